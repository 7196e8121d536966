// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::flexi_logger::Logger;
use ::std::{
    mem,
    sync::Once,
};

//======================================================================================================================
// Static Variables
//======================================================================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Initializes logging features. `RUST_LOG` takes precedence over `default_spec`.
pub fn initialize(default_spec: Option<&str>) {
    INIT_LOG.call_once(|| {
        let spec: &str = default_spec.unwrap_or("");
        let logger: Logger = match Logger::try_with_env_or_str(spec) {
            Ok(logger) => logger,
            Err(e) => {
                eprintln!("initialize(): invalid log specification {:?} ({:?})", spec, e);
                return;
            },
        };
        // Some other logger may already be installed by the host program.
        match logger.start() {
            // Writers stay alive for the rest of the process.
            Ok(handle) => mem::forget(handle),
            Err(e) => eprintln!("initialize(): failed to start logger ({:?})", e),
        }
    });
}
