// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod context;
pub mod fail;
pub mod files;
pub mod limits;
pub mod logging;
pub mod queue;
pub mod scheduler;
