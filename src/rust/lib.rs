// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod duet;
pub mod runtime;

pub use self::{
    duet::{
        config::Config,
        Duet,
    },
    runtime::{
        fail::Fail,
        files::FileDesc,
        scheduler::{
            SchedulerStats,
            TaskId,
            Yielder,
        },
    },
};

#[doc(hidden)]
pub use ::anyhow;

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal, bailing out of the enclosing `anyhow::Result` function otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::anyhow::bail!(
                        "ensure_eq failed: `(left == right)` left: `{:?}`, right: `{:?}` ({}:{})",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}

/// Ensures that two expressions are not equal, bailing out of the enclosing `anyhow::Result` function otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    $crate::anyhow::bail!(
                        "ensure_neq failed: `(left != right)` left: `{:?}`, right: `{:?}` ({}:{})",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}
