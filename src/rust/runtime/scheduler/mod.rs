// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod compute;
mod io;
#[allow(clippy::module_inception)]
mod scheduler;
mod state;
mod task;
mod yielder;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    compute::ComputeExecutor,
    io::IoExecutor,
    scheduler::{
        Scheduler,
        SchedulerStats,
        SharedScheduler,
    },
    state::{
        ExecutorState,
        StateMachine,
    },
    task::{
        Task,
        TaskEntry,
        TaskId,
    },
    yielder::Yielder,
};
