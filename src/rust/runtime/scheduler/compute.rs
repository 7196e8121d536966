// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        state::{
            ExecutorState,
            StateMachine,
        },
        task::{
            Suspension,
            Task,
        },
        SharedScheduler,
        TaskId,
    },
};
use ::libc::{
    EAGAIN,
    EIO,
};
use ::std::thread::{
    self,
    JoinHandle,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const THREAD_NAME: &str = "duet-cexec";

//======================================================================================================================
// Structures
//======================================================================================================================

/// Compute executor: the kernel thread that runs tasks from the ready queue.
pub struct ComputeExecutor {
    handle: Option<JoinHandle<()>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ComputeExecutor {
    /// Starts the executor thread.
    pub fn start(scheduler: SharedScheduler) -> Result<Self, Fail> {
        let handle: JoinHandle<()> = match thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || Self::run(scheduler))
        {
            Ok(handle) => handle,
            Err(e) => {
                let cause: String = format!("failed to spawn {} ({:?})", THREAD_NAME, e);
                error!("start(): {}", cause);
                return Err(Fail::new(e.raw_os_error().unwrap_or(EAGAIN), &cause));
            },
        };
        Ok(Self { handle: Some(handle) })
    }

    /// Waits for the executor thread to stop. Only returns once shutdown was requested and the scheduler drained.
    pub fn join(&mut self) -> Result<(), Fail> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                error!("join(): {} panicked", THREAD_NAME);
                Fail::new(EIO, "compute executor panicked")
            }),
            None => Ok(()),
        }
    }

    fn run(scheduler: SharedScheduler) {
        let mut machine: StateMachine = StateMachine::new(THREAD_NAME);
        loop {
            match scheduler.ready().pop_front() {
                Some(task) => {
                    machine.set(ExecutorState::Dispatching);
                    Self::dispatch(&scheduler, &mut machine, task);
                },
                None if scheduler.is_shutting_down() => {
                    machine.set(ExecutorState::Draining);
                    if scheduler.compute_drained() {
                        break;
                    }
                    scheduler.ready().wait(scheduler.poll_interval());
                },
                None => {
                    machine.set(ExecutorState::Idle);
                    scheduler.ready().wait(scheduler.poll_interval());
                },
            }
        }
        machine.set(ExecutorState::Stopped);
        scheduler.mark_compute_stopped();
    }

    /// Resumes `task` until it suspends, then routes it by the reason it gave.
    fn dispatch(scheduler: &SharedScheduler, machine: &mut StateMachine, mut task: Box<Task>) {
        let id: TaskId = task.id();
        scheduler.set_running_compute(Some(id));
        machine.set(ExecutorState::Running);
        let suspension: Suspension = task.resume();
        scheduler.set_running_compute(None);

        match suspension {
            Suspension::Yield => scheduler.requeue(task),
            Suspension::Io => scheduler.hand_to_io(task),
            Suspension::Exit => {
                machine.set(ExecutorState::Reclaim);
                scheduler.reclaim(task);
            },
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for ComputeExecutor {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("drop(): {} was never joined", THREAD_NAME);
        }
    }
}
