// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    files::{
        FileDesc,
        FileTable,
        IoRequest,
        Relay,
    },
    scheduler::{
        state::{
            ExecutorState,
            StateMachine,
        },
        task::Task,
        SharedScheduler,
        TaskId,
    },
};
use ::libc::{
    EAGAIN,
    EIO,
};
use ::std::{
    panic::{
        self,
        AssertUnwindSafe,
    },
    thread::{
        self,
        JoinHandle,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

const THREAD_NAME: &str = "duet-iexec";

//======================================================================================================================
// Structures
//======================================================================================================================

/// I/O executor: the kernel thread that performs the blocking calls tasks hand to it.
///
/// It never resumes a task's context. It runs the request a suspended task left behind on its own stack, stores the
/// result in the task and hands the task back to the ready queue, where the compute executor resumes it. It never
/// frees a task either.
pub struct IoExecutor {
    handle: Option<JoinHandle<()>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl IoExecutor {
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

    /// Waits for the executor thread to stop.
    pub fn join(&mut self) -> Result<(), Fail> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                error!("join(): {} panicked", THREAD_NAME);
                Fail::new(EIO, "I/O executor panicked")
            }),
            None => Ok(()),
        }
    }

    fn run(scheduler: SharedScheduler) {
        let mut machine: StateMachine = StateMachine::new(THREAD_NAME);
        loop {
            match scheduler.wait().pop_front() {
                Some(task) => {
                    machine.set(ExecutorState::Dispatching);
                    Self::relay(&scheduler, &mut machine, task);
                },
                None if scheduler.is_shutting_down() => {
                    machine.set(ExecutorState::Draining);
                    if scheduler.io_drained() {
                        break;
                    }
                    scheduler.wait().wait(scheduler.poll_interval());
                },
                None => {
                    machine.set(ExecutorState::Idle);
                    scheduler.wait().wait(scheduler.poll_interval());
                },
            }
        }
        machine.set(ExecutorState::Stopped);
    }

    /// Performs the request `task` is suspended on and routes the task onwards.
    fn relay(scheduler: &SharedScheduler, machine: &mut StateMachine, mut task: Box<Task>) {
        let id: TaskId = task.id();
        let request: IoRequest = match task.take_request() {
            Some(request) => request,
            None => {
                error!("relay(): task_id={:?} is waiting without a request", id);
                task.complete(Err(Fail::new(EIO, "no request to relay")));
                machine.set(ExecutorState::Handoff);
                scheduler.hand_back(task);
                return;
            },
        };

        scheduler.set_running_io(Some(id));
        machine.set(ExecutorState::Running);
        trace!("relay(): task_id={:?} op={} fd={:?}", id, request.name(), request.fd());
        let relay: Relay = Self::contain(scheduler.files(), request, |files, request| files.perform(request));
        scheduler.set_running_io(None);

        match relay {
            Relay::Complete(completion) => {
                task.complete(completion);
                machine.set(ExecutorState::Handoff);
                scheduler.hand_back(task);
            },
            Relay::Retry(request) => {
                task.set_request(request);
                scheduler.retry_io(task);
            },
        }
    }

    /// Runs `op` and turns a panic into an `EIO` completion, so the task still goes back to the compute executor and
    /// the descriptor it held busy is released.
    fn contain<F>(files: &FileTable, request: IoRequest, op: F) -> Relay
    where
        F: FnOnce(&FileTable, IoRequest) -> Relay,
    {
        let name: &'static str = request.name();
        let busy: Option<FileDesc> = request.busy_fd();
        match panic::catch_unwind(AssertUnwindSafe(|| op(files, request))) {
            Ok(relay) => relay,
            Err(_) => {
                error!("contain(): {} panicked (fd={:?})", name, busy);
                if let Some(fd) = busy {
                    files.release(fd);
                }
                let cause: String = format!("{} panicked", name);
                Relay::Complete(Err(Fail::new(EIO, &cause)))
            },
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for IoExecutor {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("drop(): {} was never joined", THREAD_NAME);
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
