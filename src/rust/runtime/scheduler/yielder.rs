// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    files::{
        FileDesc,
        IoCompletion,
        IoOutcome,
        IoRequest,
    },
    scheduler::{
        task::{
            ControlBlock,
            Suspension,
            TaskExit,
        },
        SharedScheduler,
        TaskId,
    },
};
use ::libc::EIO;
use ::std::{
    panic,
    path::Path,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Yielder lets a single task suspend itself and relay blocking I/O through the I/O executor.
///
/// Every task body receives one. It cannot leave the task: it is neither `Send` nor constructible outside the
/// scheduler, so the operations below are only reachable from code running as a task.
pub struct Yielder {
    block: *mut ControlBlock,
    id: TaskId,
    scheduler: SharedScheduler,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Yielder {
    pub(crate) fn new(block: *mut ControlBlock, id: TaskId, scheduler: SharedScheduler) -> Self {
        Self { block, id, scheduler }
    }

    /// Identifier of the running task.
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Moves the running task to the tail of the ready queue and suspends it until it is dispatched again.
    pub fn yield_now(&mut self) {
        unsafe { ControlBlock::suspend(self.block, Suspension::Yield) };
    }

    /// Finishes the running task. Values owned by the task body are dropped on the way out.
    pub fn exit(&mut self) -> ! {
        panic::resume_unwind(Box::new(TaskExit))
    }

    /// Creates a sibling task with the default stack size.
    pub fn create<F>(&mut self, entry: F) -> Result<TaskId, Fail>
    where
        F: FnOnce(&mut Yielder) + Send + 'static,
    {
        self.scheduler.create(self.scheduler.stack_size(), Box::new(entry))
    }

    /// Opens `path` for reading and appending, creating the file if needed.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<FileDesc, Fail> {
        let request: IoRequest = IoRequest::Open {
            path: path.as_ref().to_path_buf(),
        };
        match self.relay(request)? {
            IoOutcome::Opened(fd) => Ok(fd),
            outcome => Err(unexpected("open", outcome)),
        }
    }

    /// Closes `fd` once every read and write in flight on it completed.
    pub fn close(&mut self, fd: FileDesc) -> Result<(), Fail> {
        match self.relay(IoRequest::Close { fd })? {
            IoOutcome::Closed => Ok(()),
            outcome => Err(unexpected("close", outcome)),
        }
    }

    /// Writes `buf` to `fd`. Returns the number of bytes written.
    pub fn write(&mut self, fd: FileDesc, buf: &[u8]) -> Result<usize, Fail> {
        self.scheduler.files().acquire(fd)?;
        match self.relay(IoRequest::Write { fd, buf: buf.to_vec() })? {
            IoOutcome::Written(nbytes) => Ok(nbytes),
            outcome => Err(unexpected("write", outcome)),
        }
    }

    /// Reads up to `len` bytes from `fd`. The buffer is shorter than `len` only at end of file.
    pub fn read(&mut self, fd: FileDesc, len: usize) -> Result<Vec<u8>, Fail> {
        self.scheduler.files().acquire(fd)?;
        match self.relay(IoRequest::Read { fd, len })? {
            IoOutcome::Read(buf) => Ok(buf),
            outcome => Err(unexpected("read", outcome)),
        }
    }

    /// Hands `request` to the I/O executor and suspends until the compute executor resumes the task past it.
    fn relay(&mut self, request: IoRequest) -> IoCompletion {
        trace!("relay(): task_id={:?} op={}", self.id, request.name());
        let completion: Option<IoCompletion> = unsafe {
            ControlBlock::set_request(self.block, request);
            ControlBlock::suspend(self.block, Suspension::Io);
            ControlBlock::take_completion(self.block)
        };
        match completion {
            Some(completion) => completion,
            None => Err(Fail::new(EIO, "resumed without a completion")),
        }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn unexpected(op: &str, outcome: IoOutcome) -> Fail {
    let cause: String = format!("unexpected outcome for {} ({:?})", op, outcome);
    error!("relay(): {}", cause);
    Fail::new(EIO, &cause)
}
