// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    context::ExecutionContext,
    fail::Fail,
    files::{
        IoCompletion,
        IoRequest,
    },
    scheduler::{
        yielder::Yielder,
        SharedScheduler,
    },
};
use ::std::{
    any::Any,
    fmt,
    panic::{
        self,
        AssertUnwindSafe,
    },
    process,
    ptr::{
        self,
        NonNull,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Externally visible task identifier.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct TaskId(pub u64);

/// Body of a task.
pub type TaskEntry = Box<dyn FnOnce(&mut Yielder) + Send + 'static>;

/// Why a task handed control back to the executor that resumed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Voluntary yield. The task goes to the tail of the ready queue.
    Yield,
    /// The task stored an [IoRequest] and waits for the I/O executor.
    Io,
    /// The task finished and must be reclaimed.
    Exit,
}

/// Payload unwound through a task body by [Yielder::exit].
pub(crate) struct TaskExit;

/// State shared between a task's body and the executor resuming it. Lives on the heap so its address survives the
/// task being moved between queues.
pub(crate) struct ControlBlock {
    id: TaskId,
    /// Stack and saved suspension point of the task.
    context: ExecutionContext,
    /// Stack pointer of whoever resumed the task last.
    resumer: usize,
    /// Set by the task right before it switches away.
    suspension: Option<Suspension>,
    /// Blocking operation waiting for the I/O executor.
    request: Option<IoRequest>,
    /// Result of the last relayed operation.
    completion: Option<IoCompletion>,
    /// Taken on first resumption.
    entry: Option<TaskEntry>,
    /// Taken on first resumption and handed to the task's [Yielder].
    scheduler: Option<SharedScheduler>,
    done: bool,
    resumptions: u64,
}

/// Task
///
/// A user-level thread. Owned by exactly one queue or executor at a time; moving the box moves the ownership.
pub struct Task {
    block: NonNull<ControlBlock>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ControlBlock {
    /// Saves `suspension` and switches back to the resumer.
    ///
    /// # Safety
    ///
    /// Must be called from the task's own stack, with `block` pointing to its control block.
    pub(crate) unsafe fn suspend(block: *mut Self, suspension: Suspension) {
        (*block).suspension = Some(suspension);
        let resumer: usize = (*block).resumer;
        ExecutionContext::switch_from(ptr::addr_of_mut!((*block).context), resumer);
    }

    /// Stores a request for the I/O executor.
    ///
    /// # Safety
    ///
    /// Must be called from the task's own stack.
    pub(crate) unsafe fn set_request(block: *mut Self, request: IoRequest) {
        (*block).request = Some(request);
    }

    /// Takes the completion left by the I/O executor.
    ///
    /// # Safety
    ///
    /// Must be called from the task's own stack.
    pub(crate) unsafe fn take_completion(block: *mut Self) -> Option<IoCompletion> {
        (*block).completion.take()
    }
}

impl Task {
    /// Allocates a task whose first resumption runs `entry`.
    pub(crate) fn new(
        id: TaskId,
        stack_size: usize,
        entry: TaskEntry,
        scheduler: SharedScheduler,
    ) -> Result<Box<Self>, Fail> {
        let context: ExecutionContext = ExecutionContext::new(stack_size)?;
        let block: *mut ControlBlock = Box::into_raw(Box::new(ControlBlock {
            id,
            context,
            resumer: 0,
            suspension: None,
            request: None,
            completion: None,
            entry: Some(entry),
            scheduler: Some(scheduler),
            done: false,
            resumptions: 0,
        }));
        unsafe { (*block).context.prepare(task_main, block as usize) };

        Ok(Box::new(Self {
            block: unsafe { NonNull::new_unchecked(block) },
        }))
    }

    pub fn id(&self) -> TaskId {
        self.block().id
    }

    /// Whether the task ran to completion.
    pub fn is_done(&self) -> bool {
        self.block().done
    }

    /// How many times the task was resumed.
    pub fn resumptions(&self) -> u64 {
        self.block().resumptions
    }

    /// Runs the task on the calling thread until it suspends again.
    pub(crate) fn resume(&mut self) -> Suspension {
        let block: *mut ControlBlock = self.block.as_ptr();
        let suspension: Option<Suspension> = unsafe {
            (*block).resumptions += 1;
            ExecutionContext::switch_to(ptr::addr_of_mut!((*block).context), ptr::addr_of_mut!((*block).resumer));
            (*block).suspension.take()
        };
        match suspension {
            Some(suspension) => suspension,
            None => {
                error!("resume(): task_id={:?} switched back without a reason", self.id());
                Suspension::Exit
            },
        }
    }

    /// Takes the pending I/O request of a suspended task.
    pub(crate) fn take_request(&mut self) -> Option<IoRequest> {
        self.block_mut().request.take()
    }

    /// Puts back a request that has to be retried.
    pub(crate) fn set_request(&mut self, request: IoRequest) {
        self.block_mut().request = Some(request);
    }

    /// Leaves the result of a relayed operation for the task to pick up.
    pub(crate) fn complete(&mut self, completion: IoCompletion) {
        self.block_mut().completion = Some(completion);
    }

    fn block(&self) -> &ControlBlock {
        // The task is not running while someone holds it.
        unsafe { self.block.as_ref() }
    }

    fn block_mut(&mut self) -> &mut ControlBlock {
        unsafe { self.block.as_mut() }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// First function on every task stack.
extern "C" fn task_main(arg: usize) -> ! {
    let block: *mut ControlBlock = arg as *mut ControlBlock;
    let (id, entry, scheduler): (TaskId, Option<TaskEntry>, Option<SharedScheduler>) =
        unsafe { ((*block).id, (*block).entry.take(), (*block).scheduler.take()) };

    if let (Some(entry), Some(scheduler)) = (entry, scheduler) {
        let mut yielder: Yielder = Yielder::new(block, id, scheduler);
        match panic::catch_unwind(AssertUnwindSafe(|| entry(&mut yielder))) {
            Ok(()) => trace!("task_main(): task_id={:?} returned", id),
            Err(payload) if payload.is::<TaskExit>() => trace!("task_main(): task_id={:?} exited", id),
            Err(payload) => error!("task_main(): task_id={:?} panicked ({})", id, panic_message(&*payload)),
        }
    }

    unsafe {
        (*block).done = true;
        ControlBlock::suspend(block, Suspension::Exit);
    }

    // Exited tasks are reclaimed, never resumed.
    process::abort()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown payload"
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for u64 {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("stack_size", &self.block().context.stack_size())
            .field("done", &self.is_done())
            .field("resumptions", &self.resumptions())
            .finish()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if !self.is_done() {
            warn!("drop(): task_id={:?} dropped before completion", self.id());
        }
        drop(unsafe { Box::from_raw(self.block.as_ptr()) });
    }
}

/// A task's stack is only ever executed by the compute executor's thread; other threads merely move the box.
unsafe impl Send for Task {}
