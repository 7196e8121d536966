// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! State shared by the compute executor, the I/O executor, the facade and every task.
//!
//! A task is always in exactly one of: the ready queue, the wait queue, the compute executor's hands, the I/O
//! executor's hands. The queues hold boxed tasks, so moving a box is moving the task.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    files::FileTable,
    queue::Queue,
    scheduler::task::{
        Task,
        TaskEntry,
        TaskId,
    },
};
use ::std::{
    ops::Deref,
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            AtomicUsize,
            Ordering,
        },
        Arc,
        Mutex,
        PoisonError,
    },
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks created.
    pub created: u64,
    /// Tasks that finished and whose contexts were released.
    pub reclaimed: u64,
    /// Tasks created but not yet reclaimed.
    pub live: usize,
    /// Times the compute executor resumed a task.
    pub dispatches: u64,
    /// Voluntary yields.
    pub yields: u64,
    /// Operations the I/O executor completed.
    pub io_completed: u64,
    /// Times a close was put back on the wait queue because its file was busy.
    pub io_retries: u64,
    /// Tasks on the ready queue.
    pub ready: usize,
    /// Tasks on the wait queue.
    pub waiting: usize,
    /// Task the compute executor is running.
    pub running_compute: Option<TaskId>,
    /// Task the I/O executor is relaying.
    pub running_io: Option<TaskId>,
}

/// Counters behind [SchedulerStats].
#[derive(Default)]
struct Counters {
    created: AtomicU64,
    reclaimed: AtomicU64,
    dispatches: AtomicU64,
    yields: AtomicU64,
    io_completed: AtomicU64,
    io_retries: AtomicU64,
}

/// Task Scheduler
pub struct Scheduler {
    /// Tasks eligible to run on the compute executor.
    ready: Queue<Box<Task>>,
    /// Tasks waiting for the I/O executor.
    wait: Queue<Box<Task>>,
    /// Open files, shared with the I/O executor.
    files: FileTable,
    /// Task currently resumed by the compute executor.
    compute_slot: Mutex<Option<TaskId>>,
    /// Task currently relayed by the I/O executor.
    io_slot: Mutex<Option<TaskId>>,
    /// Set once shutdown was requested.
    shutdown: AtomicBool,
    /// Set by the compute executor once it has stopped. No I/O request can be issued afterwards.
    compute_stopped: AtomicBool,
    /// Tasks handed to the I/O executor and not yet back on the ready queue.
    io_pending: AtomicUsize,
    /// Tasks created and not yet reclaimed.
    live: AtomicUsize,
    next_id: AtomicU64,
    stack_size: usize,
    poll_interval: Duration,
    counters: Counters,
}

#[derive(Clone)]
pub struct SharedScheduler(Arc<Scheduler>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Scheduler {
    /// Stack size given to tasks that do not ask for one.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Upper bound on how long an idle executor sleeps before re-checking its queue.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub(crate) fn ready(&self) -> &Queue<Box<Task>> {
        &self.ready
    }

    pub(crate) fn wait(&self) -> &Queue<Box<Task>> {
        &self.wait
    }

    /// Asks both executors to drain and stop.
    pub fn request_shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            debug!("request_shutdown(): draining");
        }
        self.ready.notify();
        self.wait.notify();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Whether the compute executor may stop: nothing is ready and the I/O executor holds nothing it could hand back.
    pub(crate) fn compute_drained(&self) -> bool {
        // Hand-backs land on the ready queue before the pending count drops, so read the count first.
        self.io_pending.load(Ordering::Acquire) == 0 && self.ready.is_empty()
    }

    /// Whether the I/O executor may stop: nothing is waiting and the compute executor can issue no more requests.
    pub(crate) fn io_drained(&self) -> bool {
        self.compute_stopped.load(Ordering::Acquire) && self.wait.is_empty()
    }

    pub(crate) fn mark_compute_stopped(&self) {
        self.compute_stopped.store(true, Ordering::Release);
        self.wait.notify();
    }

    /// Moves a task that just suspended for I/O onto the wait queue.
    pub(crate) fn hand_to_io(&self, task: Box<Task>) {
        self.io_pending.fetch_add(1, Ordering::AcqRel);
        self.wait.push_back(task);
    }

    /// Moves a task whose I/O completed back onto the ready queue.
    pub(crate) fn hand_back(&self, task: Box<Task>) {
        self.ready.push_back(task);
        self.io_pending.fetch_sub(1, Ordering::AcqRel);
        self.counters.io_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Puts a task back on the wait queue because its request cannot run yet.
    pub(crate) fn retry_io(&self, task: Box<Task>) {
        self.counters.io_retries.fetch_add(1, Ordering::Relaxed);
        self.wait.push_back(task);
    }

    pub(crate) fn requeue(&self, task: Box<Task>) {
        self.counters.yields.fetch_add(1, Ordering::Relaxed);
        self.ready.push_back(task);
    }

    /// Releases a finished task together with its execution context.
    pub(crate) fn reclaim(&self, task: Box<Task>) {
        debug!(
            "reclaim(): task_id={:?} resumptions={:?}",
            task.id(),
            task.resumptions()
        );
        drop(task);
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.counters.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_running_compute(&self, id: Option<TaskId>) {
        if id.is_some() {
            self.counters.dispatches.fetch_add(1, Ordering::Relaxed);
        }
        *self.compute_slot.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    pub(crate) fn set_running_io(&self, id: Option<TaskId>) {
        *self.io_slot.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    /// Snapshot of the scheduler counters.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            created: self.counters.created.load(Ordering::Relaxed),
            reclaimed: self.counters.reclaimed.load(Ordering::Relaxed),
            live: self.live.load(Ordering::Acquire),
            dispatches: self.counters.dispatches.load(Ordering::Relaxed),
            yields: self.counters.yields.load(Ordering::Relaxed),
            io_completed: self.counters.io_completed.load(Ordering::Relaxed),
            io_retries: self.counters.io_retries.load(Ordering::Relaxed),
            ready: self.ready.len(),
            waiting: self.wait.len(),
            running_compute: *self.compute_slot.lock().unwrap_or_else(PoisonError::into_inner),
            running_io: *self.io_slot.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl SharedScheduler {
    pub fn new(stack_size: usize, poll_interval: Duration) -> Self {
        Self(Arc::new(Scheduler {
            ready: Queue::new(),
            wait: Queue::new(),
            files: FileTable::new(),
            compute_slot: Mutex::new(None),
            io_slot: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            compute_stopped: AtomicBool::new(false),
            io_pending: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            stack_size,
            poll_interval,
            counters: Counters::default(),
        }))
    }

    /// Allocates a task running `entry` and appends it to the ready queue. Nothing is enqueued on failure.
    pub fn create(&self, stack_size: usize, entry: TaskEntry) -> Result<TaskId, Fail> {
        let id: TaskId = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task: Box<Task> = match Task::new(id, stack_size, entry, self.clone()) {
            Ok(task) => task,
            Err(e) => {
                warn!("create(): failed to allocate task (stack_size={:?}, error={:?})", stack_size, e);
                return Err(e);
            },
        };
        self.live.fetch_add(1, Ordering::AcqRel);
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        debug!("create(): task_id={:?} stack_size={:?}", id, stack_size);
        self.ready.push_back(task);
        Ok(id)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedScheduler {
    type Target = Scheduler;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
