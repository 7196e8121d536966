// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::{
    collections::VecDeque,
    sync::{
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Thread-safe FIFO queue.
///
/// The lock is held only for the push or pop itself. Idle consumers park on a condition variable that every push
/// signals, with a timeout so they also notice conditions that no push announces.
pub struct Queue<T> {
    entries: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<T> Queue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends an entry at the tail of the queue.
    pub fn push_back(&self, entry: T) {
        self.lock().push_back(entry);
        self.not_empty.notify_one();
    }

    /// Removes the entry at the head of the queue.
    pub fn pop_front(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Whether an entry is waiting at the head of the queue.
    pub fn peek_front(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Blocks until the queue is not empty, [Self::notify] is called, or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) {
        let entries: MutexGuard<VecDeque<T>> = self.lock();
        if entries.is_empty() {
            let _ = self
                .not_empty
                .wait_timeout(entries, timeout)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes every thread parked in [Self::wait].
    pub fn notify(&self) {
        let _entries: MutexGuard<VecDeque<T>> = self.lock();
        self.not_empty.notify_all();
    }

    fn lock(&self) -> MutexGuard<VecDeque<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
