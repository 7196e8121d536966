// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::fmt;

//======================================================================================================================
// Structures
//======================================================================================================================

/// States an executor moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Queue empty; parked until something arrives or the poll interval runs out.
    Idle,
    /// Popped a task and about to run it.
    Dispatching,
    /// A task is running.
    Running,
    /// A finished task is being released (compute executor only).
    Reclaim,
    /// A task is being handed back to the ready queue (I/O executor only).
    Handoff,
    /// Shutdown requested; finishing reachable work.
    Draining,
    /// Terminal.
    Stopped,
}

/// Tracks and logs the state of one executor.
pub struct StateMachine {
    name: &'static str,
    state: ExecutorState,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl StateMachine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn set(&mut self, state: ExecutorState) {
        if self.state != state {
            trace!("{}: {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            ExecutorState::Idle => "IDLE",
            ExecutorState::Dispatching => "DISPATCHING",
            ExecutorState::Running => "RUNNING",
            ExecutorState::Reclaim => "RECLAIM",
            ExecutorState::Handoff => "HANDOFF",
            ExecutorState::Draining => "DRAINING",
            ExecutorState::Stopped => "STOPPED",
        };
        write!(f, "{}", name)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
