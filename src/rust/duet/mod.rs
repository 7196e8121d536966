// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod config;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    duet::config::Config,
    runtime::{
        fail::Fail,
        logging,
        scheduler::{
            ComputeExecutor,
            IoExecutor,
            SchedulerStats,
            SharedScheduler,
            TaskId,
            Yielder,
        },
    },
};
use ::std::time::Duration;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Duet
///
/// Runs user-level tasks on two kernel threads: a compute executor that runs tasks until they yield, block on I/O,
/// or exit, and an I/O executor that performs the blocking calls tasks hand to it.
pub struct Duet {
    scheduler: SharedScheduler,
    compute: ComputeExecutor,
    io: IoExecutor,
    stopped: bool,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Duet {
    /// Sets up the queues and the open-file table and starts both executor threads.
    pub fn new(config: &Config) -> Result<Self, Fail> {
        logging::initialize(config.log_level()?.as_deref());
        let stack_size: usize = config.stack_size()?;
        let poll_interval: Duration = config.poll_interval()?;
        let scheduler: SharedScheduler = SharedScheduler::new(stack_size, poll_interval);

        let mut compute: ComputeExecutor = ComputeExecutor::start(scheduler.clone())?;
        let io: IoExecutor = match IoExecutor::start(scheduler.clone()) {
            Ok(io) => io,
            Err(e) => {
                scheduler.request_shutdown();
                if let Err(join_error) = compute.join() {
                    warn!("new(): failed to stop compute executor ({:?})", join_error);
                }
                return Err(e);
            },
        };

        info!(
            "new(): started (stack_size={:?}, poll_interval={:?})",
            stack_size, poll_interval
        );
        Ok(Self {
            scheduler,
            compute,
            io,
            stopped: false,
        })
    }

    /// Creates a task that runs `entry` and appends it to the ready queue.
    pub fn create<F>(&self, entry: F) -> Result<TaskId, Fail>
    where
        F: FnOnce(&mut Yielder) + Send + 'static,
    {
        self.scheduler.create(self.scheduler.stack_size(), Box::new(entry))
    }

    /// Like [Self::create], with an explicit stack size.
    pub fn create_with_stack_size<F>(&self, stack_size: usize, entry: F) -> Result<TaskId, Fail>
    where
        F: FnOnce(&mut Yielder) + Send + 'static,
    {
        self.scheduler.create(stack_size, Box::new(entry))
    }

    /// Snapshot of the scheduler counters.
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Waits until every task reached completion, then stops both executors. Returns the final counters.
    pub fn shutdown(mut self) -> Result<SchedulerStats, Fail> {
        self.stop()?;
        Ok(self.scheduler.stats())
    }

    fn stop(&mut self) -> Result<(), Fail> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.scheduler.request_shutdown();

        // Join both threads even if one of them failed.
        let compute: Result<(), Fail> = self.compute.join();
        let io: Result<(), Fail> = self.io.join();
        compute?;
        io?;

        let stats: SchedulerStats = self.scheduler.stats();
        info!(
            "stop(): drained (created={:?}, reclaimed={:?}, io_completed={:?})",
            stats.created, stats.reclaimed, stats.io_completed
        );
        Ok(())
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for Duet {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("drop(): shutdown failed ({:?})", e);
        }
    }
}
