// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::common::Journal;
use ::anyhow::Result;
use ::duet::{
    ensure_eq,
    Duet,
    SchedulerStats,
    TaskId,
    Yielder,
};

//======================================================================================================================
// Tests
//======================================================================================================================

/// Tasks created back to back start in creation order.
#[test]
fn tasks_start_in_creation_order() -> Result<()> {
    const NTASKS: usize = 16;
    let duet: Duet = common::start()?;
    let journal: Journal<usize> = Journal::new();

    for i in 0..NTASKS {
        let journal: Journal<usize> = journal.clone();
        duet.create(move |_: &mut Yielder| journal.record(i))?;
    }

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events(), (0..NTASKS).collect::<Vec<usize>>());
    ensure_eq!(stats.reclaimed, NTASKS as u64);
    Ok(())
}

/// A task that yields N times is dispatched N+1 times and reclaimed once.
#[test]
fn yielding_task_is_dispatched_once_per_yield_plus_one() -> Result<()> {
    const NYIELDS: u64 = 25;
    let duet: Duet = common::start()?;

    duet.create(|yielder: &mut Yielder| {
        for _ in 0..NYIELDS {
            yielder.yield_now();
        }
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(stats.dispatches, NYIELDS + 1);
    ensure_eq!(stats.yields, NYIELDS);
    ensure_eq!(stats.created, 1);
    ensure_eq!(stats.reclaimed, 1);
    ensure_eq!(stats.live, 0);
    Ok(())
}

/// Yielding tasks take turns in FIFO order.
#[test]
fn yielding_tasks_round_robin() -> Result<()> {
    const NROUNDS: usize = 3;
    let duet: Duet = common::start()?;
    let journal: Journal<(usize, usize)> = Journal::new();
    let gate: Journal<()> = Journal::new();

    // Hold every task back until all of them are queued so the interleaving does not depend on thread timing.
    for task in 0..2 {
        let journal: Journal<(usize, usize)> = journal.clone();
        let gate: Journal<()> = gate.clone();
        duet.create(move |yielder: &mut Yielder| {
            while gate.events().is_empty() {
                yielder.yield_now();
            }
            for round in 0..NROUNDS {
                journal.record((task, round));
                yielder.yield_now();
            }
        })?;
    }
    gate.record(());

    duet.shutdown()?;
    let events: Vec<(usize, usize)> = journal.events();
    ensure_eq!(events.len(), 2 * NROUNDS);
    for pair in events.chunks(2) {
        ensure_eq!(pair[0].1, pair[1].1);
        ensure_eq!(pair[0].0 != pair[1].0, true);
    }
    Ok(())
}

/// A lone task yielding in a tight loop neither deadlocks nor starves the compute executor.
#[test]
fn thousand_yields_with_no_other_task() -> Result<()> {
    const NYIELDS: u64 = 1000;
    let duet: Duet = common::start()?;
    let journal: Journal<u64> = Journal::new();

    let counter: Journal<u64> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        for i in 0..NYIELDS {
            yielder.yield_now();
            counter.record(i);
        }
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events().len() as u64, NYIELDS);
    ensure_eq!(stats.dispatches, NYIELDS + 1);
    Ok(())
}

/// A failing stack allocation is reported and leaves the ready queue untouched.
#[test]
fn create_fails_when_stack_cannot_be_allocated() -> Result<()> {
    let duet: Duet = common::start()?;

    match duet.create_with_stack_size(usize::MAX / 2, |_: &mut Yielder| {}) {
        Ok(id) => anyhow::bail!("create should have failed (task_id={:?})", id),
        Err(e) => ensure_eq!(e.errno, libc::ENOMEM),
    }
    let stats: SchedulerStats = duet.stats();
    ensure_eq!(stats.created, 0);
    ensure_eq!(stats.ready, 0);

    // The scheduler keeps working afterwards.
    duet.create(|_: &mut Yielder| {})?;
    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(stats.created, 1);
    ensure_eq!(stats.reclaimed, 1);
    Ok(())
}

/// Tasks can create further tasks, and exit early without running the rest of their body.
#[test]
fn tasks_spawn_tasks_and_exit_early() -> Result<()> {
    let duet: Duet = common::start()?;
    let journal: Journal<&'static str> = Journal::new();

    let parent: Journal<&'static str> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        let child: Journal<&'static str> = parent.clone();
        let child_id: Result<TaskId, _> = yielder.create(move |yielder: &mut Yielder| {
            child.record("child");
            yielder.exit();
        });
        parent.record(if child_id.is_ok() { "spawned" } else { "spawn failed" });
        yielder.exit();
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events(), vec!["spawned", "child"]);
    ensure_eq!(stats.reclaimed, 2);
    Ok(())
}

/// A panicking task is reclaimed like any other and does not take the executor down.
#[test]
fn panicking_task_does_not_stop_the_scheduler() -> Result<()> {
    let duet: Duet = common::start()?;
    let journal: Journal<&'static str> = Journal::new();

    duet.create(|_: &mut Yielder| panic!("task failure under test"))?;
    let survivor: Journal<&'static str> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        yielder.yield_now();
        survivor.record("survivor");
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events(), vec!["survivor"]);
    ensure_eq!(stats.reclaimed, 2);
    Ok(())
}
