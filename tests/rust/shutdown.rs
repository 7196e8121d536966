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
    FileDesc,
    SchedulerStats,
    Yielder,
};
use ::std::{
    fs,
    path::PathBuf,
};
use ::tempfile::TempDir;

//======================================================================================================================
// Tests
//======================================================================================================================

/// Shutdown waits for tasks that are ready, blocked on I/O, or created during the drain.
#[test]
fn shutdown_drains_every_task() -> Result<()> {
    const NYIELDERS: usize = 8;
    const NWRITERS: usize = 8;
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("drain.txt");
    let duet: Duet = common::start()?;
    let journal: Journal<&'static str> = Journal::new();

    for _ in 0..NYIELDERS {
        let done: Journal<&'static str> = journal.clone();
        duet.create(move |yielder: &mut Yielder| {
            for _ in 0..50 {
                yielder.yield_now();
            }
            done.record("yielder");
        })?;
    }
    for _ in 0..NWRITERS {
        let done: Journal<&'static str> = journal.clone();
        let task_path: PathBuf = path.clone();
        duet.create(move |yielder: &mut Yielder| {
            if let Ok(fd) = yielder.open(&task_path) {
                let _ = yielder.write(fd, b"w");
                let _ = yielder.close(fd);
            }
            done.record("writer");
        })?;
    }
    let late: Journal<&'static str> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        yielder.yield_now();
        let done: Journal<&'static str> = late.clone();
        let _ = yielder.create(move |_: &mut Yielder| done.record("late"));
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    let events: Vec<&'static str> = journal.events();
    ensure_eq!(events.iter().filter(|e| **e == "yielder").count(), NYIELDERS);
    ensure_eq!(events.iter().filter(|e| **e == "writer").count(), NWRITERS);
    ensure_eq!(events.iter().filter(|e| **e == "late").count(), 1);
    ensure_eq!(fs::read(&path)?.len(), NWRITERS);

    let ntasks: u64 = (NYIELDERS + NWRITERS + 2) as u64;
    ensure_eq!(stats.created, ntasks);
    ensure_eq!(stats.reclaimed, ntasks);
    ensure_eq!(stats.live, 0);
    ensure_eq!(stats.ready, 0);
    ensure_eq!(stats.waiting, 0);
    ensure_eq!(stats.running_compute, None);
    ensure_eq!(stats.running_io, None);
    Ok(())
}

/// Dropping the scheduler without an explicit shutdown still runs every task to completion.
#[test]
fn drop_drains_every_task() -> Result<()> {
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("dropped.txt");
    let journal: Journal<FileDesc> = Journal::new();

    {
        let duet: Duet = common::start()?;
        let opened: Journal<FileDesc> = journal.clone();
        let task_path: PathBuf = path.clone();
        duet.create(move |yielder: &mut Yielder| {
            yielder.yield_now();
            if let Ok(fd) = yielder.open(&task_path) {
                opened.record(fd);
                let _ = yielder.write(fd, b"dropped");
                let _ = yielder.close(fd);
            }
        })?;
    }

    ensure_eq!(journal.events().len(), 1);
    ensure_eq!(fs::read(&path)?, b"dropped".to_vec());
    Ok(())
}

/// An idle scheduler stops promptly and reports empty counters.
#[test]
fn idle_scheduler_shuts_down() -> Result<()> {
    let duet: Duet = common::start()?;
    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(stats.created, 0);
    ensure_eq!(stats.reclaimed, 0);
    ensure_eq!(stats.dispatches, 0);
    ensure_eq!(stats.io_completed, 0);
    Ok(())
}
