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
    Fail,
    FileDesc,
    SchedulerStats,
    Yielder,
};
use ::std::{
    ffi::CString,
    fs::{
        self,
        OpenOptions,
    },
    io::Write,
    os::unix::ffi::OsStrExt,
    path::{
        Path,
        PathBuf,
    },
    sync::mpsc,
    thread,
    time::{
        Duration,
        Instant,
    },
};
use ::tempfile::TempDir;

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Creates a named pipe. Reads on it block the I/O executor until the test writes to it.
fn make_fifo(path: &Path) -> Result<()> {
    let c_path: CString = CString::new(path.as_os_str().as_bytes())?;
    if unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) } != 0 {
        anyhow::bail!("mkfifo failed: {:?}", ::std::io::Error::last_os_error());
    }
    Ok(())
}

/// Shuts `duet` down on a helper thread and fails if the drain does not finish in time.
fn shutdown_within(duet: Duet, timeout: Duration) -> Result<SchedulerStats> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(duet.shutdown());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(result?),
        Err(_) => anyhow::bail!("shutdown did not return within {:?}", timeout),
    }
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Bytes written through one descriptor are read back through another.
#[test]
fn write_then_read_back() -> Result<()> {
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("roundtrip.txt");
    let duet: Duet = common::start()?;
    let journal: Journal<Result<Vec<u8>, Fail>> = Journal::new();

    let result: Journal<Result<Vec<u8>, Fail>> = journal.clone();
    let task_path: PathBuf = path.clone();
    duet.create(move |yielder: &mut Yielder| {
        let outcome = (|| -> Result<Vec<u8>, Fail> {
            let fd: FileDesc = yielder.open(&task_path)?;
            yielder.write(fd, b"hello, duet")?;
            yielder.close(fd)?;
            let fd: FileDesc = yielder.open(&task_path)?;
            let buf: Vec<u8> = yielder.read(fd, 64)?;
            yielder.close(fd)?;
            Ok(buf)
        })();
        result.record(outcome);
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events(), vec![Ok(b"hello, duet".to_vec())]);
    ensure_eq!(fs::read(&path)?, b"hello, duet".to_vec());
    ensure_eq!(stats.io_completed, 6);
    Ok(())
}

/// Writers that share a file append to it rather than overwrite each other.
#[test]
fn concurrent_writers_append() -> Result<()> {
    const NWRITERS: usize = 3;
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("shared.txt");
    let duet: Duet = common::start()?;
    let failures: Journal<Fail> = Journal::new();

    for _ in 0..NWRITERS {
        let task_path: PathBuf = path.clone();
        let failures: Journal<Fail> = failures.clone();
        duet.create(move |yielder: &mut Yielder| {
            let outcome = (|| -> Result<(), Fail> {
                let fd: FileDesc = yielder.open(&task_path)?;
                yielder.write(fd, b"x")?;
                yielder.close(fd)
            })();
            if let Err(e) = outcome {
                failures.record(e);
            }
        })?;
    }

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(failures.events().is_empty(), true);
    ensure_eq!(fs::read_to_string(&path)?, "x".repeat(NWRITERS));
    ensure_eq!(stats.reclaimed, NWRITERS as u64);
    ensure_eq!(stats.live, 0);
    Ok(())
}

/// A close issued while a write on the same descriptor is queued completes after the write.
#[test]
fn close_waits_for_write_in_flight() -> Result<()> {
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("busy.txt");
    let duet: Duet = common::start()?;
    let journal: Journal<&'static str> = Journal::new();

    let writer: Journal<&'static str> = journal.clone();
    let task_path: PathBuf = path.clone();
    duet.create(move |yielder: &mut Yielder| {
        let fd: FileDesc = match yielder.open(&task_path) {
            Ok(fd) => fd,
            Err(_) => return writer.record("open failed"),
        };

        let closer: Journal<&'static str> = writer.clone();
        let spawned = yielder.create(move |yielder: &mut Yielder| match yielder.close(fd) {
            Ok(()) => closer.record("close done"),
            Err(_) => closer.record("close failed"),
        });
        if spawned.is_err() {
            return writer.record("create failed");
        }

        match yielder.write(fd, b"payload") {
            Ok(_) => writer.record("write done"),
            Err(_) => writer.record("write failed"),
        }
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events(), vec!["write done", "close done"]);
    ensure_eq!(fs::read(&path)?, b"payload".to_vec());
    ensure_eq!(stats.reclaimed, 2);
    Ok(())
}

/// Operations on a descriptor that was never opened fail with `EBADF`.
#[test]
fn unknown_descriptor_is_rejected() -> Result<()> {
    let duet: Duet = common::start()?;
    let journal: Journal<i32> = Journal::new();

    let errnos: Journal<i32> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        let fd: FileDesc = FileDesc::from(4096u32);
        errnos.record(yielder.write(fd, b"lost").err().map_or(0, |e| e.errno));
        errnos.record(yielder.read(fd, 16).err().map_or(0, |e| e.errno));
        errnos.record(yielder.close(fd).err().map_or(0, |e| e.errno));
    })?;

    duet.shutdown()?;
    ensure_eq!(journal.events(), vec![libc::EBADF, libc::EBADF, libc::EBADF]);
    Ok(())
}

/// A failed open reports the host error to the task and leaves the table empty.
#[test]
fn open_in_missing_directory_fails() -> Result<()> {
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("missing").join("file.txt");
    let duet: Duet = common::start()?;
    let journal: Journal<i32> = Journal::new();

    let errnos: Journal<i32> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        errnos.record(yielder.open(&path).err().map_or(0, |e| e.errno));
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    ensure_eq!(journal.events(), vec![libc::ENOENT]);
    ensure_eq!(stats.io_completed, 1);
    Ok(())
}

/// Reads asking for more than can ever be allocated are reported to the task and the scheduler still drains.
#[test]
fn oversized_read_is_reported_and_shutdown_returns() -> Result<()> {
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("small.txt");
    let fifo: PathBuf = dir.path().join("stream");
    fs::write(&path, b"abc")?;
    make_fifo(&fifo)?;
    let duet: Duet = common::start()?;
    let journal: Journal<Result<Vec<u8>, i32>> = Journal::new();

    let results: Journal<Result<Vec<u8>, i32>> = journal.clone();
    duet.create(move |yielder: &mut Yielder| {
        for target in [&path, &fifo] {
            match yielder.open(target) {
                Ok(fd) => {
                    results.record(yielder.read(fd, usize::MAX).map_err(|e| e.errno));
                    let _ = yielder.close(fd);
                },
                Err(e) => results.record(Err(e.errno)),
            }
        }
    })?;

    let stats: SchedulerStats = shutdown_within(duet, Duration::from_secs(10))?;
    ensure_eq!(journal.events(), vec![Ok(b"abc".to_vec()), Err(libc::ENOMEM)]);
    ensure_eq!(stats.live, 0);
    Ok(())
}

/// A close that reaches the I/O executor while a write on its descriptor is still queued behind it is retried until
/// the write completed.
#[test]
fn close_is_retried_until_queued_write_completes() -> Result<()> {
    let dir: TempDir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("retried.txt");
    let fifo: PathBuf = dir.path().join("gate");
    make_fifo(&fifo)?;
    let duet: Duet = common::start()?;
    let journal: Journal<&'static str> = Journal::new();

    let events: Journal<&'static str> = journal.clone();
    let task_path: PathBuf = path.clone();
    let gate_path: PathBuf = fifo.clone();
    duet.create(move |yielder: &mut Yielder| {
        let (fd, gate): (FileDesc, FileDesc) = match (yielder.open(&task_path), yielder.open(&gate_path)) {
            (Ok(fd), Ok(gate)) => (fd, gate),
            _ => return events.record("open failed"),
        };

        // Parks the I/O executor on the pipe until the test releases it.
        let spawned_blocker = yielder.create(move |yielder: &mut Yielder| {
            let _ = yielder.read(gate, 1);
        });
        let closer: Journal<&'static str> = events.clone();
        let spawned_closer = yielder.create(move |yielder: &mut Yielder| match yielder.close(fd) {
            Ok(()) => closer.record("close done"),
            Err(_) => closer.record("close failed"),
        });
        if spawned_blocker.is_err() || spawned_closer.is_err() {
            return events.record("create failed");
        }

        // Let the blocker and the closer queue their requests first.
        yielder.yield_now();
        match yielder.write(fd, b"late write") {
            Ok(_) => events.record("write done"),
            Err(_) => events.record("write failed"),
        }
    })?;

    // Wait until the pipe read is in flight or queued together with the close and the write.
    let deadline: Instant = Instant::now() + Duration::from_secs(10);
    let queued: bool = loop {
        let stats: SchedulerStats = duet.stats();
        if stats.waiting + usize::from(stats.running_io.is_some()) >= 3 {
            break true;
        }
        if Instant::now() >= deadline {
            break false;
        }
        thread::sleep(Duration::from_millis(1));
    };
    OpenOptions::new().write(true).open(&fifo)?.write_all(b"g")?;
    anyhow::ensure!(queued, "requests were never queued");

    let stats: SchedulerStats = shutdown_within(duet, Duration::from_secs(10))?;
    ensure_eq!(journal.events(), vec!["write done", "close done"]);
    anyhow::ensure!(stats.io_retries >= 1, "close was never retried ({:?})", stats);
    ensure_eq!(fs::read(&path)?, b"late write".to_vec());
    Ok(())
}
