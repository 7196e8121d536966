// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::clap::{
    Arg,
    ArgMatches,
    Command,
};
use ::duet::{
    Config,
    Duet,
    Fail,
    FileDesc,
    SchedulerStats,
    Yielder,
};
use ::std::{
    path::PathBuf,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

//======================================================================================================================
// Program Arguments
//======================================================================================================================

/// Program Arguments
#[derive(Debug)]
struct ProgramArguments {
    /// Number of writer tasks.
    ntasks: usize,
    /// Yields each writer performs before writing.
    nyields: usize,
    /// File the writers append to.
    path: PathBuf,
    /// Optional configuration file.
    config: Option<PathBuf>,
}

impl ProgramArguments {
    /// Parses the program arguments from the command line interface.
    fn new(app_name: &'static str, app_about: &'static str) -> Result<Self> {
        let matches: ArgMatches = Command::new(app_name)
            .about(app_about)
            .arg(
                Arg::new("tasks")
                    .long("tasks")
                    .value_parser(clap::value_parser!(usize))
                    .value_name("NUMBER")
                    .default_value("4")
                    .help("Sets number of writer tasks"),
            )
            .arg(
                Arg::new("yields")
                    .long("yields")
                    .value_parser(clap::value_parser!(usize))
                    .value_name("NUMBER")
                    .default_value("3")
                    .help("Sets number of yields before each write"),
            )
            .arg(
                Arg::new("path")
                    .long("path")
                    .value_parser(clap::value_parser!(PathBuf))
                    .required(true)
                    .value_name("FILE")
                    .help("Sets file to append to"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_name("FILE")
                    .help("Sets configuration file"),
            )
            .get_matches();

        let ntasks: usize = *matches
            .get_one::<usize>("tasks")
            .ok_or(anyhow::anyhow!("missing number of tasks"))?;
        if ntasks == 0 {
            anyhow::bail!("invalid number of tasks");
        }
        let nyields: usize = *matches
            .get_one::<usize>("yields")
            .ok_or(anyhow::anyhow!("missing number of yields"))?;
        let path: PathBuf = matches
            .get_one::<PathBuf>("path")
            .ok_or(anyhow::anyhow!("missing path"))?
            .clone();
        let config: Option<PathBuf> = matches.get_one::<PathBuf>("config").cloned();

        Ok(Self {
            ntasks,
            nyields,
            path,
            config,
        })
    }
}

//======================================================================================================================
// Tasks
//======================================================================================================================

/// Yields a few times, then appends one line to `path`.
fn writer(yielder: &mut Yielder, path: PathBuf, nyields: usize) -> Result<(), Fail> {
    for _ in 0..nyields {
        yielder.yield_now();
    }
    let fd: FileDesc = yielder.open(&path)?;
    let line: String = format!("task {} wrote after {} yields\n", yielder.task_id(), nyields);
    yielder.write(fd, line.as_bytes())?;
    yielder.close(fd)
}

/// Prints the file as it grows, until every writer finished.
fn reader(yielder: &mut Yielder, path: PathBuf, finished: Arc<AtomicUsize>, nwriters: usize) -> Result<(), Fail> {
    let fd: FileDesc = yielder.open(&path)?;
    let mut contents: Vec<u8> = Vec::new();
    loop {
        // Sample before reading so the last writer's line is not missed.
        let all_done: bool = finished.load(Ordering::Acquire) == nwriters;
        let chunk: Vec<u8> = yielder.read(fd, 4096)?;
        if !chunk.is_empty() {
            contents.extend_from_slice(&chunk);
            continue;
        }
        if all_done {
            break;
        }
        yielder.yield_now();
    }
    yielder.close(fd)?;
    print!("{}", String::from_utf8_lossy(&contents));
    Ok(())
}

//======================================================================================================================
// main()
//======================================================================================================================

fn main() -> Result<()> {
    let args: ProgramArguments = ProgramArguments::new(
        "file-relay",
        "Writer tasks append to a shared file through the I/O executor while a reader task prints it.",
    )?;

    let config: Config = match &args.config {
        Some(path) => Config::new(path)?,
        None => Config::default(),
    };
    let duet: Duet = Duet::new(&config)?;

    let finished: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    for _ in 0..args.ntasks {
        let path: PathBuf = args.path.clone();
        let nyields: usize = args.nyields;
        let finished: Arc<AtomicUsize> = finished.clone();
        duet.create(move |yielder: &mut Yielder| {
            if let Err(e) = writer(yielder, path, nyields) {
                eprintln!("writer {} failed ({:?})", yielder.task_id(), e);
            }
            finished.fetch_add(1, Ordering::Release);
        })?;
    }

    let path: PathBuf = args.path.clone();
    let nwriters: usize = args.ntasks;
    duet.create(move |yielder: &mut Yielder| {
        if let Err(e) = reader(yielder, path, finished, nwriters) {
            eprintln!("reader failed ({:?})", e);
        }
    })?;

    let stats: SchedulerStats = duet.shutdown()?;
    println!(
        "created={} reclaimed={} dispatches={} yields={} io_completed={} io_retries={}",
        stats.created, stats.reclaimed, stats.dispatches, stats.yields, stats.io_completed, stats.io_retries
    );
    Ok(())
}
