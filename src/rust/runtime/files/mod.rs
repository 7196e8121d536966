// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod fdesc;
mod operation;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::libc::{
    EBADF,
    EMFILE,
    ENOMEM,
};
use ::slab::{
    Slab,
    VacantEntry,
};
use ::std::{
    fs::{
        File,
        OpenOptions,
    },
    io::{
        ErrorKind,
        Read,
        Seek,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    fdesc::FileDesc,
    operation::{
        IoCompletion,
        IoOutcome,
        IoRequest,
        Relay,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Open-File Record
struct OpenFile {
    /// Underlying host file. Cloned out of the table so that blocking calls run without the table lock held.
    file: Arc<File>,
    /// Path the file was opened with.
    path: PathBuf,
    /// Reads and writes issued but not yet completed. The record is busy while this is non-zero.
    in_flight: usize,
}

/// Open-File Table
///
/// Shared by tasks, which mark records busy before handing a read or write to the I/O executor, and by the I/O
/// executor, which performs the blocking host calls.
pub struct FileTable {
    table: Mutex<Slab<OpenFile>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl FileTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Slab::new()),
        }
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no file is open.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a read or write is in flight on `fd`. Returns `None` if `fd` is not open.
    pub fn is_busy(&self, fd: FileDesc) -> Option<bool> {
        self.lock().get(fd.into()).map(|record| record.in_flight > 0)
    }

    /// Path `fd` was opened with.
    pub fn path(&self, fd: FileDesc) -> Option<PathBuf> {
        self.lock().get(fd.into()).map(|record| record.path.clone())
    }

    /// Marks `fd` busy for one more read or write.
    pub fn acquire(&self, fd: FileDesc) -> Result<(), Fail> {
        match self.lock().get_mut(fd.into()) {
            Some(record) => {
                record.in_flight += 1;
                Ok(())
            },
            None => Err(Fail::new(EBADF, "bad file descriptor")),
        }
    }

    /// Drops one read or write from the busy count of `fd`.
    pub fn release(&self, fd: FileDesc) {
        if let Some(record) = self.lock().get_mut(fd.into()) {
            record.in_flight = record.in_flight.saturating_sub(1);
        }
    }

    /// Runs `request` against the host file system. Blocks the calling thread.
    pub fn perform(&self, request: IoRequest) -> Relay {
        match request {
            IoRequest::Open { path } => Relay::Complete(self.open(&path).map(IoOutcome::Opened)),
            IoRequest::Close { fd } => self.close(fd),
            IoRequest::Read { fd, len } => {
                let result: Result<Vec<u8>, Fail> = self.read(fd, len);
                self.release(fd);
                Relay::Complete(result.map(IoOutcome::Read))
            },
            IoRequest::Write { fd, buf } => {
                let result: Result<usize, Fail> = self.write(fd, &buf);
                self.release(fd);
                Relay::Complete(result.map(IoOutcome::Written))
            },
        }
    }

    /// Opens an existing file for reading and appending, creating it if it does not exist.
    fn open(&self, path: &Path) -> Result<FileDesc, Fail> {
        let file: File = match OpenOptions::new().read(true).append(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("open(): creating {:?}", path);
                match OpenOptions::new().read(true).append(true).create(true).open(path) {
                    Ok(file) => file,
                    Err(e) => {
                        warn!("open(): failed to create {:?} ({:?})", path, e);
                        return Err(e.into());
                    },
                }
            },
            Err(e) => {
                warn!("open(): failed to open {:?} ({:?})", path, e);
                return Err(e.into());
            },
        };

        let mut table: MutexGuard<Slab<OpenFile>> = self.lock();
        let entry: VacantEntry<OpenFile> = table.vacant_entry();
        let fd: FileDesc = match FileDesc::try_from(entry.key()) {
            Ok(fd) => fd,
            Err(_) => {
                warn!("open(): descriptor table is full (path={:?})", path);
                return Err(Fail::new(EMFILE, "too many open files"));
            },
        };
        entry.insert(OpenFile {
            file: Arc::new(file),
            path: path.to_path_buf(),
            in_flight: 0,
        });
        drop(table);
        debug!("open(): path={:?} fd={:?}", path, fd);
        Ok(fd)
    }

    /// Closes `fd`, or asks for a retry while a read or write is in flight on it.
    fn close(&self, fd: FileDesc) -> Relay {
        let mut table: MutexGuard<Slab<OpenFile>> = self.lock();
        let busy: bool = match table.get(fd.into()) {
            Some(record) => record.in_flight > 0,
            None => return Relay::Complete(Err(Fail::new(EBADF, "bad file descriptor"))),
        };
        if busy {
            trace!("close(): fd={:?} is busy, retrying", fd);
            return Relay::Retry(IoRequest::Close { fd });
        }
        let record: OpenFile = table.remove(fd.into());
        drop(table);

        // The host file closes when its last handle goes away.
        drop(record.file);
        debug!("close(): path={:?} fd={:?}", record.path, fd);
        Relay::Complete(Ok(IoOutcome::Closed))
    }

    /// Reads until `len` bytes were read or the end of the file is reached.
    fn read(&self, fd: FileDesc, len: usize) -> Result<Vec<u8>, Fail> {
        let file: Arc<File> = self.file(fd)?;

        // A regular file cannot yield more than what lies past the cursor.
        let len: usize = match Self::remaining(&file) {
            Some(remaining) => len.min(remaining),
            None => len,
        };
        let mut buf: Vec<u8> = Vec::new();
        if let Err(e) = buf.try_reserve_exact(len) {
            let cause: String = format!("cannot allocate read buffer (len={:?}, error={:?})", len, e);
            warn!("read(): fd={:?} {}", fd, cause);
            return Err(Fail::new(ENOMEM, &cause));
        }
        buf.resize(len, 0);
        let mut nread: usize = 0;
        while nread < len {
            match (&*file).read(&mut buf[nread..]) {
                Ok(0) => break,
                Ok(n) => nread += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("read(): fd={:?} failed ({:?})", fd, e);
                    return Err(e.into());
                },
            }
        }
        buf.truncate(nread);
        Ok(buf)
    }

    /// Writes the whole buffer.
    fn write(&self, fd: FileDesc, buf: &[u8]) -> Result<usize, Fail> {
        let file: Arc<File> = self.file(fd)?;
        if let Err(e) = (&*file).write_all(buf) {
            warn!("write(): fd={:?} failed ({:?})", fd, e);
            return Err(e.into());
        }
        Ok(buf.len())
    }

    /// Bytes between the cursor and the end of a regular file. `None` for pipes and other streams.
    fn remaining(file: &File) -> Option<usize> {
        let size: u64 = match file.metadata() {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            _ => return None,
        };
        let mut file: &File = file;
        let position: u64 = file.stream_position().ok()?;
        usize::try_from(size.saturating_sub(position)).ok()
    }

    fn file(&self, fd: FileDesc) -> Result<Arc<File>, Fail> {
        match self.lock().get(fd.into()) {
            Some(record) => Ok(record.file.clone()),
            None => Err(Fail::new(EBADF, "bad file descriptor")),
        }
    }

    fn lock(&self) -> MutexGuard<Slab<OpenFile>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
