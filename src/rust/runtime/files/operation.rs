// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    files::FileDesc,
};
use ::std::path::PathBuf;

//======================================================================================================================
// Structures
//======================================================================================================================

/// A blocking operation a task hands to the I/O executor.
#[derive(Debug)]
pub enum IoRequest {
    /// Open a file, creating it if it does not exist.
    Open { path: PathBuf },
    /// Close a descriptor once no read or write is in flight on it.
    Close { fd: FileDesc },
    /// Read up to `len` bytes.
    Read { fd: FileDesc, len: usize },
    /// Write the whole buffer.
    Write { fd: FileDesc, buf: Vec<u8> },
}

/// What a successful [IoRequest] produced.
#[derive(Debug, PartialEq, Eq)]
pub enum IoOutcome {
    Opened(FileDesc),
    Closed,
    Read(Vec<u8>),
    Written(usize),
}

/// Result the I/O executor stores in a task before handing it back.
pub type IoCompletion = Result<IoOutcome, Fail>;

/// What the I/O executor does with a request after trying it.
#[derive(Debug)]
pub enum Relay {
    /// The operation ran; hand the task back to the compute executor.
    Complete(IoCompletion),
    /// The operation cannot run yet; put the task back on the wait queue.
    Retry(IoRequest),
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl IoRequest {
    /// Descriptor the request targets, if any.
    pub fn fd(&self) -> Option<FileDesc> {
        match self {
            IoRequest::Open { .. } => None,
            IoRequest::Close { fd } | IoRequest::Read { fd, .. } | IoRequest::Write { fd, .. } => Some(*fd),
        }
    }

    /// Descriptor whose busy count the request holds. Reads and writes acquire it before they are relayed.
    pub fn busy_fd(&self) -> Option<FileDesc> {
        match self {
            IoRequest::Read { fd, .. } | IoRequest::Write { fd, .. } => Some(*fd),
            IoRequest::Open { .. } | IoRequest::Close { .. } => None,
        }
    }

    /// Short name used in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            IoRequest::Open { .. } => "open",
            IoRequest::Close { .. } => "close",
            IoRequest::Read { .. } => "read",
            IoRequest::Write { .. } => "write",
        }
    }
}
