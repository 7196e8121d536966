// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::{
    fmt,
    num::TryFromIntError,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// File Descriptor
///
/// Names one record in the open-file table. Descriptors of closed files are reused.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct FileDesc(u32);

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<FileDesc> for u32 {
    /// Converts a [FileDesc] to a [u32].
    fn from(val: FileDesc) -> Self {
        val.0
    }
}

impl From<u32> for FileDesc {
    /// Converts a [u32] to a [FileDesc].
    fn from(val: u32) -> Self {
        FileDesc(val)
    }
}

impl From<FileDesc> for usize {
    /// Converts a [FileDesc] to a slab index.
    fn from(val: FileDesc) -> Self {
        val.0 as usize
    }
}

impl TryFrom<usize> for FileDesc {
    type Error = TryFromIntError;

    /// Converts a slab index to a [FileDesc]. Fails for indices that do not fit a descriptor.
    fn try_from(val: usize) -> Result<Self, Self::Error> {
        Ok(FileDesc(u32::try_from(val)?))
    }
}

impl fmt::Display for FileDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
