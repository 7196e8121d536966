// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    limits,
};
use ::libc::{
    c_void,
    ENOMEM,
};
use ::std::ptr;

//======================================================================================================================
// Structures
//======================================================================================================================

/// A task stack: an anonymous private mapping with an inaccessible guard page at its lowest address.
pub struct Stack {
    /// Base of the mapping (the guard page).
    base: *mut u8,
    /// Length of the mapping, guard page included.
    len: usize,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Stack {
    /// Maps a stack that can hold at least `size` bytes.
    pub fn new(size: usize) -> Result<Self, Fail> {
        let page: usize = page_size();
        let usable: usize = match size.max(limits::MIN_STACK_SIZE).checked_next_multiple_of(page) {
            Some(usable) => usable,
            None => return Err(Fail::new(ENOMEM, "stack size overflows the address space")),
        };
        let len: usize = match usable.checked_add(page) {
            Some(len) => len,
            None => return Err(Fail::new(ENOMEM, "stack size overflows the address space")),
        };

        let base: *mut c_void = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            let cause: String = format!("failed to map task stack (size={:?})", len);
            warn!("new(): {}", cause);
            return Err(Fail::new(ENOMEM, &cause));
        }

        if unsafe { libc::mprotect(base, page, libc::PROT_NONE) } != 0 {
            let cause: String = format!("failed to protect stack guard page (size={:?})", len);
            warn!("new(): {}", cause);
            unsafe { libc::munmap(base, len) };
            return Err(Fail::new(ENOMEM, &cause));
        }

        Ok(Self {
            base: base as *mut u8,
            len,
        })
    }

    /// Highest address of the stack. Stacks grow down from here.
    pub fn top(&self) -> usize {
        self.base as usize + self.len
    }

    /// Usable size of the stack, guard page excluded.
    pub fn size(&self) -> usize {
        self.len - page_size()
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for Stack {
    fn drop(&mut self) {
        if unsafe { libc::munmap(self.base as *mut c_void, self.len) } != 0 {
            warn!("drop(): failed to unmap task stack (base={:?}, len={:?})", self.base, self.len);
        }
    }
}

/// The mapping is owned exclusively by one stack.
unsafe impl Send for Stack {}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
