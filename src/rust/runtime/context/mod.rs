// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Execution contexts: a private stack plus the saved stack pointer needed to resume it.
//!
//! Switching is a plain register swap between two stacks on the same kernel thread. Callers are responsible for
//! never resuming a context from a thread other than the one that owns it.

mod stack;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        use self::x86_64 as arch;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        use self::aarch64 as arch;
    } else {
        compile_error!("execution contexts are only implemented for x86_64 and aarch64");
    }
}

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::ptr;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::stack::Stack;

/// Function a fresh context starts in. It receives the argument given to [ExecutionContext::prepare] and must never
/// return.
pub type ContextEntry = extern "C" fn(arg: usize) -> !;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Execution Context
pub struct ExecutionContext {
    /// Stack owned by this context.
    stack: Stack,
    /// Saved stack pointer. Only meaningful while the context is suspended.
    sp: usize,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ExecutionContext {
    /// Allocates a context with a stack of at least `stack_size` bytes. The context cannot be switched to until it is
    /// prepared.
    pub fn new(stack_size: usize) -> Result<Self, Fail> {
        Ok(Self {
            stack: Stack::new(stack_size)?,
            sp: 0,
        })
    }

    /// Lays out an initial frame so that the first switch into this context calls `entry(arg)`.
    pub fn prepare(&mut self, entry: ContextEntry, arg: usize) {
        self.sp = unsafe { arch::prepare_stack(self.stack.top(), entry, arg) };
    }

    /// Whether the context has an entry point or a saved suspension point to resume.
    pub fn is_prepared(&self) -> bool {
        self.sp != 0
    }

    /// Usable stack size.
    pub fn stack_size(&self) -> usize {
        self.stack.size()
    }

    /// Suspends the caller, saving its stack pointer in `from`, and resumes `target`. Returns when some context
    /// switches back to `from`.
    ///
    /// # Safety
    ///
    /// `target` must be prepared or suspended, must not be live, and must have been created for use on the calling
    /// kernel thread. `from` must stay valid until the caller is resumed.
    pub unsafe fn switch_to(target: *mut Self, from: *mut usize) {
        let sp: usize = ptr::read(ptr::addr_of!((*target).sp));
        arch::switch(from, sp);
    }

    /// Suspends `current`, which must be the live context, and resumes the stack pointer saved in `to`.
    ///
    /// # Safety
    ///
    /// `current` must be the context executing this call and `to` a stack pointer saved by [Self::switch_to].
    pub unsafe fn switch_from(current: *mut Self, to: usize) {
        arch::switch(ptr::addr_of_mut!((*current).sp), to);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
