// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Context switching for the AAPCS64 ABI.
//!
//! A suspended context is a stack pointer. The 160 bytes above it hold x19-x28, the frame pointer, the link
//! register and d8-d15, in that order.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::ContextEntry;
use ::std::arch::naked_asm;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Words in a saved frame: x19-x28, x29, x30 and d8-d15.
const FRAME_WORDS: usize = 20;

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Builds the initial frame of a fresh context below `top` and returns its stack pointer. The first switch loads
/// `entry` into x19, `arg` into x20 and returns into [trampoline].
pub unsafe fn prepare_stack(top: usize, entry: ContextEntry, arg: usize) -> usize {
    let top: usize = top & !0xf;
    let frame: *mut usize = (top - FRAME_WORDS * 8) as *mut usize;
    for i in 0..FRAME_WORDS {
        frame.add(i).write(0);
    }
    frame.add(0).write(entry as usize); // x19
    frame.add(1).write(arg); // x20
    frame.add(11).write(trampoline as usize); // x30
    frame as usize
}

/// Saves callee-saved registers on the current stack, stores the stack pointer in `from`, then restores the
/// registers saved at `to` and returns into that context.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_from: *mut usize, _to: usize) {
    naked_asm!(
        "sub sp, sp, #0xa0",
        "stp x19, x20, [sp, #0x00]",
        "stp x21, x22, [sp, #0x10]",
        "stp x23, x24, [sp, #0x20]",
        "stp x25, x26, [sp, #0x30]",
        "stp x27, x28, [sp, #0x40]",
        "stp x29, x30, [sp, #0x50]",
        "stp d8, d9, [sp, #0x60]",
        "stp d10, d11, [sp, #0x70]",
        "stp d12, d13, [sp, #0x80]",
        "stp d14, d15, [sp, #0x90]",
        "mov x2, sp",
        "str x2, [x0]",
        "mov sp, x1",
        "ldp x19, x20, [sp, #0x00]",
        "ldp x21, x22, [sp, #0x10]",
        "ldp x23, x24, [sp, #0x20]",
        "ldp x25, x26, [sp, #0x30]",
        "ldp x27, x28, [sp, #0x40]",
        "ldp x29, x30, [sp, #0x50]",
        "ldp d8, d9, [sp, #0x60]",
        "ldp d10, d11, [sp, #0x70]",
        "ldp d12, d13, [sp, #0x80]",
        "ldp d14, d15, [sp, #0x90]",
        "add sp, sp, #0xa0",
        "ret",
    )
}

/// First code a fresh context runs.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!("mov x0, x20", "blr x19", "brk #0")
}
