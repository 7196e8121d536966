// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Context switching for the System V x86_64 ABI.
//!
//! A suspended context is a stack pointer. The words above it hold the callee-saved registers in pop order
//! (r15, r14, r13, r12, rbx, rbp) followed by the address to return to.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::ContextEntry;
use ::std::arch::naked_asm;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Words in an initial frame: six callee-saved registers and the return address.
const FRAME_WORDS: usize = 7;

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Builds the initial frame of a fresh context below `top` and returns its stack pointer. The first switch pops
/// `entry` into r12 and `arg` into r13 and returns into [trampoline].
pub unsafe fn prepare_stack(top: usize, entry: ContextEntry, arg: usize) -> usize {
    // The return address sits right below a 16-byte aligned top so that the trampoline's call is ABI-aligned.
    let top: usize = top & !0xf;
    let frame: *mut usize = (top - FRAME_WORDS * 8) as *mut usize;
    frame.add(0).write(0); // r15
    frame.add(1).write(0); // r14
    frame.add(2).write(arg); // r13
    frame.add(3).write(entry as usize); // r12
    frame.add(4).write(0); // rbx
    frame.add(5).write(0); // rbp
    frame.add(6).write(trampoline as usize);
    frame as usize
}

/// Saves callee-saved registers on the current stack, stores the stack pointer in `from`, then restores the
/// registers saved below `to` and returns into that context.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_from: *mut usize, _to: usize) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

/// First code a fresh context runs.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!("mov rdi, r13", "call r12", "ud2")
}
