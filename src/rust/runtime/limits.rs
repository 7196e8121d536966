// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Default size of the stack handed to every task.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Smallest stack a task may be given. Anything below this cannot hold the entry trampoline and a logging call.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Default bound on how long an idle executor waits before re-checking its queue and the shutdown flag.
pub const DEFAULT_POLL_INTERVAL_US: u64 = 1000;
