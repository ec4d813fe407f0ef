// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! IPC Test Suite
//!
//! End-to-end tests that drive the IPC core only through the syscall
//! layer, the way a process would.
//!
//! # Organization
//!
//! - [`scenarios`] - Channel, call and port walkthroughs
//! - [`properties`] - Rights, ordering, atomicity and cancellation
//!   properties checked across many operations


use crate::kernel::platform::host;
use crate::kernel::process::Process;
use crate::kernel::thread::Thread;

/// Host clock plus a fresh process and thread
pub(crate) fn setup(name: &str) -> (Process, Thread) {
    host::install();
    (Process::new(name), Thread::new())
}

/// Poll `condition` until it holds, yielding between polls
pub(crate) fn spin_until(mut condition: impl FnMut() -> bool) {
    while !condition() {
        std::thread::yield_now();
    }
}
