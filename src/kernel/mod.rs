// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux Microkernel - IPC Core Kernel Module
//!
//! Everything that runs inside a thread's syscall invocation: objects,
//! handle tables, blocking primitives and the collaborator hooks the rest
//! of the kernel provides (clock, policy, accounting).

pub mod debug;
pub mod config;
pub mod counters;
pub mod object;
pub mod platform;
pub mod policy;
pub mod process;
pub mod sync;
pub mod syscalls;
pub mod thread;

#[cfg(test)]
mod tests;

/// Initialize the IPC core
///
/// Installs the platform hooks and logs the default limits. Safe to call
/// more than once; only the first platform wins.
pub fn init(platform: &'static dyn platform::Platform) {
    platform::install(platform);
    syscalls::init();
}
