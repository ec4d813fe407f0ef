// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! IPC System Calls
//!
//! The handle-value facing entry points of the IPC core. Every call runs
//! synchronously on the calling thread against the caller's [`Process`]:
//! it resolves handle values through the process's table, checks rights,
//! and drives the objects.
//!
//! # Design Rules
//!
//! - **Object-based**: all operations on handles with rights
//! - **Validate first**: malformed arguments are rejected before any state
//!   changes
//! - **No implicit retry**: `ShouldWait` and `InternalIntrRetry` go back to
//!   the caller
//!
//! # Error Return Convention
//!
//! Entry points return [`Result`](crate::rustux::errors::Result); the
//! architecture glue converts an error to its negative status with
//! [`Error::into_status`](crate::rustux::errors::Error::into_status).
//!
//! [`Process`]: crate::kernel::process::Process

use crate::kernel::config::IpcConfig;
use crate::log_info;

// Syscall implementations
pub mod channel;
pub mod event;
pub mod handle_ops;
pub mod object;
pub mod object_wait;
pub mod port;

/// Channel read option: drop a message that does not fit the buffers
pub const CHANNEL_READ_MAY_DISCARD: u32 = 1;

/// Initialize the syscall layer
///
/// Logs the default limits processes are created with.
pub fn init() {
    let config = IpcConfig::default();
    log_info!(
        "IPC syscalls: max message {} bytes / {} handles, {} pending per endpoint",
        config.max_message_bytes,
        config.max_message_handles,
        config.max_pending_messages
    );
    log_info!(
        "IPC syscalls: wait_many up to {} items, {} user packets per port, {} handles per process",
        config.max_wait_many_items,
        config.max_port_packets,
        config.max_handles
    );
}
