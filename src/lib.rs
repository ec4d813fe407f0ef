// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux IPC Core
//!
//! The object/capability and message-passing core of the Rustux
//! microkernel: per-process handle tables, channels, ports, and the
//! signal/wait machinery that ties them together.
//!
//! # Layout
//!
//! - [`rustux`] - ABI-level types and the error taxonomy
//! - [`kernel::object`] - kernel objects, handles and handle tables
//! - [`kernel::syscalls`] - the handle-value facing entry points
//! - [`kernel::sync`] - blocking primitives used by the wait points
//!
//! # Usage
//!
//! ```rust
//! use rustux_ipc::kernel::process::Process;
//! use rustux_ipc::kernel::syscalls::channel::{sys_channel_create, sys_channel_read, sys_channel_write};
//!
//! let process = Process::new("app");
//! let (a, b) = sys_channel_create(&process, 0).unwrap();
//! sys_channel_write(&process, a, 0, &[1, 2, 3], &[]).unwrap();
//!
//! let mut bytes = [0u8; 3];
//! let (mut actual_bytes, mut actual_handles) = (0, 0);
//! sys_channel_read(&process, b, 0, &mut bytes, &mut [], &mut actual_bytes, &mut actual_handles).unwrap();
//! assert_eq!(actual_bytes, 3);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod kernel;
pub mod rustux;

pub use kernel::object::{Handle, HandleTable, KernelObject, Rights, Signals};
pub use kernel::process::Process;
pub use kernel::thread::Thread;
pub use rustux::errors::{Error, Result};
