// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Synchronization Primitives
//!
//! Locks come from the `spin` crate; [`Event`] is the one blocking
//! primitive every wait point in the IPC core parks on.
//!
//! # Lock ordering
//!
//! 1. handle table lock
//! 2. channel endpoint message lock
//! 3. object signal-state lock
//! 4. port packet-queue lock
//!
//! A lock may only be taken while holding locks that appear earlier in
//! this list.

pub mod event;

pub use event::{Event, EventFlags};

/// Kernel mutex
pub type Mutex<T> = spin::Mutex<T>;

/// Kernel mutex guard
pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;

/// Reader/writer lock
pub type RwLock<T> = spin::RwLock<T>;
