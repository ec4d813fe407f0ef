// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Event Objects
//!
//! A user-visible event: a kernel object with no state beyond its signal
//! bits. `SIGNALED` and the user signals are driven by `object_signal`;
//! waiters observe them through `wait_one`, `wait_many` or `wait_async`.
//!
//! # Usage
//!
//! ```rust
//! use rustux_ipc::kernel::object::event::EventObject;
//! use rustux_ipc::kernel::object::Signals;
//!
//! let event = EventObject::new();
//! event.user_signal(Signals::empty(), Signals::SIGNALED).unwrap();
//! assert!(event.base().signals().contains(Signals::SIGNALED));
//! ```

use super::signals::Signals;
use super::state::ObjectBase;
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::Koid;
use alloc::sync::Arc;

/// Event object
#[derive(Debug)]
pub struct EventObject {
    base: ObjectBase,
}

impl EventObject {
    /// Signals `object_signal` may change on an event
    pub const ALLOWED_SIGNALS: Signals = Signals::SIGNALED.union(Signals::USER_ALL);

    /// Create an unsignaled event
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: ObjectBase::new(Signals::empty()),
        })
    }

    /// Kernel object ID
    pub fn koid(&self) -> Koid {
        self.base.koid()
    }

    /// Object base
    pub fn base(&self) -> &ObjectBase {
        &self.base
    }

    /// Clear then set signals on the event
    ///
    /// # Returns
    ///
    /// `Err(Error::InvalidArgs)` if either mask holds a bit outside
    /// [`EventObject::ALLOWED_SIGNALS`]
    pub fn user_signal(&self, clear: Signals, set: Signals) -> Result {
        if !Self::ALLOWED_SIGNALS.contains(clear.union(set)) {
            return Err(Error::InvalidArgs);
        }
        self.base.update_state(clear, set);
        Ok(())
    }
}
