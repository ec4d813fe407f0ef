// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Handles
//!
//! A handle is a capability: a kernel object plus the rights granted
//! through it. Processes only ever see handle *values*; the [`Handle`]
//! itself lives in a handle table or, while in flight, inside a channel
//! message that owns it exclusively.
//!
//! # Design
//!
//! - **Identity**: every handle instance has a process-independent
//!   [`HandleId`]; wait registrations are bound to it, so closing the
//!   handle cancels exactly the waits issued through it
//! - **Lifetime**: creating a handle counts a reference on the object;
//!   dropping the last one runs the object's zero-handles teardown
//! - **Immutability**: rights never change; duplicate and replace build a
//!   new handle instead

use super::rights::Rights;
use super::KernelObject;
use crate::rustux::errors::Result;
use crate::rustux::types::Koid;
use core::sync::atomic::{AtomicU64, Ordering};

/// ============================================================================
/// Handle ID
/// ============================================================================

/// Handle identifier, unique across the system for the handle's lifetime
pub type HandleId = u64;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn alloc_handle_id() -> HandleId {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// ============================================================================
/// Handle
/// ============================================================================

/// Handle to a kernel object
pub struct Handle {
    id: HandleId,
    object: KernelObject,
    rights: Rights,
}

impl Handle {
    /// Create a handle to `object` with `rights`
    pub fn new(object: KernelObject, rights: Rights) -> Self {
        object.base().inc_handle_count();
        Self {
            id: alloc_handle_id(),
            object,
            rights,
        }
    }

    /// Handle ID
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Referenced object
    pub fn object(&self) -> &KernelObject {
        &self.object
    }

    /// Rights granted through this handle
    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Koid of the referenced object
    pub fn koid(&self) -> Koid {
        self.object.koid()
    }

    /// Require specific rights
    pub fn require(&self, required: Rights) -> Result {
        self.rights.require(required)
    }

    /// Whether the handle carries `right`
    pub fn has_right(&self, right: Rights) -> bool {
        self.rights.contains(right)
    }

    /// A new handle to the same object with `rights`
    ///
    /// The caller has already checked `rights` against this handle.
    pub(crate) fn derive(&self, rights: Rights) -> Self {
        Self::new(self.object.clone(), rights)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let base = self.object.base();
        base.cancel(self.id);
        if base.dec_handle_count() {
            self.object.on_zero_handles();
        }
    }
}

impl core::fmt::Debug for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("koid", &self.koid())
            .field("type", &self.object.obj_type())
            .field("rights", &self.rights)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::object::event::EventObject;
    use crate::kernel::object::observer::WaitObserver;
    use crate::kernel::object::Signals;
    use crate::kernel::sync::Event;
    use alloc::sync::Arc;

    #[test]
    fn test_handle_counts_references() {
        let event = EventObject::new();
        let object = KernelObject::Event(event.clone());

        let first = Handle::new(object.clone(), Rights::EVENT_DEFAULT);
        let second = first.derive(Rights::WAIT);
        assert_eq!(event.base().handle_count(), 2);
        assert_ne!(first.id(), second.id());
        assert_eq!(second.rights(), Rights::WAIT);

        drop(first);
        assert_eq!(event.base().handle_count(), 1);
        drop(second);
        assert_eq!(event.base().handle_count(), 0);
    }

    #[test]
    fn test_drop_cancels_waits_through_handle() {
        let event = EventObject::new();
        let handle = Handle::new(KernelObject::Event(event.clone()), Rights::EVENT_DEFAULT);
        let other = handle.derive(Rights::WAIT);

        let woken = Arc::new(Event::default());
        let observer = WaitObserver::sync(handle.id(), Signals::SIGNALED, woken.clone());
        event.base().add_observer(observer.clone());
        let unrelated =
            WaitObserver::sync(other.id(), Signals::SIGNALED, Arc::new(Event::default()));
        event.base().add_observer(unrelated);

        drop(handle);
        assert!(woken.is_signaled());
        assert!(observer.observed().contains(Signals::HANDLE_CLOSED));
        assert_eq!(event.base().observer_count(), 1);
    }

    #[test]
    fn test_require() {
        let handle = Handle::new(KernelObject::Event(EventObject::new()), Rights::WAIT);
        assert!(handle.require(Rights::WAIT).is_ok());
        assert!(handle.has_right(Rights::WAIT));
        assert!(handle.require(Rights::SIGNAL).is_err());
    }
}
