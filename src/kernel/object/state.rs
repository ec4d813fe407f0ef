// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Object Base
//!
//! State every kernel object shares: its koid, the number of handles that
//! reference it, and its signal state together with the observers
//! registered on it. The signal bits and the observer list sit under one
//! lock so that registration and state changes are serialized: an observer
//! registered before a change is always told about it, and an observer
//! registered after a change sees the new state in `on_initialize`.

use super::alloc_koid;
use super::handle::HandleId;
use super::observer::{ObserverFlow, WaitObserver};
use super::signals::Signals;
use crate::kernel::sync::Mutex;
use crate::rustux::types::Koid;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

struct StateTracker {
    signals: Signals,
    observers: Vec<Arc<WaitObserver>>,
}

/// Kernel object base
pub struct ObjectBase {
    /// Kernel object ID
    koid: Koid,

    /// Number of live handles referencing the object
    handle_count: AtomicUsize,

    state: Mutex<StateTracker>,
}

impl ObjectBase {
    /// Create a base with a fresh koid
    pub fn new(signals: Signals) -> Self {
        Self::with_koid(alloc_koid(), signals)
    }

    /// Create a base with a preallocated koid
    pub fn with_koid(koid: Koid, signals: Signals) -> Self {
        Self {
            koid,
            handle_count: AtomicUsize::new(0),
            state: Mutex::new(StateTracker {
                signals,
                observers: Vec::new(),
            }),
        }
    }

    /// Kernel object ID
    pub fn koid(&self) -> Koid {
        self.koid
    }

    /// Current signal state
    pub fn signals(&self) -> Signals {
        self.state.lock().signals
    }

    /// Number of live handles
    pub fn handle_count(&self) -> usize {
        self.handle_count.load(Ordering::Acquire)
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    pub(crate) fn inc_handle_count(&self) {
        self.handle_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns true when the last handle went away
    pub(crate) fn dec_handle_count(&self) -> bool {
        self.handle_count.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Clear then set signal bits, notifying observers if the state changed
    pub(crate) fn update_state(&self, clear: Signals, set: Signals) {
        let mut state = self.state.lock();
        let previous = state.signals;
        let current = previous.difference(clear).union(set);
        if previous == current {
            return;
        }
        state.signals = current;
        state
            .observers
            .retain(|observer| observer.on_state_change(previous, current) == ObserverFlow::Keep);
    }

    /// Register an observer
    ///
    /// The observer sees the current state immediately, so a wait whose
    /// condition already holds completes without a state change.
    pub(crate) fn add_observer(&self, observer: Arc<WaitObserver>) {
        let mut state = self.state.lock();
        if observer.on_initialize(state.signals) == ObserverFlow::Keep {
            state.observers.push(observer);
        }
    }

    /// Unregister an observer; returns false if it was already gone
    pub(crate) fn remove_observer(&self, observer: &Arc<WaitObserver>) -> bool {
        let mut state = self.state.lock();
        match state.observers.iter().position(|o| Arc::ptr_eq(o, observer)) {
            Some(index) => {
                state.observers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Cancel every observer registered through handle `handle_id`
    pub(crate) fn cancel(&self, handle_id: HandleId) -> usize {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|observer| {
            if observer.handle_id() == handle_id {
                observer.on_cancel();
                false
            } else {
                true
            }
        });
        before - state.observers.len()
    }

    /// Remove the port registration `(handle_id, port, key)`
    pub(crate) fn cancel_by_key(&self, handle_id: HandleId, port: Koid, key: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state
            .observers
            .retain(|observer| !observer.is_port_binding(handle_id, port, key));
        before != state.observers.len()
    }

    /// Remove every registration delivering to `port`
    pub(crate) fn cancel_by_port(&self, port: Koid) {
        self.state
            .lock()
            .observers
            .retain(|observer| !observer.targets_port(port));
    }
}

impl core::fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectBase")
            .field("koid", &self.koid)
            .field("handle_count", &self.handle_count())
            .finish()
    }
}
