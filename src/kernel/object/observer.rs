// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Wait Observers
//!
//! An observer bridges an object's signal state to whoever is waiting on
//! it. It is registered on the object's [`ObjectBase`] and invoked with the
//! object's state lock held, so it must never take a handle table or
//! channel message lock.
//!
//! Two sinks exist:
//!
//! - **Sync**: a blocked `wait_one`/`wait_many` caller. The observer records
//!   the latest signal state and signals the caller's [`Event`] whenever the
//!   state intersects the trigger.
//! - **Port**: a `wait_async` registration. The observer queues a signal
//!   packet on the port when a trigger bit becomes asserted. It refers to
//!   the port weakly; a dead port removes the observer on its next firing.
//!
//! [`ObjectBase`]: super::state::ObjectBase

use super::handle::HandleId;
use super::port::{PacketOrigin, Port, WaitAsyncOptions};
use super::signals::Signals;
use crate::kernel::platform;
use crate::kernel::sync::Event;
use crate::rustux::types::Koid;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Observer identifier
pub type ObserverId = u64;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// What the state tracker does with an observer after invoking it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObserverFlow {
    /// Stay registered
    Keep,
    /// Unregister
    Remove,
}

enum ObserverSink {
    Sync {
        event: Arc<Event>,
        observed: AtomicU32,
    },
    Port {
        port: Weak<Port>,
        port_koid: Koid,
        key: u64,
        options: WaitAsyncOptions,
    },
}

/// A registration on an object's signal state
pub struct WaitObserver {
    id: ObserverId,

    /// The handle instance the wait was issued through
    handle_id: HandleId,

    /// Signals of interest
    trigger: Signals,

    sink: ObserverSink,
}

impl WaitObserver {
    /// Observer that wakes a blocked waiter through `event`
    pub fn sync(handle_id: HandleId, trigger: Signals, event: Arc<Event>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed),
            handle_id,
            trigger,
            sink: ObserverSink::Sync {
                event,
                observed: AtomicU32::new(0),
            },
        })
    }

    /// Observer that queues signal packets on `port` under `key`
    pub fn port(
        handle_id: HandleId,
        trigger: Signals,
        port: &Arc<Port>,
        key: u64,
        options: WaitAsyncOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed),
            handle_id,
            trigger,
            sink: ObserverSink::Port {
                port: Arc::downgrade(port),
                port_koid: port.koid(),
                key,
                options,
            },
        })
    }

    /// Observer ID
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Handle the wait was issued through
    pub fn handle_id(&self) -> HandleId {
        self.handle_id
    }

    /// Signals of interest
    pub fn trigger(&self) -> Signals {
        self.trigger
    }

    /// Last signal state seen by a sync observer
    ///
    /// Includes [`Signals::HANDLE_CLOSED`] if the observer was canceled by a
    /// handle close. Port observers always report an empty set.
    pub fn observed(&self) -> Signals {
        match &self.sink {
            ObserverSink::Sync { observed, .. } => {
                Signals::from_bits_retain(observed.load(Ordering::Acquire))
            }
            ObserverSink::Port { .. } => Signals::empty(),
        }
    }

    /// Whether this is the port registration `(handle_id, port, key)`
    pub(crate) fn is_port_binding(&self, handle_id: HandleId, port: Koid, bound_key: u64) -> bool {
        match &self.sink {
            ObserverSink::Port { port_koid, key, .. } => {
                self.handle_id == handle_id && *port_koid == port && *key == bound_key
            }
            ObserverSink::Sync { .. } => false,
        }
    }

    /// Whether this observer delivers to `port`
    pub(crate) fn targets_port(&self, port: Koid) -> bool {
        matches!(&self.sink, ObserverSink::Port { port_koid, .. } if *port_koid == port)
    }

    /// Invoked once at registration with the current state
    pub(crate) fn on_initialize(&self, current: Signals) -> ObserverFlow {
        match &self.sink {
            ObserverSink::Sync { event, observed } => {
                observed.store(current.bits(), Ordering::Release);
                if current.matches(self.trigger) {
                    event.signal();
                }
                ObserverFlow::Keep
            }
            ObserverSink::Port { .. } => {
                if current.matches(self.trigger) {
                    self.deliver(current)
                } else {
                    ObserverFlow::Keep
                }
            }
        }
    }

    /// Invoked on every signal state change
    pub(crate) fn on_state_change(&self, previous: Signals, current: Signals) -> ObserverFlow {
        match &self.sink {
            ObserverSink::Sync { event, observed } => {
                observed.store(current.bits(), Ordering::Release);
                if current.matches(self.trigger) {
                    event.signal();
                }
                ObserverFlow::Keep
            }
            ObserverSink::Port { .. } => {
                // Edge triggered: only newly asserted bits fire
                let asserted = current.difference(previous);
                if asserted.matches(self.trigger) {
                    self.deliver(current)
                } else {
                    ObserverFlow::Keep
                }
            }
        }
    }

    /// Invoked when the handle the wait was issued through goes away
    pub(crate) fn on_cancel(&self) {
        if let ObserverSink::Sync { event, observed } = &self.sink {
            observed.fetch_or(Signals::HANDLE_CLOSED.bits(), Ordering::AcqRel);
            event.signal();
        }
    }

    fn deliver(&self, observed: Signals) -> ObserverFlow {
        let ObserverSink::Port { port, key, options, .. } = &self.sink else {
            return ObserverFlow::Keep;
        };
        let Some(port) = port.upgrade() else {
            return ObserverFlow::Remove;
        };

        let timestamp = if options.contains(WaitAsyncOptions::TIMESTAMP) {
            platform::current_time()
        } else {
            0
        };
        let origin = PacketOrigin {
            observer: self.id,
            handle_id: self.handle_id,
        };

        if port.queue_signal(origin, *key, self.trigger, observed, timestamp).is_err() {
            return ObserverFlow::Remove;
        }
        if options.contains(WaitAsyncOptions::ONCE) {
            ObserverFlow::Remove
        } else {
            ObserverFlow::Keep
        }
    }
}

impl core::fmt::Debug for WaitObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = match self.sink {
            ObserverSink::Sync { .. } => "sync",
            ObserverSink::Port { .. } => "port",
        };
        f.debug_struct("WaitObserver")
            .field("id", &self.id)
            .field("handle_id", &self.handle_id)
            .field("trigger", &self.trigger)
            .field("sink", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::object::port::PacketPayload;
    use crate::kernel::sync::EventFlags;

    #[test]
    fn test_sync_observer_signals_on_match() {
        let event = Arc::new(Event::new(false, EventFlags::empty()));
        let observer = WaitObserver::sync(1, Signals::READABLE, event.clone());

        assert_eq!(observer.on_initialize(Signals::WRITABLE), ObserverFlow::Keep);
        assert!(!event.is_signaled());
        assert_eq!(observer.observed(), Signals::WRITABLE);

        observer.on_state_change(Signals::WRITABLE, Signals::WRITABLE | Signals::READABLE);
        assert!(event.is_signaled());
        assert_eq!(observer.observed(), Signals::WRITABLE | Signals::READABLE);
    }

    #[test]
    fn test_sync_observer_cancel_folds_handle_closed() {
        let event = Arc::new(Event::default());
        let observer = WaitObserver::sync(1, Signals::READABLE, event.clone());
        observer.on_initialize(Signals::WRITABLE);
        observer.on_cancel();
        assert!(event.is_signaled());
        assert!(observer.observed().contains(Signals::HANDLE_CLOSED | Signals::WRITABLE));
    }

    #[test]
    fn test_port_observer_is_edge_triggered() {
        let port = Port::new(16);
        let observer =
            WaitObserver::port(9, Signals::READABLE, &port, 7, WaitAsyncOptions::empty());

        assert_eq!(observer.on_initialize(Signals::WRITABLE), ObserverFlow::Keep);
        assert_eq!(port.queued(), 0);

        // A change that does not assert READABLE does nothing
        observer.on_state_change(Signals::WRITABLE, Signals::WRITABLE | Signals::USER_0);
        assert_eq!(port.queued(), 0);

        observer.on_state_change(Signals::WRITABLE, Signals::WRITABLE | Signals::READABLE);
        let packet = port.try_dequeue().expect("packet");
        assert_eq!(packet.key, 7);
        assert!(matches!(packet.payload, PacketPayload::Signal { count: 1, .. }));
    }

    #[test]
    fn test_port_observer_once_removes_itself() {
        let port = Port::new(16);
        let observer = WaitObserver::port(9, Signals::READABLE, &port, 1, WaitAsyncOptions::ONCE);
        assert_eq!(observer.on_initialize(Signals::READABLE), ObserverFlow::Remove);
        assert_eq!(port.queued(), 1);
    }

    #[test]
    fn test_port_observer_dead_port() {
        let port = Port::new(16);
        let observer =
            WaitObserver::port(9, Signals::READABLE, &port, 1, WaitAsyncOptions::empty());
        drop(port);
        assert_eq!(observer.on_initialize(Signals::READABLE), ObserverFlow::Remove);
    }
}
