// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Objects & IPC (Zircon-style)
//!
//! This module implements the capability-based kernel object model.
//! All kernel resources are accessed through handles with rights,
//! ensuring fine-grained access control.
//!
//! # Design
//!
//! - **Capability-based security**: All operations through handles with rights
//! - **Object types**: Channel endpoint, Port, Event
//! - **Handle passing**: channel messages move handles between tables
//! - **Reference counting**: teardown runs when the last handle is closed
//!
//! # Modules
//!
//! - [`handle`] / [`handle_table`] - Handles and per-process tables
//! - [`rights`] / [`signals`] - Rights and signal bitmasks
//! - [`state`] / [`observer`] - Signal state and wait observers
//! - [`channel`] - IPC channels
//! - [`port`] - Packet ports
//! - [`event`] - Event objects

pub mod channel;
pub mod event;
pub mod handle;
pub mod handle_table;
pub mod observer;
pub mod port;
pub mod rights;
pub mod signals;
pub mod state;

// Re-exports
pub use channel::{ChannelEndpoint, Message, MessageSize};
pub use event::EventObject;
pub use handle::{Handle, HandleId};
pub use handle_table::{HandleReservation, HandleTable, TransferBatch};
pub use port::{PacketPayload, Port, PortPacket, WaitAsyncOptions};
pub use rights::Rights;
pub use signals::Signals;
pub use state::ObjectBase;

use crate::rustux::errors::{Error, Result};
use crate::rustux::types::{Koid, KOID_INVALID};
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU64, Ordering};

/// ============================================================================
/// Kernel Object IDs
/// ============================================================================

/// First koid handed out; lower values are reserved
const FIRST_KOID: Koid = 1024;

static NEXT_KOID: AtomicU64 = AtomicU64::new(FIRST_KOID);

/// Allocate a kernel object ID
pub(crate) fn alloc_koid() -> Koid {
    NEXT_KOID.fetch_add(1, Ordering::Relaxed)
}

/// ============================================================================
/// Kernel Object Types
/// ============================================================================

/// Kernel object type
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Channel endpoint
    Channel = 4,

    /// Event object
    Event = 5,

    /// Port
    Port = 6,
}

impl ObjectType {
    /// Get raw value
    pub const fn into_raw(self) -> u32 {
        self as u32
    }

    /// Get name as string
    pub const fn name(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Event => "event",
            Self::Port => "port",
        }
    }

    /// Rights of a handle returned by the creating syscall
    pub const fn default_rights(self) -> Rights {
        match self {
            Self::Channel => Rights::CHANNEL_DEFAULT,
            Self::Event => Rights::EVENT_DEFAULT,
            Self::Port => Rights::PORT_DEFAULT,
        }
    }
}

/// ============================================================================
/// Kernel Object
/// ============================================================================

/// A reference to a kernel object of any type
#[derive(Clone)]
pub enum KernelObject {
    /// Channel endpoint
    Channel(Arc<ChannelEndpoint>),

    /// Port
    Port(Arc<Port>),

    /// Event
    Event(Arc<EventObject>),
}

impl KernelObject {
    /// Shared object state
    pub fn base(&self) -> &ObjectBase {
        match self {
            Self::Channel(channel) => channel.base(),
            Self::Port(port) => port.base(),
            Self::Event(event) => event.base(),
        }
    }

    /// Kernel object ID
    pub fn koid(&self) -> Koid {
        self.base().koid()
    }

    /// Koid of the related object (a channel endpoint's peer)
    pub fn related_koid(&self) -> Koid {
        match self {
            Self::Channel(channel) => channel.peer_koid(),
            Self::Port(_) | Self::Event(_) => KOID_INVALID,
        }
    }

    /// Object type
    pub fn obj_type(&self) -> ObjectType {
        match self {
            Self::Channel(_) => ObjectType::Channel,
            Self::Port(_) => ObjectType::Port,
            Self::Event(_) => ObjectType::Event,
        }
    }

    /// Whether the object can be waited on
    pub fn is_waitable(&self) -> bool {
        !matches!(self, Self::Port(_))
    }

    /// Whether both references name the same object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.koid() == other.koid()
    }

    /// Resolve to a channel endpoint
    pub fn into_channel(self) -> Result<Arc<ChannelEndpoint>> {
        match self {
            Self::Channel(channel) => Ok(channel),
            _ => Err(Error::WrongType),
        }
    }

    /// Resolve to a port
    pub fn into_port(self) -> Result<Arc<Port>> {
        match self {
            Self::Port(port) => Ok(port),
            _ => Err(Error::WrongType),
        }
    }

    /// Resolve to an event
    pub fn into_event(self) -> Result<Arc<EventObject>> {
        match self {
            Self::Event(event) => Ok(event),
            _ => Err(Error::WrongType),
        }
    }

    /// Clear then set user-controllable signals
    pub fn user_signal(&self, clear: Signals, set: Signals) -> Result {
        match self {
            Self::Channel(channel) => channel.user_signal(clear, set),
            Self::Event(event) => event.user_signal(clear, set),
            Self::Port(_) => Err(Error::NotSupported),
        }
    }

    /// A weak reference to the object
    pub fn downgrade(&self) -> WeakKernelObject {
        let koid = self.koid();
        let object = match self {
            Self::Channel(channel) => WeakObject::Channel(Arc::downgrade(channel)),
            Self::Port(port) => WeakObject::Port(Arc::downgrade(port)),
            Self::Event(event) => WeakObject::Event(Arc::downgrade(event)),
        };
        WeakKernelObject { koid, object }
    }

    /// Teardown once the last handle is closed
    pub(crate) fn on_zero_handles(&self) {
        crate::log_trace!("object {} ({}): zero handles", self.koid(), self.obj_type().name());
        match self {
            Self::Channel(channel) => channel.on_zero_handles(),
            Self::Port(port) => port.on_zero_handles(),
            Self::Event(_) => {}
        }
    }
}

impl core::fmt::Debug for KernelObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelObject")
            .field("type", &self.obj_type())
            .field("koid", &self.koid())
            .finish()
    }
}

#[derive(Clone)]
enum WeakObject {
    Channel(Weak<ChannelEndpoint>),
    Port(Weak<Port>),
    Event(Weak<EventObject>),
}

/// A kernel object reference that does not keep the object alive
#[derive(Clone)]
pub struct WeakKernelObject {
    koid: Koid,
    object: WeakObject,
}

impl WeakKernelObject {
    /// Koid of the referenced object
    pub fn koid(&self) -> Koid {
        self.koid
    }

    /// Whether the object still exists
    pub fn is_alive(&self) -> bool {
        match &self.object {
            WeakObject::Channel(weak) => weak.strong_count() > 0,
            WeakObject::Port(weak) => weak.strong_count() > 0,
            WeakObject::Event(weak) => weak.strong_count() > 0,
        }
    }

    /// Recover a strong reference if the object still exists
    pub fn upgrade(&self) -> Option<KernelObject> {
        match &self.object {
            WeakObject::Channel(weak) => weak.upgrade().map(KernelObject::Channel),
            WeakObject::Port(weak) => weak.upgrade().map(KernelObject::Port),
            WeakObject::Event(weak) => weak.upgrade().map(KernelObject::Event),
        }
    }
}
