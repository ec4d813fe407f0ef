// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Port Object
//!
//! A port is a FIFO of packets. User code queues packets explicitly; wait
//! observers registered with `wait_async` queue signal packets when the
//! object they watch changes state.
//!
//! # Design
//!
//! - **Ordering**: packets are dequeued in the order they were queued
//! - **Backpressure**: user packets are bounded; signal packets are bounded
//!   by the number of registrations, since a repeating observer keeps at
//!   most one packet queued and coalesces further triggers into it
//! - **Teardown**: when the last handle closes, queued packets are dropped
//!   and every observer delivering to the port is canceled
//!
//! Ports are not waitable themselves; `port_wait` is the only way to block
//! on one.

use super::handle::HandleId;
use super::observer::ObserverId;
use super::signals::Signals;
use super::state::ObjectBase;
use super::{KernelObject, WeakKernelObject};
use crate::kernel::sync::{Event, EventFlags, Mutex};
use crate::kernel::thread::Thread;
use crate::rustux::errors::{Error, Result, Status, RX_OK};
use crate::rustux::types::{Deadline, Koid, Nanoseconds};
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// `wait_async` options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WaitAsyncOptions: u32 {
        /// Unregister after the first packet is queued
        const ONCE = 1 << 0;
        /// Record the trigger time in the packet
        const TIMESTAMP = 1 << 1;
    }
}

/// Packet type
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Queued by `port_queue`
    User = 0,
    /// Queued by a `wait_async` observer
    Signal = 1,
}

/// Packet payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketPayload {
    /// Opaque user data
    User([u64; 4]),

    /// Signal notification
    Signal {
        /// Signals the registration was waiting for
        trigger: Signals,
        /// Object state when the packet was last updated
        observed: Signals,
        /// Number of triggers coalesced into this packet
        count: u64,
        /// Trigger time, if requested with `TIMESTAMP`
        timestamp: Nanoseconds,
    },
}

/// Port packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPacket {
    /// Caller-chosen key
    pub key: u64,
    /// Status delivered with the packet
    pub status: Status,
    /// Payload
    pub payload: PacketPayload,
}

impl PortPacket {
    /// Build a user packet
    pub const fn user(key: u64, data: [u64; 4]) -> Self {
        Self {
            key,
            status: RX_OK,
            payload: PacketPayload::User(data),
        }
    }

    /// Packet type
    pub const fn packet_type(&self) -> PacketType {
        match self.payload {
            PacketPayload::User(_) => PacketType::User,
            PacketPayload::Signal { .. } => PacketType::Signal,
        }
    }
}

/// Registration a signal packet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PacketOrigin {
    pub(crate) observer: ObserverId,
    pub(crate) handle_id: HandleId,
}

struct QueuedPacket {
    packet: PortPacket,
    origin: Option<PacketOrigin>,
}

struct PortInner {
    packets: VecDeque<QueuedPacket>,
    user_packets: usize,
    closed: bool,
    /// Objects holding observers that deliver here
    sources: Vec<WeakKernelObject>,
}

/// Port object
pub struct Port {
    base: ObjectBase,

    /// Maximum queued user packets
    max_packets: usize,

    inner: Mutex<PortInner>,

    /// Set while the queue is non-empty
    available: Event,
}

impl Port {
    /// Create a port accepting at most `max_packets` queued user packets
    pub fn new(max_packets: usize) -> Arc<Self> {
        Arc::new(Self {
            base: ObjectBase::new(Signals::empty()),
            max_packets,
            inner: Mutex::new(PortInner {
                packets: VecDeque::new(),
                user_packets: 0,
                closed: false,
                sources: Vec::new(),
            }),
            available: Event::new(false, EventFlags::empty()),
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

    /// Number of queued packets
    pub fn queued(&self) -> usize {
        self.inner.lock().packets.len()
    }

    /// Queue a user packet
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidArgs)` if the packet is not a user packet
    /// - `Err(Error::ShouldWait)` if the user packet limit is reached
    pub fn queue_user(&self, packet: PortPacket) -> Result {
        if packet.packet_type() != PacketType::User {
            return Err(Error::InvalidArgs);
        }

        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::BadState);
        }
        if inner.user_packets >= self.max_packets {
            return Err(Error::ShouldWait);
        }
        inner.user_packets += 1;
        inner.packets.push_back(QueuedPacket { packet, origin: None });
        self.available.signal();
        Ok(())
    }

    /// Queue or refresh the signal packet of an observer
    ///
    /// Called with the source object's state lock held.
    pub(crate) fn queue_signal(
        &self,
        origin: PacketOrigin,
        key: u64,
        trigger: Signals,
        observed: Signals,
        timestamp: Nanoseconds,
    ) -> Result {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::BadState);
        }

        let pending = inner
            .packets
            .iter_mut()
            .find(|queued| queued.origin.map(|o| o.observer) == Some(origin.observer));
        if let Some(queued) = pending {
            if let PacketPayload::Signal {
                observed: ref mut last,
                ref mut count,
                ..
            } = queued.packet.payload
            {
                *last = observed;
                *count += 1;
            }
            return Ok(());
        }

        inner.packets.push_back(QueuedPacket {
            packet: PortPacket {
                key,
                status: RX_OK,
                payload: PacketPayload::Signal {
                    trigger,
                    observed,
                    count: 1,
                    timestamp,
                },
            },
            origin: Some(origin),
        });
        self.available.signal();
        Ok(())
    }

    /// Dequeue the head packet without blocking
    pub fn try_dequeue(&self) -> Option<PortPacket> {
        let mut inner = self.inner.lock();
        let queued = inner.packets.pop_front()?;
        if queued.origin.is_none() {
            inner.user_packets -= 1;
        }
        if inner.packets.is_empty() {
            self.available.unsignal();
        }
        Some(queued.packet)
    }

    /// Dequeue the head packet, blocking until one arrives
    ///
    /// # Returns
    ///
    /// - `Err(Error::TimedOut)` if `deadline` passed with the queue empty
    /// - `Err(Error::InternalIntrRetry)` if the thread was interrupted
    pub fn dequeue(&self, thread: Option<&Thread>, deadline: Deadline) -> Result<PortPacket> {
        loop {
            if let Some(packet) = self.try_dequeue() {
                return Ok(packet);
            }
            self.available.wait(thread, deadline)?;
        }
    }

    /// Remember that `source` holds an observer delivering here
    pub(crate) fn add_source(&self, source: &KernelObject) {
        let mut inner = self.inner.lock();
        inner.sources.retain(WeakKernelObject::is_alive);
        let koid = source.koid();
        if !inner.sources.iter().any(|s| s.koid() == koid) {
            inner.sources.push(source.downgrade());
        }
    }

    /// Cancel the registration `(handle_id, key)` on `source`
    ///
    /// Removes the observer and any of its packets still queued.
    ///
    /// # Returns
    ///
    /// true if an observer or a packet was removed
    pub fn cancel(&self, source: &KernelObject, handle_id: HandleId, key: u64) -> bool {
        let removed_observer = source.base().cancel_by_key(handle_id, self.koid(), key);

        let mut inner = self.inner.lock();
        let before = inner.packets.len();
        inner.packets.retain(|queued| {
            !(queued.packet.key == key && queued.origin.map(|o| o.handle_id) == Some(handle_id))
        });
        let removed_packets = before != inner.packets.len();
        if inner.packets.is_empty() {
            self.available.unsignal();
        }

        removed_observer || removed_packets
    }

    /// Last handle closed
    pub(crate) fn on_zero_handles(&self) {
        let sources = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.packets.clear();
            inner.user_packets = 0;
            self.available.unsignal();
            core::mem::take(&mut inner.sources)
        };

        let koid = self.koid();
        for source in sources.iter().filter_map(WeakKernelObject::upgrade) {
            source.base().cancel_by_port(koid);
        }
    }
}

impl core::fmt::Debug for Port {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Port")
            .field("koid", &self.koid())
            .field("queued", &self.queued())
            .finish()
    }
}
