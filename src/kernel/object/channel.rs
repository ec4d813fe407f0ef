// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Channel Objects
//!
//! A channel is a pair of endpoints created together. Each endpoint owns
//! the FIFO of messages written by its peer and refers to the peer weakly.
//!
//! # Design
//!
//! - **FIFO**: messages are read from an endpoint in the order its peer
//!   wrote them; the enqueue happens under the receiving endpoint's lock
//! - **Ownership**: a queued message exclusively owns its handles; a
//!   message dropped unread closes them
//! - **Backpressure**: a write to a full queue fails with `ShouldWait`
//!   instead of blocking
//! - **Calls**: a caller registers a [`MessageWaiter`] for its transaction
//!   id on its own endpoint; a reply carrying that id is handed straight to
//!   the waiter and never queued
//!
//! # Signals
//!
//! | Signal | Meaning |
//! |--------|---------|
//! | `READABLE` | the queue is non-empty |
//! | `WRITABLE` | the peer exists |
//! | `PEER_CLOSED` | the peer's last handle was closed |

use super::alloc_koid;
use super::handle::Handle;
use super::signals::Signals;
use super::state::ObjectBase;
use crate::kernel::config::IpcConfig;
use crate::kernel::sync::{Event, EventFlags, Mutex};
use crate::kernel::thread::Thread;
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::{Deadline, Koid, Txid, TXID_SIZE};
use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use spin::Once;

/// ============================================================================
/// Message
/// ============================================================================

/// Byte and handle counts of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageSize {
    /// Payload length
    pub bytes: usize,
    /// Number of handles
    pub handles: usize,
}

/// Channel message
pub struct Message {
    bytes: Vec<u8>,
    handles: Vec<Handle>,
}

impl Message {
    /// Build a message
    pub fn new(bytes: Vec<u8>, handles: Vec<Handle>) -> Self {
        Self { bytes, handles }
    }

    /// Payload
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Embedded handles
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    /// Byte and handle counts
    pub fn size(&self) -> MessageSize {
        MessageSize {
            bytes: self.bytes.len(),
            handles: self.handles.len(),
        }
    }

    /// Transaction id in the leading bytes, little endian
    pub fn txid(&self) -> Option<Txid> {
        let prefix: [u8; TXID_SIZE] = self.bytes.get(..TXID_SIZE)?.try_into().ok()?;
        Some(Txid::from_le_bytes(prefix))
    }

    /// Take the embedded handles out of the message
    pub fn take_handles(&mut self) -> Vec<Handle> {
        core::mem::take(&mut self.handles)
    }

    /// Split into payload and handles
    pub fn into_parts(self) -> (Vec<u8>, Vec<Handle>) {
        (self.bytes, self.handles)
    }
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Message")
            .field("bytes", &self.bytes.len())
            .field("handles", &self.handles.len())
            .finish()
    }
}

/// ============================================================================
/// Call Transactions
/// ============================================================================

/// A caller blocked on a reply
pub struct MessageWaiter {
    txid: Txid,
    event: Event,
    reply: Mutex<Option<Result<Message>>>,
}

impl MessageWaiter {
    fn new(txid: Txid) -> Arc<Self> {
        Arc::new(Self {
            txid,
            event: Event::new(false, EventFlags::empty()),
            reply: Mutex::new(None),
        })
    }

    /// Transaction id being waited for
    pub fn txid(&self) -> Txid {
        self.txid
    }

    fn complete(&self, reply: Result<Message>) {
        *self.reply.lock() = Some(reply);
        self.event.signal();
    }

    fn take_reply(&self) -> Option<Result<Message>> {
        self.reply.lock().take()
    }
}

/// State of an outstanding call
///
/// Created when the request is written. While it exists the waiter stays
/// registered on the caller's endpoint; dropping it unregisters the
/// waiter. An interrupted call keeps it in the thread until `call_finish`.
pub struct CallCheckpoint {
    endpoint: Arc<ChannelEndpoint>,
    waiter: Arc<MessageWaiter>,
    deadline: Deadline,
}

impl CallCheckpoint {
    /// Endpoint the call was made through
    pub fn endpoint(&self) -> &Arc<ChannelEndpoint> {
        &self.endpoint
    }

    /// Transaction id
    pub fn txid(&self) -> Txid {
        self.waiter.txid()
    }

    /// Deadline of the reply wait
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Change the deadline, as `call_finish` does when resuming
    pub fn set_deadline(&mut self, deadline: Deadline) {
        self.deadline = deadline;
    }

    /// Wait for the reply
    ///
    /// # Returns
    ///
    /// - `Ok(reply)` once a message with the call's txid arrives
    /// - `Err(Error::PeerClosed)` if the peer closed first
    /// - `Err(Error::TimedOut)` if the deadline passed
    /// - `Err(Error::InternalIntrRetry)` if the thread was interrupted; the
    ///   waiter stays registered so the call can be resumed
    pub fn wait(&self, thread: Option<&Thread>) -> Result<Message> {
        match self.waiter.event.wait(thread, self.deadline) {
            Ok(()) => self.waiter.take_reply().unwrap_or(Err(Error::Internal)),
            Err(Error::TimedOut) => {
                // A reply may have landed between the timeout and now
                self.endpoint.unregister_waiter(&self.waiter);
                self.waiter.take_reply().unwrap_or(Err(Error::TimedOut))
            }
            Err(err) => Err(err),
        }
    }
}

impl Drop for CallCheckpoint {
    fn drop(&mut self) {
        self.endpoint.unregister_waiter(&self.waiter);
    }
}

impl core::fmt::Debug for CallCheckpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallCheckpoint")
            .field("endpoint", &self.endpoint.koid())
            .field("txid", &self.txid())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// ============================================================================
/// Channel Endpoint
/// ============================================================================

struct EndpointInner {
    messages: VecDeque<Message>,
    waiters: Vec<Arc<MessageWaiter>>,
    peer_closed: bool,
    closed: bool,
}

/// One side of a channel
pub struct ChannelEndpoint {
    base: ObjectBase,
    peer: Once<Weak<ChannelEndpoint>>,
    peer_koid: Koid,
    config: IpcConfig,
    inner: Mutex<EndpointInner>,
}

impl ChannelEndpoint {
    fn new(koid: Koid, peer_koid: Koid, config: IpcConfig) -> Self {
        Self {
            base: ObjectBase::with_koid(koid, Signals::WRITABLE),
            peer: Once::new(),
            peer_koid,
            config,
            inner: Mutex::new(EndpointInner {
                messages: VecDeque::new(),
                waiters: Vec::new(),
                peer_closed: false,
                closed: false,
            }),
        }
    }

    /// Create a connected pair of endpoints enforcing `config`
    pub fn create_pair(config: &IpcConfig) -> (Arc<Self>, Arc<Self>) {
        let koid0 = alloc_koid();
        let koid1 = alloc_koid();
        let endpoint0 = Arc::new(Self::new(koid0, koid1, *config));
        let endpoint1 = Arc::new(Self::new(koid1, koid0, *config));
        endpoint0.peer.call_once(|| Arc::downgrade(&endpoint1));
        endpoint1.peer.call_once(|| Arc::downgrade(&endpoint0));
        (endpoint0, endpoint1)
    }

    /// Kernel object ID
    pub fn koid(&self) -> Koid {
        self.base.koid()
    }

    /// Koid of the other endpoint
    pub fn peer_koid(&self) -> Koid {
        self.peer_koid
    }

    /// Object base
    pub fn base(&self) -> &ObjectBase {
        &self.base
    }

    /// Limits this endpoint enforces
    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    /// The other endpoint, if it still exists
    pub fn peer(&self) -> Option<Arc<Self>> {
        self.peer.get().and_then(Weak::upgrade)
    }

    /// Number of queued messages
    pub fn pending(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Whether the peer's last handle was closed
    pub fn is_peer_closed(&self) -> bool {
        self.inner.lock().peer_closed
    }

    /// Check a message shape against the limits
    pub fn check_message(&self, bytes: usize, handles: usize) -> Result {
        if bytes > self.config.max_message_bytes || handles > self.config.max_message_handles {
            return Err(Error::InvalidArgs);
        }
        Ok(())
    }

    /// Write a message to the peer
    ///
    /// On failure the message is handed back so its handles can be
    /// restored to the sender.
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidArgs)` if the message exceeds the limits
    /// - `Err(Error::PeerClosed)` if the peer is gone
    /// - `Err(Error::ShouldWait)` if the peer's queue is full
    pub fn write(&self, msg: Message) -> core::result::Result<(), (Error, Message)> {
        let size = msg.size();
        if let Err(err) = self.check_message(size.bytes, size.handles) {
            return Err((err, msg));
        }
        match self.peer() {
            Some(peer) => peer.deliver(msg),
            None => Err((Error::PeerClosed, msg)),
        }
    }

    /// Accept a message written by the peer
    fn deliver(&self, msg: Message) -> core::result::Result<(), (Error, Message)> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err((Error::PeerClosed, msg));
        }

        if !inner.waiters.is_empty() {
            if let Some(txid) = msg.txid() {
                if let Some(index) = inner.waiters.iter().position(|w| w.txid == txid) {
                    let waiter = inner.waiters.remove(index);
                    waiter.complete(Ok(msg));
                    drop(inner);
                    drop(waiter);
                    return Ok(());
                }
            }
        }

        if inner.messages.len() >= self.config.max_pending_messages {
            return Err((Error::ShouldWait, msg));
        }
        inner.messages.push_back(msg);
        if inner.messages.len() == 1 {
            self.base.update_state(Signals::empty(), Signals::READABLE);
        }
        Ok(())
    }

    /// Read the head message
    ///
    /// # Arguments
    ///
    /// * `max_bytes` - Capacity of the caller's byte buffer
    /// * `max_handles` - Capacity of the caller's handle buffer
    /// * `handle_room` - Handles the reader has table room reserved for
    /// * `may_discard` - Drop a head message that does not fit
    /// * `required` - Set to the head message's size whenever one exists
    ///
    /// # Returns
    ///
    /// - `Err(Error::ShouldWait)` if the queue is empty
    /// - `Err(Error::PeerClosed)` if it is empty and the peer is gone
    /// - `Err(Error::BufferTooSmall)` if the head does not fit; it stays
    ///   queued unless `may_discard` is set
    /// - `Err(Error::NoMemory)` if the head fits but carries more than
    ///   `handle_room` handles; it stays queued
    pub fn read(
        &self,
        max_bytes: usize,
        max_handles: usize,
        handle_room: usize,
        may_discard: bool,
        required: &mut MessageSize,
    ) -> Result<Message> {
        let mut discarded = None;
        let result = {
            let mut inner = self.inner.lock();
            match inner.messages.front().map(Message::size) {
                None if inner.peer_closed => Err(Error::PeerClosed),
                None => Err(Error::ShouldWait),
                Some(size) => {
                    *required = size;
                    let fits = size.bytes <= max_bytes && size.handles <= max_handles;
                    if fits && size.handles > handle_room {
                        return Err(Error::NoMemory);
                    }
                    let popped = if fits || may_discard {
                        inner.messages.pop_front()
                    } else {
                        None
                    };
                    if inner.messages.is_empty() {
                        self.base.update_state(Signals::READABLE, Signals::empty());
                    }
                    match popped {
                        Some(msg) if fits => Ok(msg),
                        other => {
                            discarded = other;
                            Err(Error::BufferTooSmall)
                        }
                    }
                }
            }
        };
        drop(discarded);
        result
    }

    /// Write a call request and register for its reply
    ///
    /// The request must start with a transaction id; it may not match a
    /// call already outstanding on this endpoint.
    pub fn begin_call(
        self: &Arc<Self>,
        msg: Message,
        deadline: Deadline,
    ) -> core::result::Result<CallCheckpoint, (Error, Message)> {
        let Some(txid) = msg.txid() else {
            return Err((Error::InvalidArgs, msg));
        };

        let waiter = MessageWaiter::new(txid);
        {
            let mut inner = self.inner.lock();
            if inner.peer_closed {
                return Err((Error::PeerClosed, msg));
            }
            if inner.waiters.iter().any(|w| w.txid == txid) {
                return Err((Error::BadState, msg));
            }
            inner.waiters.push(waiter.clone());
        }

        let checkpoint = CallCheckpoint {
            endpoint: self.clone(),
            waiter,
            deadline,
        };
        match self.write(msg) {
            Ok(()) => Ok(checkpoint),
            Err((err, msg)) => {
                drop(checkpoint);
                Err((err, msg))
            }
        }
    }

    fn unregister_waiter(&self, waiter: &Arc<MessageWaiter>) {
        let removed = {
            let mut inner = self.inner.lock();
            let index = inner.waiters.iter().position(|w| Arc::ptr_eq(w, waiter));
            index.map(|index| inner.waiters.remove(index))
        };
        drop(removed);
    }

    /// Clear then set user signals
    pub fn user_signal(&self, clear: Signals, set: Signals) -> Result {
        if !Signals::USER_ALL.contains(clear.union(set)) {
            return Err(Error::InvalidArgs);
        }
        self.base.update_state(clear, set);
        Ok(())
    }

    /// Last handle closed
    pub(crate) fn on_zero_handles(&self) {
        let (messages, waiters) = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            (
                core::mem::take(&mut inner.messages),
                core::mem::take(&mut inner.waiters),
            )
        };
        for waiter in &waiters {
            waiter.complete(Err(Error::Canceled));
        }
        drop(messages);
        drop(waiters);

        if let Some(peer) = self.peer() {
            peer.on_peer_closed();
        }
    }

    fn on_peer_closed(&self) {
        let waiters = {
            let mut inner = self.inner.lock();
            inner.peer_closed = true;
            let waiters = core::mem::take(&mut inner.waiters);
            for waiter in &waiters {
                waiter.complete(Err(Error::PeerClosed));
            }
            self.base.update_state(Signals::WRITABLE, Signals::PEER_CLOSED);
            waiters
        };
        drop(waiters);
    }
}

impl core::fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("koid", &self.koid())
            .field("peer_koid", &self.peer_koid)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::object::event::EventObject;
    use crate::kernel::object::{KernelObject, Rights};
    use crate::kernel::platform::{self, host};
    use crate::rustux::types::{deadline_after, DEADLINE_INFINITE, DEADLINE_PAST};
    use alloc::vec;

    fn pair() -> (Arc<ChannelEndpoint>, Arc<ChannelEndpoint>) {
        ChannelEndpoint::create_pair(&IpcConfig::default())
    }

    fn bytes(data: &[u8]) -> Message {
        Message::new(data.to_vec(), Vec::new())
    }

    fn call_request(txid: Txid, body: &[u8]) -> Message {
        let mut data = txid.to_le_bytes().to_vec();
        data.extend_from_slice(body);
        bytes(&data)
    }

    #[test]
    fn test_create_pair_signals() {
        let (a, b) = pair();
        assert_eq!(a.base().signals(), Signals::WRITABLE);
        assert_eq!(b.base().signals(), Signals::WRITABLE);
        assert_eq!(a.peer_koid(), b.koid());
        assert_eq!(b.peer_koid(), a.koid());
    }

    #[test]
    fn test_write_read_fifo() {
        let (a, b) = pair();
        for i in 0..4u8 {
            a.write(bytes(&[i])).unwrap();
        }
        assert!(b.base().signals().contains(Signals::READABLE));

        let mut size = MessageSize::default();
        for i in 0..4u8 {
            let msg = b.read(16, 0, 0, false, &mut size).unwrap();
            assert_eq!(msg.bytes(), &[i]);
        }
        assert!(!b.base().signals().contains(Signals::READABLE));
        assert_eq!(b.read(16, 0, 0, false, &mut size).err(), Some(Error::ShouldWait));
    }

    #[test]
    fn test_read_too_small_keeps_message() {
        let (a, b) = pair();
        a.write(bytes(&[1, 2, 3])).unwrap();

        let mut size = MessageSize::default();
        assert_eq!(b.read(1, 0, 0, false, &mut size).err(), Some(Error::BufferTooSmall));
        assert_eq!(size, MessageSize { bytes: 3, handles: 0 });
        assert_eq!(b.pending(), 1);
        assert!(b.base().signals().contains(Signals::READABLE));

        assert_eq!(b.read(3, 0, 0, false, &mut size).unwrap().bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_read_may_discard() {
        let (a, b) = pair();
        a.write(bytes(&[1, 2, 3])).unwrap();
        let mut size = MessageSize::default();
        assert_eq!(b.read(1, 0, 0, true, &mut size).err(), Some(Error::BufferTooSmall));
        assert_eq!(size.bytes, 3);
        assert_eq!(b.pending(), 0);
        assert!(!b.base().signals().contains(Signals::READABLE));
    }

    #[test]
    fn test_read_without_handle_room_keeps_message() {
        let (a, b) = pair();
        let handle = Handle::new(KernelObject::Event(EventObject::new()), Rights::EVENT_DEFAULT);
        a.write(Message::new(vec![1], vec![handle])).unwrap();

        let mut size = MessageSize::default();
        assert_eq!(b.read(4, 4, 0, false, &mut size).err(), Some(Error::NoMemory));
        assert_eq!(size, MessageSize { bytes: 1, handles: 1 });
        assert_eq!(b.pending(), 1);
        assert!(b.base().signals().contains(Signals::READABLE));

        let msg = b.read(4, 4, 1, false, &mut size).unwrap();
        assert_eq!(msg.handles().len(), 1);
    }

    #[test]
    fn test_write_limits() {
        let config = IpcConfig::new().with_max_message_bytes(4);
        let (a, _b) = ChannelEndpoint::create_pair(&config);
        let (err, msg) = a.write(bytes(&[0; 5])).unwrap_err();
        assert_eq!(err, Error::InvalidArgs);
        assert_eq!(msg.bytes().len(), 5);
    }

    #[test]
    fn test_backpressure() {
        let config = IpcConfig::new().with_max_pending_messages(2);
        let (a, b) = ChannelEndpoint::create_pair(&config);
        a.write(bytes(&[1])).unwrap();
        a.write(bytes(&[2])).unwrap();
        assert_eq!(a.write(bytes(&[3])).unwrap_err().0, Error::ShouldWait);

        let mut size = MessageSize::default();
        b.read(1, 0, 0, false, &mut size).unwrap();
        assert!(a.write(bytes(&[3])).is_ok());
    }

    #[test]
    fn test_close_sets_peer_closed() {
        let (a, b) = pair();
        a.write(bytes(&[7])).unwrap();
        a.on_zero_handles();
        drop(a);

        assert!(b.is_peer_closed());
        let signals = b.base().signals();
        assert!(signals.contains(Signals::PEER_CLOSED | Signals::READABLE));
        assert!(!signals.contains(Signals::WRITABLE));

        // Queued messages are still readable, then the peer is reported gone
        let mut size = MessageSize::default();
        assert_eq!(b.read(1, 0, 0, false, &mut size).unwrap().bytes(), &[7]);
        assert_eq!(b.read(1, 0, 0, false, &mut size).err(), Some(Error::PeerClosed));
        assert_eq!(b.write(bytes(&[1])).unwrap_err().0, Error::PeerClosed);
    }

    #[test]
    fn test_unread_message_closes_its_handles() {
        let (a, b) = pair();
        let event = EventObject::new();
        let handle = Handle::new(KernelObject::Event(event.clone()), Rights::EVENT_DEFAULT);
        a.write(Message::new(vec![0], vec![handle])).unwrap();
        assert_eq!(event.base().handle_count(), 1);

        b.on_zero_handles();
        assert_eq!(event.base().handle_count(), 0);
    }

    #[test]
    fn test_txid() {
        assert_eq!(call_request(42, &[9]).txid(), Some(42));
        assert_eq!(bytes(&[1, 2]).txid(), None);
    }

    #[test]
    fn test_call_matches_reply() {
        host::install();
        let (a, b) = pair();
        let checkpoint = a.begin_call(call_request(42, &[1]), DEADLINE_INFINITE).unwrap();

        let mut size = MessageSize::default();
        let request = b.read(64, 0, 0, false, &mut size).unwrap();
        assert_eq!(request.txid(), Some(42));

        b.write(call_request(42, &[2])).unwrap();
        let reply = checkpoint.wait(None).unwrap();
        assert_eq!(reply.bytes(), &[42, 0, 0, 0, 2]);
        // Delivered to the waiter, not queued
        assert_eq!(a.pending(), 0);
    }

    #[test]
    fn test_call_ignores_mismatched_txid() {
        host::install();
        let (a, b) = pair();
        let deadline = deadline_after(platform::current_time(), 2_000_000);
        let checkpoint = a.begin_call(call_request(42, &[]), deadline).unwrap();

        b.write(call_request(43, &[])).unwrap();
        assert_eq!(checkpoint.wait(None).err(), Some(Error::TimedOut));
        assert_eq!(a.pending(), 1);
    }

    #[test]
    fn test_call_duplicate_txid() {
        let (a, _b) = pair();
        let _first = a.begin_call(call_request(5, &[]), DEADLINE_INFINITE).unwrap();
        assert_eq!(
            a.begin_call(call_request(5, &[]), DEADLINE_INFINITE).unwrap_err().0,
            Error::BadState
        );
    }

    #[test]
    fn test_call_peer_closed() {
        host::install();
        let (a, b) = pair();
        let checkpoint = a.begin_call(call_request(1, &[]), DEADLINE_INFINITE).unwrap();
        b.on_zero_handles();
        assert_eq!(checkpoint.wait(None).err(), Some(Error::PeerClosed));
    }

    #[test]
    fn test_call_interrupt_keeps_waiter() {
        host::install();
        let (a, b) = pair();
        let thread = Thread::new();
        let mut checkpoint = a.begin_call(call_request(8, &[]), DEADLINE_INFINITE).unwrap();

        thread.interrupt();
        assert_eq!(checkpoint.wait(Some(&thread)).err(), Some(Error::InternalIntrRetry));

        b.write(call_request(8, &[1])).unwrap();
        checkpoint.set_deadline(DEADLINE_PAST);
        assert_eq!(checkpoint.wait(Some(&thread)).unwrap().bytes(), &[8, 0, 0, 0, 1]);
    }

    #[test]
    fn test_dropped_checkpoint_unregisters() {
        let (a, b) = pair();
        let checkpoint = a.begin_call(call_request(3, &[]), DEADLINE_INFINITE).unwrap();
        drop(checkpoint);
        b.write(call_request(3, &[])).unwrap();
        assert_eq!(a.pending(), 1);
    }

    #[test]
    fn test_user_signal() {
        let (a, _b) = pair();
        a.user_signal(Signals::empty(), Signals::USER_3).unwrap();
        assert!(a.base().signals().contains(Signals::USER_3));
        assert_eq!(a.user_signal(Signals::WRITABLE, Signals::empty()), Err(Error::InvalidArgs));
    }
}
