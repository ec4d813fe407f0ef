// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! IPC Counters
//!
//! System-wide accounting for the IPC core. Counters are side effects only;
//! nothing reads them to make a decision.

use core::sync::atomic::{AtomicU64, Ordering};

/// Number of message size buckets (powers of two up to 64 KiB, plus one
/// overflow bucket)
pub const MESSAGE_SIZE_BUCKETS: usize = 18;

/// Kernel counter identifiers
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Channel pairs created
    ChannelsCreated = 0,
    /// Ports created
    PortsCreated,
    /// Events created
    EventsCreated,
    /// Messages successfully written
    MessagesWritten,
    /// Messages successfully read
    MessagesRead,
    /// Payload bytes written
    BytesWritten,
    /// Handles moved through channels
    HandlesTransferred,
    /// `wait_one` calls
    WaitOne,
    /// `wait_many` calls
    WaitMany,
    /// `wait_async` registrations
    WaitAsync,
    /// Packets queued on ports
    PacketsQueued,
    /// Channel calls started
    Calls,
}

const COUNTER_COUNT: usize = Counter::Calls as usize + 1;

#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicU64 = AtomicU64::new(0);

static COUNTERS: [AtomicU64; COUNTER_COUNT] = [ZERO; COUNTER_COUNT];
static MESSAGE_SIZES: [AtomicU64; MESSAGE_SIZE_BUCKETS] = [ZERO; MESSAGE_SIZE_BUCKETS];

/// Add `value` to a counter
#[inline]
pub fn counter_add(counter: Counter, value: u64) {
    COUNTERS[counter as usize].fetch_add(value, Ordering::Relaxed);
}

/// Increment a counter
#[inline]
pub fn counter_inc(counter: Counter) {
    counter_add(counter, 1);
}

/// Read a counter
pub fn counter_get(counter: Counter) -> u64 {
    COUNTERS[counter as usize].load(Ordering::Relaxed)
}

/// Bucket index for a message of `bytes` bytes
///
/// Bucket 0 holds empty messages, bucket `n` holds sizes in
/// `[2^(n-1), 2^n)`, and the last bucket everything larger.
pub const fn message_size_bucket(bytes: usize) -> usize {
    if bytes == 0 {
        return 0;
    }
    let bits = (usize::BITS - bytes.leading_zeros()) as usize;
    if bits >= MESSAGE_SIZE_BUCKETS {
        MESSAGE_SIZE_BUCKETS - 1
    } else {
        bits
    }
}

/// Account one written message
pub fn record_message_written(bytes: usize, handles: usize) {
    counter_inc(Counter::MessagesWritten);
    counter_add(Counter::BytesWritten, bytes as u64);
    counter_add(Counter::HandlesTransferred, handles as u64);
    MESSAGE_SIZES[message_size_bucket(bytes)].fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the IPC counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcStats {
    /// Channel pairs created
    pub channels_created: u64,
    /// Ports created
    pub ports_created: u64,
    /// Events created
    pub events_created: u64,
    /// Messages written
    pub messages_written: u64,
    /// Messages read
    pub messages_read: u64,
    /// Payload bytes written
    pub bytes_written: u64,
    /// Handles transferred
    pub handles_transferred: u64,
    /// `wait_one` calls
    pub wait_one: u64,
    /// `wait_many` calls
    pub wait_many: u64,
    /// `wait_async` registrations
    pub wait_async: u64,
    /// Packets queued on ports
    pub packets_queued: u64,
    /// Channel calls started
    pub calls: u64,
    /// Written message size histogram
    pub message_sizes: [u64; MESSAGE_SIZE_BUCKETS],
}

/// Take a snapshot of every counter
pub fn snapshot() -> IpcStats {
    let mut message_sizes = [0u64; MESSAGE_SIZE_BUCKETS];
    for (out, bucket) in message_sizes.iter_mut().zip(MESSAGE_SIZES.iter()) {
        *out = bucket.load(Ordering::Relaxed);
    }

    IpcStats {
        channels_created: counter_get(Counter::ChannelsCreated),
        ports_created: counter_get(Counter::PortsCreated),
        events_created: counter_get(Counter::EventsCreated),
        messages_written: counter_get(Counter::MessagesWritten),
        messages_read: counter_get(Counter::MessagesRead),
        bytes_written: counter_get(Counter::BytesWritten),
        handles_transferred: counter_get(Counter::HandlesTransferred),
        wait_one: counter_get(Counter::WaitOne),
        wait_many: counter_get(Counter::WaitMany),
        wait_async: counter_get(Counter::WaitAsync),
        packets_queued: counter_get(Counter::PacketsQueued),
        calls: counter_get(Counter::Calls),
        message_sizes,
    }
}
