// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread IPC State
//!
//! The slice of a thread the IPC core needs: an identity, an interrupt flag
//! the rest of the kernel raises to pull a thread out of a blocking call
//! (signal or exception delivery, suspension), and the checkpoint of an
//! interrupted channel call.
//!
//! # Interrupted calls
//!
//! ```text
//! call() --interrupt--> Err(InternalIntrRetry), checkpoint saved
//! call_finish() ------> resumes the saved wait with a new deadline
//! ```

use crate::kernel::object::channel::CallCheckpoint;
use crate::kernel::sync::Mutex;
use crate::rustux::types::Tid;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Thread ID type
pub type ThreadId = Tid;

/// Invalid thread ID
pub const TID_INVALID: ThreadId = 0;

/// Global thread ID allocator
static TID_ALLOCATOR: TidAllocator = TidAllocator::new();

/// Thread ID allocator
struct TidAllocator {
    next: AtomicU64,
}

impl TidAllocator {
    const fn new() -> Self {
        Self {
            next: AtomicU64::new(1), // TID 0 is reserved/invalid
        }
    }

    fn allocate(&self) -> ThreadId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Per-thread IPC state
pub struct Thread {
    /// Thread ID
    tid: ThreadId,

    /// Set by [`Thread::interrupt`], consumed by the next blocking point
    interrupt_pending: AtomicBool,

    /// Interrupted channel call awaiting `call_finish`
    call_checkpoint: Mutex<Option<CallCheckpoint>>,
}

impl Thread {
    /// Create a new thread context
    pub fn new() -> Self {
        Self {
            tid: TID_ALLOCATOR.allocate(),
            interrupt_pending: AtomicBool::new(false),
            call_checkpoint: Mutex::new(None),
        }
    }

    /// Get the thread ID
    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    /// Interrupt the thread's current or next blocking wait
    pub fn interrupt(&self) {
        self.interrupt_pending.store(true, Ordering::Release);
    }

    /// Whether an interrupt is pending
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_pending.load(Ordering::Acquire)
    }

    /// Consume a pending interrupt
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupt_pending.swap(false, Ordering::AcqRel)
    }

    /// Save the state of an interrupted call
    pub(crate) fn save_call_checkpoint(&self, checkpoint: CallCheckpoint) {
        let previous = self.call_checkpoint.lock().replace(checkpoint);
        // Dropped outside the lock; an abandoned checkpoint unregisters its waiter
        drop(previous);
    }

    /// Take the state of an interrupted call
    pub(crate) fn take_call_checkpoint(&self) -> Option<CallCheckpoint> {
        self.call_checkpoint.lock().take()
    }

    /// Whether a call is waiting to be finished
    pub fn has_call_checkpoint(&self) -> bool {
        self.call_checkpoint.lock().is_some()
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("interrupt_pending", &self.interrupt_pending())
            .finish()
    }
}
