// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Event
//!
//! The completion primitive a blocked thread parks on. Signal producers
//! (observers, channel writers, port queuers) call [`Event::signal`]; the
//! waiting thread polls the event, its own interrupt flag and the deadline,
//! relaxing the CPU between polls.
//!
//! # Usage
//!
//! ```rust,ignore
//! let event = Event::new(false, EventFlags::empty());
//!
//! // Another thread: event.signal();
//! event.wait(Some(thread), deadline)?;
//! ```

use crate::kernel::platform;
use crate::kernel::thread::Thread;
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::Deadline;
use core::sync::atomic::{AtomicBool, Ordering};

/// Event flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags {
    /// Clear the signal when a waiter consumes it
    pub auto_unsignal: bool,
}

impl EventFlags {
    /// No flags
    pub const fn empty() -> Self {
        Self { auto_unsignal: false }
    }

    /// Auto unsignal flag
    pub const fn auto_unsignal() -> Self {
        Self { auto_unsignal: true }
    }
}

/// Event synchronization primitive
#[derive(Debug)]
pub struct Event {
    /// Whether the event is currently signaled
    signaled: AtomicBool,

    /// Event flags
    flags: EventFlags,
}

impl Event {
    /// Create a new event
    ///
    /// # Arguments
    ///
    /// * `initial` - Initial signaled state
    /// * `flags` - Event flags
    pub const fn new(initial: bool, flags: EventFlags) -> Self {
        Self {
            signaled: AtomicBool::new(initial),
            flags,
        }
    }

    /// Check if event is signaled
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Signal the event, releasing every waiter
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    /// Clear the signal
    pub fn unsignal(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    fn try_consume(&self) -> bool {
        if self.flags.auto_unsignal {
            self.signaled
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        } else {
            self.is_signaled()
        }
    }

    /// Wait for the event to be signaled
    ///
    /// An already signaled event returns immediately even when `deadline`
    /// has passed; a past deadline otherwise turns the wait into a poll.
    ///
    /// # Arguments
    ///
    /// * `thread` - The blocking thread, checked for pending interrupts
    /// * `deadline` - Absolute deadline on the platform clock
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the event was signaled
    /// - `Err(Error::TimedOut)` if the deadline expired first
    /// - `Err(Error::InternalIntrRetry)` if the thread was interrupted
    pub fn wait(&self, thread: Option<&Thread>, deadline: Deadline) -> Result {
        loop {
            if self.try_consume() {
                return Ok(());
            }
            if let Some(thread) = thread {
                if thread.take_interrupt() {
                    return Err(Error::InternalIntrRetry);
                }
            }
            if platform::current_time() >= deadline {
                return Err(Error::TimedOut);
            }
            platform::relax();
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(false, EventFlags::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::platform::host;
    use crate::rustux::types::{deadline_after, DEADLINE_INFINITE, DEADLINE_PAST};
    use std::sync::Arc;

    #[test]
    fn test_signaled_event_returns_even_past_deadline() {
        host::install();
        let event = Event::new(true, EventFlags::empty());
        assert_eq!(event.wait(None, DEADLINE_PAST), Ok(()));
        // Manual reset: stays signaled
        assert!(event.is_signaled());
    }

    #[test]
    fn test_auto_unsignal_consumes() {
        host::install();
        let event = Event::new(true, EventFlags::auto_unsignal());
        assert_eq!(event.wait(None, DEADLINE_PAST), Ok(()));
        assert!(!event.is_signaled());
        assert_eq!(event.wait(None, DEADLINE_PAST), Err(Error::TimedOut));
    }

    #[test]
    fn test_wait_times_out() {
        host::install();
        let event = Event::default();
        let deadline = deadline_after(platform::current_time(), 1_000_000);
        assert_eq!(event.wait(None, deadline), Err(Error::TimedOut));
    }

    #[test]
    fn test_cross_thread_signal() {
        host::install();
        let event = Arc::new(Event::default());
        let signaler = {
            let event = event.clone();
            std::thread::spawn(move || event.signal())
        };
        assert_eq!(event.wait(None, DEADLINE_INFINITE), Ok(()));
        signaler.join().unwrap();
    }

    #[test]
    fn test_interrupt_breaks_wait() {
        host::install();
        let thread = Thread::new();
        thread.interrupt();
        let event = Event::default();
        assert_eq!(event.wait(Some(&thread), DEADLINE_INFINITE), Err(Error::InternalIntrRetry));
        // The interrupt is consumed
        assert!(!thread.interrupt_pending());
    }
}
