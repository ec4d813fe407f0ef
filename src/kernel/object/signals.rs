// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Object Signals
//!
//! The bits of an object's signal state. The low bits carry object-kind
//! state (channel readability, event signaled); the top byte is free for
//! user signalling through `object_signal`.

use bitflags::bitflags;

bitflags! {
    /// Signal bitmask
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u32 {
        /// Channel: a message is queued
        const READABLE = 1 << 0;
        /// Channel: the peer exists and accepts messages
        const WRITABLE = 1 << 1;
        /// Channel: the peer endpoint is gone
        const PEER_CLOSED = 1 << 2;
        /// Event: the event is signaled
        const SIGNALED = 1 << 3;

        /// Folded into a waiter's observed mask when the handle it waits
        /// through is closed
        const HANDLE_CLOSED = 1 << 23;

        /// User signal 0
        const USER_0 = 1 << 24;
        /// User signal 1
        const USER_1 = 1 << 25;
        /// User signal 2
        const USER_2 = 1 << 26;
        /// User signal 3
        const USER_3 = 1 << 27;
        /// User signal 4
        const USER_4 = 1 << 28;
        /// User signal 5
        const USER_5 = 1 << 29;
        /// User signal 6
        const USER_6 = 1 << 30;
        /// User signal 7
        const USER_7 = 1 << 31;
    }
}

impl Signals {
    /// All user signals
    pub const USER_ALL: Self = Self::from_bits_truncate(0xff00_0000);

    /// Whether any bit of `trigger` is set
    #[inline]
    pub const fn matches(self, trigger: Self) -> bool {
        self.intersects(trigger)
    }
}
