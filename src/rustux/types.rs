// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Common type aliases used throughout the kernel

/// Handle value as seen by userspace
///
/// Packs an arena slot index and a generation counter; see
/// [`crate::kernel::object::handle_table`].
pub type HandleValue = u32;

/// The reserved "never a handle" value
pub const HANDLE_INVALID: HandleValue = 0;

/// Kernel object identifier (process independent)
pub type Koid = u64;

/// Koid that never names a live object
pub const KOID_INVALID: Koid = 0;

/// Thread ID type
pub type Tid = u64;

/// Time value in nanoseconds
pub type Nanoseconds = u64;

/// Absolute deadline in nanoseconds on the platform clock
pub type Deadline = Nanoseconds;

/// Deadline that never expires
pub const DEADLINE_INFINITE: Deadline = u64::MAX;

/// Deadline that has always passed; turns any wait into a poll
pub const DEADLINE_PAST: Deadline = 0;

/// Channel call transaction identifier
///
/// Occupies the first bytes of every `call` request and reply.
pub type Txid = u32;

/// Size of the transaction id prefix in a call message
pub const TXID_SIZE: usize = core::mem::size_of::<Txid>();

/// Compute an absolute deadline `duration` nanoseconds after `now`
///
/// Saturates at [`DEADLINE_INFINITE`].
pub const fn deadline_after(now: Nanoseconds, duration: Nanoseconds) -> Deadline {
    now.saturating_add(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_after_saturates() {
        assert_eq!(deadline_after(10, 5), 15);
        assert_eq!(deadline_after(u64::MAX - 1, 5), DEADLINE_INFINITE);
    }
}
