// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Common error types used throughout the kernel
//!
//! Every failure in the IPC core is one of these status values. They are
//! returned synchronously to the calling thread; nothing here is fatal to
//! the kernel.

/// Raw status code as carried across the syscall boundary
pub type Status = i32;

/// Success status code
pub const RX_OK: Status = 0;

/// Result type for operations that can fail
pub type Result<T = ()> = core::result::Result<T, Error>;

/// Kernel error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// Internal failure that should never reach userspace
    #[error("internal error")]
    Internal,

    /// Operation not supported on this object
    #[error("operation not supported")]
    NotSupported,

    /// Resource exhaustion (table, arena or allocation)
    #[error("out of memory")]
    NoMemory,

    /// Malformed request shape or bounds exceeded
    #[error("invalid arguments")]
    InvalidArgs,

    /// Value out of the accepted range
    #[error("out of range")]
    OutOfRange,

    /// Destination buffer too small; retry with the reported sizes
    #[error("buffer too small")]
    BufferTooSmall,

    /// Object is in a state that forbids the operation
    #[error("bad state")]
    BadState,

    /// Deadline elapsed without a match
    #[error("timed out")]
    TimedOut,

    /// Operation would have to block (backpressure or empty queue)
    #[error("should wait")]
    ShouldWait,

    /// Wait canceled because the handle was closed
    #[error("canceled")]
    Canceled,

    /// The other end of the channel is gone
    #[error("peer closed")]
    PeerClosed,

    /// Lookup target does not exist
    #[error("not found")]
    NotFound,

    /// Handle value absent or stale
    #[error("bad handle")]
    BadHandle,

    /// Resolved object's kind does not match the operation
    #[error("wrong type")]
    WrongType,

    /// Rights or policy check failed
    #[error("access denied")]
    AccessDenied,

    /// Read phase of a channel call failed; see the read status
    #[error("call failed")]
    CallFailed,

    /// Blocking call interrupted; resubmit (or `call_finish`) to resume
    #[error("interrupted, retry")]
    InternalIntrRetry,
}

impl Error {
    /// Convert error to status code
    pub const fn into_status(self) -> Status {
        match self {
            Self::Internal => -1,
            Self::NotSupported => -2,
            Self::NoMemory => -4,
            Self::InvalidArgs => -10,
            Self::OutOfRange => -14,
            Self::BufferTooSmall => -15,
            Self::BadState => -20,
            Self::TimedOut => -21,
            Self::ShouldWait => -22,
            Self::Canceled => -23,
            Self::PeerClosed => -24,
            Self::NotFound => -25,
            Self::BadHandle => -11,
            Self::WrongType => -12,
            Self::AccessDenied => -30,
            Self::CallFailed => -5,
            Self::InternalIntrRetry => -6,
        }
    }

    /// Convert status code to error
    ///
    /// Returns `None` for `RX_OK` and unknown codes.
    pub const fn from_status(status: Status) -> Option<Self> {
        let err = match status {
            -1 => Self::Internal,
            -2 => Self::NotSupported,
            -4 => Self::NoMemory,
            -10 => Self::InvalidArgs,
            -14 => Self::OutOfRange,
            -15 => Self::BufferTooSmall,
            -20 => Self::BadState,
            -21 => Self::TimedOut,
            -22 => Self::ShouldWait,
            -23 => Self::Canceled,
            -24 => Self::PeerClosed,
            -25 => Self::NotFound,
            -11 => Self::BadHandle,
            -12 => Self::WrongType,
            -30 => Self::AccessDenied,
            -5 => Self::CallFailed,
            -6 => Self::InternalIntrRetry,
            _ => return None,
        };
        Some(err)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        err.into_status()
    }
}

/// Fold a result into the raw status returned to userspace
pub fn result_to_status<T>(result: &Result<T>) -> Status {
    match result {
        Ok(_) => RX_OK,
        Err(err) => err.into_status(),
    }
}
