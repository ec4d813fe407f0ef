// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Handle Rights
//!
//! Rights are a property of a handle, not of the object it references: two
//! handles to the same channel may carry different rights. Every syscall
//! checks the rights it needs before touching the object.
//!
//! # Usage
//!
//! ```rust
//! use rustux_ipc::kernel::object::Rights;
//!
//! let rights = Rights::READ | Rights::WRITE | Rights::DUPLICATE;
//! assert!(rights.require(Rights::READ).is_ok());
//! assert_eq!(rights.resolve(Rights::SAME_RIGHTS), Ok(rights));
//! ```

use crate::rustux::errors::{Error, Result};
use bitflags::bitflags;
use static_assertions::const_assert_eq;

bitflags! {
    /// Handle rights bitmask
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Rights: u32 {
        /// Duplicate the handle
        const DUPLICATE = 1 << 0;
        /// Transfer the handle through a channel
        const TRANSFER = 1 << 1;
        /// Read messages or packets
        const READ = 1 << 2;
        /// Write messages or packets
        const WRITE = 1 << 3;
        /// Execute
        const EXECUTE = 1 << 4;
        /// Map into an address space
        const MAP = 1 << 5;
        /// Read object properties
        const GET_PROPERTY = 1 << 6;
        /// Set object properties
        const SET_PROPERTY = 1 << 7;
        /// Enumerate children
        const ENUMERATE = 1 << 8;
        /// Destroy the object
        const DESTROY = 1 << 9;
        /// Set policy
        const SET_POLICY = 1 << 10;
        /// Get policy
        const GET_POLICY = 1 << 11;
        /// Assert user signals on the object
        const SIGNAL = 1 << 12;
        /// Assert user signals on the peer
        const SIGNAL_PEER = 1 << 13;
        /// Wait on the object's signals
        const WAIT = 1 << 14;
        /// Query object information
        const INSPECT = 1 << 15;

        /// Sentinel for duplicate/replace: keep the source's rights
        const SAME_RIGHTS = 1 << 31;
    }
}

impl Rights {
    /// Rights every object kind starts from
    pub const BASIC: Self = Self::TRANSFER
        .union(Self::DUPLICATE)
        .union(Self::WAIT)
        .union(Self::INSPECT);

    /// Read and write
    pub const IO: Self = Self::READ.union(Self::WRITE);

    /// Default rights of a new channel endpoint
    ///
    /// Endpoints are not duplicable, so each end has exactly one handle.
    pub const CHANNEL_DEFAULT: Self = Self::TRANSFER
        .union(Self::WAIT)
        .union(Self::INSPECT)
        .union(Self::IO)
        .union(Self::SIGNAL)
        .union(Self::SIGNAL_PEER);

    /// Default rights of a new port
    pub const PORT_DEFAULT: Self = Self::TRANSFER
        .union(Self::DUPLICATE)
        .union(Self::INSPECT)
        .union(Self::IO);

    /// Default rights of a new event
    pub const EVENT_DEFAULT: Self = Self::BASIC.union(Self::SIGNAL);

    /// Require all of `required`
    ///
    /// # Returns
    ///
    /// - `Ok(())` if every right is present
    /// - `Err(Error::AccessDenied)` if any right is missing
    pub fn require(self, required: Self) -> Result {
        if self.contains(required) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    /// Resolve the rights requested for a derived handle
    ///
    /// [`Rights::SAME_RIGHTS`] yields `self`; anything else must be a subset
    /// of `self`, so a derived handle can never gain a right.
    pub fn resolve(self, requested: Self) -> Result<Self> {
        if requested.contains(Self::SAME_RIGHTS) {
            return Ok(self);
        }
        if !self.contains(requested) {
            return Err(Error::InvalidArgs);
        }
        Ok(requested)
    }
}

const_assert_eq!(Rights::SAME_RIGHTS.bits(), 0x8000_0000);
const_assert_eq!(Rights::WAIT.bits(), 0x4000);
