// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! IPC Tunables
//!
//! Per-process limits for the IPC core. Each [`Process`] owns one
//! [`IpcConfig`]; channel endpoints capture the limits of the process that
//! created them so both ends of a pair enforce the same bounds.
//!
//! [`Process`]: crate::kernel::process::Process

use crate::rustux::errors::{Error, Result};
use static_assertions::const_assert;

/// Default maximum message payload in bytes
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Default maximum handles per message
pub const DEFAULT_MAX_MESSAGE_HANDLES: usize = 64;

/// Default number of unread messages an endpoint accepts before
/// writers get `ShouldWait`
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 3500;

/// Default maximum items in one `wait_many`
pub const DEFAULT_MAX_WAIT_MANY_ITEMS: usize = 64;

/// Default maximum user packets queued on one port
pub const DEFAULT_MAX_PORT_PACKETS: usize = 2048;

/// Default maximum live handles in one process table
pub const DEFAULT_MAX_HANDLES: usize = 256 * 1024;

const_assert!(DEFAULT_MAX_MESSAGE_HANDLES <= 64);
const_assert!(DEFAULT_MAX_WAIT_MANY_ITEMS <= 64);

/// IPC limits for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcConfig {
    /// Maximum message payload in bytes
    pub max_message_bytes: usize,

    /// Maximum handles carried by one message
    pub max_message_handles: usize,

    /// Backpressure threshold for an endpoint's inbound queue
    pub max_pending_messages: usize,

    /// Maximum items accepted by `wait_many`
    pub max_wait_many_items: usize,

    /// Backpressure threshold for user packets on a port
    pub max_port_packets: usize,

    /// Maximum live handles in the process table
    pub max_handles: usize,
}

impl IpcConfig {
    /// The default limits
    pub const fn new() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_message_handles: DEFAULT_MAX_MESSAGE_HANDLES,
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
            max_wait_many_items: DEFAULT_MAX_WAIT_MANY_ITEMS,
            max_port_packets: DEFAULT_MAX_PORT_PACKETS,
            max_handles: DEFAULT_MAX_HANDLES,
        }
    }

    /// Set the maximum message payload
    pub const fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    /// Set the maximum handles per message
    pub const fn with_max_message_handles(mut self, handles: usize) -> Self {
        self.max_message_handles = handles;
        self
    }

    /// Set the endpoint backpressure threshold
    pub const fn with_max_pending_messages(mut self, count: usize) -> Self {
        self.max_pending_messages = count;
        self
    }

    /// Set the `wait_many` item limit
    pub const fn with_max_wait_many_items(mut self, count: usize) -> Self {
        self.max_wait_many_items = count;
        self
    }

    /// Set the port backpressure threshold
    pub const fn with_max_port_packets(mut self, count: usize) -> Self {
        self.max_port_packets = count;
        self
    }

    /// Set the handle table size limit
    pub const fn with_max_handles(mut self, count: usize) -> Self {
        self.max_handles = count;
        self
    }

    /// Check the limits are usable
    ///
    /// Every queue must admit at least one element, and the wait-many and
    /// per-message handle limits are capped by the ABI.
    pub fn validate(&self) -> Result {
        if self.max_pending_messages == 0
            || self.max_port_packets == 0
            || self.max_wait_many_items == 0
            || self.max_handles == 0
        {
            return Err(Error::InvalidArgs);
        }
        if self.max_message_handles > DEFAULT_MAX_MESSAGE_HANDLES
            || self.max_wait_many_items > DEFAULT_MAX_WAIT_MANY_ITEMS
        {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IpcConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_message_bytes, 65536);
        assert_eq!(config.max_wait_many_items, 64);
    }

    #[test]
    fn test_builder_overrides() {
        let config = IpcConfig::new().with_max_pending_messages(2).with_max_wait_many_items(4);
        assert_eq!(config.max_pending_messages, 2);
        assert_eq!(config.max_wait_many_items, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_queues() {
        assert_eq!(
            IpcConfig::new().with_max_pending_messages(0).validate(),
            Err(Error::InvalidArgs)
        );
        assert_eq!(IpcConfig::new().with_max_handles(0).validate(), Err(Error::InvalidArgs));
    }

    #[test]
    fn test_validate_caps_abi_limits() {
        assert_eq!(
            IpcConfig::new().with_max_message_handles(65).validate(),
            Err(Error::OutOfRange)
        );
        assert_eq!(
            IpcConfig::new().with_max_wait_many_items(128).validate(),
            Err(Error::OutOfRange)
        );
    }
}
