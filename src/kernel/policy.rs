// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Basic Policy
//!
//! Before creating a throttled object kind, the creating syscall asks the
//! process's [`PolicyHook`] whether the creation is allowed. The job
//! hierarchy that normally backs this lives outside the IPC core.

use crate::rustux::errors::{Error, Result};
use bitflags::bitflags;

/// Conditions checked by the basic policy
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCondition {
    /// Creating a channel pair
    NewChannel = 0,

    /// Creating a port
    NewPort = 1,

    /// Creating an event
    NewEvent = 2,
}

impl PolicyCondition {
    /// Bit in a [`PolicyConditions`] set
    pub const fn as_flag(self) -> PolicyConditions {
        match self {
            Self::NewChannel => PolicyConditions::NEW_CHANNEL,
            Self::NewPort => PolicyConditions::NEW_PORT,
            Self::NewEvent => PolicyConditions::NEW_EVENT,
        }
    }
}

bitflags! {
    /// A set of policy conditions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolicyConditions: u32 {
        const NEW_CHANNEL = 1 << 0;
        const NEW_PORT = 1 << 1;
        const NEW_EVENT = 1 << 2;
    }
}

/// Per-process creation policy
pub trait PolicyHook: Send + Sync {
    /// Return `Err(AccessDenied)` to veto the creation
    fn enforce_basic_policy(&self, condition: PolicyCondition) -> Result;
}

/// Policy that allows everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PolicyHook for AllowAll {
    fn enforce_basic_policy(&self, _condition: PolicyCondition) -> Result {
        Ok(())
    }
}

/// Policy that denies a fixed set of conditions
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyList {
    denied: PolicyConditions,
}

impl DenyList {
    /// Deny every condition in `denied`
    pub const fn new(denied: PolicyConditions) -> Self {
        Self { denied }
    }
}

impl PolicyHook for DenyList {
    fn enforce_basic_policy(&self, condition: PolicyCondition) -> Result {
        if self.denied.contains(condition.as_flag()) {
            crate::log_debug!("policy: denied {:?}", condition);
            return Err(Error::AccessDenied);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.enforce_basic_policy(PolicyCondition::NewChannel).is_ok());
        assert!(AllowAll.enforce_basic_policy(PolicyCondition::NewPort).is_ok());
    }

    #[test]
    fn test_deny_list() {
        let policy = DenyList::new(PolicyConditions::NEW_PORT);
        assert!(policy.enforce_basic_policy(PolicyCondition::NewChannel).is_ok());
        assert_eq!(policy.enforce_basic_policy(PolicyCondition::NewPort), Err(Error::AccessDenied));
    }
}
