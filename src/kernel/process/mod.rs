// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Process IPC State
//!
//! The part of a process the IPC core works with: its handle table, the
//! limits it runs under, and the policy that vets object creation. The
//! table is created with the process and emptied by [`Process::teardown`]
//! (or when the process is dropped).
//!
//! # Usage
//!
//! ```rust
//! use rustux_ipc::kernel::config::IpcConfig;
//! use rustux_ipc::kernel::process::Process;
//!
//! let process = Process::with_config("driver", IpcConfig::new().with_max_handles(64)).unwrap();
//! assert_eq!(process.handles().count(), 0);
//!
//! // Limits outside what the IPC core supports are refused
//! assert!(Process::with_config("bad", IpcConfig::new().with_max_wait_many_items(500)).is_err());
//! ```

use crate::kernel::config::IpcConfig;
use crate::kernel::object::{alloc_koid, HandleTable};
use crate::kernel::policy::{AllowAll, PolicyCondition, PolicyHook};
use crate::rustux::errors::Result;
use crate::rustux::types::Koid;
use alloc::string::String;
use alloc::sync::Arc;

/// Process context
pub struct Process {
    /// Process koid
    koid: Koid,

    /// Process name
    name: String,

    /// Handle table
    handles: HandleTable,

    /// IPC limits
    config: IpcConfig,

    /// Creation policy
    policy: Arc<dyn PolicyHook>,
}

impl Process {
    /// Create a process with default limits and no policy restrictions
    pub fn new(name: &str) -> Self {
        Self::build(name, IpcConfig::default(), Arc::new(AllowAll))
    }

    /// Create a process with the given limits
    ///
    /// # Returns
    ///
    /// The error from [`IpcConfig::validate`] if the limits are unusable
    pub fn with_config(name: &str, config: IpcConfig) -> Result<Self> {
        Self::with_policy(name, config, Arc::new(AllowAll))
    }

    /// Create a process with the given limits and creation policy
    ///
    /// # Returns
    ///
    /// The error from [`IpcConfig::validate`] if the limits are unusable
    pub fn with_policy(
        name: &str,
        config: IpcConfig,
        policy: Arc<dyn PolicyHook>,
    ) -> Result<Self> {
        config.validate().map_err(|err| {
            crate::log_warn!("process {}: rejected limits {:?}: {:?}", name, config, err);
            err
        })?;
        Ok(Self::build(name, config, policy))
    }

    fn build(name: &str, config: IpcConfig, policy: Arc<dyn PolicyHook>) -> Self {
        let koid = alloc_koid();
        crate::log_debug!("process {} ({}) created", koid, name);
        Self {
            koid,
            name: String::from(name),
            handles: HandleTable::new(config.max_handles),
            config,
            policy,
        }
    }

    /// Process koid
    pub fn koid(&self) -> Koid {
        self.koid
    }

    /// Process name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle table
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// IPC limits
    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    /// Ask the policy whether `condition` is allowed
    pub fn enforce_basic_policy(&self, condition: PolicyCondition) -> Result {
        self.policy.enforce_basic_policy(condition)
    }

    /// Close every handle the process holds
    ///
    /// # Returns
    ///
    /// Number of handles closed
    pub fn teardown(&self) -> usize {
        let closed = self.handles.clear();
        crate::log_debug!(
            "process {} ({}) teardown: closed {} handles",
            self.koid,
            self.name,
            closed
        );
        closed
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("koid", &self.koid)
            .field("name", &self.name)
            .field("handles", &self.handles.count())
            .finish()
    }
}
