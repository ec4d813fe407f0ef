// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Object Information
//!
//! # Syscalls Implemented
//!
//! - `sys_object_get_info_handle_basic` - Koid, rights and type of a handle

use crate::kernel::object::{ObjectType, Rights};
use crate::kernel::process::Process;
use crate::rustux::errors::Result;
use crate::rustux::types::{HandleValue, Koid};

// Import logging macros
use crate::log_debug;

/// Basic information about a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleBasicInfo {
    /// Koid of the referenced object
    pub koid: Koid,
    /// Rights carried by the handle
    pub rights: Rights,
    /// Object type
    pub obj_type: ObjectType,
    /// Koid of the related object, or `KOID_INVALID`
    pub related_koid: Koid,
}

/// Get basic information about a handle
///
/// Needs no rights on the handle.
pub fn sys_object_get_info_handle_basic(
    process: &Process,
    handle_value: HandleValue,
) -> Result<HandleBasicInfo> {
    log_debug!("sys_object_get_info_handle_basic: handle={:#x}", handle_value);

    process.handles().with_handle(handle_value, |handle| {
        let object = handle.object();
        Ok(HandleBasicInfo {
            koid: object.koid(),
            rights: handle.rights(),
            obj_type: object.obj_type(),
            related_koid: object.related_koid(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::syscalls::channel::sys_channel_create;
    use crate::kernel::syscalls::port::sys_port_create;
    use crate::rustux::errors::Error;
    use crate::rustux::types::KOID_INVALID;

    #[test]
    fn test_channel_info() {
        let process = Process::new("test");
        let (a, b) = sys_channel_create(&process, 0).unwrap();
        let info_a = sys_object_get_info_handle_basic(&process, a).unwrap();
        let info_b = sys_object_get_info_handle_basic(&process, b).unwrap();

        assert_eq!(info_a.obj_type, ObjectType::Channel);
        assert_eq!(info_a.rights, Rights::CHANNEL_DEFAULT);
        assert_eq!(info_a.related_koid, info_b.koid);
        assert_eq!(info_b.related_koid, info_a.koid);
    }

    #[test]
    fn test_port_info() {
        let process = Process::new("test");
        let port = sys_port_create(&process, 0).unwrap();
        let info = sys_object_get_info_handle_basic(&process, port).unwrap();
        assert_eq!(info.obj_type, ObjectType::Port);
        assert_eq!(info.related_koid, KOID_INVALID);
    }

    #[test]
    fn test_bad_handle() {
        let process = Process::new("test");
        assert_eq!(sys_object_get_info_handle_basic(&process, 0x1234), Err(Error::BadHandle));
    }
}
