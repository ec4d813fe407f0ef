// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Handle Operations
//!
//! This module implements handle-related system calls.
//!
//! # Syscalls Implemented
//!
//! - `sys_handle_close` - Close a single handle
//! - `sys_handle_close_many` - Close multiple handles
//! - `sys_handle_duplicate` - Duplicate a handle
//! - `sys_handle_replace` - Replace a handle

use crate::kernel::object::Rights;
use crate::kernel::process::Process;
use crate::rustux::errors::Result;
use crate::rustux::types::HandleValue;

// Import logging macros
use crate::log_debug;

/// Close a single handle
///
/// Closing the "never a handle" invalid handle is not an error.
/// It's like free(NULL).
///
/// # Arguments
///
/// * `process` - Calling process
/// * `handle_value` - Handle to close
///
/// # Returns
///
/// `Err(Error::BadHandle)` if the value is not live in the caller's table
pub fn sys_handle_close(process: &Process, handle_value: HandleValue) -> Result {
    log_debug!("sys_handle_close: handle={:#x}", handle_value);

    process.handles().close(handle_value).map_err(|err| {
        log_debug!("sys_handle_close: {:?}", err);
        err
    })
}

/// Close multiple handles
///
/// Every valid handle is closed even if some values are bad.
///
/// # Returns
///
/// `Err(Error::BadHandle)` if any value was not live
pub fn sys_handle_close_many(process: &Process, handle_values: &[HandleValue]) -> Result {
    log_debug!("sys_handle_close_many: count={}", handle_values.len());

    process.handles().close_many(handle_values).map_err(|err| {
        log_debug!("sys_handle_close_many: {:?}", err);
        err
    })
}

/// Duplicate a handle
///
/// # Arguments
///
/// * `handle_value` - Source handle; needs [`Rights::DUPLICATE`]
/// * `rights` - Subset of the source rights, or [`Rights::SAME_RIGHTS`]
///
/// # Returns
///
/// The new handle value
pub fn sys_handle_duplicate(
    process: &Process,
    handle_value: HandleValue,
    rights: Rights,
) -> Result<HandleValue> {
    log_debug!(
        "sys_handle_duplicate: handle={:#x} rights={:#x}",
        handle_value,
        rights.bits()
    );

    let new_value = process.handles().duplicate(handle_value, rights).map_err(|err| {
        log_debug!("sys_handle_duplicate: {:?}", err);
        err
    })?;

    log_debug!("sys_handle_duplicate: success new_handle={:#x}", new_value);
    Ok(new_value)
}

/// Replace a handle
///
/// The source handle is invalidated on success; no rights are needed on
/// it.
///
/// # Returns
///
/// The new handle value
pub fn sys_handle_replace(
    process: &Process,
    handle_value: HandleValue,
    rights: Rights,
) -> Result<HandleValue> {
    log_debug!(
        "sys_handle_replace: handle={:#x} rights={:#x}",
        handle_value,
        rights.bits()
    );

    let new_value = process.handles().replace(handle_value, rights).map_err(|err| {
        log_debug!("sys_handle_replace: {:?}", err);
        err
    })?;

    log_debug!("sys_handle_replace: success new_handle={:#x}", new_value);
    Ok(new_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::syscalls::event::sys_event_create;
    use crate::rustux::errors::Error;
    use crate::rustux::types::HANDLE_INVALID;

    #[test]
    fn test_close() {
        let process = Process::new("test");
        let event = sys_event_create(&process, 0).unwrap();
        assert_eq!(sys_handle_close(&process, event), Ok(()));
        assert_eq!(sys_handle_close(&process, event), Err(Error::BadHandle));
        assert_eq!(sys_handle_close(&process, HANDLE_INVALID), Ok(()));
    }

    #[test]
    fn test_close_many_closes_valid_entries() {
        let process = Process::new("test");
        let a = sys_event_create(&process, 0).unwrap();
        let b = sys_event_create(&process, 0).unwrap();
        assert_eq!(sys_handle_close_many(&process, &[a, HANDLE_INVALID, b]), Ok(()));
        assert_eq!(process.handles().count(), 0);

        let c = sys_event_create(&process, 0).unwrap();
        assert_eq!(sys_handle_close_many(&process, &[a, c]), Err(Error::BadHandle));
        assert_eq!(process.handles().count(), 0);
    }

    #[test]
    fn test_duplicate_and_replace_never_widen() {
        let process = Process::new("test");
        let event = sys_event_create(&process, 0).unwrap();

        let reduced =
            sys_handle_duplicate(&process, event, Rights::WAIT | Rights::DUPLICATE).unwrap();
        assert_eq!(process.handles().rights(reduced), Ok(Rights::WAIT | Rights::DUPLICATE));
        assert_eq!(
            sys_handle_duplicate(&process, reduced, Rights::SIGNAL),
            Err(Error::InvalidArgs)
        );

        let replaced = sys_handle_replace(&process, reduced, Rights::WAIT).unwrap();
        assert!(!process.handles().contains(reduced));
        assert_eq!(process.handles().rights(replaced), Ok(Rights::WAIT));
    }
}
