// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Event System Calls
//!
//! # Syscalls Implemented
//!
//! - `sys_event_create` - Create an event
//! - `sys_object_signal` - Clear and set user signals on an object

use crate::kernel::counters::{counter_inc, Counter};
use crate::kernel::object::{EventObject, KernelObject, ObjectType, Rights, Signals};
use crate::kernel::policy::PolicyCondition;
use crate::kernel::process::Process;
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::HandleValue;

// Import logging macros
use crate::log_debug;

/// Create an event
///
/// # Arguments
///
/// * `options` - Must be zero
///
/// # Returns
///
/// Handle to the new event with [`Rights::EVENT_DEFAULT`]
pub fn sys_event_create(process: &Process, options: u32) -> Result<HandleValue> {
    log_debug!("sys_event_create: options={:#x}", options);

    if options != 0 {
        return Err(Error::InvalidArgs);
    }
    process.enforce_basic_policy(PolicyCondition::NewEvent)?;

    let event = KernelObject::Event(EventObject::new());
    let value = process
        .handles()
        .make(event, ObjectType::Event.default_rights())?;
    counter_inc(Counter::EventsCreated);

    log_debug!("sys_event_create: handle={:#x}", value);
    Ok(value)
}

/// Clear then set signals on an object
///
/// Events accept `SIGNALED` and the user signals; channel endpoints accept
/// the user signals only.
///
/// # Arguments
///
/// * `handle_value` - Target; needs [`Rights::SIGNAL`]
/// * `clear_mask` - Signals to clear
/// * `set_mask` - Signals to set
///
/// # Returns
///
/// - `Err(Error::InvalidArgs)` if a mask holds a signal the object does not
///   let userspace drive
/// - `Err(Error::NotSupported)` for objects without user signals
pub fn sys_object_signal(
    process: &Process,
    handle_value: HandleValue,
    clear_mask: Signals,
    set_mask: Signals,
) -> Result {
    log_debug!(
        "sys_object_signal: handle={:#x} clear={:#x} set={:#x}",
        handle_value,
        clear_mask.bits(),
        set_mask.bits()
    );

    let object = process.handles().get_with_rights(handle_value, Rights::SIGNAL)?;
    object.user_signal(clear_mask, set_mask)
}
