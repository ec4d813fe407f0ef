// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Port System Calls
//!
//! This module implements the port-related system calls for inter-process
//! communication via packet queues.
//!
//! # Syscalls Implemented
//!
//! - `sys_port_create` - Create a new port
//! - `sys_port_queue` - Queue a user packet to a port
//! - `sys_port_wait` - Wait for a packet from a port
//! - `sys_port_cancel` - Cancel a `wait_async` registration
//!
//! # Design
//!
//! - Ports are packet queues for IPC
//! - Asynchronous signal notification through `sys_object_wait_async`
//! - Deadline-based waiting
//! - Key-based cancellation

use crate::kernel::counters::{counter_inc, Counter};
use crate::kernel::object::{KernelObject, ObjectType, Port, PortPacket, Rights};
use crate::kernel::policy::PolicyCondition;
use crate::kernel::process::Process;
use crate::kernel::thread::Thread;
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::{Deadline, HandleValue};
use alloc::sync::Arc;

// Import logging macros
use crate::{log_debug, log_trace};

/// Resolve a port handle
pub(super) fn lookup_port(
    process: &Process,
    handle_value: HandleValue,
    rights: Rights,
) -> Result<Arc<Port>> {
    process.handles().with_handle(handle_value, |handle| {
        let port = handle.object().clone().into_port()?;
        handle.require(rights)?;
        Ok(port)
    })
}

/// Create a port
///
/// # Arguments
///
/// * `options` - Must be zero
///
/// # Returns
///
/// Handle to the new port with [`Rights::PORT_DEFAULT`]
pub fn sys_port_create(process: &Process, options: u32) -> Result<HandleValue> {
    log_debug!("sys_port_create: options={:#x}", options);

    if options != 0 {
        return Err(Error::InvalidArgs);
    }
    process.enforce_basic_policy(PolicyCondition::NewPort)?;

    let port = Port::new(process.config().max_port_packets);
    let value = process
        .handles()
        .make(KernelObject::Port(port), ObjectType::Port.default_rights())?;
    counter_inc(Counter::PortsCreated);

    log_debug!("sys_port_create: handle={:#x}", value);
    Ok(value)
}

/// Queue a user packet
///
/// # Arguments
///
/// * `handle_value` - Port; needs [`Rights::WRITE`]
/// * `packet` - A user packet
///
/// # Returns
///
/// - `Err(Error::InvalidArgs)` for a signal packet
/// - `Err(Error::ShouldWait)` if the port's user packet limit is reached
pub fn sys_port_queue(process: &Process, handle_value: HandleValue, packet: &PortPacket) -> Result {
    log_debug!("sys_port_queue: handle={:#x} key={:#x}", handle_value, packet.key);

    let port = lookup_port(process, handle_value, Rights::WRITE)?;
    port.queue_user(*packet)?;
    counter_inc(Counter::PacketsQueued);
    Ok(())
}

/// Wait for a packet
///
/// # Arguments
///
/// * `handle_value` - Port; needs [`Rights::READ`]
/// * `deadline` - Absolute deadline; a past deadline polls
///
/// # Returns
///
/// - The head packet
/// - `Err(Error::TimedOut)` if the deadline passed with the port empty
/// - `Err(Error::InternalIntrRetry)` if the thread was interrupted
pub fn sys_port_wait(
    process: &Process,
    thread: &Thread,
    handle_value: HandleValue,
    deadline: Deadline,
) -> Result<PortPacket> {
    log_debug!("sys_port_wait: handle={:#x} deadline={}", handle_value, deadline);

    let port = lookup_port(process, handle_value, Rights::READ)?;
    let packet = port.dequeue(Some(thread), deadline).map_err(|err| {
        log_trace!("sys_port_wait: {:?}", err);
        err
    })?;

    log_trace!("sys_port_wait: key={:#x} type={:?}", packet.key, packet.packet_type());
    Ok(packet)
}

/// Cancel the `wait_async` registration made through `source_value` with
/// `key`
///
/// Removes the observer and any of its packets not yet dequeued.
///
/// # Arguments
///
/// * `handle_value` - Port; needs [`Rights::WRITE`]
/// * `source_value` - Handle the wait was registered through
/// * `key` - Key of the registration
///
/// # Returns
///
/// `Err(Error::NotFound)` if nothing matched, including a second cancel
pub fn sys_port_cancel(
    process: &Process,
    handle_value: HandleValue,
    source_value: HandleValue,
    key: u64,
) -> Result {
    log_debug!(
        "sys_port_cancel: handle={:#x} source={:#x} key={:#x}",
        handle_value,
        source_value,
        key
    );

    let port = lookup_port(process, handle_value, Rights::WRITE)?;
    let (source, handle_id) = process
        .handles()
        .with_handle(source_value, |handle| Ok((handle.object().clone(), handle.id())))?;

    if port.cancel(&source, handle_id, key) {
        Ok(())
    } else {
        Err(Error::NotFound)
    }
}
