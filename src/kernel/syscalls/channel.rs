// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Channel System Calls
//!
//! This module implements the Channel system calls for IPC.
//! Channels provide bidirectional message passing between processes.
//!
//! # Syscalls Implemented
//!
//! - `sys_channel_create` - Create a channel pair
//! - `sys_channel_write` - Write to a channel
//! - `sys_channel_read` - Read from a channel
//! - `sys_channel_call` - Write a request and wait for its reply
//! - `sys_channel_call_finish` - Resume an interrupted call
//!
//! # Design
//!
//! - Messages contain both data bytes and handles
//! - Handles leave the writer's table atomically; a failed write puts them
//!   back under their original values
//! - Room for a message's handles is reserved in the reader's table before
//!   the message leaves the queue, so a receive never loses a message
//! - Bytes are copied out before handles are installed in the reader's
//!   table, and every received handle gets a fresh value

use super::CHANNEL_READ_MAY_DISCARD;
use crate::kernel::counters::{counter_inc, record_message_written, Counter};
use crate::kernel::object::channel::CallCheckpoint;
use crate::kernel::object::{
    ChannelEndpoint, Handle, HandleReservation, KernelObject, Message, MessageSize, ObjectType,
    Rights, TransferBatch,
};
use crate::kernel::policy::PolicyCondition;
use crate::kernel::process::Process;
use crate::kernel::thread::Thread;
use crate::rustux::errors::{Error, Result, Status, RX_OK};
use crate::rustux::types::{Deadline, HandleValue, TXID_SIZE};
use alloc::sync::Arc;
use alloc::vec;

// Import logging macros
use crate::{log_debug, log_trace};

/// Buffers of a channel call
pub struct ChannelCallArgs<'a> {
    /// Request payload; starts with the transaction id
    pub wr_bytes: &'a [u8],
    /// Handles to send with the request
    pub wr_handles: &'a [HandleValue],
    /// Reply payload buffer
    pub rd_bytes: &'a mut [u8],
    /// Reply handle buffer
    pub rd_handles: &'a mut [HandleValue],
}

/// Resolve a channel endpoint handle
fn lookup_channel(
    process: &Process,
    handle_value: HandleValue,
    rights: Rights,
) -> Result<Arc<ChannelEndpoint>> {
    process.handles().with_handle(handle_value, |handle| {
        let endpoint = handle.object().clone().into_channel()?;
        handle.require(rights)?;
        Ok(endpoint)
    })
}

/// Take `handle_values` out of the caller's table and build the message
///
/// The writing endpoint and its peer may not travel through the channel.
fn build_message(
    process: &Process,
    endpoint: &ChannelEndpoint,
    bytes: &[u8],
    handle_values: &[HandleValue],
) -> Result<(Message, TransferBatch)> {
    endpoint.check_message(bytes.len(), handle_values.len())?;

    let own = endpoint.koid();
    let peer = endpoint.peer_koid();
    let mut batch = process.handles().remove_for_transfer(handle_values, |handle| {
        let koid = handle.koid();
        if koid == own || koid == peer {
            Err(Error::NotSupported)
        } else {
            Ok(())
        }
    })?;

    let msg = Message::new(bytes.to_vec(), batch.take_handles());
    Ok((msg, batch))
}

/// Copy a received message into the caller's buffers
///
/// The caller has checked that the buffers are large enough and reserved
/// table room for every handle, so this cannot fail.
fn copy_out(
    msg: Message,
    reservation: HandleReservation<'_>,
    bytes: &mut [u8],
    handle_values: &mut [HandleValue],
) {
    let (data, handles) = msg.into_parts();
    bytes[..data.len()].copy_from_slice(&data);

    let values = reservation.install(handles);
    handle_values[..values.len()].copy_from_slice(&values);
    counter_inc(Counter::MessagesRead);
}

/// Reserve room for a call reply
///
/// A reply cannot carry more handles than the buffer holds or the channel
/// allows, so that many values are set aside before waiting.
fn reserve_reply<'a>(
    process: &'a Process,
    endpoint: &ChannelEndpoint,
    rd_handles: &[HandleValue],
) -> Result<HandleReservation<'a>> {
    let count = rd_handles.len().min(endpoint.config().max_message_handles);
    process.handles().reserve(count)
}

/// Create a channel
///
/// # Arguments
///
/// * `options` - Must be zero
///
/// # Returns
///
/// Handles to both endpoints, each with [`Rights::CHANNEL_DEFAULT`]
pub fn sys_channel_create(process: &Process, options: u32) -> Result<(HandleValue, HandleValue)> {
    log_debug!("sys_channel_create: options={:#x}", options);

    if options != 0 {
        return Err(Error::InvalidArgs);
    }
    process.enforce_basic_policy(PolicyCondition::NewChannel)?;

    let (endpoint0, endpoint1) = ChannelEndpoint::create_pair(process.config());
    let rights = ObjectType::Channel.default_rights();
    let values = process.handles().add_many(vec![
        Handle::new(KernelObject::Channel(endpoint0), rights),
        Handle::new(KernelObject::Channel(endpoint1), rights),
    ])?;
    counter_inc(Counter::ChannelsCreated);

    log_debug!("sys_channel_create: handles={:#x},{:#x}", values[0], values[1]);
    Ok((values[0], values[1]))
}

/// Write a message to a channel
///
/// # Arguments
///
/// * `handle_value` - Endpoint to write through; needs [`Rights::WRITE`]
/// * `options` - Must be zero
/// * `bytes` - Payload
/// * `handle_values` - Handles to move into the message; each needs
///   [`Rights::TRANSFER`]
///
/// # Returns
///
/// - `Err(Error::InvalidArgs)` for an oversized message or a repeated handle
/// - `Err(Error::NotSupported)` if the channel's own endpoints are embedded
/// - `Err(Error::PeerClosed)` if the other endpoint is gone
/// - `Err(Error::ShouldWait)` if the peer's queue is full
///
/// On any failure the caller's handle table is left unchanged.
pub fn sys_channel_write(
    process: &Process,
    handle_value: HandleValue,
    options: u32,
    bytes: &[u8],
    handle_values: &[HandleValue],
) -> Result {
    log_debug!(
        "sys_channel_write: handle={:#x} bytes={} handles={}",
        handle_value,
        bytes.len(),
        handle_values.len()
    );

    if options != 0 {
        return Err(Error::InvalidArgs);
    }

    let endpoint = lookup_channel(process, handle_value, Rights::WRITE)?;
    let (msg, batch) = build_message(process, &endpoint, bytes, handle_values)?;

    match endpoint.write(msg) {
        Ok(()) => {
            batch.commit();
            record_message_written(bytes.len(), handle_values.len());
            Ok(())
        }
        Err((err, mut msg)) => {
            process.handles().restore(batch, msg.take_handles());
            log_debug!("sys_channel_write: {:?}", err);
            Err(err)
        }
    }
}

/// Read a message from a channel
///
/// # Arguments
///
/// * `handle_value` - Endpoint to read from; needs [`Rights::READ`]
/// * `options` - Zero or [`CHANNEL_READ_MAY_DISCARD`]
/// * `bytes` - Payload buffer
/// * `handle_values` - Buffer for the received handle values
/// * `actual_bytes` / `actual_handles` - Size of the message, also set when
///   the buffers are too small
///
/// # Returns
///
/// - `Err(Error::ShouldWait)` if nothing is queued
/// - `Err(Error::PeerClosed)` if nothing is queued and the peer is gone
/// - `Err(Error::BufferTooSmall)` if the head message does not fit
/// - `Err(Error::NoMemory)` if the caller's table has no room for the head
///   message's handles; the message stays queued
pub fn sys_channel_read(
    process: &Process,
    handle_value: HandleValue,
    options: u32,
    bytes: &mut [u8],
    handle_values: &mut [HandleValue],
    actual_bytes: &mut usize,
    actual_handles: &mut usize,
) -> Result {
    log_debug!(
        "sys_channel_read: handle={:#x} options={:#x} bytes={} handles={}",
        handle_value,
        options,
        bytes.len(),
        handle_values.len()
    );

    if options & !CHANNEL_READ_MAY_DISCARD != 0 {
        return Err(Error::InvalidArgs);
    }
    let may_discard = options & CHANNEL_READ_MAY_DISCARD != 0;

    let endpoint = lookup_channel(process, handle_value, Rights::READ)?;

    // Reserve for the head's handles, then take it. A racing reader may
    // swap the head between the two, so retry with the new head's count.
    let mut size = MessageSize::default();
    let mut room = 0;
    let received = loop {
        let reservation = match process.handles().reserve(room) {
            Ok(reservation) => reservation,
            Err(err) => break Err(err),
        };
        let result = endpoint.read(
            bytes.len(),
            handle_values.len(),
            reservation.len(),
            may_discard,
            &mut size,
        );
        match result {
            Ok(msg) => break Ok((msg, reservation)),
            Err(Error::NoMemory) => room = size.handles,
            Err(err) => break Err(err),
        }
    };
    *actual_bytes = size.bytes;
    *actual_handles = size.handles;

    let (msg, reservation) = received.map_err(|err| {
        log_trace!("sys_channel_read: {:?}", err);
        err
    })?;
    copy_out(msg, reservation, bytes, handle_values);
    Ok(())
}

/// Wait for the reply of an outstanding call and copy it out
#[allow(clippy::too_many_arguments)]
fn finish_call(
    thread: &Thread,
    checkpoint: CallCheckpoint,
    reservation: HandleReservation<'_>,
    rd_bytes: &mut [u8],
    rd_handles: &mut [HandleValue],
    actual_bytes: &mut usize,
    actual_handles: &mut usize,
    read_status: &mut Status,
) -> Result {
    let reply = match checkpoint.wait(Some(thread)) {
        Ok(reply) => reply,
        Err(Error::InternalIntrRetry) => {
            log_debug!("channel call: txid={:#x} interrupted", checkpoint.txid());
            thread.save_call_checkpoint(checkpoint);
            return Err(Error::InternalIntrRetry);
        }
        Err(err) => {
            log_debug!("channel call: txid={:#x} failed: {:?}", checkpoint.txid(), err);
            *read_status = err.into_status();
            return Err(Error::CallFailed);
        }
    };
    drop(checkpoint);

    let size = reply.size();
    *actual_bytes = size.bytes;
    *actual_handles = size.handles;
    if size.bytes > rd_bytes.len() || size.handles > rd_handles.len() {
        *read_status = Error::BufferTooSmall.into_status();
        return Err(Error::CallFailed);
    }
    if size.handles > reservation.len() {
        *read_status = Error::NoMemory.into_status();
        return Err(Error::CallFailed);
    }

    copy_out(reply, reservation, rd_bytes, rd_handles);
    Ok(())
}

/// Write a request and wait for the reply with the same transaction id
///
/// # Arguments
///
/// * `handle_value` - Endpoint; needs [`Rights::READ`] and [`Rights::WRITE`]
/// * `options` - Must be zero
/// * `deadline` - Absolute deadline for the reply
/// * `args` - Request and reply buffers
/// * `read_status` - Underlying failure when the result is `CallFailed`
///
/// # Returns
///
/// - write-phase failures as `sys_channel_write` reports them
/// - `Err(Error::NoMemory)` if the caller's table has no room for a reply
///   filling `rd_handles`; nothing is sent
/// - `Err(Error::CallFailed)` if the reply could not be received
/// - `Err(Error::InternalIntrRetry)` if the thread was interrupted; resume
///   with [`sys_channel_call_finish`]
#[allow(clippy::too_many_arguments)]
pub fn sys_channel_call(
    process: &Process,
    thread: &Thread,
    handle_value: HandleValue,
    options: u32,
    deadline: Deadline,
    args: &mut ChannelCallArgs<'_>,
    actual_bytes: &mut usize,
    actual_handles: &mut usize,
    read_status: &mut Status,
) -> Result {
    log_debug!(
        "sys_channel_call: handle={:#x} bytes={} handles={} deadline={}",
        handle_value,
        args.wr_bytes.len(),
        args.wr_handles.len(),
        deadline
    );

    *read_status = RX_OK;
    if options != 0 || args.wr_bytes.len() < TXID_SIZE {
        return Err(Error::InvalidArgs);
    }

    let endpoint = lookup_channel(process, handle_value, Rights::READ | Rights::WRITE)?;
    let reservation = reserve_reply(process, &endpoint, args.rd_handles)?;
    let (msg, batch) = build_message(process, &endpoint, args.wr_bytes, args.wr_handles)?;

    if let Some(abandoned) = thread.take_call_checkpoint() {
        log_debug!(
            "sys_channel_call: abandoning interrupted call txid={:#x}",
            abandoned.txid()
        );
    }

    let checkpoint = match endpoint.begin_call(msg, deadline) {
        Ok(checkpoint) => {
            batch.commit();
            record_message_written(args.wr_bytes.len(), args.wr_handles.len());
            counter_inc(Counter::Calls);
            checkpoint
        }
        Err((err, mut msg)) => {
            process.handles().restore(batch, msg.take_handles());
            log_debug!("sys_channel_call: write failed: {:?}", err);
            return Err(err);
        }
    };

    finish_call(
        thread,
        checkpoint,
        reservation,
        args.rd_bytes,
        args.rd_handles,
        actual_bytes,
        actual_handles,
        read_status,
    )
}

/// Resume a call interrupted with `InternalIntrRetry`
///
/// # Arguments
///
/// * `deadline` - New deadline for the reply
/// * `rd_bytes` / `rd_handles` - Reply buffers
///
/// # Returns
///
/// - `Err(Error::BadState)` if the thread has no interrupted call
/// - `Err(Error::NoMemory)` if the caller's table has no room for a reply
///   filling `rd_handles`; the call stays resumable
/// - otherwise as [`sys_channel_call`]'s read phase
#[allow(clippy::too_many_arguments)]
pub fn sys_channel_call_finish(
    process: &Process,
    thread: &Thread,
    deadline: Deadline,
    rd_bytes: &mut [u8],
    rd_handles: &mut [HandleValue],
    actual_bytes: &mut usize,
    actual_handles: &mut usize,
    read_status: &mut Status,
) -> Result {
    log_debug!("sys_channel_call_finish: tid={} deadline={}", thread.tid(), deadline);

    *read_status = RX_OK;
    let mut checkpoint = thread.take_call_checkpoint().ok_or(Error::BadState)?;
    let reservation = match reserve_reply(process, checkpoint.endpoint(), rd_handles) {
        Ok(reservation) => reservation,
        Err(err) => {
            thread.save_call_checkpoint(checkpoint);
            return Err(err);
        }
    };
    checkpoint.set_deadline(deadline);

    finish_call(
        thread,
        checkpoint,
        reservation,
        rd_bytes,
        rd_handles,
        actual_bytes,
        actual_handles,
        read_status,
    )
}
