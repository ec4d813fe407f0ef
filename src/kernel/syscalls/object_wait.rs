// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Object Wait System Calls
//!
//! This module implements the wait-related system calls for kernel objects.
//! These syscalls allow threads to wait for signals on kernel objects.
//!
//! # Syscalls Implemented
//!
//! - `sys_object_wait_one` - Wait on a single object
//! - `sys_object_wait_many` - Wait on multiple objects
//! - `sys_object_wait_async` - Async wait with port notification
//!
//! # Design
//!
//! - Synchronous waits register a sync observer bound to the handle they
//!   were issued through, block on a private event, and unregister before
//!   returning
//! - Observers are registered while the handle table's lock pins the
//!   handles, so a concurrent close always sees them and folds
//!   `HANDLE_CLOSED` into the observed state
//! - Asynchronous waits queue packets on a port until canceled

use super::port::lookup_port;
use crate::kernel::counters::{counter_inc, Counter};
use crate::kernel::object::observer::WaitObserver;
use crate::kernel::object::{Handle, KernelObject, Rights, Signals, WaitAsyncOptions};
use crate::kernel::process::Process;
use crate::kernel::sync::{Event, EventFlags};
use crate::kernel::thread::Thread;
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::{Deadline, HandleValue};
use alloc::sync::Arc;
use alloc::vec::Vec;

// Import logging macros
use crate::{log_debug, log_trace};

/// ============================================================================
/// Wait Item Structure
/// ============================================================================

/// Wait item for wait_many syscall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitItem {
    /// Handle to wait on
    pub handle: HandleValue,

    /// Signals to wait for
    pub waitfor: Signals,

    /// Pending signals (output)
    pub pending: Signals,
}

impl WaitItem {
    /// Wait item for `handle` and `waitfor`
    pub const fn new(handle: HandleValue, waitfor: Signals) -> Self {
        Self {
            handle,
            waitfor,
            pending: Signals::empty(),
        }
    }
}

/// A sync observer registered on an object
struct Registration {
    object: KernelObject,
    observer: Arc<WaitObserver>,
}

impl Registration {
    /// Register on the object behind `handle`; called under the table lock
    fn attach(handle: &Handle, signals: Signals, event: &Arc<Event>) -> Result<Self> {
        handle.require(Rights::WAIT)?;
        let object = handle.object().clone();
        if !object.is_waitable() {
            return Err(Error::NotSupported);
        }

        let observer = WaitObserver::sync(handle.id(), signals, event.clone());
        object.base().add_observer(observer.clone());
        Ok(Self { object, observer })
    }

    /// Unregister and report the last observed state
    fn detach(self) -> Signals {
        self.object.base().remove_observer(&self.observer);
        self.observer.observed()
    }
}

/// ============================================================================
/// Syscall: Object Wait One
/// ============================================================================

/// Wait for signals on one object
///
/// # Arguments
///
/// * `handle_value` - Object to wait on; needs [`Rights::WAIT`]
/// * `signals` - Signals of interest
/// * `deadline` - Absolute deadline; a past deadline polls
/// * `observed` - Signal state when the wait ended
///
/// # Returns
///
/// - `Ok(())` once any signal in `signals` is asserted
/// - `Err(Error::TimedOut)` if the deadline passed first
/// - `Err(Error::Canceled)` if the handle was closed during the wait
/// - `Err(Error::InternalIntrRetry)` if the thread was interrupted
pub fn sys_object_wait_one(
    process: &Process,
    thread: &Thread,
    handle_value: HandleValue,
    signals: Signals,
    deadline: Deadline,
    observed: &mut Signals,
) -> Result {
    log_debug!(
        "sys_object_wait_one: handle={:#x} signals={:#x} deadline={}",
        handle_value,
        signals.bits(),
        deadline
    );
    counter_inc(Counter::WaitOne);

    let event = Arc::new(Event::new(false, EventFlags::empty()));
    let registration = process
        .handles()
        .with_handle(handle_value, |handle| Registration::attach(handle, signals, &event))?;

    let result = event.wait(Some(thread), deadline);
    *observed = registration.detach();

    if observed.contains(Signals::HANDLE_CLOSED) {
        log_debug!("sys_object_wait_one: handle={:#x} closed", handle_value);
        return Err(Error::Canceled);
    }

    log_trace!("sys_object_wait_one: {:?} observed={:#x}", result, observed.bits());
    result
}

/// ============================================================================
/// Syscall: Object Wait Many
/// ============================================================================

/// Wait for signals on several objects
///
/// All items are registered under one table lock scope; if any fails,
/// those already registered are removed before the error is returned.
/// When the wait ends, every item's `pending` is updated.
///
/// # Arguments
///
/// * `items` - At most `max_wait_many_items` entries; may be empty, in
///   which case the call sleeps until `deadline`
/// * `deadline` - Absolute deadline; a past deadline polls
///
/// # Returns
///
/// - `Err(Error::OutOfRange)` for too many items
/// - `Err(Error::Canceled)` if any handle was closed during the wait
/// - otherwise as [`sys_object_wait_one`]
pub fn sys_object_wait_many(
    process: &Process,
    thread: &Thread,
    items: &mut [WaitItem],
    deadline: Deadline,
) -> Result {
    log_debug!("sys_object_wait_many: count={} deadline={}", items.len(), deadline);
    counter_inc(Counter::WaitMany);

    if items.len() > process.config().max_wait_many_items {
        return Err(Error::OutOfRange);
    }

    let event = Arc::new(Event::new(false, EventFlags::empty()));
    if items.is_empty() {
        return match event.wait(Some(thread), deadline) {
            Ok(()) => Err(Error::TimedOut),
            Err(err) => Err(err),
        };
    }

    let values: Vec<HandleValue> = items.iter().map(|item| item.handle).collect();
    let registrations = process.handles().with_handles(&values, |handles| {
        let mut registrations = Vec::with_capacity(handles.len());
        for (handle, item) in handles.iter().zip(items.iter()) {
            match Registration::attach(handle, item.waitfor, &event) {
                Ok(registration) => registrations.push(registration),
                Err(err) => {
                    for registration in registrations {
                        registration.detach();
                    }
                    return Err(err);
                }
            }
        }
        Ok(registrations)
    })?;

    let result = event.wait(Some(thread), deadline);

    let mut canceled = false;
    for (item, registration) in items.iter_mut().zip(registrations) {
        item.pending = registration.detach();
        canceled |= item.pending.contains(Signals::HANDLE_CLOSED);
    }

    if canceled {
        log_debug!("sys_object_wait_many: a handle was closed");
        return Err(Error::Canceled);
    }
    result
}

/// ============================================================================
/// Syscall: Object Wait Async
/// ============================================================================

/// Queue a signal packet on a port whenever the object asserts `signals`
///
/// # Arguments
///
/// * `handle_value` - Object to observe; needs [`Rights::WAIT`]
/// * `port_value` - Port to deliver to; needs [`Rights::WRITE`]
/// * `key` - Key carried by every packet
/// * `signals` - Signals of interest
/// * `options` - [`WaitAsyncOptions`]
///
/// # Returns
///
/// - `Ok(())` once registered; a packet is queued right away if the object
///   already asserts a signal of interest
/// - `Err(Error::NotSupported)` if the object is not waitable
pub fn sys_object_wait_async(
    process: &Process,
    handle_value: HandleValue,
    port_value: HandleValue,
    key: u64,
    signals: Signals,
    options: WaitAsyncOptions,
) -> Result {
    log_debug!(
        "sys_object_wait_async: handle={:#x} port={:#x} key={:#x} signals={:#x} options={:?}",
        handle_value,
        port_value,
        key,
        signals.bits(),
        options
    );

    let port = lookup_port(process, port_value, Rights::WRITE)?;

    let object = process.handles().with_handle(handle_value, |handle| {
        handle.require(Rights::WAIT)?;
        let object = handle.object().clone();
        if !object.is_waitable() {
            return Err(Error::NotSupported);
        }
        let observer = WaitObserver::port(handle.id(), signals, &port, key, options);
        object.base().add_observer(observer);
        Ok(object)
    })?;

    port.add_source(&object);
    counter_inc(Counter::WaitAsync);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::config::IpcConfig;
    use crate::kernel::object::port::PacketPayload;
    use crate::kernel::platform::{self, host};
    use crate::kernel::syscalls::channel::{sys_channel_create, sys_channel_write};
    use crate::kernel::syscalls::event::{sys_event_create, sys_object_signal};
    use crate::kernel::syscalls::handle_ops::{sys_handle_close, sys_handle_duplicate};
    use crate::kernel::syscalls::port::{sys_port_create, sys_port_wait};
    use crate::rustux::types::{deadline_after, DEADLINE_INFINITE, DEADLINE_PAST};

    fn observer_count(process: &Process, value: HandleValue) -> usize {
        process
            .handles()
            .get_with_rights(value, Rights::empty())
            .unwrap()
            .base()
            .observer_count()
    }

    #[test]
    fn test_wait_one_already_satisfied() {
        let process = Process::new("test");
        let thread = Thread::new();
        let (a, _b) = sys_channel_create(&process, 0).unwrap();

        let mut observed = Signals::empty();
        sys_object_wait_one(
            &process,
            &thread,
            a,
            Signals::WRITABLE,
            DEADLINE_PAST,
            &mut observed,
        )
        .unwrap();
        assert!(observed.contains(Signals::WRITABLE));
        assert_eq!(observer_count(&process, a), 0);
    }

    #[test]
    fn test_wait_one_times_out() {
        host::install();
        let process = Process::new("test");
        let thread = Thread::new();
        let event = sys_event_create(&process, 0).unwrap();

        let mut observed = Signals::all();
        let deadline = deadline_after(platform::current_time(), 1_000_000);
        assert_eq!(
            sys_object_wait_one(
                &process,
                &thread,
                event,
                Signals::SIGNALED,
                deadline,
                &mut observed,
            ),
            Err(Error::TimedOut)
        );
        assert_eq!(observed, Signals::empty());
        assert_eq!(observer_count(&process, event), 0);
    }

    #[test]
    fn test_wait_one_requires_wait_right() {
        let process = Process::new("test");
        let thread = Thread::new();
        let event = sys_event_create(&process, 0).unwrap();
        let no_wait = sys_handle_duplicate(&process, event, Rights::SIGNAL).unwrap();
        let port = sys_port_create(&process, 0).unwrap();

        let mut observed = Signals::empty();
        assert_eq!(
            sys_object_wait_one(
                &process,
                &thread,
                no_wait,
                Signals::SIGNALED,
                DEADLINE_PAST,
                &mut observed,
            ),
            Err(Error::AccessDenied)
        );
        assert_eq!(
            sys_object_wait_one(
                &process,
                &thread,
                port,
                Signals::SIGNALED,
                DEADLINE_PAST,
                &mut observed,
            ),
            Err(Error::AccessDenied)
        );
    }

    #[test]
    fn test_wait_one_wakes_on_signal() {
        host::install();
        let process = Process::new("test");
        let event = sys_event_create(&process, 0).unwrap();

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let thread = Thread::new();
                let mut observed = Signals::empty();
                let result = sys_object_wait_one(
                    &process,
                    &thread,
                    event,
                    Signals::SIGNALED,
                    DEADLINE_INFINITE,
                    &mut observed,
                );
                (result, observed)
            });

            while observer_count(&process, event) == 0 {
                std::thread::yield_now();
            }
            sys_object_signal(&process, event, Signals::empty(), Signals::SIGNALED).unwrap();

            let (result, observed) = waiter.join().unwrap();
            assert_eq!(result, Ok(()));
            assert!(observed.contains(Signals::SIGNALED));
        });
    }

    #[test]
    fn test_wait_many_too_many_items() {
        let process =
            Process::with_config("test", IpcConfig::new().with_max_wait_many_items(2)).unwrap();
        let thread = Thread::new();
        let event = sys_event_create(&process, 0).unwrap();
        let mut items = [WaitItem::new(event, Signals::SIGNALED); 3];
        assert_eq!(
            sys_object_wait_many(&process, &thread, &mut items, DEADLINE_PAST),
            Err(Error::OutOfRange)
        );
    }

    #[test]
    fn test_wait_many_empty_times_out() {
        let process = Process::new("test");
        let thread = Thread::new();
        assert_eq!(
            sys_object_wait_many(&process, &thread, &mut [], DEADLINE_PAST),
            Err(Error::TimedOut)
        );
    }

    #[test]
    fn test_wait_many_reports_every_item() {
        let process = Process::new("test");
        let thread = Thread::new();
        let (a, b) = sys_channel_create(&process, 0).unwrap();
        let event = sys_event_create(&process, 0).unwrap();
        sys_channel_write(&process, a, 0, &[1], &[]).unwrap();

        let mut items = [
            WaitItem::new(event, Signals::SIGNALED),
            WaitItem::new(b, Signals::READABLE),
            WaitItem::new(a, Signals::READABLE),
        ];
        sys_object_wait_many(&process, &thread, &mut items, DEADLINE_PAST).unwrap();
        assert_eq!(items[0].pending, Signals::empty());
        assert!(items[1].pending.contains(Signals::READABLE | Signals::WRITABLE));
        assert_eq!(items[2].pending, Signals::WRITABLE);
    }

    #[test]
    fn test_wait_many_unwinds_on_failure() {
        let process = Process::new("test");
        let thread = Thread::new();
        let events: Vec<HandleValue> =
            (0..5).map(|_| sys_event_create(&process, 0).unwrap()).collect();
        let no_wait = sys_handle_duplicate(&process, events[2], Rights::SIGNAL).unwrap();

        let mut items: Vec<WaitItem> =
            events.iter().map(|&e| WaitItem::new(e, Signals::SIGNALED)).collect();
        items[2].handle = no_wait;
        assert_eq!(
            sys_object_wait_many(&process, &thread, &mut items, DEADLINE_PAST),
            Err(Error::AccessDenied)
        );
        for &event in &events {
            assert_eq!(observer_count(&process, event), 0);
        }
    }

    #[test]
    fn test_wait_async_delivers_once_per_edge() {
        let process = Process::new("test");
        let thread = Thread::new();
        let port = sys_port_create(&process, 0).unwrap();
        let (a, b) = sys_channel_create(&process, 0).unwrap();

        sys_object_wait_async(
            &process,
            b,
            port,
            7,
            Signals::READABLE,
            WaitAsyncOptions::empty(),
        )
        .unwrap();
        sys_channel_write(&process, a, 0, &[1], &[]).unwrap();

        let packet = sys_port_wait(&process, &thread, port, DEADLINE_PAST).unwrap();
        assert_eq!(packet.key, 7);
        match packet.payload {
            PacketPayload::Signal { trigger, observed, count, .. } => {
                assert_eq!(trigger, Signals::READABLE);
                assert!(observed.contains(Signals::READABLE));
                assert_eq!(count, 1);
            }
            PacketPayload::User(_) => panic!("expected a signal packet"),
        }
        assert_eq!(
            sys_port_wait(&process, &thread, port, DEADLINE_PAST),
            Err(Error::TimedOut)
        );
    }

    #[test]
    fn test_wait_async_once() {
        let process = Process::new("test");
        let port = sys_port_create(&process, 0).unwrap();
        let event = sys_event_create(&process, 0).unwrap();

        sys_object_wait_async(
            &process,
            event,
            port,
            1,
            Signals::SIGNALED,
            WaitAsyncOptions::ONCE,
        )
        .unwrap();
        assert_eq!(observer_count(&process, event), 1);
        sys_object_signal(&process, event, Signals::empty(), Signals::SIGNALED).unwrap();
        assert_eq!(observer_count(&process, event), 0);
    }

    #[test]
    fn test_wait_async_rights() {
        let process = Process::new("test");
        let port = sys_port_create(&process, 0).unwrap();
        let event = sys_event_create(&process, 0).unwrap();
        let read_only_port = sys_handle_duplicate(&process, port, Rights::READ).unwrap();

        assert_eq!(
            sys_object_wait_async(
                &process,
                event,
                read_only_port,
                1,
                Signals::SIGNALED,
                WaitAsyncOptions::empty(),
            ),
            Err(Error::AccessDenied)
        );
        assert_eq!(
            sys_object_wait_async(
                &process,
                event,
                event,
                1,
                Signals::SIGNALED,
                WaitAsyncOptions::empty(),
            ),
            Err(Error::WrongType)
        );
    }

    #[test]
    fn test_close_cancels_async_registration() {
        let process = Process::new("test");
        let port = sys_port_create(&process, 0).unwrap();
        let event = sys_event_create(&process, 0).unwrap();
        let watcher = sys_handle_duplicate(&process, event, Rights::SAME_RIGHTS).unwrap();

        sys_object_wait_async(
            &process,
            watcher,
            port,
            1,
            Signals::SIGNALED,
            WaitAsyncOptions::empty(),
        )
        .unwrap();
        assert_eq!(observer_count(&process, event), 1);
        sys_handle_close(&process, watcher).unwrap();
        assert_eq!(observer_count(&process, event), 0);
    }
}
