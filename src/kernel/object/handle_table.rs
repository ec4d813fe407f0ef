// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Handle Table
//!
//! Per-process namespace mapping handle values to [`Handle`]s. Every
//! capability operation (make, duplicate, replace, close, transfer)
//! funnels through a table.
//!
//! # Handle values
//!
//! ```text
//!  31          20 19            0
//! +--------------+---------------+
//! |  generation  |   slot + 1    |
//! +--------------+---------------+
//! ```
//!
//! Slots come from one system-wide arena, so a value is live in at most one
//! table at a time. Releasing a slot bumps its generation, so a stale value
//! never resolves to a newer handle; a slot that runs out of generations is
//! retired. The low field is never zero, which keeps [`HANDLE_INVALID`]
//! free.
//!
//! # Locking
//!
//! Mutations take the table's write lock; lookups share the read lock.
//! The arena lock is a leaf taken under the table lock. Handles leaving a
//! table are dropped only after the lock is released, since dropping the
//! last handle runs object teardown.
//!
//! # Reservations
//!
//! A receive that must not fail after it consumes a message first takes a
//! [`HandleReservation`]: values allocated up front and counted against
//! the table limit until installed or dropped.

use super::handle::{Handle, HandleId};
use super::rights::Rights;
use super::KernelObject;
use crate::kernel::sync::{Mutex, RwLock};
use crate::rustux::errors::{Error, Result};
use crate::rustux::types::{HandleValue, HANDLE_INVALID};
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use static_assertions::const_assert;

/// ============================================================================
/// Handle Value Arena
/// ============================================================================

/// Bits of a handle value holding the slot
pub const INDEX_BITS: u32 = 20;

const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << (u32::BITS - INDEX_BITS)) - 1;

/// Number of handle slots in the system
pub const MAX_ARENA_SLOTS: usize = INDEX_MASK as usize;

const_assert!(INDEX_BITS < u32::BITS);

const fn encode(index: u32, generation: u32) -> HandleValue {
    (generation << INDEX_BITS) | (index + 1)
}

const fn decode_index(value: HandleValue) -> usize {
    ((value & INDEX_MASK) - 1) as usize
}

struct HandleArena {
    generations: Vec<u32>,
    /// Released slots, reused oldest first to stretch generation reuse
    free: VecDeque<u32>,
}

impl HandleArena {
    const fn new() -> Self {
        Self {
            generations: Vec::new(),
            free: VecDeque::new(),
        }
    }

    fn allocate(&mut self) -> Result<HandleValue> {
        let index = match self.free.pop_front() {
            Some(index) => index,
            None => {
                if self.generations.len() >= MAX_ARENA_SLOTS {
                    return Err(Error::NoMemory);
                }
                self.generations.push(0);
                (self.generations.len() - 1) as u32
            }
        };
        Ok(encode(index, self.generations[index as usize]))
    }

    /// Return a value's slot to the free list
    ///
    /// A slot that has issued its last generation is retired instead, so a
    /// value is never issued twice.
    fn release(&mut self, value: HandleValue) {
        let index = decode_index(value);
        if let Some(generation) = self.generations.get_mut(index) {
            if *generation == GENERATION_MASK {
                return;
            }
            *generation += 1;
            self.free.push_back(index as u32);
        }
    }
}

static ARENA: Mutex<HandleArena> = Mutex::new(HandleArena::new());

/// ============================================================================
/// Transfer Batch
/// ============================================================================

/// Handles removed from a table for one channel write
///
/// Their values stay reserved until the batch is committed, so a failed
/// write can put every handle back under its original value.
#[derive(Default)]
pub struct TransferBatch {
    values: Vec<HandleValue>,
    handles: Vec<Handle>,
    bindings: Vec<(KernelObject, HandleId)>,
}

impl TransferBatch {
    /// Number of handles in the batch
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Move the handles out, to be embedded in a message
    pub fn take_handles(&mut self) -> Vec<Handle> {
        core::mem::take(&mut self.handles)
    }

    /// The write succeeded: release the values and cancel waits issued
    /// through the transferred handles
    pub fn commit(mut self) {
        release_values(&core::mem::take(&mut self.values));
        for (object, handle_id) in core::mem::take(&mut self.bindings) {
            object.base().cancel(handle_id);
        }
    }
}

impl Drop for TransferBatch {
    fn drop(&mut self) {
        if !self.values.is_empty() {
            release_values(&self.values);
        }
    }
}

fn release_values(values: &[HandleValue]) {
    if values.is_empty() {
        return;
    }
    let mut arena = ARENA.lock();
    for &value in values {
        arena.release(value);
    }
}

/// ============================================================================
/// Handle Reservation
/// ============================================================================

/// Room set aside in a [`HandleTable`] for handles about to be received
///
/// Dropping an unused reservation gives the room back.
#[must_use]
pub struct HandleReservation<'a> {
    table: &'a HandleTable,
    values: Vec<HandleValue>,
}

impl HandleReservation<'_> {
    /// Number of reserved values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is reserved
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Install `handles` under the reserved values
    ///
    /// Cannot fail. Values left over are released; handles beyond
    /// [`len`](Self::len) are closed.
    ///
    /// # Returns
    ///
    /// The values of the installed handles, in order
    pub fn install(mut self, mut handles: Vec<Handle>) -> Vec<HandleValue> {
        let mut values = core::mem::take(&mut self.values);
        let excess = handles.split_off(handles.len().min(values.len()));
        let spare = values.split_off(handles.len());

        {
            let mut entries = self.table.entries.write();
            self.table
                .reserved
                .fetch_sub(values.len() + spare.len(), Ordering::Relaxed);
            for (&value, handle) in values.iter().zip(handles) {
                entries.insert(value, handle);
            }
        }
        release_values(&spare);
        drop(excess);
        values
    }
}

impl Drop for HandleReservation<'_> {
    fn drop(&mut self) {
        if self.values.is_empty() {
            return;
        }
        {
            let _entries = self.table.entries.write();
            self.table.reserved.fetch_sub(self.values.len(), Ordering::Relaxed);
        }
        release_values(&self.values);
    }
}

/// ============================================================================
/// Handle Table
/// ============================================================================

/// Handle table
pub struct HandleTable {
    /// Maximum live handles
    max_handles: usize,

    entries: RwLock<BTreeMap<HandleValue, Handle>>,

    /// Values held by outstanding reservations; changed under the write lock
    reserved: AtomicUsize,
}

impl HandleTable {
    /// Create an empty table holding at most `max_handles` handles
    pub fn new(max_handles: usize) -> Self {
        Self {
            max_handles,
            entries: RwLock::new(BTreeMap::new()),
            reserved: AtomicUsize::new(0),
        }
    }

    /// Free room left, given the locked entries
    fn room(&self, entries: &BTreeMap<HandleValue, Handle>) -> usize {
        self.max_handles
            .saturating_sub(entries.len() + self.reserved.load(Ordering::Relaxed))
    }

    /// Number of live handles
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether `value` is live in this table
    pub fn contains(&self, value: HandleValue) -> bool {
        self.entries.read().contains_key(&value)
    }

    fn insert_locked(
        &self,
        entries: &mut BTreeMap<HandleValue, Handle>,
        handle: Handle,
    ) -> core::result::Result<HandleValue, (Error, Handle)> {
        if self.room(entries) == 0 {
            return Err((Error::NoMemory, handle));
        }
        let value = match ARENA.lock().allocate() {
            Ok(value) => value,
            Err(err) => return Err((err, handle)),
        };
        entries.insert(value, handle);
        Ok(value)
    }

    /// Create a handle to `object` and install it
    ///
    /// # Returns
    ///
    /// The new handle value, or `Err(Error::NoMemory)` if the table or the
    /// arena is full (the handle is closed in that case)
    pub fn make(&self, object: KernelObject, rights: Rights) -> Result<HandleValue> {
        self.add(Handle::new(object, rights))
    }

    /// Install an existing handle
    pub fn add(&self, handle: Handle) -> Result<HandleValue> {
        let mut entries = self.entries.write();
        match self.insert_locked(&mut entries, handle) {
            Ok(value) => Ok(value),
            Err((err, handle)) => {
                drop(entries);
                drop(handle);
                Err(err)
            }
        }
    }

    /// Install a batch of handles, all or nothing
    ///
    /// On failure every handle in the batch is closed.
    pub fn add_many(&self, handles: Vec<Handle>) -> Result<Vec<HandleValue>> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = self.entries.write();
        let values = match self.allocate_locked(&entries, handles.len()) {
            Ok(values) => values,
            Err(err) => {
                drop(entries);
                drop(handles);
                return Err(err);
            }
        };
        for (&value, handle) in values.iter().zip(handles) {
            entries.insert(value, handle);
        }
        Ok(values)
    }

    /// Allocate `count` values if the table has room for them
    fn allocate_locked(
        &self,
        entries: &BTreeMap<HandleValue, Handle>,
        count: usize,
    ) -> Result<Vec<HandleValue>> {
        if count > self.room(entries) {
            return Err(Error::NoMemory);
        }

        let mut arena = ARENA.lock();
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            match arena.allocate() {
                Ok(value) => values.push(value),
                Err(err) => {
                    for &value in &values {
                        arena.release(value);
                    }
                    return Err(err);
                }
            }
        }
        Ok(values)
    }

    /// Set aside room for `count` handles
    ///
    /// # Returns
    ///
    /// The reservation, or `Err(Error::NoMemory)` if the table or the arena
    /// lacks room. A reservation of zero always succeeds.
    pub fn reserve(&self, count: usize) -> Result<HandleReservation<'_>> {
        if count == 0 {
            return Ok(HandleReservation {
                table: self,
                values: Vec::new(),
            });
        }

        let entries = self.entries.write();
        let values = self.allocate_locked(&entries, count)?;
        self.reserved.fetch_add(count, Ordering::Relaxed);
        Ok(HandleReservation { table: self, values })
    }

    /// Resolve `value`, requiring `required` rights
    ///
    /// # Returns
    ///
    /// - `Err(Error::BadHandle)` if the value is absent or stale
    /// - `Err(Error::AccessDenied)` if a required right is missing
    pub fn get_with_rights(&self, value: HandleValue, required: Rights) -> Result<KernelObject> {
        let entries = self.entries.read();
        let handle = entries.get(&value).ok_or(Error::BadHandle)?;
        handle.require(required)?;
        Ok(handle.object().clone())
    }

    /// Run `f` on the handle under the table's read lock
    ///
    /// Used where an operation must complete while the handle is known to
    /// be live, such as registering a wait bound to it.
    pub fn with_handle<R>(
        &self,
        value: HandleValue,
        f: impl FnOnce(&Handle) -> Result<R>,
    ) -> Result<R> {
        let entries = self.entries.read();
        let handle = entries.get(&value).ok_or(Error::BadHandle)?;
        f(handle)
    }

    /// Run `f` on several handles under one read lock scope
    ///
    /// Every value is resolved before `f` runs; the first absent value
    /// fails with `Err(Error::BadHandle)`.
    pub fn with_handles<R>(
        &self,
        values: &[HandleValue],
        f: impl FnOnce(&[&Handle]) -> Result<R>,
    ) -> Result<R> {
        let entries = self.entries.read();
        let handles = values
            .iter()
            .map(|value| entries.get(value).ok_or(Error::BadHandle))
            .collect::<Result<Vec<&Handle>>>()?;
        f(&handles)
    }

    /// Rights of the handle at `value`
    pub fn rights(&self, value: HandleValue) -> Result<Rights> {
        self.with_handle(value, |handle| Ok(handle.rights()))
    }

    /// Duplicate the handle at `value`
    ///
    /// # Arguments
    ///
    /// * `value` - Source handle; must carry [`Rights::DUPLICATE`]
    /// * `requested` - Subset of the source's rights, or [`Rights::SAME_RIGHTS`]
    ///
    /// # Returns
    ///
    /// - `Err(Error::AccessDenied)` without the `DUPLICATE` right
    /// - `Err(Error::InvalidArgs)` if `requested` would widen the rights
    pub fn duplicate(&self, value: HandleValue, requested: Rights) -> Result<HandleValue> {
        let mut entries = self.entries.write();
        let source = entries.get(&value).ok_or(Error::BadHandle)?;
        source.require(Rights::DUPLICATE)?;
        let rights = source.rights().resolve(requested)?;
        let handle = source.derive(rights);

        match self.insert_locked(&mut entries, handle) {
            Ok(value) => Ok(value),
            Err((err, handle)) => {
                drop(entries);
                drop(handle);
                Err(err)
            }
        }
    }

    /// Replace the handle at `value` with one carrying `requested` rights
    ///
    /// Needs no rights on the source. On failure the source is left intact.
    pub fn replace(&self, value: HandleValue, requested: Rights) -> Result<HandleValue> {
        let mut entries = self.entries.write();
        let source = entries.get(&value).ok_or(Error::BadHandle)?;
        let rights = source.rights().resolve(requested)?;
        let handle = source.derive(rights);

        let new_value = match ARENA.lock().allocate() {
            Ok(new_value) => new_value,
            Err(err) => {
                drop(entries);
                drop(handle);
                return Err(err);
            }
        };

        let old = entries.remove(&value);
        entries.insert(new_value, handle);
        ARENA.lock().release(value);
        drop(entries);
        drop(old);
        Ok(new_value)
    }

    /// Close the handle at `value`
    ///
    /// Closing [`HANDLE_INVALID`] succeeds and does nothing.
    pub fn close(&self, value: HandleValue) -> Result {
        if value == HANDLE_INVALID {
            return Ok(());
        }
        let handle = {
            let mut entries = self.entries.write();
            let handle = entries.remove(&value).ok_or(Error::BadHandle)?;
            ARENA.lock().release(value);
            handle
        };
        drop(handle);
        Ok(())
    }

    /// Close every handle in `values`
    ///
    /// Valid values are closed even when others are bad; the result is
    /// `Err(Error::BadHandle)` if any value was absent.
    pub fn close_many(&self, values: &[HandleValue]) -> Result {
        let mut status = Ok(());
        let mut removed = Vec::with_capacity(values.len());
        {
            let mut entries = self.entries.write();
            let mut arena = ARENA.lock();
            for &value in values.iter().filter(|&&value| value != HANDLE_INVALID) {
                match entries.remove(&value) {
                    Some(handle) => {
                        arena.release(value);
                        removed.push(handle);
                    }
                    None => status = Err(Error::BadHandle),
                }
            }
        }
        drop(removed);
        status
    }

    /// Remove handles for embedding in an outgoing message
    ///
    /// Each handle must carry [`Rights::TRANSFER`] and pass `check`. All or
    /// nothing: on the first failure, handles already removed are put back.
    ///
    /// # Returns
    ///
    /// - `Err(Error::BadHandle)` for an absent value
    /// - `Err(Error::InvalidArgs)` for a value repeated in `values`
    /// - `Err(Error::AccessDenied)` for a handle without `TRANSFER`
    /// - whatever `check` returns
    pub fn remove_for_transfer(
        &self,
        values: &[HandleValue],
        check: impl Fn(&Handle) -> Result,
    ) -> Result<TransferBatch> {
        let mut entries = self.entries.write();
        let mut batch = TransferBatch::default();

        for &value in values {
            let outcome = match entries.remove(&value) {
                Some(handle) => {
                    let checked = handle.require(Rights::TRANSFER).and_then(|()| check(&handle));
                    match checked {
                        Ok(()) => Ok(handle),
                        Err(err) => {
                            entries.insert(value, handle);
                            Err(err)
                        }
                    }
                }
                None if batch.values.contains(&value) => Err(Error::InvalidArgs),
                None => Err(Error::BadHandle),
            };

            match outcome {
                Ok(handle) => {
                    batch.bindings.push((handle.object().clone(), handle.id()));
                    batch.values.push(value);
                    batch.handles.push(handle);
                }
                Err(err) => {
                    let values = core::mem::take(&mut batch.values);
                    let handles = core::mem::take(&mut batch.handles);
                    for (value, handle) in values.into_iter().zip(handles) {
                        entries.insert(value, handle);
                    }
                    return Err(err);
                }
            }
        }

        Ok(batch)
    }

    /// Put a failed transfer back under its original values
    pub fn restore(&self, mut batch: TransferBatch, handles: Vec<Handle>) {
        let values = core::mem::take(&mut batch.values);
        let mut entries = self.entries.write();
        for (value, handle) in values.into_iter().zip(handles) {
            entries.insert(value, handle);
        }
    }

    /// Close every handle in the table
    ///
    /// # Returns
    ///
    /// Number of handles closed
    pub fn clear(&self) -> usize {
        let drained = {
            let mut entries = self.entries.write();
            let drained = core::mem::take(&mut *entries);
            let mut arena = ARENA.lock();
            for &value in drained.keys() {
                arena.release(value);
            }
            drained
        };
        let count = drained.len();
        drop(drained);
        count
    }
}

impl Drop for HandleTable {
    fn drop(&mut self) {
        self.clear();
    }
}

impl core::fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandleTable")
            .field("count", &self.count())
            .field("reserved", &self.reserved.load(Ordering::Relaxed))
            .field("max_handles", &self.max_handles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::object::event::EventObject;

    fn event() -> KernelObject {
        KernelObject::Event(EventObject::new())
    }

    #[test]
    fn test_value_encoding() {
        assert_eq!(encode(0, 0), 1);
        assert_eq!(decode_index(encode(41, 3)), 41);
        assert_ne!(encode(0, 0), HANDLE_INVALID);
        assert_ne!(encode(5, 1), encode(5, 2));
    }

    #[test]
    fn test_make_and_get() {
        let table = HandleTable::new(16);
        let value = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert_ne!(value, HANDLE_INVALID);
        assert_eq!(table.count(), 1);
        assert!(table.get_with_rights(value, Rights::WAIT).is_ok());
        assert_eq!(table.get_with_rights(value, Rights::READ).err(), Some(Error::AccessDenied));
    }

    #[test]
    fn test_stale_value_is_bad_handle() {
        let table = HandleTable::new(16);
        let value = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        table.close(value).unwrap();
        let _fresh = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert_eq!(table.get_with_rights(value, Rights::empty()).err(), Some(Error::BadHandle));
        assert_eq!(table.close(value), Err(Error::BadHandle));
    }

    #[test]
    fn test_value_lives_in_one_table() {
        let a = HandleTable::new(16);
        let b = HandleTable::new(16);
        let value = a.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert!(!b.contains(value));
        assert_eq!(b.close(value), Err(Error::BadHandle));
        assert!(a.contains(value));
    }

    #[test]
    fn test_with_handles_resolves_all_first() {
        let table = HandleTable::new(16);
        let a = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let b = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert_eq!(table.with_handles(&[a, b], |handles| Ok(handles.len())), Ok(2));

        let mut called = false;
        let result = table.with_handles(&[a, 0x77, b], |_| {
            called = true;
            Ok(())
        });
        assert_eq!(result, Err(Error::BadHandle));
        assert!(!called);
    }

    #[test]
    fn test_exhausted_slot_is_retired() {
        let mut arena = HandleArena::new();
        let first = arena.allocate().unwrap();
        let mut value = first;
        for _ in 0..GENERATION_MASK {
            arena.release(value);
            value = arena.allocate().unwrap();
            assert_ne!(value, first);
            assert_eq!(decode_index(value), 0);
        }
        assert_eq!(value >> INDEX_BITS, GENERATION_MASK);

        // The last generation of slot 0 is spent; the next value needs a new slot
        arena.release(value);
        let next = arena.allocate().unwrap();
        assert_eq!(decode_index(next), 1);
        assert_ne!(next, first);
    }

    #[test]
    fn test_stale_value_survives_many_reuses() {
        let table = HandleTable::new(16);
        let stale = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        table.close(stale).unwrap();

        for _ in 0..=GENERATION_MASK {
            let fresh = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
            assert_ne!(fresh, stale);
            assert_eq!(table.get_with_rights(stale, Rights::empty()).err(), Some(Error::BadHandle));
            table.close(fresh).unwrap();
        }
    }

    #[test]
    fn test_reserve_counts_against_limit() {
        let table = HandleTable::new(3);
        table.make(event(), Rights::EVENT_DEFAULT).unwrap();

        let reservation = table.reserve(2).unwrap();
        assert_eq!(reservation.len(), 2);
        assert_eq!(table.make(event(), Rights::EVENT_DEFAULT), Err(Error::NoMemory));
        assert_eq!(table.reserve(1).err(), Some(Error::NoMemory));

        // Dropping gives the room back
        drop(reservation);
        assert!(table.reserve(2).is_ok());
        assert!(table.reserve(0).unwrap().is_empty());
    }

    #[test]
    fn test_reservation_install() {
        let table = HandleTable::new(3);
        let reservation = table.reserve(3).unwrap();
        let values = reservation.install(alloc::vec![
            Handle::new(event(), Rights::EVENT_DEFAULT),
            Handle::new(event(), Rights::WAIT),
        ]);
        assert_eq!(values.len(), 2);
        assert_eq!(table.count(), 2);
        assert_eq!(table.rights(values[1]), Ok(Rights::WAIT));

        // The unused value went back, so one more handle fits
        table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert_eq!(table.make(event(), Rights::EVENT_DEFAULT), Err(Error::NoMemory));
    }

    #[test]
    fn test_close_invalid_is_noop() {
        let table = HandleTable::new(16);
        assert_eq!(table.close(HANDLE_INVALID), Ok(()));
    }

    #[test]
    fn test_table_limit() {
        let table = HandleTable::new(2);
        table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let value = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert_eq!(table.make(event(), Rights::EVENT_DEFAULT), Err(Error::NoMemory));
        assert_eq!(table.duplicate(value, Rights::SAME_RIGHTS), Err(Error::NoMemory));
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_duplicate_rights() {
        let table = HandleTable::new(16);
        let value = table.make(event(), Rights::EVENT_DEFAULT).unwrap();

        let same = table.duplicate(value, Rights::SAME_RIGHTS).unwrap();
        assert_eq!(table.rights(same), Ok(Rights::EVENT_DEFAULT));

        let reduced = table.duplicate(value, Rights::WAIT).unwrap();
        assert_eq!(table.rights(reduced), Ok(Rights::WAIT));

        // No DUPLICATE on the reduced handle
        assert_eq!(table.duplicate(reduced, Rights::WAIT), Err(Error::AccessDenied));
        // Escalation is rejected
        assert_eq!(table.duplicate(value, Rights::READ), Err(Error::InvalidArgs));
    }

    #[test]
    fn test_replace() {
        let table = HandleTable::new(16);
        let value = table.make(event(), Rights::WAIT | Rights::SIGNAL).unwrap();

        // Replace works without DUPLICATE
        let replaced = table.replace(value, Rights::WAIT).unwrap();
        assert!(!table.contains(value));
        assert_eq!(table.rights(replaced), Ok(Rights::WAIT));

        // Failed replace leaves the source
        assert_eq!(table.replace(replaced, Rights::SIGNAL), Err(Error::InvalidArgs));
        assert!(table.contains(replaced));
    }

    #[test]
    fn test_close_many() {
        let table = HandleTable::new(16);
        let a = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let b = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        assert_eq!(table.close_many(&[a, HANDLE_INVALID, 0x7fff_ffff, b]), Err(Error::BadHandle));
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_remove_for_transfer_duplicate_value_unwinds() {
        let table = HandleTable::new(16);
        let a = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let b = table.make(event(), Rights::EVENT_DEFAULT).unwrap();

        let result = table.remove_for_transfer(&[a, b, a], |_| Ok(()));
        assert_eq!(result.err(), Some(Error::InvalidArgs));
        assert!(table.contains(a));
        assert!(table.contains(b));
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_remove_for_transfer_requires_transfer_right() {
        let table = HandleTable::new(16);
        let a = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let b = table.make(event(), Rights::WAIT).unwrap();

        let result = table.remove_for_transfer(&[a, b], |_| Ok(()));
        assert_eq!(result.err(), Some(Error::AccessDenied));
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_restore_keeps_values() {
        let table = HandleTable::new(16);
        let a = table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let b = table.make(event(), Rights::EVENT_DEFAULT).unwrap();

        let mut batch = table.remove_for_transfer(&[a, b], |_| Ok(())).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(table.count(), 0);

        let handles = batch.take_handles();
        table.restore(batch, handles);
        assert!(table.contains(a));
        assert!(table.contains(b));
    }

    #[test]
    fn test_add_many_is_all_or_nothing() {
        let table = HandleTable::new(2);
        table.make(event(), Rights::EVENT_DEFAULT).unwrap();
        let handles = alloc::vec![
            Handle::new(event(), Rights::EVENT_DEFAULT),
            Handle::new(event(), Rights::EVENT_DEFAULT),
        ];
        assert_eq!(table.add_many(handles), Err(Error::NoMemory));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_clear_closes_objects() {
        let table = HandleTable::new(16);
        let event = EventObject::new();
        table.make(KernelObject::Event(event.clone()), Rights::EVENT_DEFAULT).unwrap();
        table.make(KernelObject::Event(event.clone()), Rights::EVENT_DEFAULT).unwrap();
        assert_eq!(event.base().handle_count(), 2);
        assert_eq!(table.clear(), 2);
        assert_eq!(event.base().handle_count(), 0);
    }
}
