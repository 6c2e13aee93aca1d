//! Zero-copy access to a table's backing arrays.
//!
//! [`TableInternals`] borrows a live table and exposes its three arrays and
//! bookkeeping as read-only views, for callers that want to hand the raw
//! storage to bulk routines. [`TableParts`] is the consuming counterpart: it
//! takes the arrays out of a table, which is gone afterwards, and returns them
//! to the pool when it is dropped or disposed.

use alloc::vec::Vec;
use core::mem::MaybeUninit;

use crate::hash_table::ArrayEntry;
use crate::hash_table::HashTable;
use crate::hash_table::take_detached;
use crate::pool::ArrayPool;
use crate::pool::RentedArray;
use crate::pool::release_quietly;

/// Borrowed view of a table's private state.
///
/// Obtained from `internals()` on [`HashTable`], [`HashMap`](crate::HashMap)
/// or [`HashSet`](crate::HashSet).
pub struct TableInternals<'a, K, V, P: ArrayPool> {
    table: &'a HashTable<K, V, P>,
}

impl<'a, K, V, P: ArrayPool> TableInternals<'a, K, V, P> {
    /// The bucket array: one chain head (or `-1`) per bucket.
    pub fn buckets(&self) -> &'a [i32] {
        self.table.raw_buckets()
    }

    /// Every slot ever handed out, live or free, in index order.
    pub fn entries(&self) -> &'a [ArrayEntry<K>] {
        self.table.raw_entries()
    }

    /// The value array, index-aligned with [`entries`](Self::entries). Only
    /// slots whose entry is occupied hold an initialized value.
    pub fn values(&self) -> &'a [MaybeUninit<V>] {
        self.table.raw_values()
    }

    /// The value at `index`, if that slot is live.
    pub fn value(&self, index: usize) -> Option<&'a V> {
        self.table.get_direct(index).map(|(_, value)| value)
    }

    /// Bucket count.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of slots ever handed out; the length of [`entries`](Self::entries).
    pub fn high_water(&self) -> usize {
        self.table.high_water()
    }

    /// Index of the first free slot, or `-1`.
    pub fn free_list_head(&self) -> i32 {
        self.table.free_list_head()
    }

    /// Number of free slots below the high-water mark.
    pub fn free_count(&self) -> usize {
        self.table.free_count()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Structural modification counter.
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// Chain steps walked by inserts since the last rehash.
    pub fn collisions(&self) -> usize {
        self.table.collisions()
    }

    /// Reciprocal used to reduce hashes to buckets.
    pub fn fast_mod_multiplier(&self) -> u64 {
        self.table.fast_mod_multiplier()
    }

    /// The pool the arrays were rented from.
    pub fn pool(&self) -> &'a P {
        self.table.pool()
    }
}

/// The backing arrays of a consumed table.
///
/// Dropping this drops every live key and value and returns the arrays to
/// the pool; [`dispose`](Self::dispose) does the same explicitly.
pub struct TableParts<K, V, P: ArrayPool> {
    buckets: RentedArray<i32>,
    entries: RentedArray<ArrayEntry<K>>,
    values: RentedArray<V>,
    capacity: usize,
    high_water: usize,
    len: usize,
    version: u64,
    pool: P,
}

impl<K, V, P: ArrayPool> HashTable<K, V, P> {
    /// Borrows the table's backing arrays and bookkeeping.
    pub fn internals(&self) -> TableInternals<'_, K, V, P> {
        TableInternals { table: self }
    }

    /// Moves the backing arrays and pool out of the table.
    pub fn into_parts(self) -> TableParts<K, V, P> {
        let len = self.len();
        let version = self.version();
        let (buckets, entries, values, capacity, high_water, pool) = self.into_raw_arrays();
        TableParts {
            buckets,
            entries,
            values,
            capacity,
            high_water,
            len,
            version,
            pool,
        }
    }

    /// Drops every element and returns the arrays to the pool.
    pub fn dispose(self) {
        drop(self);
    }
}

impl<K, V, P: ArrayPool> TableParts<K, V, P> {
    /// The bucket array.
    pub fn buckets(&self) -> &[i32] {
        // SAFETY: The first `capacity` buckets were initialized by the table.
        unsafe { self.buckets.assume_init_prefix(self.capacity) }
    }

    /// Every slot ever handed out, live or free.
    pub fn entries(&self) -> &[ArrayEntry<K>] {
        // SAFETY: The table initialized every slot below its high-water mark.
        unsafe { self.entries.assume_init_prefix(self.high_water) }
    }

    /// The value array, index-aligned with [`entries`](Self::entries).
    pub fn values(&self) -> &[MaybeUninit<V>] {
        &self.values.as_uninit_slice()[..self.high_water]
    }

    /// The value at `index`, if that slot is live.
    pub fn value(&self, index: usize) -> Option<&V> {
        let entry = self.entries().get(index)?;
        if !entry.is_occupied() {
            return None;
        }
        // SAFETY: Live slots hold an initialized value.
        Some(unsafe { self.values()[index].assume_init_ref() })
    }

    /// Bucket count of the source table.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The source table's version at the time of the move.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The pool the arrays go back to.
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Moves every live key/value pair out in slot order, then returns the
    /// arrays to the pool.
    pub fn into_pairs(mut self) -> Vec<(K, V)> {
        let mut pairs = Vec::with_capacity(self.len);
        let end = core::mem::replace(&mut self.high_water, 0);
        let mut index = 0;
        while let Some(pair) =
            take_detached(&mut self.entries, &mut self.values, &mut index, end, &mut self.len)
        {
            pairs.push(pair);
        }
        pairs
    }

    /// Drops every element and returns the arrays to the pool.
    pub fn dispose(self) {
        drop(self);
    }
}

impl<K, V, P: ArrayPool> Drop for TableParts<K, V, P> {
    fn drop(&mut self) {
        let end = core::mem::replace(&mut self.high_water, 0);
        let mut index = 0;
        while take_detached(&mut self.entries, &mut self.values, &mut index, end, &mut self.len)
            .is_some()
        {}

        let buckets = core::mem::replace(&mut self.buckets, RentedArray::empty());
        let entries = core::mem::replace(&mut self.entries, RentedArray::empty());
        let values = core::mem::replace(&mut self.values, RentedArray::empty());
        release_quietly(buckets, &self.pool);
        release_quietly(entries, &self.pool);
        release_quietly(values, &self.pool);
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::Cell;

    use super::*;
    use crate::hash_table::tests::DropCounter;
    use crate::hash_table::tests::check_invariants;
    use crate::pool::HeapPool;
    use crate::pool::tests::RecordingPool;

    fn filled<P: ArrayPool>(pool: P) -> HashTable<u32, String, P> {
        let mut table = HashTable::new_in(pool);
        for i in 0..10u32 {
            table.try_insert(i as u64, |a, b| a == b, i, i.to_string());
        }
        table.remove(4, |&k| k == 4);
        table
    }

    #[test]
    fn views_follow_the_table() {
        let table = filled(HeapPool);
        check_invariants(&table);
        let internals = table.internals();

        assert_eq!(internals.len(), 9);
        assert_eq!(internals.high_water(), 10);
        assert_eq!(internals.free_count(), 1);
        assert_eq!(internals.free_list_head(), 4);
        assert_eq!(internals.buckets().len(), internals.capacity());
        assert_eq!(internals.entries().len(), 10);
        assert_eq!(internals.values().len(), 10);
        assert_eq!(internals.version(), table.version());

        assert!(!internals.entries()[4].is_occupied());
        assert_eq!(internals.value(4), None);
        assert_eq!(internals.entries()[7].key(), Some(&7));
        assert_eq!(internals.value(7).map(String::as_str), Some("7"));

        let live = internals
            .buckets()
            .iter()
            .filter(|&&head| head >= 0)
            .count();
        assert!(live > 0);
    }

    #[test]
    fn into_parts_moves_arrays() {
        let pool = RecordingPool::default();
        let table = filled(&pool);
        let capacity = table.capacity();
        let version = table.version();

        let parts = table.into_parts();
        assert_eq!(parts.capacity(), capacity);
        assert_eq!(parts.version(), version);
        assert_eq!(parts.len(), 9);
        assert_eq!(parts.value(3).map(String::as_str), Some("3"));
        assert_eq!(parts.value(4), None);
        assert_eq!(pool.outstanding.get(), 3);

        let pairs = parts.into_pairs();
        assert_eq!(pool.outstanding.get(), 0);
        let keys: Vec<u32> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn dispose_drops_and_returns() {
        let pool = RecordingPool::default();
        let drops = Rc::new(Cell::new(0));
        let mut table: HashTable<u32, DropCounter, &RecordingPool> = HashTable::new_in(&pool);
        for i in 0..6u32 {
            table.try_insert(i as u64, |a, b| a == b, i, DropCounter(drops.clone()));
        }
        table.remove_recycling(2, |&k| k == 2);

        let parts = table.into_parts();
        assert_eq!(drops.get(), 0);
        parts.dispose();
        assert_eq!(drops.get(), 6);
        assert_eq!(pool.outstanding.get(), 0);
        assert_eq!(pool.rents.get(), pool.releases.get());

        let table: HashTable<u32, u32, &RecordingPool> = HashTable::with_capacity_in(4, &pool);
        table.dispose();
        assert_eq!(pool.outstanding.get(), 0);
    }

    #[test]
    fn empty_table_has_empty_views() {
        let table: HashTable<u32, u32, HeapPool> = HashTable::new_in(HeapPool);
        let internals = table.internals();
        assert!(internals.buckets().is_empty());
        assert!(internals.entries().is_empty());
        assert_eq!(internals.free_list_head(), -1);

        let parts = table.into_parts();
        assert!(parts.buckets().is_empty());
        assert!(parts.into_pairs().is_empty());
    }
}
