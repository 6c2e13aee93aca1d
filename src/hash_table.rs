//! The chained hash table underneath [`HashMap`](crate::HashMap) and
//! [`HashSet`](crate::HashSet).
//!
//! Three pool-rented arrays make up a table:
//!
//! - `buckets`: one `i32` per bucket, the index of the first entry of the
//!   bucket's chain or `-1`.
//! - `entries`: one [`ArrayEntry`] per slot, holding the key, its cached hash
//!   and the `previous`/`next` links of a doubly linked chain.
//! - `values`: one `V` per slot, index-aligned with `entries`.
//!
//! Slots are handed out from a free list first and from the high-water mark
//! second. A slot's index is its *direct index*; it stays valid until the
//! entry is removed, the table is cleared, or [`HashTable::trim_excess`]
//! compacts it. Growth copies slots index-for-index and never moves an entry.

#[cfg(feature = "stats")]
use alloc::vec::Vec;
use core::fmt::Debug;
use core::mem::MaybeUninit;

use crate::comparer::fold_hash;
use crate::error::Error;
use crate::error::Result;
use crate::pool::ArrayPool;
use crate::pool::DefaultPool;
use crate::pool::RentedArray;
use crate::pool::release_quietly;
use crate::primes;

/// Terminates a chain in either direction, and marks an empty bucket.
pub(crate) const END_OF_CHAIN: i32 = -1;

/// Free slots store `FREE_LIST_START - next_free` in `next`, which is always
/// `<= -2` and therefore distinguishable from a live link.
pub(crate) const FREE_LIST_START: i32 = -3;

/// An insert that walks past more than this many entries of its chain grows
/// the table early. Well-distributed hashes at full load practically never
/// build chains this long, so churn at a reserved capacity does not trip it.
const COLLISION_WALK_LIMIT: usize = 100;

/// A single slot of the entries array.
///
/// Live slots have `next >= -1`; free slots carry the free-list encoding in
/// `next` and an uninitialized key.
pub struct ArrayEntry<K> {
    hash: u32,
    previous: i32,
    next: i32,
    recyclable: bool,
    key: MaybeUninit<K>,
}

impl<K> ArrayEntry<K> {
    /// Returns `true` if this slot holds a live key.
    #[inline(always)]
    pub fn is_occupied(&self) -> bool {
        self.next >= END_OF_CHAIN
    }

    /// The folded hash cached at insertion. Meaningless for free slots.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Index of the previous entry in the chain, or `-1`.
    pub fn previous(&self) -> i32 {
        self.previous
    }

    /// Index of the next entry in the chain, `-1` at the end, or the
    /// free-list encoding for a free slot.
    pub fn next(&self) -> i32 {
        self.next
    }

    /// Returns `true` if this free slot still holds a value kept for reuse.
    pub fn is_recyclable(&self) -> bool {
        !self.is_occupied() && self.recyclable
    }

    /// The key, if the slot is live.
    pub fn key(&self) -> Option<&K> {
        if self.is_occupied() {
            // SAFETY: Live slots always hold an initialized key.
            Some(unsafe { self.key.assume_init_ref() })
        } else {
            None
        }
    }
}

impl<K: Debug> Debug for ArrayEntry<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArrayEntry")
            .field("key", &self.key())
            .field("hash", &self.hash)
            .field("previous", &self.previous)
            .field("next", &self.next)
            .finish()
    }
}

/// How [`VacantEntry::recycle_or_insert_with`] obtained its value slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotOrigin {
    /// The key was already present.
    Existing,
    /// A value left behind by [`HashTable::remove_recycling`] was handed back.
    Recycled,
    /// A new value was built.
    Created,
}

/// Chain-length statistics.
///
/// Only available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries.
    pub len: usize,
    /// Number of buckets (and of entry slots).
    pub capacity: usize,
    /// Slots ever handed out since the last compaction.
    pub high_water: usize,
    /// Slots waiting on the free list.
    pub free_count: usize,
    /// Chain steps walked by inserts since the last rehash.
    pub collisions: usize,
    /// Buckets with at least one entry.
    pub used_buckets: usize,
    /// Length of the longest chain.
    pub longest_chain: usize,
    /// Live entries per bucket.
    pub load_factor: f64,
    /// Bytes held in the three backing arrays.
    pub total_bytes: usize,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.len,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Slots: {} handed out, {} on the free list",
            self.high_water, self.free_count
        );
        println!(
            "Buckets: {} used, longest chain {}",
            self.used_buckets, self.longest_chain
        );
        println!("Collisions since last rehash: {}", self.collisions);
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// A chained hash table over pool-rented arrays.
///
/// Like [`hashbrown::HashTable`](https://docs.rs/hashbrown), the table knows
/// nothing about hashing: every operation takes the key's hash and an
/// equality predicate. Unlike it, keys and values live in separate arrays and
/// every entry has a stable integer index.
///
/// ## Example
///
/// ```rust
/// # use core::hash::BuildHasher;
/// # use pooled_hash::hash_table::Entry;
/// # use pooled_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// # use core::hash::BuildHasherDefault;
/// let hasher = BuildHasherDefault::<SipHasher>::default();
/// let mut table: HashTable<&str, u32> = HashTable::new();
///
/// let hash = hasher.hash_one("alice");
/// let index = match table.entry(hash, |k| *k == "alice") {
///     Entry::Vacant(entry) => entry.insert_indexed("alice", 31).0,
///     Entry::Occupied(entry) => entry.index(),
/// };
///
/// assert_eq!(table.get_direct(index), Some((&"alice", &31)));
/// ```
pub struct HashTable<K, V, P: ArrayPool = DefaultPool> {
    buckets: RentedArray<i32>,
    entries: RentedArray<ArrayEntry<K>>,
    values: RentedArray<V>,

    size: usize,
    fast_mod_multiplier: u64,

    high_water: usize,
    free_list: i32,
    free_count: usize,

    collisions: usize,
    version: u64,

    pool: P,
}

impl<K, V, P> Debug for HashTable<K, V, P>
where
    K: Debug,
    V: Debug,
    P: ArrayPool,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, k, v)| (k, v)))
            .finish()
    }
}

impl<K, V, P> Clone for HashTable<K, V, P>
where
    K: Clone,
    V: Clone,
    P: ArrayPool + Clone,
{
    fn clone(&self) -> Self {
        let mut table = Self::new_in(self.pool.clone());
        if self.size == 0 {
            return table;
        }

        table.buckets = rent_buckets(&table.pool, self.size);
        table.entries = rent_entries(&table.pool, self.size);
        table.values = RentedArray::rent(&table.pool, self.size);
        table.size = self.size;
        table.fast_mod_multiplier = self.fast_mod_multiplier;

        // SAFETY: Both bucket arrays hold at least `size` initialized slots.
        unsafe {
            table
                .buckets
                .assume_init_prefix_mut(self.size)
                .copy_from_slice(self.buckets.assume_init_prefix(self.size));
        }

        // The high-water mark advances one slot at a time so a panicking
        // `clone` leaves a table that drops exactly what was written.
        for index in 0..self.high_water {
            // SAFETY: `index < high_water`, so the source slot is initialized
            // and the destination has room for it.
            unsafe {
                let source = self.slot(index);
                let occupied = source.is_occupied();
                let (key, value) = if occupied {
                    (
                        MaybeUninit::new(source.key.assume_init_ref().clone()),
                        Some(self.value(index).clone()),
                    )
                } else {
                    (MaybeUninit::uninit(), None)
                };

                table.entries.as_mut_ptr().add(index).write(ArrayEntry {
                    hash: source.hash,
                    previous: source.previous,
                    next: source.next,
                    recyclable: false,
                    key,
                });
                if let Some(value) = value {
                    table.values.as_mut_ptr().add(index).write(value);
                }
            }
            table.high_water = index + 1;
        }

        table.free_list = self.free_list;
        table.free_count = self.free_count;
        table.collisions = self.collisions;
        table
    }
}

impl<K, V, P: ArrayPool> Drop for HashTable<K, V, P> {
    fn drop(&mut self) {
        let high_water = core::mem::replace(&mut self.high_water, 0);
        // SAFETY: `high_water` was the table's initialized prefix; the table
        // no longer considers any slot initialized.
        unsafe { self.drop_elements(0..high_water) };

        let buckets = core::mem::replace(&mut self.buckets, RentedArray::empty());
        let entries = core::mem::replace(&mut self.entries, RentedArray::empty());
        let values = core::mem::replace(&mut self.values, RentedArray::empty());
        release_quietly(buckets, &self.pool);
        release_quietly(entries, &self.pool);
        release_quietly(values, &self.pool);
    }
}

impl<K, V> Default for HashTable<K, V, DefaultPool> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HashTable<K, V, DefaultPool> {
    /// Creates an empty table. Nothing is rented until the first insert.
    pub fn new() -> Self {
        Self::new_in(DefaultPool::default())
    }

    /// Creates a table that can hold `capacity` entries before it grows.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    ///
    /// ```rust
    /// # use pooled_hash::hash_table::HashTable;
    /// let table: HashTable<u64, String> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, DefaultPool::default())
    }
}

impl<K, V, P: ArrayPool> HashTable<K, V, P> {
    /// Creates an empty table renting from `pool`.
    pub fn new_in(pool: P) -> Self {
        HashTable {
            buckets: RentedArray::empty(),
            entries: RentedArray::empty(),
            values: RentedArray::empty(),
            size: 0,
            fast_mod_multiplier: 0,
            high_water: 0,
            free_list: END_OF_CHAIN,
            free_count: 0,
            collisions: 0,
            version: 0,
            pool,
        }
    }

    /// Creates a table renting from `pool` that can hold `capacity` entries
    /// before it grows.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    pub fn with_capacity_in(capacity: usize, pool: P) -> Self {
        assert!(
            capacity <= primes::MAX_PRIME_LENGTH,
            "capacity overflow: {capacity}"
        );

        let mut table = Self::new_in(pool);
        if capacity > 0 {
            table.initialize(capacity);
        }
        table
    }

    fn initialize(&mut self, capacity: usize) {
        let size = primes::get_prime(capacity);
        self.buckets = rent_buckets(&self.pool, size);
        self.entries = rent_entries(&self.pool, size);
        self.values = RentedArray::rent(&self.pool, size);
        self.size = size;
        self.fast_mod_multiplier = primes::fast_mod_multiplier(size as u32);
        self.high_water = 0;
        self.free_list = END_OF_CHAIN;
        self.free_count = 0;
        self.collisions = 0;
    }

    /// Returns the number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.high_water - self.free_count
    }

    /// Returns `true` if the table holds no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries the table can hold before it must grow. Equal to the
    /// bucket count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Structural modification counter. Bumped by every insert, removal,
    /// clear, rehash and compaction, but not by overwriting a value.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The pool this table rents from.
    pub fn pool(&self) -> &P {
        &self.pool
    }

    #[inline(always)]
    fn bucket_for(&self, hash: u32) -> usize {
        primes::fast_mod(hash, self.size as u32, self.fast_mod_multiplier) as usize
    }

    /// # Safety
    ///
    /// `bucket < self.size`.
    #[inline(always)]
    unsafe fn bucket(&self, bucket: usize) -> i32 {
        debug_assert!(bucket < self.size);
        // SAFETY: Buckets `0..size` are always initialized.
        unsafe { *self.buckets.as_ptr().add(bucket) }
    }

    /// # Safety
    ///
    /// `bucket < self.size`.
    #[inline(always)]
    unsafe fn set_bucket(&mut self, bucket: usize, head: i32) {
        debug_assert!(bucket < self.size);
        // SAFETY: Buckets `0..size` are always initialized.
        unsafe { *self.buckets.as_mut_ptr().add(bucket) = head }
    }

    /// # Safety
    ///
    /// `index < self.high_water`.
    #[inline(always)]
    unsafe fn slot(&self, index: usize) -> &ArrayEntry<K> {
        debug_assert!(index < self.high_water);
        // SAFETY: Slots `0..high_water` are always initialized.
        unsafe { &*self.entries.as_ptr().add(index) }
    }

    /// # Safety
    ///
    /// `index < self.high_water`.
    #[inline(always)]
    unsafe fn slot_mut(&mut self, index: usize) -> &mut ArrayEntry<K> {
        debug_assert!(index < self.high_water);
        // SAFETY: Slots `0..high_water` are always initialized.
        unsafe { &mut *self.entries.as_mut_ptr().add(index) }
    }

    /// # Safety
    ///
    /// The slot at `index` must be live or recyclable.
    #[inline(always)]
    unsafe fn value(&self, index: usize) -> &V {
        // SAFETY: Caller guarantees the value is initialized.
        unsafe { &*self.values.as_ptr().add(index) }
    }

    /// # Safety
    ///
    /// The slot at `index` must be live or recyclable.
    #[inline(always)]
    unsafe fn value_mut(&mut self, index: usize) -> &mut V {
        // SAFETY: Caller guarantees the value is initialized.
        unsafe { &mut *self.values.as_mut_ptr().add(index) }
    }

    #[inline(always)]
    fn is_live(&self, index: usize) -> bool {
        // SAFETY: Checked against `high_water` first.
        index < self.high_water && unsafe { self.slot(index) }.is_occupied()
    }

    /// Returns the direct index of the entry matching `hash` and `eq`.
    pub fn find_index(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<usize> {
        if self.size == 0 {
            return None;
        }

        let hash = fold_hash(hash);
        // SAFETY: `bucket_for` always yields a bucket below `size`, and chain
        // links always point at live slots below `high_water`.
        unsafe {
            let mut index = self.bucket(self.bucket_for(hash));
            let mut steps = 0;
            while index >= 0 {
                let entry = self.slot(index as usize);
                if entry.hash == hash && eq(entry.key.assume_init_ref()) {
                    return Some(index as usize);
                }
                index = entry.next;

                steps += 1;
                debug_assert!(steps <= self.high_water, "hash chain contains a cycle");
            }
        }

        None
    }

    /// Returns the key and value matching `hash` and `eq`.
    pub fn find(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(&K, &V)> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns live slots.
        unsafe { Some((self.slot(index).key.assume_init_ref(), self.value(index))) }
    }

    /// Returns the key and a mutable reference to the value matching `hash`
    /// and `eq`.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(&K, &mut V)> {
        let index = self.find_index(hash, eq)?;
        Some(self.split_live_mut(index))
    }

    #[inline(always)]
    fn split_live_mut(&mut self, index: usize) -> (&K, &mut V) {
        debug_assert!(self.is_live(index));
        // SAFETY: Callers pass a live index; keys and values are separate
        // arrays so the two references never alias.
        unsafe {
            let key = (*self.entries.as_ptr().add(index)).key.assume_init_ref();
            let value = &mut *self.values.as_mut_ptr().add(index);
            (key, value)
        }
    }

    /// Looks up the entry matching `hash` and `eq` for insertion or in-place
    /// modification.
    ///
    /// Every entry walked past on the way is counted as a collision if the
    /// lookup ends in an insert.
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Entry<'_, K, V, P> {
        let hash = fold_hash(hash);
        let mut steps = 0;

        if self.size > 0 {
            // SAFETY: See `find_index`.
            let mut index = unsafe { self.bucket(self.bucket_for(hash)) };
            while index >= 0 {
                // SAFETY: Chain links always point at live slots.
                let (matches, next) = unsafe {
                    let entry = self.slot(index as usize);
                    (
                        entry.hash == hash && eq(entry.key.assume_init_ref()),
                        entry.next,
                    )
                };
                if matches {
                    return Entry::Occupied(OccupiedEntry {
                        table: self,
                        index: index as usize,
                    });
                }
                index = next;
                steps += 1;
            }
        }

        Entry::Vacant(VacantEntry {
            table: self,
            hash,
            steps,
        })
    }

    /// Inserts `key`/`value` unless an existing key compares equal to `key`.
    ///
    /// `eq` receives a stored key and `key`, so it does not need to borrow
    /// the key being moved in. Returns the direct index of the new or existing
    /// entry and whether an insert happened. On a match, `key` and `value` are
    /// dropped and the table is not modified.
    pub fn try_insert(
        &mut self,
        hash: u64,
        eq: impl Fn(&K, &K) -> bool,
        key: K,
        value: V,
    ) -> (usize, bool) {
        match self.entry(hash, |stored| eq(stored, &key)) {
            Entry::Occupied(entry) => (entry.index(), false),
            Entry::Vacant(entry) => (entry.insert_indexed(key, value).0, true),
        }
    }

    /// Pops the free-list head, or hands out the slot at the high-water mark
    /// (growing first if the arrays are full). Returns the index and whether
    /// the slot still holds a recycled value.
    fn claim_slot(&mut self) -> (usize, bool) {
        if self.size == 0 {
            self.initialize(0);
        }

        if self.free_count > 0 {
            let index = self.free_list as usize;
            // SAFETY: The free list only links slots below `high_water`.
            let (next, recycled) = {
                let entry = unsafe { self.slot_mut(index) };
                (entry.next, core::mem::replace(&mut entry.recyclable, false))
            };
            debug_assert!(next <= FREE_LIST_START - END_OF_CHAIN);
            self.free_list = FREE_LIST_START - next;
            self.free_count -= 1;
            return (index, recycled);
        }

        if self.high_water == self.size {
            assert!(
                self.size < primes::MAX_PRIME_LENGTH,
                "capacity overflow: table is at its maximum size"
            );
            self.resize(primes::expand_prime(self.high_water));
        }

        let index = self.high_water;
        self.high_water += 1;
        (index, false)
    }

    /// Writes a live entry for `key` at the claimed slot `index` and links it
    /// at the head of its bucket's chain.
    fn link_new(&mut self, index: usize, hash: u32, key: K) {
        let bucket = self.bucket_for(hash);
        // SAFETY: `bucket < size`; `index` was just claimed and is below
        // `high_water`; a non-negative head is a live slot.
        unsafe {
            let head = self.bucket(bucket);
            self.entries.as_mut_ptr().add(index).write(ArrayEntry {
                hash,
                previous: END_OF_CHAIN,
                next: head,
                recyclable: false,
                key: MaybeUninit::new(key),
            });
            if head >= 0 {
                self.slot_mut(head as usize).previous = index as i32;
            }
            self.set_bucket(bucket, index as i32);
        }
        self.version += 1;
    }

    /// Adds the chain steps of one insert to the collision count and grows
    /// early when that insert alone walked a degenerate chain.
    fn record_collisions(&mut self, steps: usize) {
        self.collisions += steps;

        let len = self.len();
        if steps > COLLISION_WALK_LIMIT
            && len * 2 >= self.size
            && self.size < primes::MAX_PRIME_LENGTH
        {
            log::debug!(
                "insert walked {} chain entries ({} live); growing before the table fills",
                steps,
                len
            );
            self.resize(primes::expand_prime(self.size));
        }
    }

    fn insert_new(&mut self, hash: u32, steps: usize, key: K, value: V) -> usize {
        let (index, recycled) = self.claim_slot();
        let stale = if recycled {
            // SAFETY: A recyclable slot still holds its old value.
            Some(unsafe { core::ptr::replace(self.values.as_mut_ptr().add(index), value) })
        } else {
            // SAFETY: `index` is a claimed slot below `size`.
            unsafe { self.values.as_mut_ptr().add(index).write(value) };
            None
        };
        self.link_new(index, hash, key);
        self.record_collisions(steps);
        drop(stale);
        index
    }

    /// Unlinks the live entry at `index` from its chain.
    ///
    /// # Safety
    ///
    /// `index` must be live.
    unsafe fn unlink(&mut self, index: usize) {
        // SAFETY: Caller guarantees `index` is live; its links point at live
        // slots or terminate.
        unsafe {
            let (hash, previous, next) = {
                let entry = self.slot(index);
                (entry.hash, entry.previous, entry.next)
            };

            if previous >= 0 {
                self.slot_mut(previous as usize).next = next;
            } else {
                let bucket = self.bucket_for(hash);
                debug_assert_eq!(self.bucket(bucket), index as i32);
                self.set_bucket(bucket, next);
            }

            if next >= 0 {
                self.slot_mut(next as usize).previous = previous;
            }
        }
    }

    /// Pushes the already-unlinked slot at `index` onto the free list.
    ///
    /// # Safety
    ///
    /// `index < high_water`, and the slot's key has been moved out.
    unsafe fn push_free(&mut self, index: usize, recyclable: bool) {
        let free_list = self.free_list;
        // SAFETY: Caller guarantees `index < high_water`.
        let entry = unsafe { self.slot_mut(index) };
        entry.previous = END_OF_CHAIN;
        entry.next = FREE_LIST_START - free_list;
        entry.recyclable = recyclable;
        self.free_list = index as i32;
        self.free_count += 1;
        self.version += 1;
    }

    /// # Safety
    ///
    /// `index` must be live.
    unsafe fn remove_live(&mut self, index: usize) -> (K, V) {
        // SAFETY: Caller guarantees `index` is live. The key and value are
        // moved out before the slot joins the free list.
        unsafe {
            self.unlink(index);
            let key = self.slot(index).key.assume_init_read();
            let value = self.values.as_ptr().add(index).read();
            self.push_free(index, false);
            (key, value)
        }
    }

    /// Removes the entry matching `hash` and `eq`, returning its former
    /// direct index, key and value.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(usize, K, V)> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns live slots.
        let (key, value) = unsafe { self.remove_live(index) };
        Some((index, key, value))
    }

    /// Removes the live entry at direct index `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<(K, V)> {
        if !self.is_live(index) {
            return None;
        }
        // SAFETY: Checked live above.
        Some(unsafe { self.remove_live(index) })
    }

    /// Removes the entry matching `hash` and `eq` but keeps its value in the
    /// vacated slot, where the next [`VacantEntry::recycle_or_insert_with`]
    /// can pick it up. Returns the vacated index.
    ///
    /// The key is dropped. The kept value is dropped whenever the slot is
    /// reused by a plain insert, or when the table is cleared, compacted or
    /// dropped.
    pub fn remove_recycling(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<usize> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns live slots. The key is moved out
        // before the slot becomes free and dropped last.
        let key = unsafe {
            self.unlink(index);
            let key = self.slot(index).key.assume_init_read();
            self.push_free(index, true);
            key
        };
        drop(key);
        Some(index)
    }

    /// Removes every entry for which `f` returns `false`. Surviving entries
    /// keep their direct indices.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        // Removal only pushes onto the free list, so the high-water mark is
        // fixed for the whole walk.
        for index in 0..self.high_water {
            let keep = match self.get_direct_mut(index) {
                Some((key, value)) => f(key, value),
                None => continue,
            };
            if !keep {
                // SAFETY: `get_direct_mut` just confirmed the slot is live.
                drop(unsafe { self.remove_live(index) });
            }
        }
    }

    /// Returns the key and value at direct index `index`, if it is live.
    pub fn get_direct(&self, index: usize) -> Option<(&K, &V)> {
        if !self.is_live(index) {
            return None;
        }
        // SAFETY: Checked live above.
        unsafe { Some((self.slot(index).key.assume_init_ref(), self.value(index))) }
    }

    /// Returns the key and a mutable value reference at direct index `index`,
    /// if it is live.
    pub fn get_direct_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        if !self.is_live(index) {
            return None;
        }
        Some(self.split_live_mut(index))
    }

    /// Returns the value at direct index `index` without any check.
    ///
    /// # Safety
    ///
    /// `index` must have been obtained from this table, and the entry must not
    /// have been removed since, nor the table cleared or compacted.
    #[inline(always)]
    pub unsafe fn get_direct_value_unchecked(&self, index: usize) -> &V {
        debug_assert!(self.is_live(index));
        // SAFETY: Caller guarantees the slot is live.
        unsafe { self.value(index) }
    }

    /// Mutable variant of [`get_direct_value_unchecked`].
    ///
    /// # Safety
    ///
    /// Same contract as [`get_direct_value_unchecked`].
    ///
    /// [`get_direct_value_unchecked`]: HashTable::get_direct_value_unchecked
    #[inline(always)]
    pub unsafe fn get_direct_value_unchecked_mut(&mut self, index: usize) -> &mut V {
        debug_assert!(self.is_live(index));
        // SAFETY: Caller guarantees the slot is live.
        unsafe { self.value_mut(index) }
    }

    /// Grows the table, if needed, so it holds `capacity` entries without
    /// growing again. Rehashes at most once. Returns the new capacity.
    ///
    /// Only a degenerate chain, where a single insert walks past more than a
    /// hundred entries, can still grow a table that stays within the reserved
    /// capacity.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        if capacity > primes::MAX_PRIME_LENGTH {
            return Err(Error::OutOfRange {
                name: "capacity",
                value: capacity,
                limit: primes::MAX_PRIME_LENGTH,
            });
        }

        if self.size >= capacity {
            return Ok(self.size);
        }

        if self.size == 0 {
            self.initialize(capacity);
        } else {
            self.resize(primes::get_prime(capacity));
        }

        Ok(self.size)
    }

    /// Grows the table, if needed, so `additional` more entries fit without
    /// growing again. Returns the new capacity.
    pub fn increase_capacity_by(&mut self, additional: usize) -> Result<usize> {
        let limit = primes::MAX_PRIME_LENGTH - self.len();
        if additional > limit {
            return Err(Error::OutOfRange {
                name: "additional",
                value: additional,
                limit,
            });
        }
        self.ensure_capacity(self.len() + additional)
    }

    /// Rehashes into `new_size` buckets. Slots keep their indices, so the
    /// free list and every direct index survive.
    fn resize(&mut self, new_size: usize) {
        debug_assert!(new_size >= self.high_water);
        debug_assert!(new_size <= primes::MAX_PRIME_LENGTH);
        log::trace!(
            "rehashing table: {} -> {} buckets ({} live entries)",
            self.size,
            new_size,
            self.len()
        );

        let mut buckets = rent_buckets(&self.pool, new_size);
        let mut entries = rent_entries::<K, P>(&self.pool, new_size);
        let mut values = RentedArray::<V>::rent(&self.pool, new_size);
        let multiplier = primes::fast_mod_multiplier(new_size as u32);

        // SAFETY: Both arrays hold at least `high_water` slots and do not
        // overlap. Values are copied bytewise regardless of initialization;
        // the old arrays are treated as uninitialized afterwards.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.entries.as_ptr(),
                entries.as_mut_ptr(),
                self.high_water,
            );
            core::ptr::copy_nonoverlapping(
                self.values.as_ptr(),
                values.as_mut_ptr(),
                self.high_water,
            );

            let entries_ptr = entries.as_mut_ptr();
            let buckets_ptr = buckets.as_mut_ptr();
            for index in 0..self.high_water {
                let entry = entries_ptr.add(index);
                if (*entry).next < END_OF_CHAIN {
                    continue;
                }

                let bucket =
                    primes::fast_mod((*entry).hash, new_size as u32, multiplier) as usize;
                let head = *buckets_ptr.add(bucket);
                (*entry).previous = END_OF_CHAIN;
                (*entry).next = head;
                if head >= 0 {
                    (*entries_ptr.add(head as usize)).previous = index as i32;
                }
                *buckets_ptr.add(bucket) = index as i32;
            }
        }

        let old_buckets = core::mem::replace(&mut self.buckets, buckets);
        let old_entries = core::mem::replace(&mut self.entries, entries);
        let old_values = core::mem::replace(&mut self.values, values);
        self.size = new_size;
        self.fast_mod_multiplier = multiplier;
        self.collisions = 0;
        self.version += 1;

        old_buckets.return_to(&self.pool);
        old_entries.return_to(&self.pool);
        old_values.return_to(&self.pool);
    }

    /// Drops keys of live slots and values of live or recyclable slots in
    /// `range`.
    ///
    /// # Safety
    ///
    /// Every slot in `range` must be an initialized entry, and the table must
    /// no longer treat those slots as holding anything.
    unsafe fn drop_elements(&mut self, range: core::ops::Range<usize>) {
        if !core::mem::needs_drop::<K>() && !core::mem::needs_drop::<V>() {
            return;
        }

        let entries = self.entries.as_mut_ptr();
        let values = self.values.as_mut_ptr();
        for index in range {
            // SAFETY: Caller guarantees the slots are initialized entries
            // that nothing else will read again.
            unsafe {
                let entry = &mut *entries.add(index);
                if entry.is_occupied() {
                    entry.key.assume_init_drop();
                    values.add(index).drop_in_place();
                } else if core::mem::replace(&mut entry.recyclable, false) {
                    values.add(index).drop_in_place();
                }
            }
        }
    }

    /// Drops every value kept for recycling.
    fn drop_recycled_values(&mut self) {
        if !core::mem::needs_drop::<V>() {
            for index in 0..self.high_water {
                // SAFETY: `index < high_water`.
                unsafe { self.slot_mut(index).recyclable = false };
            }
            return;
        }

        for index in 0..self.high_water {
            // SAFETY: `index < high_water`; the flag is cleared before the
            // value is dropped so a panicking drop cannot cause a double drop.
            unsafe {
                let entry = self.slot_mut(index);
                if !entry.is_occupied() && core::mem::replace(&mut entry.recyclable, false) {
                    self.values.as_mut_ptr().add(index).drop_in_place();
                }
            }
        }
    }

    /// Resets links and counters to the empty state without touching slot
    /// contents. Returns the previous high-water mark.
    fn reset(&mut self) -> usize {
        if self.size > 0 {
            // SAFETY: Buckets `0..size` are initialized.
            unsafe { self.buckets.assume_init_prefix_mut(self.size) }.fill(END_OF_CHAIN);
        }
        let high_water = core::mem::replace(&mut self.high_water, 0);
        self.free_list = END_OF_CHAIN;
        self.free_count = 0;
        self.collisions = 0;
        self.version += 1;
        high_water
    }

    /// Removes every entry, keeping the rented arrays.
    pub fn clear(&mut self) {
        let high_water = self.reset();
        // SAFETY: `reset` detached the old prefix from the table.
        unsafe { self.drop_elements(0..high_water) };
    }

    /// Compacts live entries to the front and shrinks the arrays to the
    /// smallest prime that fits them. An empty table gives its arrays back to
    /// the pool.
    ///
    /// Compaction renumbers entries: every direct index obtained before this
    /// call is invalid afterwards.
    pub fn trim_excess(&mut self) {
        self.drop_recycled_values();

        let len = self.len();
        if len == 0 {
            self.reset();
            self.size = 0;
            self.fast_mod_multiplier = 0;
            let buckets = core::mem::replace(&mut self.buckets, RentedArray::empty());
            let entries = core::mem::replace(&mut self.entries, RentedArray::empty());
            let values = core::mem::replace(&mut self.values, RentedArray::empty());
            buckets.return_to(&self.pool);
            entries.return_to(&self.pool);
            values.return_to(&self.pool);
            return;
        }

        let new_size = primes::get_prime(len);
        if new_size >= self.size && self.free_count == 0 {
            return;
        }
        let new_size = new_size.min(self.size);
        log::debug!(
            "compacting table: {} -> {} buckets, {} live of {} slots",
            self.size,
            new_size,
            len,
            self.high_water
        );

        let mut buckets = rent_buckets(&self.pool, new_size);
        let mut entries = rent_entries::<K, P>(&self.pool, new_size);
        let mut values = RentedArray::<V>::rent(&self.pool, new_size);
        let multiplier = primes::fast_mod_multiplier(new_size as u32);

        let mut next_index = 0;
        // SAFETY: Source slots below `high_water` are initialized; live ones
        // are moved bitwise to distinct destination slots below `len`, which
        // fits in `new_size`.
        unsafe {
            let entries_ptr = entries.as_mut_ptr();
            let values_ptr = values.as_mut_ptr();
            let buckets_ptr = buckets.as_mut_ptr();
            for index in 0..self.high_water {
                let source = self.entries.as_ptr().add(index);
                if !(*source).is_occupied() {
                    continue;
                }

                let hash = (*source).hash;
                let bucket = primes::fast_mod(hash, new_size as u32, multiplier) as usize;
                let head = *buckets_ptr.add(bucket);
                entries_ptr.add(next_index).write(ArrayEntry {
                    hash,
                    previous: END_OF_CHAIN,
                    next: head,
                    recyclable: false,
                    key: MaybeUninit::new((*source).key.assume_init_read()),
                });
                values_ptr
                    .add(next_index)
                    .write(self.values.as_ptr().add(index).read());
                if head >= 0 {
                    (*entries_ptr.add(head as usize)).previous = next_index as i32;
                }
                *buckets_ptr.add(bucket) = next_index as i32;
                next_index += 1;
            }
        }
        debug_assert_eq!(next_index, len);

        let old_buckets = core::mem::replace(&mut self.buckets, buckets);
        let old_entries = core::mem::replace(&mut self.entries, entries);
        let old_values = core::mem::replace(&mut self.values, values);
        self.size = new_size;
        self.fast_mod_multiplier = multiplier;
        self.high_water = len;
        self.free_list = END_OF_CHAIN;
        self.free_count = 0;
        self.collisions = 0;
        self.version += 1;

        old_buckets.return_to(&self.pool);
        old_entries.return_to(&self.pool);
        old_values.return_to(&self.pool);
    }

    /// Iterates live entries in slot order as `(index, key, value)`.
    pub fn iter(&self) -> Iter<'_, K, V> {
        // SAFETY: Slots `0..high_water` are initialized entries.
        let entries = unsafe { self.entries.assume_init_prefix(self.high_water) };
        Iter {
            inner: entries
                .iter()
                .zip(self.values.as_uninit_slice()[..self.high_water].iter())
                .enumerate(),
            remaining: self.len(),
        }
    }

    /// Iterates live entries in slot order as `(index, key, mutable value)`.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let remaining = self.len();
        let high_water = self.high_water;
        // SAFETY: Slots `0..high_water` are initialized entries. Keys and
        // values live in different arrays, so the borrows are disjoint.
        let entries = unsafe { self.entries.assume_init_prefix(high_water) };
        IterMut {
            inner: entries
                .iter()
                .zip(self.values.as_uninit_slice_mut()[..high_water].iter_mut())
                .enumerate(),
            remaining,
        }
    }

    /// Removes every entry, yielding owned keys and values. The arrays are
    /// kept. Entries not consumed are dropped with the iterator.
    pub fn drain(&mut self) -> Drain<'_, K, V, P> {
        let remaining = self.len();
        let end = self.reset();
        Drain {
            table: self,
            index: 0,
            end,
            remaining,
        }
    }

    /// Starts a detached enumeration. See [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        Cursor {
            next: 0,
            version: self.version,
        }
    }

    /// Advances `cursor` to the next live entry.
    ///
    /// Fails with [`Error::Invalidated`] if the table was structurally
    /// modified after the cursor was created.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(usize, &K, &V)>> {
        if cursor.version != self.version {
            return Err(Error::Invalidated);
        }

        while cursor.next < self.high_water {
            let index = cursor.next;
            cursor.next += 1;
            if let Some((key, value)) = self.get_direct(index) {
                return Ok(Some((index, key, value)));
            }
        }

        Ok(None)
    }

    /// Computes a histogram of chain lengths: element `n` counts the buckets
    /// whose chain holds exactly `n` entries.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn chain_length_histogram(&self) -> Vec<usize> {
        let mut histogram = alloc::vec![0usize; 1];
        for bucket in 0..self.size {
            let mut length = 0;
            // SAFETY: `bucket < size`; chain links point at live slots.
            unsafe {
                let mut index = self.bucket(bucket);
                while index >= 0 {
                    length += 1;
                    index = self.slot(index as usize).next;
                }
            }
            if histogram.len() <= length {
                histogram.resize(length + 1, 0);
            }
            histogram[length] += 1;
        }
        histogram
    }

    /// Returns detailed utilization statistics.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        let histogram = self.chain_length_histogram();
        let used_buckets = histogram.iter().skip(1).sum();
        DebugStats {
            len: self.len(),
            capacity: self.size,
            high_water: self.high_water,
            free_count: self.free_count,
            collisions: self.collisions,
            used_buckets,
            longest_chain: histogram.len() - 1,
            load_factor: if self.size == 0 {
                0.0
            } else {
                self.len() as f64 / self.size as f64
            },
            total_bytes: self.buckets.len() * core::mem::size_of::<i32>()
                + self.entries.len() * core::mem::size_of::<ArrayEntry<K>>()
                + self.values.len() * core::mem::size_of::<V>(),
        }
    }
}

/// Entries hold keys, so the pool wipes them on return whenever keys own
/// resources, even though `ArrayEntry` itself has no drop glue.
fn rent_entries<K, P: ArrayPool>(pool: &P, size: usize) -> RentedArray<ArrayEntry<K>> {
    RentedArray::rent(pool, size).with_clear_on_return(core::mem::needs_drop::<K>())
}

fn rent_buckets<P: ArrayPool>(pool: &P, size: usize) -> RentedArray<i32> {
    let mut buckets = RentedArray::rent(pool, size);
    for slot in buckets.as_uninit_slice_mut()[..size].iter_mut() {
        slot.write(END_OF_CHAIN);
    }
    buckets
}

/// A detached enumeration position.
///
/// Unlike [`Iter`], a cursor does not borrow the table, so the table may be
/// modified between steps. Any structural modification invalidates the
/// cursor: the next [`HashTable::advance`] reports [`Error::Invalidated`]
/// and the enumeration must restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    next: usize,
    version: u64,
}

impl Cursor {
    /// The table version this cursor was created against.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// A view into a single entry in the table, which may be vacant or occupied.
///
/// Constructed by [`HashTable::entry`].
pub enum Entry<'a, K, V, P: ArrayPool> {
    /// No entry matched.
    Vacant(VacantEntry<'a, K, V, P>),
    /// An entry matched.
    Occupied(OccupiedEntry<'a, K, V, P>),
}

impl<'a, K, V, P: ArrayPool> Entry<'a, K, V, P> {
    /// Direct index of the matched entry, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Entry::Occupied(entry) => Some(entry.index),
            Entry::Vacant(_) => None,
        }
    }
}

/// A vacant entry. Inserting through it may grow the table; the key given
/// must hash and compare consistently with the lookup that produced it.
pub struct VacantEntry<'a, K, V, P: ArrayPool> {
    table: &'a mut HashTable<K, V, P>,
    hash: u32,
    steps: usize,
}

impl<'a, K, V, P: ArrayPool> VacantEntry<'a, K, V, P> {
    /// Inserts `key` and `value`, returning a reference to the stored value.
    pub fn insert(self, key: K, value: V) -> &'a mut V {
        self.insert_indexed(key, value).1
    }

    /// Inserts `key` and `value`, returning the new direct index and a
    /// reference to the stored value.
    pub fn insert_indexed(self, key: K, value: V) -> (usize, &'a mut V) {
        let table = self.table;
        let index = table.insert_new(self.hash, self.steps, key, value);
        // SAFETY: `index` was just filled.
        (index, unsafe { table.value_mut(index) })
    }

    /// Inserts `key`, reusing a value left behind by
    /// [`HashTable::remove_recycling`] when the next free slot holds one, and
    /// calling `create` otherwise.
    ///
    /// A recycled value is returned as it was left; the caller is expected to
    /// reset it.
    pub fn recycle_or_insert_with(
        self,
        key: K,
        create: impl FnOnce() -> V,
    ) -> (usize, &'a mut V, SlotOrigin) {
        let table = self.table;
        let recyclable = table.free_count > 0
            // SAFETY: A non-empty free list has a head below `high_water`.
            && unsafe { table.slot(table.free_list as usize) }.is_recyclable();

        if !recyclable {
            let value = create();
            let index = table.insert_new(self.hash, self.steps, key, value);
            // SAFETY: `index` was just filled.
            return (index, unsafe { table.value_mut(index) }, SlotOrigin::Created);
        }

        let (index, recycled) = table.claim_slot();
        debug_assert!(recycled);
        table.link_new(index, self.hash, key);
        table.record_collisions(self.steps);
        // SAFETY: The recycled value was left initialized in the slot.
        (index, unsafe { table.value_mut(index) }, SlotOrigin::Recycled)
    }
}

/// An occupied entry.
pub struct OccupiedEntry<'a, K, V, P: ArrayPool> {
    table: &'a mut HashTable<K, V, P>,
    index: usize,
}

impl<'a, K, V, P: ArrayPool> OccupiedEntry<'a, K, V, P> {
    /// Direct index of the entry.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The stored key.
    pub fn key(&self) -> &K {
        // SAFETY: Occupied entries always point at live slots.
        unsafe { self.table.slot(self.index).key.assume_init_ref() }
    }

    /// The stored value.
    pub fn get(&self) -> &V {
        // SAFETY: Occupied entries always point at live slots.
        unsafe { self.table.value(self.index) }
    }

    /// The stored value, mutably.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: Occupied entries always point at live slots.
        unsafe { self.table.value_mut(self.index) }
    }

    /// Converts into a mutable reference bound to the table borrow.
    pub fn into_mut(self) -> &'a mut V {
        let table = self.table;
        // SAFETY: Occupied entries always point at live slots.
        unsafe { table.value_mut(self.index) }
    }

    /// Removes the entry, returning its key and value.
    pub fn remove(self) -> (K, V) {
        // SAFETY: Occupied entries always point at live slots.
        unsafe { self.table.remove_live(self.index) }
    }
}

/// Iterator over live entries, created by [`HashTable::iter`].
pub struct Iter<'a, K, V> {
    inner: core::iter::Enumerate<
        core::iter::Zip<
            core::slice::Iter<'a, ArrayEntry<K>>,
            core::slice::Iter<'a, MaybeUninit<V>>,
        >,
    >,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (usize, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for (index, (entry, value)) in self.inner.by_ref() {
            if entry.is_occupied() {
                self.remaining -= 1;
                // SAFETY: Live slots hold an initialized key and value.
                return Some(unsafe {
                    (index, entry.key.assume_init_ref(), value.assume_init_ref())
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Mutable iterator over live entries, created by [`HashTable::iter_mut`].
pub struct IterMut<'a, K, V> {
    inner: core::iter::Enumerate<
        core::iter::Zip<
            core::slice::Iter<'a, ArrayEntry<K>>,
            core::slice::IterMut<'a, MaybeUninit<V>>,
        >,
    >,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (usize, &'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        for (index, (entry, value)) in self.inner.by_ref() {
            if entry.is_occupied() {
                self.remaining -= 1;
                // SAFETY: Live slots hold an initialized key and value.
                return Some(unsafe {
                    (index, entry.key.assume_init_ref(), value.assume_init_mut())
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// Draining iterator, created by [`HashTable::drain`].
///
/// The table is already empty when this is created; the iterator only owns
/// the detached slots `index..end`.
pub struct Drain<'a, K, V, P: ArrayPool> {
    table: &'a mut HashTable<K, V, P>,
    index: usize,
    end: usize,
    remaining: usize,
}

impl<K, V, P: ArrayPool> Iterator for Drain<'_, K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        take_detached(
            &mut self.table.entries,
            &mut self.table.values,
            &mut self.index,
            self.end,
            &mut self.remaining,
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, P: ArrayPool> ExactSizeIterator for Drain<'_, K, V, P> {}

impl<K, V, P: ArrayPool> Drop for Drain<'_, K, V, P> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

/// Owning iterator, created by `HashTable::into_iter`.
pub struct IntoIter<K, V, P: ArrayPool = DefaultPool> {
    table: HashTable<K, V, P>,
    index: usize,
    end: usize,
    remaining: usize,
}

impl<K, V, P: ArrayPool> Iterator for IntoIter<K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        take_detached(
            &mut self.table.entries,
            &mut self.table.values,
            &mut self.index,
            self.end,
            &mut self.remaining,
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, P: ArrayPool> ExactSizeIterator for IntoIter<K, V, P> {}

impl<K, V, P: ArrayPool> Drop for IntoIter<K, V, P> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

impl<K, V, P: ArrayPool> IntoIterator for HashTable<K, V, P> {
    type IntoIter = IntoIter<K, V, P>;
    type Item = (K, V);

    fn into_iter(mut self) -> Self::IntoIter {
        let remaining = self.len();
        let end = self.reset();
        IntoIter {
            table: self,
            index: 0,
            end,
            remaining,
        }
    }
}

impl<'a, K, V, P: ArrayPool> IntoIterator for &'a HashTable<K, V, P> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (usize, &'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Moves the next live entry out of detached slots `*index..end`, dropping
/// any recycled value passed on the way.
pub(crate) fn take_detached<K, V>(
    entries: &mut RentedArray<ArrayEntry<K>>,
    values: &mut RentedArray<V>,
    index: &mut usize,
    end: usize,
    remaining: &mut usize,
) -> Option<(K, V)> {
    while *index < end {
        let current = *index;
        *index += 1;
        // SAFETY: Detached slots below `end` are initialized entries that the
        // table no longer reads; each is visited exactly once.
        unsafe {
            let entry = &mut *entries.as_mut_ptr().add(current);
            if entry.is_occupied() {
                *remaining -= 1;
                let key = entry.key.assume_init_read();
                let value = values.as_ptr().add(current).read();
                return Some((key, value));
            }
            if core::mem::replace(&mut entry.recyclable, false) {
                values.as_mut_ptr().add(current).drop_in_place();
            }
        }
    }
    None
}

impl<K, V, P: ArrayPool> HashTable<K, V, P> {
    pub(crate) fn raw_buckets(&self) -> &[i32] {
        // SAFETY: Buckets `0..size` are initialized.
        unsafe { self.buckets.assume_init_prefix(self.size) }
    }

    pub(crate) fn raw_entries(&self) -> &[ArrayEntry<K>] {
        // SAFETY: Slots `0..high_water` are initialized entries.
        unsafe { self.entries.assume_init_prefix(self.high_water) }
    }

    pub(crate) fn raw_values(&self) -> &[MaybeUninit<V>] {
        &self.values.as_uninit_slice()[..self.high_water]
    }

    pub(crate) fn high_water(&self) -> usize {
        self.high_water
    }

    pub(crate) fn free_list_head(&self) -> i32 {
        self.free_list
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free_count
    }

    pub(crate) fn collisions(&self) -> usize {
        self.collisions
    }

    pub(crate) fn fast_mod_multiplier(&self) -> u64 {
        self.fast_mod_multiplier
    }

    /// Moves the three arrays and the pool out, leaving nothing for `Drop`.
    pub(crate) fn into_raw_arrays(
        mut self,
    ) -> (
        RentedArray<i32>,
        RentedArray<ArrayEntry<K>>,
        RentedArray<V>,
        usize,
        usize,
        P,
    ) {
        let high_water = core::mem::replace(&mut self.high_water, 0);
        let size = core::mem::replace(&mut self.size, 0);
        let buckets = core::mem::replace(&mut self.buckets, RentedArray::empty());
        let entries = core::mem::replace(&mut self.entries, RentedArray::empty());
        let values = core::mem::replace(&mut self.values, RentedArray::empty());

        let this = core::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is never used or dropped again; the pool is read out
        // exactly once and the remaining fields own nothing.
        let pool = unsafe { core::ptr::read(&this.pool) };
        (buckets, entries, values, size, high_water, pool)
    }
}
