use core::fmt::Debug;
use core::ops::Index;

use crate::comparer::DefaultHashBuilder;
use crate::comparer::KeyComparer;
use crate::error::Error;
use crate::error::Result;
use crate::error::check_copy_bounds;
use crate::hash_table;
use crate::hash_table::Cursor;
use crate::hash_table::HashTable;
use crate::hash_table::SlotOrigin;
use crate::internals::TableInternals;
use crate::internals::TableParts;
use crate::pool::ArrayPool;
use crate::pool::DefaultPool;

/// A hash map over pool-rented arrays.
///
/// `HashMap<K, V, S, P>` stores key-value pairs in the chained
/// [`HashTable`], hashing and comparing keys through `S` (any
/// [`BuildHasher`](core::hash::BuildHasher), or a custom [`KeyComparer`]) and
/// renting its arrays from `P`.
///
/// Every entry has a *direct index* that survives growth. Indices returned by
/// [`try_add`](Self::try_add), [`get_index`](Self::get_index) and friends can
/// be passed to [`get_direct`](Self::get_direct) until that entry is removed
/// or the map is cleared or trimmed.
///
/// # Performance Characteristics
///
/// - **Memory**: 16 bytes of bookkeeping per slot (hash, two links, flags) plus
///   `K` and `V`, and 4 bytes per bucket
/// - **Removal**: O(1) unlink through the doubly linked chain
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder, P: ArrayPool = DefaultPool> {
    table: HashTable<K, V, P>,
    hash_builder: S,
}

impl<K, V, S, P> Debug for HashMap<K, V, S, P>
where
    K: Debug,
    V: Debug,
    P: ArrayPool,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V> HashMap<K, V, DefaultHashBuilder, DefaultPool> {
    /// Creates an empty map with the default hasher and pool.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::HashMap;
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates an empty map that holds `capacity` entries before growing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S> HashMap<K, V, S, DefaultPool> {
    /// Creates a new hash map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasherDefault;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use pooled_hash::HashMap;
    /// #
    /// let map: HashMap<i32, String, _> =
    ///     HashMap::with_hasher(BuildHasherDefault::<SipHasher>::default());
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_hasher_in(hash_builder, DefaultPool::default())
    }

    /// Creates a new hash map with the specified capacity and hasher builder.
    ///
    /// The actual capacity is the next prime at or above the request.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, DefaultPool::default())
    }
}

impl<K, V, S, P: ArrayPool> HashMap<K, V, S, P> {
    /// Creates an empty map renting its arrays from `pool`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use std::rc::Rc;
    /// # use pooled_hash::HashMap;
    /// # use pooled_hash::RecyclingPool;
    /// # use foldhash::fast::RandomState;
    /// let pool = Rc::new(RecyclingPool::new());
    /// let mut a = HashMap::with_hasher_in(RandomState::default(), pool.clone());
    /// a.insert(1, "one");
    /// drop(a);
    ///
    /// // The second map picks up the arrays the first one returned.
    /// assert!(pool.retained_count() > 0);
    /// let mut b = HashMap::with_hasher_in(RandomState::default(), pool.clone());
    /// b.insert(2, "two");
    /// ```
    pub fn with_hasher_in(hash_builder: S, pool: P) -> Self {
        Self {
            table: HashTable::new_in(pool),
            hash_builder,
        }
    }

    /// Creates an empty map renting from `pool` that holds `capacity` entries
    /// before growing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: S, pool: P) -> Self {
        Self {
            table: HashTable::with_capacity_in(capacity, pool),
            hash_builder,
        }
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of elements the map can hold before it grows.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Structural modification counter; see [`HashTable::version`].
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns a reference to the map's pool.
    pub fn pool(&self) -> &P {
        self.table.pool()
    }

    /// Removes all elements from the map.
    ///
    /// This operation preserves the map's rented arrays.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Compacts the map and shrinks it to fit its elements. Invalidates every
    /// direct index.
    pub fn trim_excess(&mut self) {
        self.table.trim_excess();
    }

    /// Grows the map, rehashing at most once, so it holds `capacity` elements
    /// without growing again. Returns the new capacity.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.table.ensure_capacity(capacity)
    }

    /// Grows the map so `additional` more elements fit without growing again.
    /// Returns the new capacity.
    pub fn increase_capacity_by(&mut self, additional: usize) -> Result<usize> {
        self.table.increase_capacity_by(additional)
    }

    /// Returns the key and value at direct index `index`, if it is live.
    pub fn get_direct(&self, index: usize) -> Option<(&K, &V)> {
        self.table.get_direct(index)
    }

    /// Returns the key and a mutable value at direct index `index`, if it is
    /// live.
    pub fn get_direct_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        self.table.get_direct_mut(index)
    }

    /// Returns the value at direct index `index` without checking it.
    ///
    /// # Safety
    ///
    /// `index` must come from this map, and the entry must not have been
    /// removed since, nor the map cleared or trimmed.
    pub unsafe fn get_direct_value_unchecked(&self, index: usize) -> &V {
        // SAFETY: Forwarded caller contract.
        unsafe { self.table.get_direct_value_unchecked(index) }
    }

    /// Mutable variant of
    /// [`get_direct_value_unchecked`](Self::get_direct_value_unchecked).
    ///
    /// # Safety
    ///
    /// Same contract as `get_direct_value_unchecked`.
    pub unsafe fn get_direct_value_unchecked_mut(&mut self, index: usize) -> &mut V {
        // SAFETY: Forwarded caller contract.
        unsafe { self.table.get_direct_value_unchecked_mut(index) }
    }

    /// Removes the element at direct index `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<(K, V)> {
        self.table.remove_at(index)
    }

    /// Retains only the pairs for which `f` returns `true`. Survivors keep
    /// their direct indices.
    pub fn retain(&mut self, f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(f);
    }

    /// Returns an iterator over the key-value pairs of the map, in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::HashMap;
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let mut pairs: Vec<_> = map.iter().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, vec![(&1, &"a"), (&2, &"b")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the pairs with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes every pair, yielding them. The rented arrays are kept.
    pub fn drain(&mut self) -> Drain<'_, K, V, P> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Starts a detached enumeration that does not borrow the map.
    pub fn cursor(&self) -> Cursor {
        self.table.cursor()
    }

    /// Advances `cursor`, failing with [`Error::Invalidated`] if the map was
    /// structurally modified since the cursor was created.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::Error;
    /// # use pooled_hash::HashMap;
    /// let mut map = HashMap::new();
    /// map.insert("a", 1);
    /// map.insert("b", 2);
    ///
    /// let mut cursor = map.cursor();
    /// assert!(map.advance(&mut cursor).unwrap().is_some());
    ///
    /// map.remove(&"a");
    /// assert_eq!(map.advance(&mut cursor), Err(Error::Invalidated));
    /// ```
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(&K, &V)>> {
        Ok(self.table.advance(cursor)?.map(|(_, k, v)| (k, v)))
    }

    /// Clones every pair into `dest` starting at `index`.
    ///
    /// Fails without writing anything if `index` is past the end of `dest` or
    /// the remaining room is smaller than [`len`](Self::len).
    pub fn copy_to(&self, dest: &mut [(K, V)], index: usize) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        check_copy_bounds(dest.len(), index, self.len())?;
        for (slot, (k, v)) in dest[index..].iter_mut().zip(self.iter()) {
            *slot = (k.clone(), v.clone());
        }
        Ok(())
    }

    /// Borrows the map's backing arrays.
    pub fn internals(&self) -> TableInternals<'_, K, V, P> {
        self.table.internals()
    }

    /// Moves the backing arrays out of the map.
    pub fn into_parts(self) -> TableParts<K, V, P> {
        self.table.into_parts()
    }

    /// Drops every element and returns the arrays to the pool.
    pub fn dispose(self) {
        self.table.dispose();
    }

    /// Chain-length histogram of the underlying table.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn chain_length_histogram(&self) -> alloc::vec::Vec<usize> {
        self.table.chain_length_histogram()
    }

    /// Utilization statistics of the underlying table.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> hash_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<K, V, S, P> HashMap<K, V, S, P>
where
    S: KeyComparer<K>,
    P: ArrayPool,
{
    /// Inserts a key-value pair, overwriting the value of an existing key.
    ///
    /// Returns the previous value, if any. Overwriting does not change the
    /// key, the direct index or the version.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::HashMap;
    /// let mut map = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map[&37], "b");
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_builder.hash_key(&key);
        match self
            .table
            .entry(hash, |k| self.hash_builder.keys_equal(k, &key))
        {
            hash_table::Entry::Occupied(mut entry) => {
                Some(core::mem::replace(entry.get_mut(), value))
            }
            hash_table::Entry::Vacant(entry) => {
                entry.insert(key, value);
                None
            }
        }
    }

    /// Inserts a new key-value pair, returning its direct index.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already present; the
    /// map is left untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::Error;
    /// # use pooled_hash::HashMap;
    /// let mut map = HashMap::new();
    /// let index = map.add("k", 1).unwrap();
    /// assert_eq!(map.get_direct(index), Some((&"k", &1)));
    ///
    /// assert!(matches!(map.add("k", 2), Err(Error::DuplicateKey { .. })));
    /// assert_eq!(map[&"k"], 1);
    /// ```
    pub fn add(&mut self, key: K, value: V) -> Result<usize>
    where
        K: Debug,
    {
        let hash = self.hash_builder.hash_key(&key);
        match self
            .table
            .entry(hash, |k| self.hash_builder.keys_equal(k, &key))
        {
            hash_table::Entry::Occupied(_) => Err(Error::duplicate_key(&key)),
            hash_table::Entry::Vacant(entry) => Ok(entry.insert_indexed(key, value).0),
        }
    }

    /// Inserts a new key-value pair unless the key is present.
    ///
    /// Returns the direct index of the new or existing entry and whether the
    /// pair was inserted. An existing entry is not modified.
    pub fn try_add(&mut self, key: K, value: V) -> (usize, bool) {
        let hash = self.hash_builder.hash_key(&key);
        match self
            .table
            .entry(hash, |k| self.hash_builder.keys_equal(k, &key))
        {
            hash_table::Entry::Occupied(entry) => (entry.index(), false),
            hash_table::Entry::Vacant(entry) => (entry.insert_indexed(key, value).0, true),
        }
    }

    #[inline]
    fn find_index(&self, key: &K) -> Option<usize> {
        let hash = self.hash_builder.hash_key(key);
        self.table
            .find_index(hash, |k| self.hash_builder.keys_equal(k, key))
    }

    /// Returns a reference to the value corresponding to the key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value corresponding to the key.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let hash = self.hash_builder.hash_key(key);
        self.table
            .find(hash, |k| self.hash_builder.keys_equal(k, key))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_builder.hash_key(key);
        let hash_builder = &self.hash_builder;
        self.table
            .find_mut(hash, |k| hash_builder.keys_equal(k, key))
            .map(|(_, v)| v)
    }

    /// Returns the value corresponding to the key, or
    /// [`Error::KeyNotFound`].
    pub fn get_checked(&self, key: &K) -> Result<&V>
    where
        K: Debug,
    {
        self.get(key).ok_or_else(|| Error::key_not_found(key))
    }

    /// Returns `true` if the map contains the key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_index(key).is_some()
    }

    /// Returns the direct index of the key, or [`Error::KeyNotFound`].
    pub fn get_index(&self, key: &K) -> Result<usize>
    where
        K: Debug,
    {
        self.find_index(key).ok_or_else(|| Error::key_not_found(key))
    }

    /// Returns the direct index of the key, if present.
    pub fn try_find_index(&self, key: &K) -> Option<usize> {
        self.find_index(key)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes a key, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_builder.hash_key(key);
        let hash_builder = &self.hash_builder;
        self.table
            .remove(hash, |k| hash_builder.keys_equal(k, key))
            .map(|(_, k, v)| (k, v))
    }

    /// Removes a key, returning its value, or fails with
    /// [`Error::KeyNotFound`].
    pub fn remove_checked(&mut self, key: &K) -> Result<V>
    where
        K: Debug,
    {
        self.remove(key).ok_or_else(|| Error::key_not_found(key))
    }

    /// Returns the value for `key`, inserting the result of `f` first if the
    /// key is absent. Also returns the entry's direct index.
    ///
    /// `f` runs before the map grows, so the returned reference always points
    /// into the final arrays.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::HashMap;
    /// let mut counts: HashMap<&str, u32> = HashMap::new();
    /// for word in ["a", "b", "a"] {
    ///     *counts.get_or_insert_with(word, || 0).1 += 1;
    /// }
    /// assert_eq!(counts[&"a"], 2);
    /// ```
    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> (usize, &mut V) {
        match self.entry(key) {
            Entry::Occupied(entry) => {
                let index = entry.index();
                (index, entry.into_mut())
            }
            Entry::Vacant(entry) => entry.insert_indexed(f()),
        }
    }

    /// [`get_or_insert_with`](Self::get_or_insert_with) using
    /// `V::default()`.
    pub fn get_or_insert_default(&mut self, key: K) -> (usize, &mut V)
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Removes a key but keeps its value in the vacated slot for a later
    /// [`recycle_or_insert_with`](Self::recycle_or_insert_with). Returns the
    /// vacated index.
    pub fn remove_recycling(&mut self, key: &K) -> Option<usize> {
        let hash = self.hash_builder.hash_key(key);
        let hash_builder = &self.hash_builder;
        self.table
            .remove_recycling(hash, |k| hash_builder.keys_equal(k, key))
    }

    /// Returns the value for `key`, inserting one if absent: a value left by
    /// [`remove_recycling`](Self::remove_recycling) is reused when the next
    /// free slot holds one, otherwise `create` builds a fresh one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::HashMap;
    /// # use pooled_hash::SlotOrigin;
    /// let mut buffers: HashMap<u32, Vec<u8>> = HashMap::new();
    /// buffers.insert(1, Vec::with_capacity(4096));
    /// buffers.remove_recycling(&1);
    ///
    /// let (_, buffer, origin) = buffers.recycle_or_insert_with(2, Vec::new);
    /// assert_eq!(origin, SlotOrigin::Recycled);
    /// assert!(buffer.capacity() >= 4096);
    /// ```
    pub fn recycle_or_insert_with(
        &mut self,
        key: K,
        create: impl FnOnce() -> V,
    ) -> (usize, &mut V, SlotOrigin) {
        let hash = self.hash_builder.hash_key(&key);
        match self
            .table
            .entry(hash, |k| self.hash_builder.keys_equal(k, &key))
        {
            hash_table::Entry::Occupied(entry) => {
                let index = entry.index();
                (index, entry.into_mut(), SlotOrigin::Existing)
            }
            hash_table::Entry::Vacant(entry) => entry.recycle_or_insert_with(key, create),
        }
    }

    /// Gets the given key's corresponding entry in the map for in-place
    /// manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pooled_hash::HashMap;
    /// let mut map = HashMap::new();
    /// map.entry("poneyland").or_insert(3);
    /// *map.entry("poneyland").or_insert(10) *= 2;
    /// assert_eq!(map[&"poneyland"], 6);
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, P> {
        let hash = self.hash_builder.hash_key(&key);
        match self
            .table
            .entry(hash, |k| self.hash_builder.keys_equal(k, &key))
        {
            hash_table::Entry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            hash_table::Entry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }
}

impl<K, V, S, P> Default for HashMap<K, V, S, P>
where
    S: Default,
    P: ArrayPool + Default,
{
    fn default() -> Self {
        Self::with_hasher_in(S::default(), P::default())
    }
}

impl<K, V, S, P> PartialEq for HashMap<K, V, S, P>
where
    V: PartialEq,
    S: KeyComparer<K>,
    P: ArrayPool,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, P> Eq for HashMap<K, V, S, P>
where
    V: Eq,
    S: KeyComparer<K>,
    P: ArrayPool,
{
}

impl<K, V, S, P> Index<&K> for HashMap<K, V, S, P>
where
    S: KeyComparer<K>,
    P: ArrayPool,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &K) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not present in map"),
        }
    }
}

impl<K, V, S, P> FromIterator<(K, V)> for HashMap<K, V, S, P>
where
    S: KeyComparer<K> + Default,
    P: ArrayPool + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S, P> Extend<(K, V)> for HashMap<K, V, S, P>
where
    S: KeyComparer<K>,
    P: ArrayPool,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        if let Err(e) = self.increase_capacity_by(lower) {
            log::debug!("not reserving for extend, growing as entries arrive: {e}");
        }
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S, P: ArrayPool> IntoIterator for HashMap<K, V, S, P> {
    type IntoIter = IntoIter<K, V, P>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, V, S, P: ArrayPool> IntoIterator for &'a HashMap<K, V, S, P> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, P: ArrayPool> IntoIterator for &'a mut HashMap<K, V, S, P> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, P: ArrayPool> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, P>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, P>),
}

impl<'a, K, V, P: ArrayPool> Entry<'a, K, V, P> {
    /// Inserts a default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }

    /// Direct index of an occupied entry.
    pub fn index(&self) -> Option<usize> {
        match self {
            Entry::Occupied(entry) => Some(entry.index()),
            Entry::Vacant(_) => None,
        }
    }
}

impl<'a, K, V, P> Entry<'a, K, V, P>
where
    V: Default,
    P: ArrayPool,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, P: ArrayPool> {
    entry: hash_table::VacantEntry<'a, K, V, P>,
    key: K,
}

impl<'a, K, V, P: ArrayPool> VacantEntry<'a, K, V, P> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        self.entry.insert(self.key, value)
    }

    /// Inserts the value, returning the new direct index along with the
    /// reference.
    pub fn insert_indexed(self, value: V) -> (usize, &'a mut V) {
        self.entry.insert_indexed(self.key, value)
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, P: ArrayPool> {
    entry: hash_table::OccupiedEntry<'a, K, V, P>,
}

impl<'a, K, V, P: ArrayPool> OccupiedEntry<'a, K, V, P> {
    /// Direct index of the entry.
    pub fn index(&self) -> usize {
        self.entry.index()
    }

    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        self.entry.key()
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        self.entry.get()
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        self.entry.get_mut()
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        self.entry.into_mut()
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.entry.get_mut(), value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V> {
    inner: hash_table::Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// An iterator over the key-value pairs of a `HashMap` with mutable values.
pub struct IterMut<'a, K, V> {
    inner: hash_table::IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// An iterator over mutable values of a `HashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V, P: ArrayPool> {
    inner: hash_table::Drain<'a, K, V, P>,
}

impl<K, V, P: ArrayPool> Iterator for Drain<'_, K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: ArrayPool> ExactSizeIterator for Drain<'_, K, V, P> {}

/// An owning iterator over the key-value pairs of a `HashMap`.
pub struct IntoIter<K, V, P: ArrayPool> {
    inner: hash_table::IntoIter<K, V, P>,
}

impl<K, V, P: ArrayPool> Iterator for IntoIter<K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: ArrayPool> ExactSizeIterator for IntoIter<K, V, P> {}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::hash_table::tests::DropCounter;
    use crate::pool::HeapPool;
    use crate::pool::tests::RecordingPool;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    /// Every key lands in the same chain.
    #[derive(Clone, Default)]
    struct ConstantHash;

    impl<K: PartialEq> KeyComparer<K> for ConstantHash {
        fn hash_key(&self, _key: &K) -> u64 {
            0x1234_5678
        }

        fn keys_equal(&self, a: &K, b: &K) -> bool {
            a == b
        }
    }

    fn sip_map<K, V>() -> HashMap<K, V, SipHashBuilder, HeapPool> {
        HashMap::with_hasher_in(SipHashBuilder::default(), HeapPool)
    }

    #[test]
    fn test_new_and_with_hasher() {
        let map: HashMap<i32, String> = HashMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);

        let map: HashMap<i32, String, _> = HashMap::with_hasher(SipHashBuilder::default());
        assert!(map.is_empty());
        assert_eq!(map.capacity(), 0);
    }

    #[test]
    fn test_with_capacity() {
        let map: HashMap<i32, String, _> =
            HashMap::with_capacity_and_hasher(100, SipHashBuilder::default());
        assert!(map.capacity() >= 100);
        assert!(map.is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = sip_map();

        assert_eq!(map.insert(1, "hello".to_string()), None);
        assert_eq!(map.insert(2, "world".to_string()), None);
        assert_eq!(map.len(), 2);
        let version = map.version();

        assert_eq!(map.insert(1, "hi".to_string()), Some("hello".to_string()));
        assert_eq!(map.len(), 2);
        assert_eq!(map.version(), version);

        assert_eq!(map.get(&1), Some(&"hi".to_string()));
        assert_eq!(map.get(&2), Some(&"world".to_string()));
        assert_eq!(map.get(&3), None);
        assert_eq!(map[&2], "world");
    }

    #[test]
    fn test_get_mut() {
        let mut map = sip_map();
        map.insert(1, "hello".to_string());

        if let Some(value) = map.get_mut(&1) {
            value.push_str(" world");
        }
        assert_eq!(map.get(&1), Some(&"hello world".to_string()));
        assert_eq!(map.get_mut(&2), None);
    }

    #[test]
    fn test_remove() {
        let mut map = sip_map();
        map.insert(1, "hello".to_string());
        map.insert(2, "world".to_string());

        assert_eq!(map.remove(&1), Some("hello".to_string()));
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));

        assert_eq!(map.remove(&1), None);
        assert_eq!(map.remove_entry(&2), Some((2, "world".to_string())));
        assert!(map.is_empty());
    }

    #[test]
    fn test_abc_scenario() {
        let mut map = sip_map();
        map.add("a", 1).unwrap();
        map.add("b", 2).unwrap();
        map.add("c", 3).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&"b"), Some(&2));

        assert_eq!(map.remove(&"b"), Some(2));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"b"), None);

        map.add("b", 20).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&"b"), Some(&20));
    }

    #[test]
    fn test_strict_add_rejects_duplicates() {
        let mut map = sip_map();
        map.add("k".to_string(), 1).unwrap();
        let version = map.version();

        assert_eq!(
            map.add("k".to_string(), 2),
            Err(Error::DuplicateKey {
                key: "\"k\"".to_string()
            })
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"k".to_string()), Some(&1));
        assert_eq!(map.version(), version);

        let (index, added) = map.try_add("k".to_string(), 3);
        assert!(!added);
        assert_eq!(map.get_direct(index), Some((&"k".to_string(), &1)));
    }

    #[test]
    fn test_checked_lookups() {
        let mut map = sip_map();
        map.insert(5u32, 'x');

        assert_eq!(map.get_checked(&5), Ok(&'x'));
        assert_eq!(
            map.get_checked(&6),
            Err(Error::KeyNotFound {
                key: "6".to_string()
            })
        );
        assert!(matches!(map.get_index(&6), Err(Error::KeyNotFound { .. })));
        assert_eq!(map.try_find_index(&6), None);

        let index = map.get_index(&5).unwrap();
        assert_eq!(map.try_find_index(&5), Some(index));

        assert!(matches!(map.remove_checked(&6), Err(Error::KeyNotFound { .. })));
        assert_eq!(map.remove_checked(&5), Ok('x'));
    }

    #[test]
    #[should_panic(expected = "key not present")]
    fn test_index_panics_on_missing_key() {
        let map: HashMap<i32, i32, SipHashBuilder, HeapPool> = sip_map();
        assert_eq!(map[&1], 0);
    }

    #[test]
    fn test_constant_hash_collisions() {
        let mut map: HashMap<String, usize, ConstantHash, HeapPool> =
            HashMap::with_hasher_in(ConstantHash, HeapPool);
        map.insert("left".to_string(), 1);
        map.insert("right".to_string(), 2);

        assert_eq!(map.get(&"left".to_string()), Some(&1));
        assert_eq!(map.get(&"right".to_string()), Some(&2));
        assert_eq!(map.get(&"neither".to_string()), None);

        for i in 0..100 {
            map.insert(i.to_string(), i);
        }
        for i in 0..100 {
            assert_eq!(map.get(&i.to_string()), Some(&i));
        }
        assert_eq!(map.remove(&"left".to_string()), Some(1));
        assert_eq!(map.get(&"right".to_string()), Some(&2));
    }

    #[test]
    fn test_direct_index_stable_with_reserved_capacity() {
        let mut map = sip_map();
        map.ensure_capacity(500).unwrap();
        let capacity = map.capacity();

        let (first, _) = map.try_add(0u64, 0u64);
        for k in 1..500u64 {
            map.insert(k, k * 10);
            unsafe {
                assert_eq!(*map.get_direct_value_unchecked(first), 0);
            }
        }
        assert_eq!(map.capacity(), capacity);

        unsafe {
            *map.get_direct_value_unchecked_mut(first) = 99;
        }
        assert_eq!(map[&0], 99);
    }

    #[test]
    fn test_direct_index_stable_across_growth() {
        let mut map = sip_map();
        let indices: Vec<usize> = (0..1000u32).map(|k| map.add(k, k).unwrap()).collect();
        for (k, index) in indices.iter().enumerate() {
            assert_eq!(map.get_direct(*index), Some((&(k as u32), &(k as u32))));
        }

        let (key, value) = map.remove_at(indices[10]).unwrap();
        assert_eq!((key, value), (10, 10));
        assert!(map.get_direct(indices[10]).is_none());
        assert!(map.remove_at(indices[10]).is_none());
        assert!(map.remove_at(usize::MAX).is_none());

        if let Some((_, v)) = map.get_direct_mut(indices[20]) {
            *v = 2000;
        }
        assert_eq!(map[&20], 2000);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut map = sip_map();
        let mut calls = 0;
        for word in ["a", "b", "a", "c", "a"] {
            let (_, count) = map.get_or_insert_with(word, || {
                calls += 1;
                0
            });
            *count += 1;
        }
        assert_eq!(calls, 3);
        assert_eq!(map[&"a"], 3);

        let (index, value) = map.get_or_insert_default("d");
        assert_eq!(*value, 0);
        assert_eq!(map.get_direct(index), Some((&"d", &0)));

        // Building values while the map grows underneath.
        let mut map: HashMap<u32, Vec<u32>, SipHashBuilder, HeapPool> = sip_map();
        for k in 0..200 {
            let (_, v) = map.get_or_insert_with(k, || vec![k]);
            v.push(k + 1);
        }
        for k in 0..200 {
            assert_eq!(map[&k], vec![k, k + 1]);
        }
    }

    #[test]
    fn test_recycle_or_insert() {
        let mut map: HashMap<u32, Vec<u8>, SipHashBuilder, HeapPool> = sip_map();
        map.insert(1, vec![1; 64]);
        map.insert(2, vec![2; 8]);

        let (index, value, origin) = map.recycle_or_insert_with(2, Vec::new);
        assert_eq!(origin, SlotOrigin::Existing);
        assert_eq!(value, &vec![2; 8]);
        assert_eq!(map.get_index(&2), Ok(index));

        let freed = map.remove_recycling(&1).unwrap();
        assert!(!map.contains_key(&1));
        assert_eq!(map.remove_recycling(&1), None);

        let (index, value, origin) = map.recycle_or_insert_with(3, Vec::new);
        assert_eq!(origin, SlotOrigin::Recycled);
        assert_eq!(index, freed);
        assert_eq!(value.len(), 64);
        value.clear();

        let (_, value, origin) = map.recycle_or_insert_with(4, || vec![4]);
        assert_eq!(origin, SlotOrigin::Created);
        assert_eq!(value, &vec![4]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_entry_api() {
        let mut map = sip_map();

        let value = map.entry(1).or_insert("hello".to_string());
        assert_eq!(value, &"hello".to_string());
        assert_eq!(map.len(), 1);

        let value = map.entry(1).or_insert("world".to_string());
        assert_eq!(value, &"hello".to_string());
        assert_eq!(map.len(), 1);

        map.entry(2).or_insert_with(|| "computed".to_string());
        assert_eq!(map.get(&2), Some(&"computed".to_string()));

        map.entry(1)
            .and_modify(|v| v.push_str(" world"))
            .or_insert("default".to_string());
        assert_eq!(map.get(&1), Some(&"hello world".to_string()));

        assert_eq!(map.entry(3).key(), &3);
        assert_eq!(map.entry(3).index(), None);
        assert_eq!(map.entry(1).index(), map.try_find_index(&1));
    }

    #[test]
    fn test_entry_or_default() {
        let mut map: HashMap<i32, Vec<i32>, SipHashBuilder, HeapPool> = sip_map();

        map.entry(1).or_default().push(42);
        assert_eq!(map.get(&1), Some(&vec![42]));

        map.entry(1).or_default().push(24);
        assert_eq!(map.get(&1), Some(&vec![42, 24]));
    }

    #[test]
    fn test_occupied_entry() {
        let mut map = sip_map();
        map.insert(1, "hello".to_string());

        match map.entry(1) {
            Entry::Occupied(mut entry) => {
                assert_eq!(entry.key(), &1);
                assert_eq!(entry.get(), &"hello".to_string());

                *entry.get_mut() = "world".to_string();
                assert_eq!(entry.get(), &"world".to_string());

                let old_value = entry.insert("new".to_string());
                assert_eq!(old_value, "world".to_string());
                assert_eq!(entry.get(), &"new".to_string());

                let (key, value) = entry.remove_entry();
                assert_eq!(key, 1);
                assert_eq!(value, "new".to_string());
            }
            Entry::Vacant(_) => panic!("Expected occupied entry"),
        }

        assert!(map.is_empty());
    }

    #[test]
    fn test_vacant_entry() {
        let mut map: HashMap<i32, String, SipHashBuilder, HeapPool> = sip_map();

        match map.entry(1) {
            Entry::Vacant(entry) => {
                assert_eq!(entry.key(), &1);
                let (index, value) = entry.insert_indexed("hello".to_string());
                assert_eq!(value, &"hello".to_string());
                assert_eq!(index, 0);
            }
            Entry::Occupied(_) => panic!("Expected vacant entry"),
        }

        match map.entry(2) {
            Entry::Vacant(entry) => assert_eq!(entry.into_key(), 2),
            Entry::Occupied(_) => panic!("Expected vacant entry"),
        }
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_iterators() {
        let mut map = sip_map();
        map.insert(1, "one".to_string());
        map.insert(2, "two".to_string());
        map.insert(3, "three".to_string());

        let mut pairs: Vec<_> = map.iter().collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (&1, &"one".to_string()),
                (&2, &"two".to_string()),
                (&3, &"three".to_string())
            ]
        );

        let mut keys: Vec<_> = map.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(map.values().len(), 3);

        for value in map.values_mut() {
            value.make_ascii_uppercase();
        }
        for (_, value) in &mut map {
            value.push('!');
        }
        assert_eq!(map[&2], "TWO!");

        let mut owned: Vec<_> = map.into_iter().collect();
        owned.sort();
        assert_eq!(owned[0], (1, "ONE!".to_string()));
    }

    #[test]
    fn test_drain() {
        let mut map = sip_map();
        map.insert(1, "one".to_string());
        map.insert(2, "two".to_string());

        let mut drained: Vec<_> = map.drain().collect();
        drained.sort();
        assert_eq!(drained, vec![(1, "one".to_string()), (2, "two".to_string())]);
        assert!(map.is_empty());
        assert!(map.capacity() > 0);

        map.insert(3, "three".to_string());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_retain() {
        let mut map = sip_map();
        for i in 0..10 {
            map.insert(i, i * 10);
        }
        let index = map.try_find_index(&8).unwrap();
        map.retain(|k, v| {
            *v += 1;
            k % 2 == 0
        });
        assert_eq!(map.len(), 5);
        assert_eq!(map.get_direct(index), Some((&8, &81)));
        assert!(!map.contains_key(&3));
    }

    #[test]
    fn test_copy_to() {
        let mut map = sip_map();
        map.insert(1, 'a');
        map.insert(2, 'b');

        let mut dest = vec![(0, ' '); 4];
        map.copy_to(&mut dest, 1).unwrap();
        assert_eq!(dest[0], (0, ' '));
        let mut copied = dest[1..3].to_vec();
        copied.sort();
        assert_eq!(copied, vec![(1, 'a'), (2, 'b')]);
        assert_eq!(dest[3], (0, ' '));

        assert!(matches!(
            map.copy_to(&mut dest, 3),
            Err(Error::InvalidArgument { name: "dest", .. })
        ));
        assert!(matches!(
            map.copy_to(&mut dest, 5),
            Err(Error::OutOfRange { name: "index", .. })
        ));
        assert_eq!(dest[3], (0, ' '));
    }

    #[test]
    fn test_cursor() {
        let mut map = sip_map();
        for i in 0..5 {
            map.insert(i, i * i);
        }

        let mut cursor = map.cursor();
        let mut total = 0;
        while let Some((_, v)) = map.advance(&mut cursor).unwrap() {
            total += v;
        }
        assert_eq!(total, 30);

        let mut cursor = map.cursor();
        map.advance(&mut cursor).unwrap();
        map.insert(7, 49);
        assert_eq!(map.advance(&mut cursor), Err(Error::Invalidated));
    }

    #[test]
    fn test_capacity_management() {
        let mut map = sip_map();
        assert!(map.ensure_capacity(100).unwrap() >= 100);
        for i in 0..10 {
            map.insert(i, i);
        }
        assert!(map.increase_capacity_by(1000).unwrap() >= 1010);
        assert!(matches!(
            map.increase_capacity_by(usize::MAX),
            Err(Error::OutOfRange { .. })
        ));

        for i in 0..9 {
            map.remove(&i);
        }
        map.trim_excess();
        assert_eq!(map.capacity(), 3);
        assert_eq!(map[&9], 9);
    }

    #[test]
    fn test_from_iter_extend_eq() {
        let map: HashMap<i32, i32, SipHashBuilder, HeapPool> =
            (0..50).map(|i| (i, i * 2)).collect();
        assert_eq!(map.len(), 50);

        let mut other: HashMap<i32, i32, SipHashBuilder, HeapPool> = sip_map();
        other.extend((0..50).rev().map(|i| (i, i * 2)));
        assert_eq!(map, other);

        other.insert(0, -1);
        assert_ne!(map, other);

        let clone = map.clone();
        assert_eq!(clone, map);
    }

    #[test]
    fn test_debug_format() {
        let mut map = sip_map();
        map.insert(1, "x");
        assert_eq!(alloc::format!("{map:?}"), "{1: \"x\"}");
    }

    #[test]
    fn test_pool_traffic() {
        let pool = RecordingPool::default();
        let drops = Rc::new(Cell::new(0));
        {
            let mut map = HashMap::with_hasher_in(SipHashBuilder::default(), &pool);
            for i in 0..100 {
                map.insert(i, DropCounter(drops.clone()));
            }
            assert_eq!(pool.outstanding.get(), 3);
            assert!(pool.releases.get() > 0);

            map.remove(&0);
            assert_eq!(drops.get(), 1);
        }
        assert_eq!(drops.get(), 100);
        assert_eq!(pool.outstanding.get(), 0);

        let mut map = HashMap::with_capacity_and_hasher_in(8, SipHashBuilder::default(), &pool);
        map.insert(1, 1);
        let parts = map.into_parts();
        assert_eq!(parts.len(), 1);
        drop(parts);
        assert_eq!(pool.outstanding.get(), 0);
    }

    #[test]
    fn test_internals_view() {
        let mut map = sip_map();
        for i in 0..10 {
            map.insert(i, i);
        }
        map.remove(&3);

        let internals = map.internals();
        assert_eq!(internals.len(), 9);
        assert_eq!(internals.free_count(), 1);
        let index = map.try_find_index(&5).unwrap();
        assert_eq!(internals.value(index), Some(&5));
    }

    #[test]
    fn test_complex_values() {
        let mut map: HashMap<String, Vec<String>, SipHashBuilder, HeapPool> = sip_map();
        map.entry("fruits".to_string())
            .or_default()
            .push("apple".to_string());
        map.entry("fruits".to_string())
            .or_default()
            .push("banana".to_string());

        assert_eq!(
            map.get(&"fruits".to_string()),
            Some(&vec!["apple".to_string(), "banana".to_string()])
        );
    }

    #[test]
    fn test_default_trait() {
        let map: HashMap<i32, String, SipHashBuilder, HeapPool> = HashMap::default();
        assert!(map.is_empty());
    }
}
