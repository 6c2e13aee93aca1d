use core::fmt::Debug;

use crate::comparer::DefaultHashBuilder;
use crate::comparer::KeyComparer;
use crate::error::Error;
use crate::error::Result;
use crate::error::check_copy_bounds;
use crate::hash_table;
use crate::hash_table::Cursor;
use crate::hash_table::HashTable;
use crate::internals::TableInternals;
use crate::internals::TableParts;
use crate::pool::ArrayPool;
use crate::pool::DefaultPool;

/// A hash set over pool-rented arrays.
///
/// `HashSet<T, S, P>` stores values in the chained [`HashTable`] with no
/// payload, hashing and comparing them through `S` and renting arrays from
/// `P`. Like [`HashMap`](crate::HashMap), every value has a direct index that
/// survives growth.
///
/// # Performance Characteristics
///
/// - **Memory**: 16 bytes of bookkeeping per slot plus the size of `T`, and 4
///   bytes per bucket.
#[derive(Clone)]
pub struct HashSet<T, S = DefaultHashBuilder, P: ArrayPool = DefaultPool> {
    table: HashTable<T, (), P>,
    hash_builder: S,
}

impl<T, S, P> PartialEq for HashSet<T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }
}

impl<T, S, P> Eq for HashSet<T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
}

impl<T, S, P> Debug for HashSet<T, S, P>
where
    T: Debug,
    P: ArrayPool,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T> HashSet<T, DefaultHashBuilder, DefaultPool> {
    /// Creates an empty set with the default hasher and pool.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pooled_hash::HashSet;
    ///
    /// let set: HashSet<i32> = HashSet::new();
    /// assert!(set.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates an empty set that holds `capacity` values before growing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<T, S> HashSet<T, S, DefaultPool> {
    /// Creates a new hash set with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_hasher_in(hash_builder, DefaultPool::default())
    }

    /// Creates a new hash set with the specified capacity and hasher builder.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest supported table size.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, DefaultPool::default())
    }
}

impl<T, S, P: ArrayPool> HashSet<T, S, P> {
    /// Creates an empty set renting its arrays from `pool`.
    pub fn with_hasher_in(hash_builder: S, pool: P) -> Self {
        Self {
            table: HashTable::new_in(pool),
            hash_builder,
        }
    }

    /// Creates an empty set renting from `pool` that holds `capacity` values
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

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of elements the set can hold before it grows.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Structural modification counter.
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// Returns a reference to the set's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns a reference to the set's pool.
    pub fn pool(&self) -> &P {
        self.table.pool()
    }

    /// Clears the set, removing all values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pooled_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// set.insert(1);
    /// set.clear();
    /// assert!(set.is_empty());
    /// assert!(set.capacity() > 0);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Compacts the set and shrinks it to fit. Invalidates every direct index.
    pub fn trim_excess(&mut self) {
        self.table.trim_excess();
    }

    /// Grows the set, rehashing at most once, so it holds `capacity` values
    /// without growing again.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.table.ensure_capacity(capacity)
    }

    /// Grows the set so `additional` more values fit without growing again.
    pub fn increase_capacity_by(&mut self, additional: usize) -> Result<usize> {
        self.table.increase_capacity_by(additional)
    }

    /// Returns the value at direct index `index`, if it is live.
    pub fn get_direct(&self, index: usize) -> Option<&T> {
        self.table.get_direct(index).map(|(v, _)| v)
    }

    /// Removes the value at direct index `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        self.table.remove_at(index).map(|(v, _)| v)
    }

    /// An iterator visiting all elements in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Clears the set, returning all elements as an iterator. Keeps the
    /// rented arrays.
    pub fn drain(&mut self) -> Drain<'_, T, P> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Retains only the elements specified by the predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pooled_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = (1..=4).collect();
    /// set.retain(|&x| x % 2 == 0);
    /// assert_eq!(set.len(), 2);
    /// assert!(set.contains(&2));
    /// assert!(set.contains(&4));
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.table.retain(|v, _| f(v));
    }

    /// Starts a detached enumeration that does not borrow the set.
    pub fn cursor(&self) -> Cursor {
        self.table.cursor()
    }

    /// Advances `cursor`, failing with [`Error::Invalidated`] if the set was
    /// structurally modified since the cursor was created.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<&T>> {
        Ok(self.table.advance(cursor)?.map(|(_, v, _)| v))
    }

    /// Clones every element into `dest` starting at `index`.
    ///
    /// Fails without writing anything if `index` is past the end of `dest` or
    /// the remaining room is smaller than [`len`](Self::len).
    pub fn copy_to(&self, dest: &mut [T], index: usize) -> Result<()>
    where
        T: Clone,
    {
        check_copy_bounds(dest.len(), index, self.len())?;
        for (slot, value) in dest[index..].iter_mut().zip(self.iter()) {
            slot.clone_from(value);
        }
        Ok(())
    }

    /// Borrows the set's backing arrays.
    pub fn internals(&self) -> TableInternals<'_, T, (), P> {
        self.table.internals()
    }

    /// Moves the backing arrays out of the set.
    pub fn into_parts(self) -> TableParts<T, (), P> {
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

impl<T, S, P> HashSet<T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    #[inline]
    fn find_index(&self, value: &T) -> Option<usize> {
        let hash = self.hash_builder.hash_key(value);
        self.table
            .find_index(hash, |v| self.hash_builder.keys_equal(v, value))
    }

    /// Adds a value to the set.
    ///
    /// Returns whether the value was newly inserted. An existing equal value
    /// is kept.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pooled_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// assert!(set.insert(2));
    /// assert!(!set.insert(2));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> bool {
        self.try_add(value).1
    }

    /// Adds a value, returning its direct index along with whether it was
    /// newly inserted.
    pub fn try_add(&mut self, value: T) -> (usize, bool) {
        let hash = self.hash_builder.hash_key(&value);
        match self
            .table
            .entry(hash, |v| self.hash_builder.keys_equal(v, &value))
        {
            hash_table::Entry::Occupied(entry) => (entry.index(), false),
            hash_table::Entry::Vacant(entry) => (entry.insert_indexed(value, ()).0, true),
        }
    }

    /// Adds a new value, returning its direct index, or fails with
    /// [`Error::DuplicateKey`] if an equal value is present.
    pub fn add(&mut self, value: T) -> Result<usize>
    where
        T: Debug,
    {
        let hash = self.hash_builder.hash_key(&value);
        match self
            .table
            .entry(hash, |v| self.hash_builder.keys_equal(v, &value))
        {
            hash_table::Entry::Occupied(_) => Err(Error::duplicate_key(&value)),
            hash_table::Entry::Vacant(entry) => Ok(entry.insert_indexed(value, ()).0),
        }
    }

    /// Returns `true` if the set contains a value.
    pub fn contains(&self, value: &T) -> bool {
        self.find_index(value).is_some()
    }

    /// Returns a reference to the stored value equal to `value`, if any.
    pub fn get(&self, value: &T) -> Option<&T> {
        let hash = self.hash_builder.hash_key(value);
        self.table
            .find(hash, |v| self.hash_builder.keys_equal(v, value))
            .map(|(v, _)| v)
    }

    /// Returns the direct index of `value`, or [`Error::KeyNotFound`].
    pub fn get_index(&self, value: &T) -> Result<usize>
    where
        T: Debug,
    {
        self.find_index(value)
            .ok_or_else(|| Error::key_not_found(value))
    }

    /// Returns the direct index of `value`, if present.
    pub fn try_find_index(&self, value: &T) -> Option<usize> {
        self.find_index(value)
    }

    /// Removes a value from the set. Returns whether the value was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.take(value).is_some()
    }

    /// Removes and returns the stored value equal to `value`, if any.
    pub fn take(&mut self, value: &T) -> Option<T> {
        let hash = self.hash_builder.hash_key(value);
        let hash_builder = &self.hash_builder;
        self.table
            .remove(hash, |v| hash_builder.keys_equal(v, value))
            .map(|(_, v, _)| v)
    }

    /// Returns `true` if `self` has no elements in common with `other`.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        if self.len() <= other.len() {
            self.iter().all(|v| !other.contains(v))
        } else {
            other.iter().all(|v| !self.contains(v))
        }
    }

    /// Returns `true` if `other` contains every element of `self`.
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }

    /// Returns `true` if `self` contains every element of `other`.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Visits the values of `self`, then those of `other` not in `self`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pooled_hash::HashSet;
    ///
    /// let a: HashSet<i32> = [1, 2].into_iter().collect();
    /// let b: HashSet<i32> = [2, 3].into_iter().collect();
    ///
    /// let mut union: Vec<_> = a.union(&b).copied().collect();
    /// union.sort();
    /// assert_eq!(union, vec![1, 2, 3]);
    /// ```
    pub fn union<'a>(&'a self, other: &'a Self) -> Union<'a, T, S, P> {
        Union {
            iter: self.iter(),
            other_iter: other.iter(),
            seen: self,
        }
    }

    /// Visits the values in both `self` and `other`.
    pub fn intersection<'a>(&'a self, other: &'a Self) -> Intersection<'a, T, S, P> {
        if self.len() <= other.len() {
            Intersection {
                iter: self.iter(),
                other,
            }
        } else {
            Intersection {
                iter: other.iter(),
                other: self,
            }
        }
    }

    /// Visits the values in `self` but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a Self) -> Difference<'a, T, S, P> {
        Difference {
            iter: self.iter(),
            other,
        }
    }

    /// Visits the values in exactly one of `self` and `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pooled_hash::HashSet;
    ///
    /// let a: HashSet<i32> = [1, 2].into_iter().collect();
    /// let b: HashSet<i32> = [2, 3].into_iter().collect();
    ///
    /// let mut sym_diff: Vec<_> = a.symmetric_difference(&b).copied().collect();
    /// sym_diff.sort();
    /// assert_eq!(sym_diff, vec![1, 3]);
    /// ```
    pub fn symmetric_difference<'a>(&'a self, other: &'a Self) -> SymmetricDifference<'a, T, S, P> {
        SymmetricDifference {
            iter: self.difference(other).chain(other.difference(self)),
        }
    }
}

impl<T, S, P> Default for HashSet<T, S, P>
where
    S: Default,
    P: ArrayPool + Default,
{
    fn default() -> Self {
        Self::with_hasher_in(S::default(), P::default())
    }
}

/// An iterator over the elements of a `HashSet`.
pub struct Iter<'a, T> {
    inner: hash_table::Iter<'a, T, ()>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v, _)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// A draining iterator over the elements of a `HashSet`.
pub struct Drain<'a, T, P: ArrayPool> {
    inner: hash_table::Drain<'a, T, (), P>,
}

impl<T, P: ArrayPool> Iterator for Drain<'_, T, P> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, _)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, P: ArrayPool> ExactSizeIterator for Drain<'_, T, P> {}

/// An owning iterator over the elements of a `HashSet`.
pub struct IntoIter<T, P: ArrayPool> {
    inner: hash_table::IntoIter<T, (), P>,
}

impl<T, P: ArrayPool> Iterator for IntoIter<T, P> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, _)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, P: ArrayPool> ExactSizeIterator for IntoIter<T, P> {}

impl<T, S, P: ArrayPool> IntoIterator for HashSet<T, S, P> {
    type IntoIter = IntoIter<T, P>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, T, S, P: ArrayPool> IntoIterator for &'a HashSet<T, S, P> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, S, P> FromIterator<T> for HashSet<T, S, P>
where
    S: KeyComparer<T> + Default,
    P: ArrayPool + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<T, S, P> Extend<T> for HashSet<T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

/// An iterator over the union of two sets.
pub struct Union<'a, T, S, P: ArrayPool> {
    iter: Iter<'a, T>,
    other_iter: Iter<'a, T>,
    seen: &'a HashSet<T, S, P>,
}

impl<'a, T, S, P> Iterator for Union<'a, T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(v) = self.iter.next() {
            return Some(v);
        }
        loop {
            let v = self.other_iter.next()?;
            if !self.seen.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the intersection of two sets.
pub struct Intersection<'a, T, S, P: ArrayPool> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, S, P>,
}

impl<'a, T, S, P> Iterator for Intersection<'a, T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.iter.next()?;
            if self.other.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the difference of two sets.
pub struct Difference<'a, T, S, P: ArrayPool> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, S, P>,
}

impl<'a, T, S, P> Iterator for Difference<'a, T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.iter.next()?;
            if !self.other.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the symmetric difference of two sets.
pub struct SymmetricDifference<'a, T, S, P: ArrayPool> {
    iter: core::iter::Chain<Difference<'a, T, S, P>, Difference<'a, T, S, P>>,
}

impl<'a, T, S, P> Iterator for SymmetricDifference<'a, T, S, P>
where
    S: KeyComparer<T>,
    P: ArrayPool,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
