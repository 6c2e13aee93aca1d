#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod comparer;

pub mod error;

/// A key-value map over the pooled chained table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable comparers and pools.
pub mod hash_map;

pub mod hash_table;

/// A hash set over the pooled chained table.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable comparers and pools.
pub mod hash_set;

pub mod internals;

pub mod pool;

mod primes;

pub use comparer::DefaultHashBuilder;
pub use comparer::KeyComparer;
pub use error::Error;
pub use error::Result;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::Cursor;
pub use hash_table::HashTable;
pub use hash_table::SlotOrigin;
pub use internals::TableInternals;
pub use internals::TableParts;
pub use pool::ArrayPool;
pub use pool::DefaultPool;
pub use pool::HeapPool;
pub use pool::RecyclingPool;
#[cfg(feature = "std")]
pub use pool::SharedPool;
