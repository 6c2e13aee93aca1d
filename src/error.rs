//! Error types shared by the table and its map/set wrappers.

use alloc::format;
use alloc::string::String;
use core::fmt::Debug;

use thiserror::Error;

/// Result type alias for fallible collection operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the strict (non-`try_`) collection operations.
///
/// Every operation validates its arguments before touching the table, so an
/// `Err` always means the collection is exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An argument was rejected before any mutation took place.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An index, count or capacity fell outside the accepted range.
    #[error("argument '{name}' is out of range: {value} exceeds {limit}")]
    OutOfRange {
        /// Name of the offending parameter.
        name: &'static str,
        /// The value that was passed.
        value: usize,
        /// The largest accepted value.
        limit: usize,
    },

    /// A strict add found the key already present.
    #[error("an item with the same key has already been added: {key}")]
    DuplicateKey {
        /// `Debug` rendering of the key.
        key: String,
    },

    /// A strict lookup or removal did not find the key.
    #[error("the given key was not present: {key}")]
    KeyNotFound {
        /// `Debug` rendering of the key.
        key: String,
    },

    /// The collection was structurally modified after a cursor was created.
    #[error("collection was modified; enumeration cannot resume")]
    Invalidated,
}

impl Error {
    pub(crate) fn duplicate_key<K: Debug + ?Sized>(key: &K) -> Self {
        Error::DuplicateKey {
            key: format!("{key:?}"),
        }
    }

    pub(crate) fn key_not_found<K: Debug + ?Sized>(key: &K) -> Self {
        Error::KeyNotFound {
            key: format!("{key:?}"),
        }
    }
}

/// Validates a copy of `count` items into `dest_len` slots starting at
/// `index`.
pub(crate) fn check_copy_bounds(dest_len: usize, index: usize, count: usize) -> Result<()> {
    if index > dest_len {
        return Err(Error::OutOfRange {
            name: "index",
            value: index,
            limit: dest_len,
        });
    }

    if dest_len - index < count {
        return Err(Error::InvalidArgument {
            name: "dest",
            reason: "destination is too small to hold every element",
        });
    }

    Ok(())
}
