//! Pluggable key hashing and equality.

use core::hash::BuildHasher;
use core::hash::Hash;
use core::hash::Hasher;

/// Supplies the hash and equality used to place and find keys.
///
/// Every [`BuildHasher`] is a comparer for keys that implement `Hash + Eq`,
/// so the usual hasher builders work unchanged. Implement this trait directly
/// for custom equality, case-insensitive keys, or to force collisions in
/// tests.
pub trait KeyComparer<K: ?Sized> {
    /// Hashes `key`. Equal keys must produce equal hashes.
    fn hash_key(&self, key: &K) -> u64;

    /// Returns `true` when `a` and `b` denote the same key.
    fn keys_equal(&self, a: &K, b: &K) -> bool;
}

impl<K, S> KeyComparer<K> for S
where
    K: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_one(key)
    }

    #[inline]
    fn keys_equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used when none is given.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used when none is given.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Hasher builder used when none is given.
        pub type DefaultHashBuilder = core::hash::BuildHasherDefault<FnvHasher>;
    }
}

/// 64-bit FNV-1a. Only the default for bare `no_std` builds, where no seeded
/// hasher is available.
#[derive(Clone, Copy, Debug)]
pub struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        FnvHasher(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for FnvHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
}

/// Folds a 64-bit hash into the 32 bits stored per entry.
#[inline(always)]
pub(crate) fn fold_hash(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use core::hash::BuildHasherDefault;

    use super::*;

    struct Mod10;

    impl KeyComparer<u32> for Mod10 {
        fn hash_key(&self, key: &u32) -> u64 {
            (*key % 10) as u64
        }

        fn keys_equal(&self, a: &u32, b: &u32) -> bool {
            a % 10 == b % 10
        }
    }

    #[test]
    fn build_hasher_is_a_comparer() {
        let builder = BuildHasherDefault::<FnvHasher>::default();
        assert_eq!(builder.hash_key("abc"), builder.hash_key("abc"));
        assert_ne!(builder.hash_key("abc"), builder.hash_key("abd"));
        assert!(KeyComparer::<str>::keys_equal(&builder, "x", "x"));
        assert!(!KeyComparer::<str>::keys_equal(&builder, "x", "y"));
    }

    #[test]
    fn custom_comparer() {
        assert_eq!(Mod10.hash_key(&13), Mod10.hash_key(&23));
        assert!(Mod10.keys_equal(&13, &23));
    }

    #[test]
    fn fnv_known_value() {
        let mut h = FnvHasher::default();
        h.write(b"a");
        assert_eq!(h.finish(), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn fold_mixes_high_bits() {
        assert_eq!(fold_hash(0x0000_0001_0000_0000), 1);
        assert_eq!(fold_hash(0xFFFF_FFFF_FFFF_FFFF), 0);
    }
}
