//! Bucket sizing: a prime growth sequence and division-free modulo.

/// Largest bucket count the table will ever use. Also the largest prime below
/// `i32::MAX` that keeps entry indices representable as `i32`.
pub(crate) const MAX_PRIME_LENGTH: usize = 0x7FFF_FFC3;

/// Primes skipped by `get_prime` when searching beyond the table, to avoid
/// sizes that interact badly with hash functions built around 101.
const HASH_PRIME: usize = 101;

/// Roughly 1.2x apart so early growth stays cheap.
const PRIMES: [u32; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

pub(crate) fn is_prime(candidate: usize) -> bool {
    if candidate & 1 == 0 {
        return candidate == 2;
    }

    let limit = candidate.isqrt();
    let mut divisor = 3;
    while divisor <= limit {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }

    candidate > 1
}

/// Smallest usable prime `>= min`.
pub(crate) fn get_prime(min: usize) -> usize {
    if let Some(&prime) = PRIMES.iter().find(|&&p| p as usize >= min) {
        return prime as usize;
    }

    let mut candidate = min | 1;
    while candidate < MAX_PRIME_LENGTH {
        if is_prime(candidate) && (candidate - 1) % HASH_PRIME != 0 {
            return candidate;
        }
        candidate += 2;
    }

    min
}

/// Next size in the growth sequence: the first prime at least twice `old`.
pub(crate) fn expand_prime(old: usize) -> usize {
    let new = old.saturating_mul(2);
    if new > MAX_PRIME_LENGTH && old < MAX_PRIME_LENGTH {
        return MAX_PRIME_LENGTH;
    }

    get_prime(new)
}

/// Precomputes the reciprocal used by [`fast_mod`]. Only valid for
/// `divisor <= i32::MAX`.
#[inline]
pub(crate) fn fast_mod_multiplier(divisor: u32) -> u64 {
    u64::MAX / divisor as u64 + 1
}

/// `value % divisor` without a division instruction (Lemire's fastmod).
#[inline(always)]
pub(crate) fn fast_mod(value: u32, divisor: u32, multiplier: u64) -> u32 {
    let lowbits = multiplier.wrapping_mul(value as u64);
    let result = ((lowbits as u128 * divisor as u128) >> 64) as u32;
    debug_assert_eq!(result, value % divisor);
    result
}
