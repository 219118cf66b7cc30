//! Hash and key-comparison functions for [`KvStore`](crate::KvStore).

/// Hash function signature used by a table.
pub type HashFn = fn(&[u8]) -> u32;

/// Key comparison signature used by a table. Returns `true` on match.
pub type CompareFn = fn(&[u8], &[u8]) -> bool;

/// Default string hash: `h = h * 33 + byte`, wrapping, seeded with 0.
pub fn hasher(key: &[u8]) -> u32 {
    key.iter().fold(0u32, |h, &c| {
        h.wrapping_add(h.wrapping_shl(5)).wrapping_add(u32::from(c))
    })
}

/// Default comparator: exact byte equality.
pub fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hasher_matches_times_33_recurrence() {
        assert_eq!(hasher(b""), 0);
        assert_eq!(hasher(b"a"), 97);
        assert_eq!(hasher(b"ab"), 97 * 33 + 98);
        assert_eq!(hasher(b"abc"), (97 * 33 + 98) * 33 + 99);
    }

    #[test]
    fn hasher_wraps_on_long_keys() {
        let key = vec![0xFFu8; 4096];
        // Must not panic in debug builds.
        let _ = hasher(&key);
    }

    #[test]
    fn comparator_is_exact() {
        assert!(bytes_eq(b"key", b"key"));
        assert!(!bytes_eq(b"key", b"Key"));
        assert!(!bytes_eq(b"key", b"key "));
    }
}
