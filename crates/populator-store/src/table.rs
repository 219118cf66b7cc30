//! Open-chained hash table over byte-string keys.
//!
//! [`KvStore`] keeps an array of `hsize` bucket-chain heads. A key lives
//! in at most one chain, the one at `hash(key) % hsize`. New keys are
//! linked at the head of their chain, so within a chain the most recently
//! inserted key comes first, and lookups and removals return the first
//! match.
//!
//! # Resize policy
//!
//! After every insertion of a new key, if `len() >= 2 * hsize()` the table
//! is rehashed into `4 * hsize()` buckets. Rehashing cannot overlap a scan:
//! iteration borrows the table shared, insertion borrows it exclusively.

use std::fmt;
use std::mem;

use populator_arena::{Arena, ArenaError, Block};

use crate::hash::{bytes_eq, hasher, CompareFn, HashFn};

type Link = Option<Box<KvEntry>>;

/// A key/value node. Owns its copied key and value.
pub struct KvEntry {
    key: Block,
    value: Block,
    next: Link,
}

impl KvEntry {
    /// The entry's key.
    pub fn key(&self) -> &[u8] {
        self.key.as_bytes()
    }

    /// The entry's value.
    pub fn value(&self) -> &[u8] {
        self.value.as_bytes()
    }

    /// Take ownership of the key and value blocks.
    pub fn into_parts(self) -> (Block, Block) {
        (self.key, self.value)
    }
}

impl fmt::Debug for KvEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvEntry")
            .field("key", &String::from_utf8_lossy(self.key()))
            .field("value", &String::from_utf8_lossy(self.value()))
            .finish()
    }
}

/// Chained hash table whose keys and values are arena blocks.
pub struct KvStore {
    nodes: Vec<Link>,
    /// Arena charge for the bucket array, so the table's own footprint
    /// counts against the arena budget.
    bucket_charge: Block,
    ct: usize,
    hash: HashFn,
    cmp: CompareFn,
    arena: Arena,
}

impl KvStore {
    /// Bucket count used for stores created on first reference.
    pub const DEFAULT_SIZE: usize = 32;

    /// Bucket count substituted for a zero-size request.
    pub const MIN_SIZE: usize = 17;

    /// Create a table with `size` buckets using the default hash and
    /// comparator. A `size` of zero becomes [`MIN_SIZE`](Self::MIN_SIZE).
    pub fn new(arena: Arena, size: usize) -> Result<Self, ArenaError> {
        Self::with_functions(arena, size, hasher, bytes_eq)
    }

    /// Create a table with [`DEFAULT_SIZE`](Self::DEFAULT_SIZE) buckets.
    pub fn with_default_size(arena: Arena) -> Result<Self, ArenaError> {
        Self::new(arena, Self::DEFAULT_SIZE)
    }

    /// Create a table with explicit hash and comparison functions.
    pub fn with_functions(
        arena: Arena,
        size: usize,
        hash: HashFn,
        cmp: CompareFn,
    ) -> Result<Self, ArenaError> {
        let size = normalize_size(size);
        let (nodes, bucket_charge) = alloc_buckets(&arena, size)?;
        Ok(Self {
            nodes,
            bucket_charge,
            ct: 0,
            hash,
            cmp,
            arena,
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.ct
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.ct == 0
    }

    /// Number of bucket chains.
    pub fn hsize(&self) -> usize {
        self.nodes.len()
    }

    /// The arena this table allocates from.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    fn bucket(&self, key: &[u8]) -> usize {
        (self.hash)(key) as usize % self.nodes.len()
    }

    /// Insert `key` with `value`, or replace the value of an existing key
    /// in place. An empty key is ignored.
    ///
    /// A new key is linked at the head of its chain and may trigger the
    /// 4× expansion. A failed expansion is logged and leaves the table
    /// usable at its current size.
    pub fn insert_or_update(&mut self, key: &[u8], value: &[u8]) -> Result<(), ArenaError> {
        if key.is_empty() {
            return Ok(());
        }
        let value = self.arena.duplicate(value)?;
        let idx = self.bucket(key);
        let cmp = self.cmp;

        let mut cur = self.nodes[idx].as_deref_mut();
        while let Some(entry) = cur {
            if cmp(entry.key.as_bytes(), key) {
                entry.value = value;
                return Ok(());
            }
            cur = entry.next.as_deref_mut();
        }

        let key = self.arena.duplicate(key)?;
        let next = self.nodes[idx].take();
        self.nodes[idx] = Some(Box::new(KvEntry { key, value, next }));
        self.ct += 1;

        if self.ct >= 2 * self.nodes.len() {
            let target = self.nodes.len() * 4;
            if let Err(err) = self.resize(target) {
                tracing::warn!(
                    hsize = self.nodes.len(),
                    target,
                    %err,
                    "hash table expansion failed, keeping current size"
                );
            }
        }
        Ok(())
    }

    /// The entry stored under `key`, if any.
    pub fn get_entry(&self, key: &[u8]) -> Option<&KvEntry> {
        let mut cur = self.nodes[self.bucket(key)].as_deref();
        while let Some(entry) = cur {
            if (self.cmp)(entry.key.as_bytes(), key) {
                return Some(entry);
            }
            cur = entry.next.as_deref();
        }
        None
    }

    /// The value stored under `key`, if any.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        self.get_entry(key).map(KvEntry::value)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get_entry(key).is_some()
    }

    /// Unlink and return the entry stored under `key`.
    pub fn remove(&mut self, key: &[u8]) -> Option<KvEntry> {
        let idx = self.bucket(key);
        let cmp = self.cmp;
        let mut link = &mut self.nodes[idx];
        while link
            .as_ref()
            .is_some_and(|entry| !cmp(entry.key.as_bytes(), key))
        {
            link = &mut link.as_mut()?.next;
        }
        let mut removed = link.take()?;
        *link = removed.next.take();
        self.ct -= 1;
        Some(*removed)
    }

    /// Rehash every entry into a fresh array of `new_size` buckets.
    ///
    /// On failure the table is left exactly as it was.
    pub fn resize(&mut self, new_size: usize) -> Result<(), ArenaError> {
        let new_size = normalize_size(new_size);
        let (mut nodes, charge) = alloc_buckets(&self.arena, new_size)?;
        let old = mem::take(&mut self.nodes);
        for mut head in old {
            while let Some(mut entry) = head {
                head = entry.next.take();
                let idx = (self.hash)(entry.key.as_bytes()) as usize % new_size;
                entry.next = nodes[idx].take();
                nodes[idx] = Some(entry);
            }
        }
        self.nodes = nodes;
        self.bucket_charge = charge;
        Ok(())
    }

    /// Drop every entry and start over with `new_size` buckets.
    ///
    /// Passing [`hsize()`](Self::hsize) empties the table in place.
    pub fn empty(&mut self, new_size: usize) -> Result<(), ArenaError> {
        let new_size = normalize_size(new_size);
        let (nodes, charge) = alloc_buckets(&self.arena, new_size)?;
        for head in mem::replace(&mut self.nodes, nodes) {
            drop_chain(head);
        }
        self.bucket_charge = charge;
        self.ct = 0;
        Ok(())
    }

    /// Iterate over `(key, value)` pairs, bucket by bucket, each chain
    /// from its head.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buckets: self.nodes.iter(),
            chain: None,
        }
    }

    /// Length of the longest bucket chain.
    pub fn max_chain_len(&self) -> usize {
        self.nodes
            .iter()
            .map(|head| {
                let mut n = 0;
                let mut cur = head.as_deref();
                while let Some(entry) = cur {
                    n += 1;
                    cur = entry.next.as_deref();
                }
                n
            })
            .max()
            .unwrap_or(0)
    }
}

impl Drop for KvStore {
    fn drop(&mut self) {
        for head in mem::take(&mut self.nodes) {
            drop_chain(head);
        }
    }
}

impl fmt::Debug for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("hsize", &self.nodes.len())
            .field("ct", &self.ct)
            .field("bucket_bytes", &self.bucket_charge.capacity())
            .finish()
    }
}

/// Iterator over the entries of a [`KvStore`].
pub struct Iter<'a> {
    buckets: std::slice::Iter<'a, Link>,
    chain: Option<&'a KvEntry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain {
                self.chain = entry.next.as_deref();
                return Some((entry.key(), entry.value()));
            }
            self.chain = self.buckets.next()?.as_deref();
        }
    }
}

impl<'a> IntoIterator for &'a KvStore {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

fn normalize_size(size: usize) -> usize {
    if size == 0 {
        KvStore::MIN_SIZE
    } else {
        size
    }
}

fn alloc_buckets(arena: &Arena, size: usize) -> Result<(Vec<Link>, Block), ArenaError> {
    let bytes = size.saturating_mul(mem::size_of::<Link>());
    let charge = arena.allocate(bytes)?;
    let mut nodes = Vec::new();
    nodes
        .try_reserve_exact(size)
        .map_err(|_| ArenaError::AllocationFailed { requested: bytes })?;
    nodes.resize_with(size, || None);
    Ok((nodes, charge))
}

/// Unlink a chain one node at a time so long chains cannot overflow the
/// stack through recursive `Box` drops.
fn drop_chain(mut head: Link) {
    while let Some(mut entry) = head {
        head = entry.next.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use populator_arena::ArenaConfig;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn store(size: usize) -> KvStore {
        KvStore::new(Arena::default(), size).unwrap()
    }

    fn constant_hash(_: &[u8]) -> u32 {
        7
    }

    #[test]
    fn zero_size_becomes_minimum() {
        assert_eq!(store(0).hsize(), KvStore::MIN_SIZE);
        assert_eq!(
            KvStore::with_default_size(Arena::default()).unwrap().hsize(),
            32
        );
    }

    #[test]
    fn insert_then_lookup() {
        let mut t = store(32);
        t.insert_or_update(b"a", b"1").unwrap();
        assert_eq!(t.lookup(b"a"), Some(&b"1"[..]));
        assert_eq!(t.lookup(b"b"), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn update_replaces_value_in_place() {
        let mut t = store(32);
        t.insert_or_update(b"a", b"1").unwrap();
        t.insert_or_update(b"a", b"2").unwrap();
        assert_eq!(t.lookup(b"a"), Some(&b"2"[..]));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn empty_key_is_ignored() {
        let mut t = store(32);
        t.insert_or_update(b"", b"x").unwrap();
        assert!(t.is_empty());
        assert_eq!(t.arena().stats().live_blocks, 1);
    }

    #[test]
    fn empty_value_is_stored() {
        let mut t = store(32);
        t.insert_or_update(b"k", b"").unwrap();
        assert_eq!(t.lookup(b"k"), Some(&b""[..]));
    }

    #[test]
    fn remove_unlinks_and_returns_entry() {
        let mut t = KvStore::with_functions(Arena::default(), 8, constant_hash, bytes_eq).unwrap();
        for k in [b"x", b"y", b"z"] {
            t.insert_or_update(k, k).unwrap();
        }
        let removed = t.remove(b"y").unwrap();
        assert_eq!(removed.key(), b"y");
        assert_eq!(removed.value(), b"y");
        assert_eq!(t.len(), 2);
        assert!(t.remove(b"y").is_none());
        assert_eq!(t.lookup(b"x"), Some(&b"x"[..]));
        assert_eq!(t.lookup(b"z"), Some(&b"z"[..]));
        assert!(t.remove(b"absent").is_none());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn chain_order_is_most_recent_first() {
        let mut t = KvStore::with_functions(Arena::default(), 8, constant_hash, bytes_eq).unwrap();
        t.insert_or_update(b"first", b"1").unwrap();
        t.insert_or_update(b"second", b"2").unwrap();
        t.insert_or_update(b"first", b"3").unwrap();
        let keys: Vec<&[u8]> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&b"second"[..], &b"first"[..]]);
    }

    #[test]
    fn expands_fourfold_at_twice_hsize() {
        let mut t = store(4);
        for i in 0..7 {
            t.insert_or_update(format!("k{i}").as_bytes(), b"v").unwrap();
        }
        assert_eq!(t.hsize(), 4);
        t.insert_or_update(b"k7", b"v").unwrap();
        assert_eq!(t.len(), 8);
        assert_eq!(t.hsize(), 16);
    }

    #[test]
    fn update_never_triggers_expansion() {
        let mut t = store(1);
        t.insert_or_update(b"a", b"1").unwrap();
        assert_eq!(t.hsize(), 1);
        for _ in 0..10 {
            t.insert_or_update(b"a", b"again").unwrap();
        }
        assert_eq!(t.hsize(), 1);
    }

    #[test]
    fn empty_frees_entries_and_resizes() {
        let arena = Arena::default();
        let mut t = KvStore::new(arena.clone(), 8).unwrap();
        for i in 0..10 {
            t.insert_or_update(format!("k{i}").as_bytes(), b"v").unwrap();
        }
        t.empty(t.hsize()).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.iter().count(), 0);
        // Only the bucket charge remains.
        assert_eq!(arena.stats().live_blocks, 1);
        t.empty(64).unwrap();
        assert_eq!(t.hsize(), 64);
    }

    #[test]
    fn drop_releases_everything() {
        let arena = Arena::default();
        {
            let mut t = KvStore::new(arena.clone(), 8).unwrap();
            for i in 0..100 {
                t.insert_or_update(format!("k{i}").as_bytes(), b"value").unwrap();
            }
            assert!(arena.stats().live_blocks > 200);
        }
        assert_eq!(arena.stats().live_blocks, 0);
        assert_eq!(arena.stats().live_bytes, 0);
    }

    #[test]
    fn long_chain_drop_does_not_overflow() {
        let mut t = KvStore::with_functions(Arena::default(), 1, constant_hash, bytes_eq).unwrap();
        // Constant hash keeps every key in one chain whatever the size.
        for i in 0..10_000u32 {
            t.insert_or_update(&i.to_le_bytes(), b"").unwrap();
        }
        assert_eq!(t.max_chain_len(), 10_000);
        drop(t);
    }

    #[test]
    fn creation_fails_on_exhausted_arena() {
        let arena = Arena::new(&ArenaConfig::with_budget(0));
        assert!(matches!(
            KvStore::new(arena, 32),
            Err(ArenaError::AllocationFailed { .. })
        ));
    }

    #[test]
    fn failed_expansion_keeps_table_usable() {
        let bucket_bytes = 2 * mem::size_of::<Link>();
        // Room for the initial buckets and a few short strings, not for
        // the 8-bucket expansion.
        let arena = Arena::new(&ArenaConfig::with_budget(bucket_bytes + 64));
        let mut t = KvStore::new(arena, 2).unwrap();
        for k in [b"a", b"b", b"c", b"d"] {
            t.insert_or_update(k, b"1").unwrap();
        }
        assert_eq!(t.hsize(), 2);
        assert_eq!(t.len(), 4);
        for k in [b"a", b"b", b"c", b"d"] {
            assert_eq!(t.lookup(k), Some(&b"1"[..]));
        }
    }

    proptest! {
        #[test]
        fn matches_btreemap_model(
            ops in proptest::collection::vec(
                (0u8..24, proptest::collection::vec(any::<u8>(), 0..6), any::<bool>()),
                1..200,
            )
        ) {
            let mut t = store(2);
            let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
            for (k, v, is_remove) in ops {
                let key = format!("key{k}").into_bytes();
                if is_remove {
                    let removed = t.remove(&key).map(|e| e.value().to_vec());
                    prop_assert_eq!(removed, model.remove(&key));
                } else {
                    t.insert_or_update(&key, &v).unwrap();
                    model.insert(key, v);
                }
                prop_assert_eq!(t.len(), model.len());
            }
            for (k, v) in &model {
                prop_assert_eq!(t.lookup(k), Some(v.as_slice()));
            }
            prop_assert_eq!(t.iter().count(), model.len());
        }

        #[test]
        fn expansion_is_exactly_fourfold(size in 1usize..16, extra in 0usize..8) {
            let mut t = store(size);
            let threshold = 2 * size;
            for i in 0..threshold - 1 {
                t.insert_or_update(format!("k{i}").as_bytes(), b"v").unwrap();
            }
            prop_assert_eq!(t.hsize(), size);
            t.insert_or_update(b"trigger", b"last").unwrap();
            prop_assert_eq!(t.hsize(), 4 * size);
            for i in 0..extra {
                t.insert_or_update(format!("k{i}").as_bytes(), b"rewritten").unwrap();
            }
            for i in 0..threshold - 1 {
                let expected: &[u8] = if i < extra { b"rewritten" } else { b"v" };
                prop_assert_eq!(t.lookup(format!("k{i}").as_bytes()), Some(expected));
            }
            prop_assert_eq!(t.lookup(b"trigger"), Some(&b"last"[..]));
        }
    }
}
