//! Hash table whose buckets are red-black trees.
//!
//! Every bucket slot holds the root of an independent red-black tree. All
//! buckets share one node arena and therefore one sentinel. A key lives in
//! bucket `hash(key) % capacity`; the red-black engine is simply pointed at
//! that bucket's root slot.
//!
//! When an insert pushes `len / capacity` above the configured load factor the
//! table grows synchronously before the insert returns, by as many growth steps
//! as it takes to get back under the load factor. Growth reserves the new
//! bucket array first and then relinks the existing nodes into it, so running
//! out of memory leaves the table exactly as it was. Relinking itself only
//! fails on a corrupted table (a key reachable from two places), and then the
//! table is left partially migrated.

use std::fmt;

use log::{debug, warn};

use crate::bst::{self, Balancer, Iter};
use crate::config::HashTableConfig;
use crate::error::{Error, Result};
use crate::node::{Arena, Node, NodeRef};
use crate::rbtree::{Color, RedBlack};

/// Plain hash function pointer, the default hasher type.
pub type HashFn = fn(i32) -> usize;

/// Maps a key to itself (reinterpreted as unsigned).
pub fn identity_hash(key: i32) -> usize {
    key as u32 as usize
}

/// Knuth's multiplicative hash with the 32-bit golden ratio constant.
///
/// The table reduces hashes modulo the capacity, which only sees the low bits
/// of the product. Those keep the key's trailing zeros, so the high half is
/// folded down first.
pub fn multiplicative_hash(key: i32) -> usize {
    let h = (key as u32).wrapping_mul(0x9E37_79B9);
    (h ^ (h >> 16)) as usize
}

fn alloc_buckets(capacity: usize) -> Option<Vec<NodeRef>> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(capacity).ok()?;
    buckets.resize(capacity, NodeRef::NIL);
    Some(buckets)
}

/// Hash table of `i32` keys with red-black tree buckets.
pub struct BucketHashTable<H = HashFn> {
    arena: Arena<Color>,
    buckets: Vec<NodeRef>,
    hash: H,
    config: HashTableConfig,
    size: usize,
}

impl<H: Fn(i32) -> usize> BucketHashTable<H> {
    /// Create a table with the default configuration.
    pub fn new(hash: H) -> Result<Self> {
        Self::with_config(HashTableConfig::default(), hash)
    }

    pub fn with_capacity(capacity: usize, hash: H) -> Result<Self> {
        Self::with_config(HashTableConfig::with_capacity(capacity), hash)
    }

    pub fn with_config(config: HashTableConfig, hash: H) -> Result<Self> {
        config.validate()?;

        let capacity = config.initial_capacity;
        let buckets = alloc_buckets(capacity).ok_or_else(|| {
            warn!("not enough memory for {capacity} hash table buckets");
            Error::BucketAllocation { capacity }
        })?;

        Ok(Self {
            arena: Arena::new(RedBlack::SENTINEL),
            buckets,
            hash,
            config,
            size: 0,
        })
    }

    #[inline]
    fn bucket_index(&self, key: i32) -> usize {
        (self.hash)(key) % self.buckets.len()
    }

    /// Insert a key, or bump its count if it is already present.
    ///
    /// Returns [`Error::RehashFailed`] if the table needed to grow and could
    /// not; the key is stored regardless and the table keeps its old capacity.
    pub fn insert(&mut self, key: i32) -> Result<()> {
        let idx = self.bucket_index(key);
        bst::insert_key::<RedBlack>(&mut self.arena, &mut self.buckets[idx], key, &mut self.size)?;

        if self.needs_rehash() {
            self.rehash()?;
        }
        Ok(())
    }

    pub fn delete(&mut self, key: i32) -> Result<()> {
        if self.size == 0 {
            return Err(Error::EmptyStructure);
        }
        let idx = self.bucket_index(key);
        bst::delete_key::<RedBlack>(&mut self.arena, &mut self.buckets[idx], key, &mut self.size)
    }

    /// Replace `old` with `new`. Fails without touching the table when `old`
    /// is absent.
    pub fn modify(&mut self, old: i32, new: i32) -> Result<()> {
        self.delete(old)?;
        self.insert(new)
    }

    /// Node holding `key`, or [`NodeRef::NIL`].
    pub fn find(&self, key: i32) -> NodeRef {
        self.arena.find(self.buckets[self.bucket_index(key)], key)
    }

    pub fn contains(&self, key: i32) -> bool {
        !self.find(key).is_nil()
    }

    /// Occurrence count of `key`.
    pub fn count(&self, key: i32) -> Option<u32> {
        self.arena.get(self.find(key)).ok().map(Node::count)
    }

    pub fn key_of(&self, handle: NodeRef) -> Result<i32> {
        self.arena.get(handle).map(Node::key)
    }

    /// Smallest key across all buckets.
    pub fn min(&self) -> Option<i32> {
        self.buckets
            .iter()
            .map(|&root| self.arena.min_node(root))
            .filter(|n| !n.is_nil())
            .map(|n| self.arena.key(n))
            .min()
    }

    /// Largest key across all buckets.
    pub fn max(&self) -> Option<i32> {
        self.buckets
            .iter()
            .map(|&root| self.arena.max_node(root))
            .filter(|n| !n.is_nil())
            .map(|n| self.arena.key(n))
            .max()
    }

    pub fn delete_min(&mut self) -> Result<()> {
        let key = self.min().ok_or(Error::EmptyStructure)?;
        self.delete(key)
    }

    pub fn delete_max(&mut self) -> Result<()> {
        let key = self.max().ok_or(Error::EmptyStructure)?;
        self.delete(key)
    }

    /// Number of distinct keys across all buckets.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.size as f64 / self.buckets.len() as f64
    }

    pub fn config(&self) -> &HashTableConfig {
        &self.config
    }

    /// Number of keys in one bucket. The index wraps around the capacity.
    pub fn bucket_len(&self, index: usize) -> usize {
        let mut len = 0;
        self.bucket_traverse_inorder(index, |_, _| len += 1);
        len
    }

    /// Visit one bucket's `(key, count)` pairs in ascending key order. The
    /// index wraps around the capacity.
    pub fn bucket_traverse_inorder(&self, index: usize, mut f: impl FnMut(i32, u32)) {
        let root = self.buckets[index % self.buckets.len()];
        self.arena.walk_inorder(root, &mut |node| f(node.key, node.count));
    }

    /// Visit every bucket in index order, each in ascending key order.
    pub fn traverse_inorder(&self, mut f: impl FnMut(i32, u32)) {
        for &root in &self.buckets {
            self.arena.walk_inorder(root, &mut |node| f(node.key, node.count));
        }
    }

    /// Keys in traversal order (bucket by bucket, not globally sorted).
    pub fn keys(&self) -> Vec<i32> {
        let mut keys = Vec::with_capacity(self.size);
        self.traverse_inorder(|key, _| keys.push(key));
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, u32)> + '_ {
        self.buckets
            .iter()
            .flat_map(move |&root| Iter::new(&self.arena, root))
    }

    /// Release every node. Capacity is kept.
    pub fn clear(&mut self) {
        for idx in 0..self.buckets.len() {
            let root = std::mem::replace(&mut self.buckets[idx], NodeRef::NIL);
            self.arena.release_subtree(root);
        }
        self.size = 0;
    }

    /// Check every bucket as a red-black tree, bucket membership of every
    /// key, and size bookkeeping.
    pub fn validate(&self) -> Result<()> {
        let mut total = 0;

        for (idx, &root) in self.buckets.iter().enumerate() {
            total += self.arena.check_links(root)?;
            RedBlack::check_balance(&self.arena, root)?;

            let mut misplaced = None;
            self.arena.walk_inorder(root, &mut |node| {
                if misplaced.is_none() && self.bucket_index(node.key) != idx {
                    misplaced = Some(node.key);
                }
            });
            if let Some(key) = misplaced {
                return Err(Error::Corrupted {
                    key,
                    reason: "key stored in the wrong bucket",
                });
            }
        }

        if total != self.size || total != self.arena.live() {
            return Err(Error::Corrupted {
                key: i32::MIN,
                reason: "size does not match reachable nodes",
            });
        }
        Ok(())
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage() + self.buckets.capacity() * std::mem::size_of::<NodeRef>()
    }

    fn needs_rehash(&self) -> bool {
        self.load_factor() > self.config.load_factor
    }

    fn rehash(&mut self) -> Result<()> {
        let capacity = self.buckets.len();
        let mut new_capacity = capacity;

        // With a small capacity and load factor one step may not be enough.
        loop {
            new_capacity = match new_capacity.checked_mul(self.config.growth_ratio) {
                Some(c) => c,
                None => {
                    warn!("cannot grow hash table past {capacity} buckets");
                    return Err(Error::RehashFailed { capacity });
                }
            };
            if self.size as f64 / new_capacity as f64 <= self.config.load_factor {
                break;
            }
        }

        self.grow_to(new_capacity)
    }

    fn grow_to(&mut self, new_capacity: usize) -> Result<()> {
        let capacity = self.buckets.len();
        let Some(buckets) = alloc_buckets(new_capacity) else {
            warn!("not enough memory to rehash from {capacity} to {new_capacity} buckets");
            return Err(Error::RehashFailed { capacity });
        };

        debug!("rehashing {} keys from {capacity} to {new_capacity} buckets", self.size);

        let old = std::mem::replace(&mut self.buckets, buckets);
        for root in old {
            self.relink(root)?;
        }
        Ok(())
    }

    /// Move a whole old-bucket subtree into the current buckets, children
    /// first, reusing the nodes and their counts.
    fn relink(&mut self, n: NodeRef) -> Result<()> {
        if n.is_nil() {
            return Ok(());
        }

        let (left, right) = (self.arena.left(n), self.arena.right(n));
        self.relink(left)?;
        self.relink(right)?;

        self.arena.detach(n, RedBlack::LEAF);
        let idx = self.bucket_index(self.arena.key(n));
        bst::attach::<RedBlack>(&mut self.arena, &mut self.buckets[idx], n)
    }
}

impl<H> fmt::Debug for BucketHashTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketHashTable")
            .field("size", &self.size)
            .field("capacity", &self.buckets.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(capacity: usize) -> BucketHashTable {
        BucketHashTable::with_capacity(capacity, identity_hash as HashFn).unwrap()
    }

    #[test]
    fn test_scenario_capacity_four() {
        let mut t = table(4);
        for key in 1..=3 {
            t.insert(key).unwrap();
        }
        // 3 / 4 is exactly the load factor, which does not trigger growth.
        assert_eq!(t.capacity(), 4);

        t.insert(4).unwrap();
        assert_eq!(t.capacity(), 8);
        assert!(t.load_factor() <= 0.75);
        for key in 1..=4 {
            assert!(t.contains(key), "lost key {key}");
        }
        t.validate().unwrap();
    }

    #[test]
    fn test_load_factor_bound_after_inserts() {
        let mut t = table(4);
        for key in 0..1000 {
            t.insert(key * 13 - 500).unwrap();
            assert!(t.load_factor() <= 0.75);
        }
        assert_eq!(t.len(), 1000);
        t.validate().unwrap();
    }

    #[test]
    fn test_small_load_factor_grows_several_steps() {
        let config = HashTableConfig {
            initial_capacity: 1,
            load_factor: 0.3,
            growth_ratio: 2,
        };
        let mut t = BucketHashTable::with_config(config, identity_hash as HashFn).unwrap();

        t.insert(1).unwrap();
        // 1/1 and 1/2 are both above 0.3.
        assert_eq!(t.capacity(), 4);

        for key in 2..200 {
            t.insert(key).unwrap();
            assert!(t.load_factor() <= 0.3, "load factor {} after {key}", t.load_factor());
        }
        t.validate().unwrap();
    }

    #[test]
    fn test_rehash_keeps_keys_and_counts() {
        let mut t = table(8);
        for key in 0..6 {
            t.insert(key).unwrap();
        }
        t.insert(2).unwrap();
        t.insert(2).unwrap();
        let mut before = t.keys();
        before.sort_unstable();
        let capacity = t.capacity();

        t.grow_to(capacity * 2).unwrap();

        let mut after = t.keys();
        after.sort_unstable();
        assert_eq!(before, after);
        assert_eq!(t.count(2), Some(3));
        assert_eq!(t.capacity(), capacity * 2);
        t.validate().unwrap();
    }

    #[test]
    fn test_failed_growth_leaves_table_unchanged() {
        let mut t = table(8);
        for key in [3, 11, 19, 4] {
            t.insert(key).unwrap();
        }
        let keys = t.keys();

        assert_eq!(t.grow_to(usize::MAX), Err(Error::RehashFailed { capacity: 8 }));
        assert_eq!(t.capacity(), 8);
        assert_eq!(t.keys(), keys);
        assert_eq!(t.bucket_len(3), 3);
        t.validate().unwrap();
    }

    #[test]
    fn test_bucket_allocation_failure() {
        let err = BucketHashTable::with_capacity(usize::MAX, identity_hash as HashFn).unwrap_err();
        assert_eq!(err, Error::BucketAllocation { capacity: usize::MAX });
    }

    #[test]
    fn test_colliding_keys_share_a_bucket() {
        let mut t = BucketHashTable::with_capacity(100, |_: i32| 7usize).unwrap();
        for key in 0..50 {
            t.insert(key).unwrap();
        }
        assert_eq!(t.bucket_len(7), 50);
        let mut bucket = Vec::new();
        t.bucket_traverse_inorder(107, |key, _| bucket.push(key));
        assert_eq!(bucket, (0..50).collect::<Vec<_>>());
        t.validate().unwrap();
    }

    #[test]
    fn test_delete_and_empty() {
        let mut t = table(16);
        assert_eq!(t.delete(1), Err(Error::EmptyStructure));
        assert_eq!(t.len(), 0);

        for key in 0..10 {
            t.insert(key).unwrap();
        }
        assert_eq!(t.delete(42), Err(Error::KeyNotFound(42)));
        for key in (0..10).step_by(2) {
            t.delete(key).unwrap();
            t.validate().unwrap();
        }
        assert_eq!(t.len(), 5);
        assert!(!t.contains(4));
        assert!(t.contains(5));
    }

    #[test]
    fn test_min_max_across_buckets() {
        let mut t = table(16);
        assert_eq!((t.min(), t.max()), (None, None));
        assert_eq!(t.delete_max(), Err(Error::EmptyStructure));

        for key in [17, -4, 250, 3, 99] {
            t.insert(key).unwrap();
        }
        assert_eq!((t.min(), t.max()), (Some(-4), Some(250)));

        t.delete_min().unwrap();
        t.delete_max().unwrap();
        assert_eq!((t.min(), t.max()), (Some(3), Some(99)));
    }

    #[test]
    fn test_modify_moves_between_buckets() {
        let mut t = table(16);
        t.insert(1).unwrap();
        t.modify(1, 2).unwrap();
        assert!(!t.contains(1));
        assert!(t.contains(2));
        assert_eq!(t.bucket_len(1), 0);
        assert_eq!(t.bucket_len(2), 1);
        assert_eq!(t.modify(1, 3), Err(Error::KeyNotFound(1)));
        t.validate().unwrap();
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut t = table(4);
        for key in 0..20 {
            t.insert(key).unwrap();
        }
        let capacity = t.capacity();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.capacity(), capacity);
        t.insert(5).unwrap();
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![(5, 1)]);
        t.validate().unwrap();
    }

    #[test]
    fn test_multiplicative_hash_spreads_keys() {
        let mut t = BucketHashTable::with_capacity(64, multiplicative_hash as HashFn).unwrap();
        for key in 0..40 {
            t.insert(key * 64).unwrap();
        }
        // Keys sharing their low six bits must not pile into one bucket.
        assert_eq!(t.capacity(), 64);
        let used = (0..t.capacity()).filter(|&i| t.bucket_len(i) > 0).count();
        assert!(used >= 20, "only {used} buckets used");
        t.validate().unwrap();
    }
}
