use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

// A narrow key range makes duplicates, hits and deletes of present keys common.
fn key_strategy() -> impl Strategy<Value = i32> {
    -64i32..64
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 50)]
    Insert(#[proptest(strategy = "key_strategy()")] i32),
    #[proptest(weight = 25)]
    Delete(#[proptest(strategy = "key_strategy()")] i32),
    #[proptest(weight = 15)]
    Contains(#[proptest(strategy = "key_strategy()")] i32),
    #[proptest(weight = 8)]
    Modify(
        #[proptest(strategy = "key_strategy()")] i32,
        #[proptest(strategy = "key_strategy()")] i32,
    ),
    #[proptest(weight = 2)]
    DeleteMin,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=600)
}

/// Reference model: key to occurrence count.
#[derive(Default)]
struct Model(BTreeMap<i32, u32>);

impl Model {
    fn insert(&mut self, key: i32) {
        *self.0.entry(key).or_insert(0) += 1;
    }

    fn delete(&mut self, key: i32) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::EmptyStructure);
        }
        self.0.remove(&key).map(|_| ()).ok_or(Error::KeyNotFound(key))
    }

    fn modify(&mut self, old: i32, new: i32) -> Result<()> {
        self.delete(old)?;
        self.insert(new);
        Ok(())
    }

    fn delete_min(&mut self) -> Result<()> {
        self.0.pop_first().map(|_| ()).ok_or(Error::EmptyStructure)
    }

    fn pairs(&self) -> Vec<(i32, u32)> {
        self.0.iter().map(|(&k, &c)| (k, c)).collect()
    }
}

/// Replays `ops` against a structure and the model, validating after every step.
macro_rules! check_equivalence {
    ($t:expr, $ops:expr, $sorted:expr) => {{
        let t = &mut $t;
        let mut m = Model::default();

        for op in $ops {
            match op {
                Op::Insert(key) => {
                    prop_assert_eq!(t.insert(key), Ok(()));
                    m.insert(key);
                }
                Op::Delete(key) => {
                    prop_assert_eq!(t.delete(key), m.delete(key));
                }
                Op::Contains(key) => {
                    prop_assert_eq!(t.contains(key), m.0.contains_key(&key));
                    prop_assert_eq!(t.count(key), m.0.get(&key).copied());
                }
                Op::Modify(old, new) => {
                    prop_assert_eq!(t.modify(old, new), m.modify(old, new));
                }
                Op::DeleteMin => {
                    prop_assert_eq!(t.delete_min(), m.delete_min());
                }
            }

            prop_assert_eq!(t.len(), m.0.len());
            prop_assert_eq!(t.validate(), Ok(()));
        }

        prop_assert_eq!(t.min(), m.0.keys().next().copied());
        prop_assert_eq!(t.max(), m.0.keys().next_back().copied());

        let mut got: Vec<(i32, u32)> = t.iter().collect();
        if $sorted {
            let mut sorted = got.clone();
            sorted.sort_unstable();
            prop_assert_eq!(&got, &sorted);
        } else {
            got.sort_unstable();
        }
        prop_assert_eq!(got, m.pairs());
    }};
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_avl(ops in ops_strategy()) {
        check_equivalence!(AvlTree::new(), ops, true);
    }

    #[test]
    fn prop_equivalence_rb(ops in ops_strategy()) {
        check_equivalence!(RbTree::new(), ops, true);
    }

    #[test]
    fn prop_equivalence_hash_identity(ops in ops_strategy()) {
        let mut table = BucketHashTable::with_capacity(2, identity_hash as HashFn).unwrap();
        check_equivalence!(table, ops, false);
    }

    #[test]
    fn prop_equivalence_hash_multiplicative(ops in ops_strategy(), capacity in 1usize..16) {
        let mut table = BucketHashTable::with_capacity(capacity, multiplicative_hash as HashFn).unwrap();
        check_equivalence!(table, ops, false);
    }

    #[test]
    fn prop_avl_height_bound(keys in prop::collection::vec(any::<i32>(), 1..=2000)) {
        let mut t = AvlTree::new();
        for key in keys {
            t.insert(key).unwrap();
        }
        // h < 1.4405 * log2(n + 2) - 0.3277
        let bound = 1.4405 * ((t.len() + 2) as f64).log2() - 0.3277;
        prop_assert!((t.height() as f64) < bound, "height {} bound {bound}", t.height());
    }

    #[test]
    fn prop_rb_height_bound(keys in prop::collection::vec(any::<i32>(), 1..=2000)) {
        let mut t = RbTree::new();
        for key in keys {
            t.insert(key).unwrap();
        }
        let bound = 2.0 * ((t.len() + 1) as f64).log2();
        prop_assert!((t.height() as f64) <= bound, "height {} bound {bound}", t.height());
    }

    #[test]
    fn prop_handles_survive_other_deletes(
        keys in prop::collection::btree_set(key_strategy(), 2..=40),
        pick in any::<prop::sample::Index>(),
    ) {
        let keys: Vec<i32> = keys.into_iter().collect();
        let kept = keys[pick.index(keys.len())];

        let mut t = RbTree::new();
        for &key in &keys {
            t.insert(key).unwrap();
        }
        let handle = t.find(kept);

        for &key in keys.iter().filter(|&&k| k != kept) {
            t.delete(key).unwrap();
            prop_assert_eq!(t.key_of(handle), Ok(kept));
        }
        prop_assert_eq!(t.root_key(), Some(kept));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const SMALL_SET: [i32; 7] = [4, -2, 9, 0, 7, 1, 12];

#[test]
fn exhaustive_insert_order_small_set() {
    let mut expected = SMALL_SET.to_vec();
    expected.sort_unstable();

    for_each_permutation(&SMALL_SET, |perm| {
        let mut avl = AvlTree::new();
        let mut rb = RbTree::new();
        let mut table = BucketHashTable::with_capacity(3, identity_hash as HashFn).unwrap();

        for &key in &perm {
            avl.insert(key).unwrap();
            rb.insert(key).unwrap();
            table.insert(key).unwrap();
        }

        avl.validate().unwrap();
        rb.validate().unwrap();
        table.validate().unwrap();
        assert_eq!(avl.keys(), expected);
        assert_eq!(rb.keys(), expected);
        assert!(avl.height() <= 4, "{perm:?}");

        let mut keys = table.keys();
        keys.sort_unstable();
        assert_eq!(keys, expected);
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    // Insert in a fixed order, then delete in all permutations.
    let mut base_avl = AvlTree::new();
    let mut base_rb = RbTree::new();
    for &key in &SMALL_SET {
        base_avl.insert(key).unwrap();
        base_rb.insert(key).unwrap();
    }

    for_each_permutation(&SMALL_SET, |perm| {
        let mut avl = base_avl.clone();
        let mut rb = base_rb.clone();
        let mut m: BTreeMap<i32, ()> = SMALL_SET.iter().map(|&k| (k, ())).collect();

        for key in perm {
            avl.delete(key).unwrap();
            rb.delete(key).unwrap();
            m.remove(&key);

            avl.validate().unwrap();
            rb.validate().unwrap();
            let expected: Vec<i32> = m.keys().copied().collect();
            assert_eq!(avl.keys(), expected);
            assert_eq!(rb.keys(), expected);
        }
        assert!(avl.is_empty());
        assert!(rb.root().is_nil());
        assert_eq!(avl.delete(0), Err(Error::EmptyStructure));
    });
}
