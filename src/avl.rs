//! Height-balanced (AVL) strategy.
//!
//! Each node stores its height; the sentinel's height is 0. After a mutation
//! the fix-up walks from the change point to the root, recomputing heights and
//! rotating wherever the balance factor (left height minus right height)
//! reaches +-2.

use crate::bst::{Balancer, Removal, Tree};
use crate::error::{Error, Result};
use crate::node::{Arena, NodeRef};

/// Marker type selecting AVL balancing for [`Tree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Avl;

/// AVL tree over `i32` keys.
pub type AvlTree = Tree<Avl>;

/// Which walk is running. A fresh insertion can only leave a child leaning
/// by exactly one, while a deletion can leave it perfectly balanced, so the
/// single-rotation test differs.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Insert,
    Delete,
}

#[inline]
fn height(arena: &Arena<u32>, n: NodeRef) -> u32 {
    arena.meta(n)
}

#[inline]
fn update_height(arena: &mut Arena<u32>, n: NodeRef) {
    if n.is_nil() {
        return;
    }
    let h = 1 + height(arena, arena.left(n)).max(height(arena, arena.right(n)));
    arena.set_meta(n, h);
}

#[inline]
fn balance_factor(arena: &Arena<u32>, n: NodeRef) -> i64 {
    i64::from(height(arena, arena.left(n))) - i64::from(height(arena, arena.right(n)))
}

fn rotate_left(arena: &mut Arena<u32>, root: &mut NodeRef, n: NodeRef) {
    let up = arena.rotate_left(root, n);
    update_height(arena, n);
    update_height(arena, up);
}

fn rotate_right(arena: &mut Arena<u32>, root: &mut NodeRef, n: NodeRef) {
    let up = arena.rotate_right(root, n);
    update_height(arena, n);
    update_height(arena, up);
}

fn rebalance(arena: &mut Arena<u32>, root: &mut NodeRef, start: NodeRef, walk: Walk) {
    let mut n = start;

    while !n.is_nil() {
        update_height(arena, n);
        let factor = balance_factor(arena, n);

        if factor > 1 {
            let left = arena.left(n);
            let child = balance_factor(arena, left);
            let single = match walk {
                Walk::Insert => child == 1,
                Walk::Delete => child >= 0,
            };

            if single {
                rotate_right(arena, root, n);
            } else if child < 0 {
                rotate_left(arena, root, left);
                rotate_right(arena, root, n);
            }
        } else if factor < -1 {
            let right = arena.right(n);
            let child = balance_factor(arena, right);
            let single = match walk {
                Walk::Insert => child == -1,
                Walk::Delete => child <= 0,
            };

            if single {
                rotate_left(arena, root, n);
            } else if child > 0 {
                rotate_right(arena, root, right);
                rotate_left(arena, root, n);
            }
        }

        n = arena.parent(n);
    }
}

impl Balancer for Avl {
    type Meta = u32;

    const NAME: &'static str = "AvlTree";
    const SENTINEL: u32 = 0;
    const LEAF: u32 = 1;

    fn insert_fixup(arena: &mut Arena<u32>, root: &mut NodeRef, node: NodeRef) -> Result<()> {
        if node.is_nil() {
            return Err(Error::FixingSentinel);
        }
        // The new leaf already has height 1; the walk starts at its parent.
        let parent = arena.parent(node);
        rebalance(arena, root, parent, Walk::Insert);
        Ok(())
    }

    fn delete_fixup(arena: &mut Arena<u32>, root: &mut NodeRef, removal: Removal<u32>) -> Result<()> {
        rebalance(arena, root, removal.parent, Walk::Delete);
        Ok(())
    }

    fn check_balance(arena: &Arena<u32>, root: NodeRef) -> Result<()> {
        check_heights(arena, root).map(|_| ())
    }
}

fn check_heights(arena: &Arena<u32>, n: NodeRef) -> Result<u32> {
    if n.is_nil() {
        return if height(arena, n) == 0 {
            Ok(0)
        } else {
            Err(Error::Corrupted {
                key: arena.key(n),
                reason: "sentinel height is not zero",
            })
        };
    }

    let left = check_heights(arena, arena.left(n))?;
    let right = check_heights(arena, arena.right(n))?;
    let corrupted = |reason| Error::Corrupted {
        key: arena.key(n),
        reason,
    };

    if height(arena, n) != 1 + left.max(right) {
        return Err(corrupted("stored height does not match children"));
    }
    if left.abs_diff(right) > 1 {
        return Err(corrupted("balance factor outside -1..=1"));
    }
    Ok(1 + left.max(right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_balanced(t: &AvlTree) {
        t.validate().unwrap();
        let arena = t.arena();
        let mut stack = vec![t.root()];
        while let Some(n) = stack.pop() {
            if n.is_nil() {
                continue;
            }
            let factor = balance_factor(arena, n);
            assert!((-1..=1).contains(&factor), "factor {factor} at {}", arena.key(n));
            stack.push(arena.left(n));
            stack.push(arena.right(n));
        }
    }

    #[test]
    fn test_scenario_five_keys() {
        let mut t = AvlTree::new();
        for key in [10, 20, 5, 15, 25] {
            t.insert(key).unwrap();
            assert_balanced(&t);
        }
        assert_eq!(t.keys(), vec![5, 10, 15, 20, 25]);
        assert_eq!(t.root_key(), Some(10));
        assert_eq!(t.height(), 3);
    }

    #[test]
    fn test_single_rotations() {
        let mut t = AvlTree::new();
        for key in [1, 2, 3] {
            t.insert(key).unwrap();
        }
        assert_eq!(t.root_key(), Some(2));

        let mut t = AvlTree::new();
        for key in [3, 2, 1] {
            t.insert(key).unwrap();
        }
        assert_eq!(t.root_key(), Some(2));
        assert_balanced(&t);
    }

    #[test]
    fn test_double_rotations() {
        let mut t = AvlTree::new();
        for key in [30, 10, 20] {
            t.insert(key).unwrap();
        }
        assert_eq!(t.root_key(), Some(20));
        assert_balanced(&t);

        let mut t = AvlTree::new();
        for key in [10, 30, 20] {
            t.insert(key).unwrap();
        }
        assert_eq!(t.root_key(), Some(20));
        assert_balanced(&t);
    }

    #[test]
    fn test_delete_leaves_balanced_child() {
        // Removing 5 leaves 20's right-hand subtree with factor 0: the delete
        // walk must still use a single rotation.
        let mut t = AvlTree::new();
        for key in [10, 5, 20, 15, 25] {
            t.insert(key).unwrap();
        }
        t.delete(5).unwrap();
        assert_balanced(&t);
        assert_eq!(t.root_key(), Some(20));
        assert_eq!(t.keys(), vec![10, 15, 20, 25]);
    }

    #[test]
    fn test_ascending_inserts_stay_logarithmic() {
        let mut t = AvlTree::new();
        for key in 0..1000 {
            t.insert(key).unwrap();
        }
        assert_balanced(&t);
        // 1.44 * log2(1002) is just under 14.4.
        assert!(t.height() <= 14, "height {}", t.height());
    }

    #[test]
    fn test_delete_everything() {
        let mut t = AvlTree::new();
        let keys: Vec<i32> = (0..200).map(|i| (i * 37) % 211).collect();
        for &key in &keys {
            t.insert(key).unwrap();
        }
        for &key in keys.iter().rev() {
            t.delete(key).unwrap();
            assert_balanced(&t);
        }
        assert!(t.is_empty());
        assert_eq!(t.delete(1), Err(Error::EmptyStructure));
    }

    #[test]
    fn test_insert_then_delete_restores_key_set() {
        let mut t = AvlTree::new();
        for key in [8, 4, 12, 2, 6] {
            t.insert(key).unwrap();
        }
        let before = t.keys();
        t.insert(7).unwrap();
        t.delete(7).unwrap();
        assert_eq!(t.keys(), before);
        assert_eq!(t.len(), 5);
        assert_balanced(&t);
    }

    #[test]
    fn test_detects_bad_height() {
        let mut t = AvlTree::new();
        for key in [2, 1, 3] {
            t.insert(key).unwrap();
        }
        let root = t.root();
        let mut arena = t.arena().clone();
        arena.set_meta(root, 7);
        assert!(matches!(
            Avl::check_balance(&arena, root),
            Err(Error::Corrupted { key: 2, .. })
        ));
    }
}
