//! Sentinel binary-search-tree engine shared by both balancing strategies.
//!
//! Every structural operation works on an [`Arena`] plus a caller-owned root
//! slot. A standalone [`Tree`] owns one root; the bucket hash table owns one
//! root per bucket and a single arena for all of them, so the same engine serves
//! both without knowing which one it is driving.
//!
//! Balancing is plugged in through [`Balancer`]: the engine finds insertion
//! points, links leaves, splices nodes out and hands the mutation point to the
//! balancer's fix-up, which walks back up towards the root.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::node::{Arena, Node, NodeRef};

/// A balancing strategy: its per-node bookkeeping and its two fix-up walks.
pub trait Balancer {
    /// Height (AVL) or color (red-black).
    type Meta: Copy + Eq + fmt::Debug;

    /// Short name used in logs and reports.
    const NAME: &'static str;

    /// Bookkeeping of the sentinel. Never changes.
    const SENTINEL: Self::Meta;

    /// Bookkeeping of a freshly created leaf.
    const LEAF: Self::Meta;

    /// Restore balance after `node` was linked as a new leaf.
    fn insert_fixup(
        arena: &mut Arena<Self::Meta>,
        root: &mut NodeRef,
        node: NodeRef,
    ) -> Result<()>;

    /// Restore balance after a node was spliced out.
    fn delete_fixup(
        arena: &mut Arena<Self::Meta>,
        root: &mut NodeRef,
        removal: Removal<Self::Meta>,
    ) -> Result<()>;

    /// Check the strategy's own invariant over the subtree at `root`.
    fn check_balance(arena: &Arena<Self::Meta>, root: NodeRef) -> Result<()>;
}

/// What a splice left behind: the child that took the removed node's place
/// (possibly the sentinel), that child's new parent, and the bookkeeping the
/// removed node carried.
#[derive(Clone, Copy, Debug)]
pub struct Removal<M> {
    pub child: NodeRef,
    pub parent: NodeRef,
    pub meta: M,
}

enum Probe {
    Found(NodeRef),
    Vacant(NodeRef),
}

impl<M: Copy> Arena<M> {
    fn probe(&self, root: NodeRef, key: i32) -> Probe {
        let mut parent = NodeRef::NIL;
        let mut it = root;

        while !it.is_nil() {
            parent = it;
            it = match key.cmp(&self.key(it)) {
                Ordering::Less => self.left(it),
                Ordering::Greater => self.right(it),
                Ordering::Equal => return Probe::Found(it),
            };
        }

        Probe::Vacant(parent)
    }

    /// Find the node holding `key`, or the sentinel.
    pub(crate) fn find(&self, root: NodeRef, key: i32) -> NodeRef {
        match self.probe(root, key) {
            Probe::Found(n) => n,
            Probe::Vacant(_) => NodeRef::NIL,
        }
    }

    pub(crate) fn min_node(&self, mut n: NodeRef) -> NodeRef {
        if !n.is_nil() {
            while !self.left(n).is_nil() {
                n = self.left(n);
            }
        }
        n
    }

    pub(crate) fn max_node(&self, mut n: NodeRef) -> NodeRef {
        if !n.is_nil() {
            while !self.right(n).is_nil() {
                n = self.right(n);
            }
        }
        n
    }

    fn link_leaf(&mut self, root: &mut NodeRef, parent: NodeRef, node: NodeRef) {
        if parent.is_nil() {
            *root = node;
            return;
        }

        self.set_parent(node, parent);
        if self.key(parent) > self.key(node) {
            self.set_left(parent, node);
        } else {
            self.set_right(parent, node);
        }
    }

    /// Put `new` where `old` hangs under `parent` (or at the root).
    fn replace_child(&mut self, root: &mut NodeRef, parent: NodeRef, old: NodeRef, new: NodeRef) {
        if parent.is_nil() {
            *root = new;
        } else if self.left(parent) == old {
            self.set_left(parent, new);
        } else {
            self.set_right(parent, new);
        }

        if !new.is_nil() {
            self.set_parent(new, parent);
        }
    }

    /// Rotate `x` down to the left; its right child takes its place.
    /// Returns the new subtree root.
    pub(crate) fn rotate_left(&mut self, root: &mut NodeRef, x: NodeRef) -> NodeRef {
        let y = self.right(x);
        if x.is_nil() || y.is_nil() {
            return x;
        }

        let inner = self.left(y);
        self.set_right(x, inner);
        if !inner.is_nil() {
            self.set_parent(inner, x);
        }

        let parent = self.parent(x);
        self.replace_child(root, parent, x, y);
        self.set_left(y, x);
        self.set_parent(x, y);
        y
    }

    /// Mirror of [`Arena::rotate_left`].
    pub(crate) fn rotate_right(&mut self, root: &mut NodeRef, x: NodeRef) -> NodeRef {
        let y = self.left(x);
        if x.is_nil() || y.is_nil() {
            return x;
        }

        let inner = self.right(y);
        self.set_left(x, inner);
        if !inner.is_nil() {
            self.set_parent(inner, x);
        }

        let parent = self.parent(x);
        self.replace_child(root, parent, x, y);
        self.set_right(y, x);
        self.set_parent(x, y);
        y
    }

    /// Exchange the tree positions of `a` and `b`: parent, children and
    /// balance bookkeeping. Keys and counts stay with their nodes, so handles
    /// keep naming the same key. Handles `b` being a child of `a`.
    pub(crate) fn swap_nodes(&mut self, root: &mut NodeRef, a: NodeRef, b: NodeRef) -> Result<()> {
        if a.is_nil() || b.is_nil() {
            return Err(Error::SwapSentinel);
        }
        if a == b {
            return Ok(());
        }

        let old_a = self.node(a).clone();
        let old_b = self.node(b).clone();
        let swapped = |x: NodeRef| {
            if x == a {
                b
            } else if x == b {
                a
            } else {
                x
            }
        };

        {
            let n = self.node_mut(a);
            n.parent = swapped(old_b.parent);
            n.left = swapped(old_b.left);
            n.right = swapped(old_b.right);
            n.meta = old_b.meta;
        }
        {
            let n = self.node_mut(b);
            n.parent = swapped(old_a.parent);
            n.left = swapped(old_a.left);
            n.right = swapped(old_a.right);
            n.meta = old_a.meta;
        }

        // Outer neighbours still point at the old occupant.
        for (n, other) in [(a, b), (b, a)] {
            let parent = self.parent(n);
            if parent.is_nil() {
                *root = n;
            } else if parent != a && parent != b {
                if self.left(parent) == other {
                    self.set_left(parent, n);
                } else {
                    self.set_right(parent, n);
                }
            }

            for child in [self.left(n), self.right(n)] {
                if !child.is_nil() && child != a && child != b {
                    self.set_parent(child, n);
                }
            }
        }

        Ok(())
    }

    /// Unlink a node with at most one real child, lifting that child (or the
    /// sentinel) into its slot.
    fn splice_out(&mut self, root: &mut NodeRef, n: NodeRef) -> (NodeRef, NodeRef) {
        debug_assert!(self.left(n).is_nil() || self.right(n).is_nil());

        let child = if self.left(n).is_nil() {
            self.right(n)
        } else {
            self.left(n)
        };
        let parent = self.parent(n);
        self.replace_child(root, parent, n, child);
        (child, parent)
    }

    pub(crate) fn walk_inorder(&self, n: NodeRef, f: &mut impl FnMut(&Node<M>)) {
        if n.is_nil() {
            return;
        }
        self.walk_inorder(self.left(n), f);
        f(self.node(n));
        self.walk_inorder(self.right(n), f);
    }

    /// Post-order release of a whole subtree, stopping at the sentinel.
    pub(crate) fn release_subtree(&mut self, n: NodeRef) {
        if n.is_nil() {
            return;
        }
        let (left, right) = (self.left(n), self.right(n));
        self.release_subtree(left);
        self.release_subtree(right);
        self.release(n);
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub(crate) fn depth(&self, n: NodeRef) -> usize {
        if n.is_nil() {
            return 0;
        }
        1 + self.depth(self.left(n)).max(self.depth(self.right(n)))
    }

    /// Check ordering, parent links and counts below `root`; returns the
    /// number of nodes found.
    pub(crate) fn check_links(&self, root: NodeRef) -> Result<usize> {
        if !root.is_nil() && !self.parent(root).is_nil() {
            return Err(Error::Corrupted {
                key: self.key(root),
                reason: "root has a parent",
            });
        }
        self.check_subtree(root, None, None)
    }

    fn check_subtree(&self, n: NodeRef, low: Option<i32>, high: Option<i32>) -> Result<usize> {
        if n.is_nil() {
            return Ok(0);
        }

        let node = self.node(n);
        let corrupted = |reason| Error::Corrupted { key: node.key, reason };

        if node.count == 0 {
            return Err(corrupted("released node still linked"));
        }
        if low.is_some_and(|low| node.key <= low) || high.is_some_and(|high| node.key >= high) {
            return Err(corrupted("key out of order"));
        }
        for child in [node.left, node.right] {
            if !child.is_nil() && self.parent(child) != n {
                return Err(corrupted("child does not point back to its parent"));
            }
        }

        let left = self.check_subtree(node.left, low, Some(node.key))?;
        let right = self.check_subtree(node.right, Some(node.key), high)?;
        Ok(left + right + 1)
    }
}

/// Insert `key` under `root`. An existing key only has its count bumped.
/// Returns whether a node was added.
pub(crate) fn insert_key<B: Balancer>(
    arena: &mut Arena<B::Meta>,
    root: &mut NodeRef,
    key: i32,
    size: &mut usize,
) -> Result<bool> {
    let parent = match arena.probe(*root, key) {
        Probe::Found(n) => {
            arena.bump_count(n);
            return Ok(false);
        }
        Probe::Vacant(parent) => parent,
    };

    let node = arena.alloc(key, B::LEAF)?;
    arena.link_leaf(root, parent, node);
    *size += 1;

    B::insert_fixup(arena, root, node)?;
    Ok(true)
}

/// Link an already allocated, detached node under `root`.
pub(crate) fn attach<B: Balancer>(
    arena: &mut Arena<B::Meta>,
    root: &mut NodeRef,
    node: NodeRef,
) -> Result<()> {
    let key = arena.key(node);
    match arena.probe(*root, key) {
        Probe::Found(_) => Err(Error::Corrupted {
            key,
            reason: "key present in two places",
        }),
        Probe::Vacant(parent) => {
            arena.link_leaf(root, parent, node);
            B::insert_fixup(arena, root, node)
        }
    }
}

/// Remove `key` from under `root`.
///
/// A node with two real children first trades places with its in-order
/// successor, so the node that is physically unlinked has at most one child.
pub(crate) fn delete_key<B: Balancer>(
    arena: &mut Arena<B::Meta>,
    root: &mut NodeRef,
    key: i32,
    size: &mut usize,
) -> Result<()> {
    let node = arena.find(*root, key);
    if node.is_nil() {
        return Err(Error::KeyNotFound(key));
    }

    if !arena.left(node).is_nil() && !arena.right(node).is_nil() {
        let successor = arena.min_node(arena.right(node));
        arena.swap_nodes(root, node, successor)?;
    }

    let meta = arena.meta(node);
    let (child, parent) = arena.splice_out(root, node);
    arena.release(node);
    *size -= 1;

    B::delete_fixup(arena, root, Removal { child, parent, meta })
}

/// In-order iterator over `(key, count)` pairs.
pub struct Iter<'a, M> {
    arena: &'a Arena<M>,
    stack: SmallVec<[NodeRef; 64]>,
}

impl<'a, M: Copy> Iter<'a, M> {
    pub(crate) fn new(arena: &'a Arena<M>, root: NodeRef) -> Self {
        let mut iter = Self {
            arena,
            stack: SmallVec::new(),
        };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut n: NodeRef) {
        while !n.is_nil() {
            self.stack.push(n);
            n = self.arena.left(n);
        }
    }
}

impl<M: Copy> Iterator for Iter<'_, M> {
    type Item = (i32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.stack.pop()?;
        self.push_left_spine(self.arena.right(n));
        let node = self.arena.node(n);
        Some((node.key, node.count))
    }
}

/// A self-balancing binary search tree over `i32` keys with occurrence counts.
///
/// The balancing strategy is chosen by `B`; see [`crate::AvlTree`] and
/// [`crate::RbTree`].
pub struct Tree<B: Balancer> {
    arena: Arena<B::Meta>,
    root: NodeRef,
    size: usize,
    _balancer: PhantomData<B>,
}

impl<B: Balancer> Tree<B> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(B::SENTINEL),
            root: NodeRef::NIL,
            size: 0,
            _balancer: PhantomData,
        }
    }

    /// Insert a key, or bump its count if it is already present.
    pub fn insert(&mut self, key: i32) -> Result<()> {
        insert_key::<B>(&mut self.arena, &mut self.root, key, &mut self.size).map(|_| ())
    }

    pub fn delete(&mut self, key: i32) -> Result<()> {
        if self.root.is_nil() {
            return Err(Error::EmptyStructure);
        }
        delete_key::<B>(&mut self.arena, &mut self.root, key, &mut self.size)
    }

    /// Replace `old` with `new`.
    ///
    /// Fails without touching the tree when `old` is absent. The slot freed by
    /// the delete is reused by the insert, so the insert cannot run out of
    /// memory and lose the key.
    pub fn modify(&mut self, old: i32, new: i32) -> Result<()> {
        self.delete(old)?;
        self.insert(new)
    }

    /// Node holding `key`, or [`NodeRef::NIL`].
    pub fn find(&self, key: i32) -> NodeRef {
        self.arena.find(self.root, key)
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

    pub fn count_of(&self, handle: NodeRef) -> Result<u32> {
        self.arena.get(handle).map(Node::count)
    }

    pub fn min(&self) -> Option<i32> {
        self.arena.get(self.arena.min_node(self.root)).ok().map(Node::key)
    }

    pub fn max(&self) -> Option<i32> {
        self.arena.get(self.arena.max_node(self.root)).ok().map(Node::key)
    }

    pub fn delete_min(&mut self) -> Result<()> {
        let key = self.min().ok_or(Error::EmptyStructure)?;
        self.delete(key)
    }

    pub fn delete_max(&mut self) -> Result<()> {
        let key = self.max().ok_or(Error::EmptyStructure)?;
        self.delete(key)
    }

    pub fn root_key(&self) -> Option<i32> {
        self.arena.get(self.root).ok().map(Node::key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        self.arena.depth(self.root)
    }

    /// Visit every `(key, count)` in ascending key order.
    pub fn traverse_inorder(&self, mut f: impl FnMut(i32, u32)) {
        self.arena.walk_inorder(self.root, &mut |node| f(node.key, node.count));
    }

    pub fn keys(&self) -> Vec<i32> {
        let mut keys = Vec::with_capacity(self.size);
        self.traverse_inorder(|key, _| keys.push(key));
        keys
    }

    pub fn iter(&self) -> Iter<'_, B::Meta> {
        Iter::new(&self.arena, self.root)
    }

    /// Release every node. The tree stays usable.
    pub fn clear(&mut self) {
        self.arena.release_subtree(self.root);
        self.root = NodeRef::NIL;
        self.size = 0;
    }

    /// Check ordering, links, size bookkeeping and the balance invariant.
    pub fn validate(&self) -> Result<()> {
        let nodes = self.arena.check_links(self.root)?;
        if nodes != self.size || nodes != self.arena.live() {
            return Err(Error::Corrupted {
                key: self.root_key().unwrap_or(i32::MIN),
                reason: "size does not match reachable nodes",
            });
        }
        B::check_balance(&self.arena, self.root)
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    #[cfg(test)]
    pub(crate) fn arena(&self) -> &Arena<B::Meta> {
        &self.arena
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> NodeRef {
        self.root
    }
}

impl<B: Balancer> Default for Tree<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Balancer> Clone for Tree<B> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            root: self.root,
            size: self.size,
            _balancer: PhantomData,
        }
    }
}

impl<B: Balancer> fmt::Debug for Tree<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(B::NAME)
            .field("size", &self.size)
            .field("root", &self.root_key())
            .finish()
    }
}

impl<'a, B: Balancer> IntoIterator for &'a Tree<B> {
    type Item = (i32, u32);
    type IntoIter = Iter<'a, B::Meta>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
