//! Arena-backed node storage.
//!
//! All nodes of a tree (or of every bucket of a hash table) live in a single
//! `Vec`, addressed by 32-bit indices instead of pointers. Slot 0 is the
//! sentinel: it stands in for every missing child and for the parent of a root,
//! so link fields are always populated with something traversable. Rotations and
//! swaps are plain index reassignments.
//!
//! Released slots go onto a free list and are reused by the next allocation.
//! A released slot is recognisable by its zero occurrence count.

use std::fmt;

use log::warn;

use crate::error::{Error, Result};

/// A 32-bit reference to a node slot in an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct NodeRef(u32);

impl NodeRef {
    /// The sentinel slot.
    pub const NIL: NodeRef = NodeRef(0);

    #[inline]
    pub fn is_nil(self) -> bool {
        self.0 == 0
    }

    #[inline]
    fn new(idx: usize) -> Self {
        debug_assert!(idx < u32::MAX as usize);
        NodeRef(idx as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "NodeRef(NIL)")
        } else {
            write!(f, "NodeRef({})", self.0)
        }
    }
}

/// One tree node. `M` is the balance bookkeeping: a height for AVL trees, a
/// color for red-black trees.
#[derive(Clone, Debug)]
pub struct Node<M> {
    pub(crate) key: i32,
    pub(crate) count: u32,
    pub(crate) parent: NodeRef,
    pub(crate) left: NodeRef,
    pub(crate) right: NodeRef,
    pub(crate) meta: M,
}

impl<M: Copy> Node<M> {
    fn detached(key: i32, meta: M) -> Self {
        Self {
            key,
            count: 1,
            parent: NodeRef::NIL,
            left: NodeRef::NIL,
            right: NodeRef::NIL,
            meta,
        }
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    /// Number of times the key was inserted since the node was created.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn meta(&self) -> M {
        self.meta
    }
}

/// Node storage with the sentinel in slot 0.
#[derive(Clone, Debug)]
pub struct Arena<M> {
    nodes: Vec<Node<M>>,
    free: Vec<NodeRef>,
}

impl<M: Copy> Arena<M> {
    /// Create an arena holding only the sentinel. The sentinel carries the
    /// smallest representable key, a count of one and `sentinel_meta`.
    pub fn new(sentinel_meta: M) -> Self {
        Self {
            nodes: vec![Node::detached(i32::MIN, sentinel_meta)],
            free: Vec::new(),
        }
    }

    /// Allocate a detached node. Fails with [`Error::NodeAllocation`] instead of
    /// aborting when the backing storage cannot grow.
    pub fn alloc(&mut self, key: i32, meta: M) -> Result<NodeRef> {
        let node = Node::detached(key, meta);

        if let Some(slot) = self.free.pop() {
            self.nodes[slot.index()] = node;
            return Ok(slot);
        }

        if self.nodes.len() >= u32::MAX as usize {
            warn!("node arena is full ({} slots)", self.nodes.len());
            return Err(Error::NodeAllocation);
        }

        if self.nodes.try_reserve(1).is_err() {
            warn!("not enough memory to grow the node arena past {} slots", self.nodes.len());
            return Err(Error::NodeAllocation);
        }

        let idx = self.nodes.len();
        self.nodes.push(node);
        Ok(NodeRef::new(idx))
    }

    /// Return a node's slot to the free list.
    pub fn release(&mut self, n: NodeRef) {
        debug_assert!(!n.is_nil(), "the sentinel is never released");
        let node = &mut self.nodes[n.index()];
        node.count = 0;
        node.parent = NodeRef::NIL;
        node.left = NodeRef::NIL;
        node.right = NodeRef::NIL;
        self.free.push(n);
    }

    /// Reset a live node's links so it can be linked into another tree.
    pub(crate) fn detach(&mut self, n: NodeRef, meta: M) {
        debug_assert!(!n.is_nil());
        let node = &mut self.nodes[n.index()];
        node.parent = NodeRef::NIL;
        node.left = NodeRef::NIL;
        node.right = NodeRef::NIL;
        node.meta = meta;
    }

    /// Look up a live node. The sentinel, released slots and out-of-range
    /// handles are rejected.
    pub fn get(&self, n: NodeRef) -> Result<&Node<M>> {
        match self.nodes.get(n.index()) {
            Some(node) if !n.is_nil() && node.count > 0 => Ok(node),
            _ => Err(Error::InvalidHandle(n)),
        }
    }

    /// Number of live nodes.
    pub fn live(&self) -> usize {
        self.nodes.len() - 1 - self.free.len()
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node<M>>()
            + self.free.capacity() * std::mem::size_of::<NodeRef>()
    }

    #[inline]
    pub(crate) fn node(&self, n: NodeRef) -> &Node<M> {
        &self.nodes[n.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, n: NodeRef) -> &mut Node<M> {
        debug_assert!(!n.is_nil(), "the sentinel is never written");
        &mut self.nodes[n.index()]
    }

    #[inline]
    pub(crate) fn key(&self, n: NodeRef) -> i32 {
        self.node(n).key
    }

    #[inline]
    pub(crate) fn parent(&self, n: NodeRef) -> NodeRef {
        self.node(n).parent
    }

    #[inline]
    pub(crate) fn left(&self, n: NodeRef) -> NodeRef {
        self.node(n).left
    }

    #[inline]
    pub(crate) fn right(&self, n: NodeRef) -> NodeRef {
        self.node(n).right
    }

    #[inline]
    pub(crate) fn meta(&self, n: NodeRef) -> M {
        self.node(n).meta
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, n: NodeRef, parent: NodeRef) {
        self.node_mut(n).parent = parent;
    }

    #[inline]
    pub(crate) fn set_left(&mut self, n: NodeRef, left: NodeRef) {
        self.node_mut(n).left = left;
    }

    #[inline]
    pub(crate) fn set_right(&mut self, n: NodeRef, right: NodeRef) {
        self.node_mut(n).right = right;
    }

    #[inline]
    pub(crate) fn set_meta(&mut self, n: NodeRef, meta: M) {
        self.node_mut(n).meta = meta;
    }

    #[inline]
    pub(crate) fn bump_count(&mut self, n: NodeRef) {
        let node = self.node_mut(n);
        node.count = node.count.saturating_add(1);
    }
}
