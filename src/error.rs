//! Error type shared by every structure in the crate.
//!
//! Absence of a key on lookup is never an error: `contains` returns `false` and
//! `find` returns [`NodeRef::NIL`]. Errors are reserved for operations that could
//! not be carried out, and for broken invariants.

use thiserror::Error;

use crate::node::NodeRef;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("node handle {0:?} does not refer to a live node")]
    InvalidHandle(NodeRef),

    #[error("not enough memory to allocate a tree node")]
    NodeAllocation,

    #[error("not enough memory to allocate {capacity} buckets")]
    BucketAllocation { capacity: usize },

    #[error("cannot delete from an empty structure")]
    EmptyStructure,

    #[error("key {0} not found for delete")]
    KeyNotFound(i32),

    #[error("cannot swap the sentinel node")]
    SwapSentinel,

    /// A red-black fix-up met a color configuration that the invariants rule
    /// out: a red node whose parent is also red at the root, or a black-height
    /// deficit with no sibling to borrow from. `Color` has only two values, so
    /// "unknown" refers to the configuration, not to a single node's color.
    #[error("impossible color configuration at node {key}")]
    UnknownColor { key: i32 },

    #[error("rehashing failed, table kept at {capacity} buckets")]
    RehashFailed { capacity: usize },

    #[error("fix-up called on the sentinel node")]
    FixingSentinel,

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("invariant broken at key {key}: {reason}")]
    Corrupted { key: i32, reason: &'static str },
}
