//! # lookup-trees
//!
//! Three lookup structures over `i32` keys with occurrence counts:
//!
//! - [`AvlTree`]: height-balanced binary search tree.
//! - [`RbTree`]: red-black tree.
//! - [`BucketHashTable`]: hash table whose buckets are red-black trees and
//!   which doubles its bucket count once the load factor passes 0.75.
//!
//! Trees are sentinel based: every absent child and the root's parent is one
//! shared sentinel node, so the balancing code never branches on "no node".
//! Nodes live in an arena and are named by [`NodeRef`] handles, which stay
//! valid until their key is deleted.
//!
//! Inserting a key that is already present bumps its count instead of adding
//! a node. Deleting a key removes its node regardless of the count.
//!
//! ## Example
//!
//! ```rust
//! use lookup_trees::{identity_hash, AvlTree, BucketHashTable, HashFn, RbTree};
//!
//! let mut avl = AvlTree::new();
//! for key in [10, 20, 5, 15, 25] {
//!     avl.insert(key).unwrap();
//! }
//! assert_eq!(avl.root_key(), Some(10));
//! assert_eq!(avl.keys(), vec![5, 10, 15, 20, 25]);
//!
//! let mut rb = RbTree::new();
//! rb.insert(3).unwrap();
//! rb.insert(3).unwrap();
//! assert_eq!(rb.count(3), Some(2));
//!
//! let mut table = BucketHashTable::with_capacity(4, identity_hash as HashFn).unwrap();
//! for key in 1..=4 {
//!     table.insert(key).unwrap();
//! }
//! assert_eq!(table.capacity(), 8);
//! assert!(table.contains(4));
//! ```

pub mod avl;
pub mod bst;
pub mod config;
pub mod error;
pub mod harness;
pub mod hash_table;
pub mod logging;
pub mod node;
pub mod rbtree;

pub use avl::{Avl, AvlTree};
pub use bst::{Balancer, Iter, Removal, Tree};
pub use config::HashTableConfig;
pub use error::{Error, Result};
pub use hash_table::{identity_hash, multiplicative_hash, BucketHashTable, HashFn};
pub use node::{Arena, Node, NodeRef};
pub use rbtree::{Color, RbTree, RedBlack};

#[cfg(test)]
mod proptests;
