//! Color-balanced (red-black) strategy.
//!
//! Invariants: the sentinel and the root are black, a red node never has a
//! red child, and every path from a node down to the sentinel crosses the same
//! number of black nodes. The same strategy drives each bucket of
//! [`crate::BucketHashTable`].

use crate::bst::{Balancer, Removal, Tree};
use crate::error::{Error, Result};
use crate::node::{Arena, NodeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
}

/// Marker type selecting red-black balancing for [`Tree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RedBlack;

/// Red-black tree over `i32` keys.
pub type RbTree = Tree<RedBlack>;

#[inline]
fn color(arena: &Arena<Color>, n: NodeRef) -> Color {
    arena.meta(n)
}

#[inline]
fn is_red(arena: &Arena<Color>, n: NodeRef) -> bool {
    color(arena, n) == Color::Red
}

#[inline]
fn is_black(arena: &Arena<Color>, n: NodeRef) -> bool {
    color(arena, n) == Color::Black
}

fn insert_fixup(arena: &mut Arena<Color>, root: &mut NodeRef, node: NodeRef) -> Result<()> {
    let mut z = node;

    while z != *root && is_red(arena, z) && is_red(arena, arena.parent(z)) {
        let parent = arena.parent(z);
        let grandparent = arena.parent(parent);
        if grandparent.is_nil() {
            // A red parent without a parent would be a red root.
            return Err(Error::UnknownColor {
                key: arena.key(parent),
            });
        }

        let parent_is_left = arena.left(grandparent) == parent;
        let uncle = if parent_is_left {
            arena.right(grandparent)
        } else {
            arena.left(grandparent)
        };

        match color(arena, uncle) {
            Color::Red => {
                arena.set_meta(parent, Color::Black);
                arena.set_meta(uncle, Color::Black);
                arena.set_meta(grandparent, Color::Red);
                z = grandparent;
            }
            Color::Black => {
                let z_is_left = arena.left(parent) == z;
                match (parent_is_left, z_is_left) {
                    (true, true) => {
                        arena.set_meta(parent, Color::Black);
                        arena.set_meta(grandparent, Color::Red);
                        arena.rotate_right(root, grandparent);
                        z = parent;
                    }
                    (true, false) => {
                        arena.set_meta(z, Color::Black);
                        arena.set_meta(grandparent, Color::Red);
                        arena.rotate_left(root, parent);
                        arena.rotate_right(root, grandparent);
                    }
                    (false, true) => {
                        arena.set_meta(z, Color::Black);
                        arena.set_meta(grandparent, Color::Red);
                        arena.rotate_right(root, parent);
                        arena.rotate_left(root, grandparent);
                    }
                    (false, false) => {
                        arena.set_meta(parent, Color::Black);
                        arena.set_meta(grandparent, Color::Red);
                        arena.rotate_left(root, grandparent);
                        z = parent;
                    }
                }
            }
        }
    }

    let r = *root;
    if !r.is_nil() {
        arena.set_meta(r, Color::Black);
    }
    Ok(())
}

/// Resolve the missing black left on the path through `x` (a "double black")
/// after a black node was spliced out above it.
fn delete_fixup(
    arena: &mut Arena<Color>,
    root: &mut NodeRef,
    mut x: NodeRef,
    mut parent: NodeRef,
) -> Result<()> {
    while x != *root && is_black(arena, x) {
        if parent.is_nil() {
            return Err(Error::FixingSentinel);
        }

        if arena.left(parent) == x {
            let mut sibling = arena.right(parent);
            if sibling.is_nil() {
                return Err(Error::UnknownColor {
                    key: arena.key(parent),
                });
            }

            if is_red(arena, sibling) {
                arena.set_meta(sibling, Color::Black);
                arena.set_meta(parent, Color::Red);
                arena.rotate_left(root, parent);
                sibling = arena.right(parent);
                if sibling.is_nil() {
                    return Err(Error::UnknownColor {
                        key: arena.key(parent),
                    });
                }
            }

            if is_black(arena, arena.left(sibling)) && is_black(arena, arena.right(sibling)) {
                arena.set_meta(sibling, Color::Red);
                x = parent;
                parent = arena.parent(x);
            } else {
                if is_black(arena, arena.right(sibling)) {
                    let near = arena.left(sibling);
                    arena.set_meta(near, Color::Black);
                    arena.set_meta(sibling, Color::Red);
                    arena.rotate_right(root, sibling);
                    sibling = arena.right(parent);
                }

                let far = arena.right(sibling);
                arena.set_meta(sibling, color(arena, parent));
                arena.set_meta(parent, Color::Black);
                arena.set_meta(far, Color::Black);
                arena.rotate_left(root, parent);
                x = *root;
                parent = NodeRef::NIL;
            }
        } else {
            let mut sibling = arena.left(parent);
            if sibling.is_nil() {
                return Err(Error::UnknownColor {
                    key: arena.key(parent),
                });
            }

            if is_red(arena, sibling) {
                arena.set_meta(sibling, Color::Black);
                arena.set_meta(parent, Color::Red);
                arena.rotate_right(root, parent);
                sibling = arena.left(parent);
                if sibling.is_nil() {
                    return Err(Error::UnknownColor {
                        key: arena.key(parent),
                    });
                }
            }

            if is_black(arena, arena.right(sibling)) && is_black(arena, arena.left(sibling)) {
                arena.set_meta(sibling, Color::Red);
                x = parent;
                parent = arena.parent(x);
            } else {
                if is_black(arena, arena.left(sibling)) {
                    let near = arena.right(sibling);
                    arena.set_meta(near, Color::Black);
                    arena.set_meta(sibling, Color::Red);
                    arena.rotate_left(root, sibling);
                    sibling = arena.left(parent);
                }

                let far = arena.left(sibling);
                arena.set_meta(sibling, color(arena, parent));
                arena.set_meta(parent, Color::Black);
                arena.set_meta(far, Color::Black);
                arena.rotate_right(root, parent);
                x = *root;
                parent = NodeRef::NIL;
            }
        }
    }

    if !x.is_nil() {
        arena.set_meta(x, Color::Black);
    }
    Ok(())
}

impl Balancer for RedBlack {
    type Meta = Color;

    const NAME: &'static str = "RbTree";
    const SENTINEL: Color = Color::Black;
    const LEAF: Color = Color::Red;

    fn insert_fixup(arena: &mut Arena<Color>, root: &mut NodeRef, node: NodeRef) -> Result<()> {
        if node.is_nil() {
            return Err(Error::FixingSentinel);
        }
        insert_fixup(arena, root, node)
    }

    fn delete_fixup(arena: &mut Arena<Color>, root: &mut NodeRef, removal: Removal<Color>) -> Result<()> {
        if removal.meta == Color::Red {
            return Ok(());
        }
        if is_red(arena, removal.child) {
            arena.set_meta(removal.child, Color::Black);
            return Ok(());
        }
        delete_fixup(arena, root, removal.child, removal.parent)
    }

    fn check_balance(arena: &Arena<Color>, root: NodeRef) -> Result<()> {
        if is_red(arena, NodeRef::NIL) {
            return Err(Error::Corrupted {
                key: i32::MIN,
                reason: "sentinel is red",
            });
        }
        if is_red(arena, root) {
            return Err(Error::Corrupted {
                key: arena.key(root),
                reason: "root is red",
            });
        }
        black_height(arena, root).map(|_| ())
    }
}

/// Black nodes on every path from `n` down to the sentinel, counting the
/// sentinel itself.
fn black_height(arena: &Arena<Color>, n: NodeRef) -> Result<usize> {
    if n.is_nil() {
        return Ok(1);
    }

    let corrupted = |reason| Error::Corrupted {
        key: arena.key(n),
        reason,
    };

    if is_red(arena, n) && (is_red(arena, arena.left(n)) || is_red(arena, arena.right(n))) {
        return Err(corrupted("red node with a red child"));
    }

    let left = black_height(arena, arena.left(n))?;
    let right = black_height(arena, arena.right(n))?;
    if left != right {
        return Err(corrupted("black heights differ"));
    }

    Ok(left + usize::from(is_black(arena, n)))
}
