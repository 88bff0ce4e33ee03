//! AVL node layout, rotations and the shared rebalancing table.

use crate::pool::{ChunkId, ChunkPool};

/// Node storage of an AVL tree.
pub type Nodes<V> = ChunkPool<AvlNode<V>>;

/// Handle to an AVL node.
pub type NodeId<V> = ChunkId<AvlNode<V>>;

/// Optional node handle: a child link or a parent back-reference.
pub type Link<V> = Option<NodeId<V>>;

/// One tree node.
///
/// `left`/`right` own their subtree; `parent` is a back-reference used for
/// rebalancing and iteration, never for teardown.
pub struct AvlNode<V> {
    pub(crate) parent: Link<V>,
    pub(crate) left: Link<V>,
    pub(crate) right: Link<V>,
    /// `height(right) - height(left)`; ±2 only between a mutation and its
    /// rotation.
    pub(crate) balance: i8,
    pub(crate) value: V,
}

impl<V> AvlNode<V> {
    pub(crate) const fn leaf(value: V, parent: Link<V>) -> Self {
        Self {
            parent,
            left: None,
            right: None,
            balance: 0,
            value,
        }
    }
}

/// Points `parent`'s link that held `old` at `new`, or the root if `old` had
/// no parent.
pub fn replace_child<V>(
    nodes: &mut Nodes<V>,
    root: &mut Link<V>,
    parent: Link<V>,
    old: NodeId<V>,
    new: Link<V>,
) {
    match parent {
        None => *root = new,
        Some(p) => {
            let node = &mut nodes[p];
            if node.left == Some(old) {
                node.left = new;
            } else {
                debug_assert_eq!(node.right, Some(old), "parent link does not match child");
                node.right = new;
            }
        }
    }
}

/// Rotates `a` down to the left; returns its right child, the new subtree root.
///
/// Balance factors are left to the caller.
pub fn rotate_left<V>(nodes: &mut Nodes<V>, root: &mut Link<V>, a: NodeId<V>) -> NodeId<V> {
    let b = nodes[a].right.expect("left rotation needs a right child");
    let inner = nodes[b].left;
    let parent = nodes[a].parent;

    nodes[a].right = inner;
    if let Some(inner) = inner {
        nodes[inner].parent = Some(a);
    }
    nodes[b].left = Some(a);
    nodes[a].parent = Some(b);
    nodes[b].parent = parent;
    replace_child(nodes, root, parent, a, Some(b));
    b
}

/// Rotates `a` down to the right; returns its left child, the new subtree root.
pub fn rotate_right<V>(nodes: &mut Nodes<V>, root: &mut Link<V>, a: NodeId<V>) -> NodeId<V> {
    let b = nodes[a].left.expect("right rotation needs a left child");
    let inner = nodes[b].right;
    let parent = nodes[a].parent;

    nodes[a].left = inner;
    if let Some(inner) = inner {
        nodes[inner].parent = Some(a);
    }
    nodes[b].right = Some(a);
    nodes[a].parent = Some(b);
    nodes[b].parent = parent;
    replace_child(nodes, root, parent, a, Some(b));
    b
}

/// Outcome of rebalancing one node whose balance reached ±2.
pub struct Rebalanced<V> {
    /// Root of the rotated subtree.
    pub root: NodeId<V>,
    /// `true` if the subtree is as tall as before the rotation. Only a
    /// single rotation over a perfectly balanced child (a deletion case)
    /// keeps the height.
    pub height_kept: bool,
}

/// Applies the rotation matching `a`'s ±2 balance and its heavy child's
/// balance (LL, LR, RR or RL) and fixes every balance factor involved.
pub fn rebalance<V>(nodes: &mut Nodes<V>, root: &mut Link<V>, a: NodeId<V>) -> Rebalanced<V> {
    if nodes[a].balance < 0 {
        rebalance_left_heavy(nodes, root, a)
    } else {
        rebalance_right_heavy(nodes, root, a)
    }
}

fn rebalance_left_heavy<V>(nodes: &mut Nodes<V>, root: &mut Link<V>, a: NodeId<V>) -> Rebalanced<V> {
    debug_assert_eq!(nodes[a].balance, -2);
    let b = nodes[a].left.expect("left-heavy node has a left child");
    let b_balance = nodes[b].balance;

    if b_balance <= 0 {
        // Left-left.
        let top = rotate_right(nodes, root, a);
        if b_balance == 0 {
            nodes[a].balance = -1;
            nodes[b].balance = 1;
        } else {
            nodes[a].balance = 0;
            nodes[b].balance = 0;
        }
        return Rebalanced {
            root: top,
            height_kept: b_balance == 0,
        };
    }

    // Left-right.
    let c = nodes[b].right.expect("left-right case has an inner grandchild");
    let c_balance = nodes[c].balance;
    rotate_left(nodes, root, b);
    let top = rotate_right(nodes, root, a);
    nodes[a].balance = i8::from(c_balance < 0);
    nodes[b].balance = -i8::from(c_balance > 0);
    nodes[c].balance = 0;
    Rebalanced {
        root: top,
        height_kept: false,
    }
}

fn rebalance_right_heavy<V>(
    nodes: &mut Nodes<V>,
    root: &mut Link<V>,
    a: NodeId<V>,
) -> Rebalanced<V> {
    debug_assert_eq!(nodes[a].balance, 2);
    let b = nodes[a].right.expect("right-heavy node has a right child");
    let b_balance = nodes[b].balance;

    if b_balance >= 0 {
        // Right-right.
        let top = rotate_left(nodes, root, a);
        if b_balance == 0 {
            nodes[a].balance = 1;
            nodes[b].balance = -1;
        } else {
            nodes[a].balance = 0;
            nodes[b].balance = 0;
        }
        return Rebalanced {
            root: top,
            height_kept: b_balance == 0,
        };
    }

    // Right-left.
    let c = nodes[b].left.expect("right-left case has an inner grandchild");
    let c_balance = nodes[c].balance;
    rotate_right(nodes, root, b);
    let top = rotate_left(nodes, root, a);
    nodes[a].balance = -i8::from(c_balance > 0);
    nodes[b].balance = i8::from(c_balance < 0);
    nodes[c].balance = 0;
    Rebalanced {
        root: top,
        height_kept: false,
    }
}

/// Leftmost node of the subtree rooted at `id`.
pub fn leftmost<V>(nodes: &Nodes<V>, mut id: NodeId<V>) -> NodeId<V> {
    while let Some(left) = nodes[id].left {
        id = left;
    }
    id
}

/// Rightmost node of the subtree rooted at `id`.
pub fn rightmost<V>(nodes: &Nodes<V>, mut id: NodeId<V>) -> NodeId<V> {
    while let Some(right) = nodes[id].right {
        id = right;
    }
    id
}
