//! Whole-tree walks: Morris in-order traversal, the shared in-order
//! iterator and iterative teardown. None of them recurse or keep a stack.

use std::iter::FusedIterator;
use std::ops::ControlFlow;

use super::node::{Link, NodeId, Nodes, leftmost};

/// In-order Morris traversal.
///
/// Threads each in-order predecessor's empty right link back to its
/// successor while descending and clears the thread on the way back, so the
/// tree has its original shape when this returns. After `visit` breaks the
/// walk keeps going, without calling `visit`, until every thread is undone.
pub fn morris<V, F>(nodes: &mut Nodes<V>, root: Link<V>, mut visit: F) -> ControlFlow<()>
where
    F: FnMut(NodeId<V>, &V) -> ControlFlow<()>,
{
    let mut stopped = false;
    let mut cur = root;
    while let Some(id) = cur {
        let Some(left) = nodes[id].left else {
            if !stopped {
                stopped = visit(id, &nodes[id].value).is_break();
            }
            cur = nodes[id].right;
            continue;
        };

        let mut pred = left;
        while let Some(right) = nodes[pred].right {
            if right == id {
                break;
            }
            pred = right;
        }

        if nodes[pred].right.is_none() {
            nodes[pred].right = Some(id);
            cur = Some(left);
        } else {
            nodes[pred].right = None;
            if !stopped {
                stopped = visit(id, &nodes[id].value).is_break();
            }
            cur = nodes[id].right;
        }
    }

    if stopped {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

/// Frees every node children-first, handing each value to `destroy`.
///
/// Climbs back through parent links instead of keeping a stack; a child's
/// link is cleared when it is freed so the parent is revisited as a leaf.
/// Returns the number of nodes freed.
pub fn teardown<V, F>(nodes: &mut Nodes<V>, root: Link<V>, mut destroy: F) -> usize
where
    F: FnMut(V),
{
    let mut freed = 0;
    let mut cur = root;
    while let Some(id) = cur {
        let node = &nodes[id];
        if let Some(child) = node.left.or(node.right) {
            cur = Some(child);
            continue;
        }

        let parent = node.parent;
        if let Some(p) = parent {
            let parent_node = &mut nodes[p];
            if parent_node.left == Some(id) {
                parent_node.left = None;
            } else {
                parent_node.right = None;
            }
        }
        let node = nodes.free(id).expect("teardown visits live nodes once");
        destroy(node.value);
        freed += 1;
        cur = parent;
    }
    freed
}

/// In-order successor through parent links.
fn successor<V>(nodes: &Nodes<V>, id: NodeId<V>) -> Link<V> {
    if let Some(right) = nodes[id].right {
        return Some(leftmost(nodes, right));
    }
    let mut child = id;
    let mut parent = nodes[id].parent;
    while let Some(p) = parent {
        if nodes[p].left == Some(child) {
            return Some(p);
        }
        child = p;
        parent = nodes[p].parent;
    }
    None
}

/// Ascending iterator over an [`AvlTree`](super::AvlTree).
///
/// Walks parent links, so it needs only shared access and constant
/// auxiliary space.
pub struct Iter<'a, V> {
    nodes: &'a Nodes<V>,
    next: Link<V>,
    remaining: usize,
}

impl<'a, V> Iter<'a, V> {
    pub(super) fn new(nodes: &'a Nodes<V>, root: Link<V>, len: usize) -> Self {
        Self {
            nodes,
            next: root.map(|r| leftmost(nodes, r)),
            remaining: len,
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        let id = self.next?;
        self.next = successor(self.nodes, id);
        self.remaining -= 1;
        Some(&self.nodes[id].value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}
