//! Removal: successor promotion, splice, rebalance toward the root.

use std::mem;

use super::node::{Link, NodeId, Nodes, leftmost, rebalance, replace_child};

/// Unlinks `target` and returns its value.
///
/// A node with two children trades values with its in-order successor
/// (leftmost of the right subtree) and the successor is spliced out instead,
/// so the physically removed node always has at most one child.
///
/// Unlike insertion, several ancestors may need a rotation: the walk goes up
/// while the subtree it just left got shorter and stops as soon as a balance
/// settles at ±1 or a rotation keeps the subtree height.
pub fn remove<V>(nodes: &mut Nodes<V>, root: &mut Link<V>, target: NodeId<V>) -> V {
    let mut target = target;
    if let (Some(_), Some(right)) = (nodes[target].left, nodes[target].right) {
        let successor = leftmost(nodes, right);
        let (a, b) = nodes
            .pair_mut(target, successor)
            .expect("successor is a distinct live node");
        mem::swap(&mut a.value, &mut b.value);
        target = successor;
    }

    let node = &nodes[target];
    let child = node.left.or(node.right);
    let parent = node.parent;
    let left_shrank = parent.is_some_and(|p| nodes[p].left == Some(target));

    replace_child(nodes, root, parent, target, child);
    if let Some(child) = child {
        nodes[child].parent = parent;
    }
    let removed = nodes.free(target).expect("removed node is live").value;

    let mut next = parent;
    let mut left_shrank = left_shrank;
    while let Some(id) = next {
        nodes[id].balance += if left_shrank { 1 } else { -1 };
        let subtree = match nodes[id].balance {
            -1 | 1 => break,
            0 => id,
            _ => {
                let rebalanced = rebalance(nodes, root, id);
                if rebalanced.height_kept {
                    break;
                }
                rebalanced.root
            }
        };
        next = nodes[subtree].parent;
        if let Some(p) = next {
            left_shrank = nodes[p].left == Some(subtree);
        }
    }

    removed
}
