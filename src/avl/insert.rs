//! Insertion: descent, leaf link, balance update from the pivot, one rotation.

use std::cmp::Ordering;

use super::node::{AvlNode, Link, NodeId, Nodes, rebalance};
use crate::error::Result;

/// Outcome of [`insert`].
pub enum InsertOutcome<V> {
    /// A new node now holds the value.
    Inserted(NodeId<V>),
    /// An equal value already lives in the returned node; the rejected value
    /// is handed back.
    Present(NodeId<V>, V),
}

/// Inserts `value` unless an equal value is present.
///
/// The descent remembers the *pivot*: the deepest node on the path whose
/// balance is non-zero (or the root). Only nodes from the pivot down change
/// balance, and at most the pivot needs a rotation.
///
/// The new node is allocated before any link is touched, so an allocation
/// failure leaves the tree unchanged.
pub fn insert<V, C>(
    nodes: &mut Nodes<V>,
    root: &mut Link<V>,
    value: V,
    compare: &C,
) -> Result<InsertOutcome<V>>
where
    C: Fn(&V, &V) -> Ordering,
{
    let Some(mut cur) = *root else {
        let id = nodes.alloc(AvlNode::leaf(value, None))?;
        *root = Some(id);
        return Ok(InsertOutcome::Inserted(id));
    };

    let mut pivot = cur;
    let went_left = loop {
        let next = match compare(&value, &nodes[cur].value) {
            Ordering::Equal => return Ok(InsertOutcome::Present(cur, value)),
            Ordering::Less => nodes[cur].left.ok_or(true),
            Ordering::Greater => nodes[cur].right.ok_or(false),
        };
        match next {
            Ok(child) => {
                if nodes[child].balance != 0 {
                    pivot = child;
                }
                cur = child;
            }
            Err(went_left) => break went_left,
        }
    };

    let leaf = nodes.alloc(AvlNode::leaf(value, Some(cur)))?;
    if went_left {
        nodes[cur].left = Some(leaf);
    } else {
        nodes[cur].right = Some(leaf);
    }

    // Every node strictly between pivot and leaf had balance 0 and tilts
    // toward the leaf; the pivot tilts too, possibly to ±2.
    let mut child = leaf;
    let mut parent = cur;
    loop {
        if nodes[parent].left == Some(child) {
            nodes[parent].balance -= 1;
        } else {
            nodes[parent].balance += 1;
        }
        if parent == pivot {
            break;
        }
        child = parent;
        parent = nodes[parent]
            .parent
            .expect("pivot is an ancestor of the new leaf");
    }

    if nodes[pivot].balance.abs() == 2 {
        rebalance(nodes, root, pivot);
    }
    Ok(InsertOutcome::Inserted(leaf))
}
