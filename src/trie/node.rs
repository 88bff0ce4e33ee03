//! Trie nodes and the path operations shared by the byte and nibble tries.

use std::ops::ControlFlow;

use super::codec::{KeyBuf, KeyCodec};
use crate::pool::{ChunkId, ChunkPool};

/// Node storage of a trie.
pub type Nodes<V> = ChunkPool<TrieNode<V>>;

/// Handle to a trie node.
pub type NodeId<V> = ChunkId<TrieNode<V>>;

/// Optional node handle.
pub type Link<V> = Option<NodeId<V>>;

/// One trie node.
///
/// A node without a payload exists only as part of a longer key's path; it
/// must then have at least one child. The root sentinel is exempt.
pub struct TrieNode<V> {
    pub(crate) parent: Link<V>,
    pub(crate) children: Box<[Link<V>]>,
    /// Key unit this node stands for.
    pub(crate) unit: u8,
    /// Slot of this node in its parent's `children`.
    pub(crate) slot: u8,
    pub(crate) child_count: u16,
    pub(crate) payload: Option<V>,
}

impl<V> TrieNode<V> {
    pub(crate) fn new(parent: Link<V>, unit: u8, slot: u8, fanout: usize) -> Self {
        Self {
            parent,
            children: vec![None; fanout].into_boxed_slice(),
            unit,
            slot,
            child_count: 0,
            payload: None,
        }
    }

    pub(crate) const fn is_dead(&self) -> bool {
        self.payload.is_none() && self.child_count == 0
    }
}

/// Where the walk along a key's path ended.
pub enum Descent<V> {
    /// Every unit has a node; this is the last one.
    Complete(NodeId<V>),
    /// The path breaks off: `node` is the deepest existing node and
    /// `matched` units were consumed reaching it.
    Partial {
        /// Deepest existing node.
        node: NodeId<V>,
        /// Units consumed.
        matched: usize,
    },
    /// A unit has no slot in the alphabet.
    OutOfAlphabet,
}

/// Follows `key` from `root` as far as existing nodes allow.
pub fn descend<V, K: KeyCodec>(nodes: &Nodes<V>, codec: &K, root: NodeId<V>, key: &[u8]) -> Descent<V> {
    let mut cur = root;
    let mut matched = 0;
    let mut broken = false;
    for unit in codec.units(key) {
        let Some(slot) = codec.slot(unit) else {
            return Descent::OutOfAlphabet;
        };
        if broken {
            continue;
        }
        match nodes[cur].children[usize::from(slot)] {
            Some(child) => {
                cur = child;
                matched += 1;
            }
            None => broken = true,
        }
    }
    if broken {
        Descent::Partial { node: cur, matched }
    } else {
        Descent::Complete(cur)
    }
}

/// Hangs one new node per remaining unit under `from`, returning the last.
///
/// Callers reserve the chunks beforehand, so the allocations cannot fail
/// half-way.
pub fn extend_path<V, K: KeyCodec>(
    nodes: &mut Nodes<V>,
    codec: &K,
    from: NodeId<V>,
    units: impl Iterator<Item = u8>,
) -> crate::Result<NodeId<V>> {
    let fanout = codec.alphabet_size();
    let mut cur = from;
    for unit in units {
        let slot = codec
            .slot(unit)
            .ok_or(crate::Error::invalid("key unit outside the alphabet"))?;
        let child = nodes.alloc(TrieNode::new(Some(cur), unit, slot, fanout))?;
        let parent = &mut nodes[cur];
        parent.children[usize::from(slot)] = Some(child);
        parent.child_count += 1;
        cur = child;
    }
    Ok(cur)
}

/// Unlinks dead nodes from `start` toward the root, stopping at the first
/// node that still has a payload or children. The root is never pruned.
/// Returns the number of nodes freed.
pub fn prune<V>(nodes: &mut Nodes<V>, root: NodeId<V>, start: NodeId<V>) -> usize {
    let mut freed = 0;
    let mut cur = start;
    while cur != root && nodes[cur].is_dead() {
        let node = &nodes[cur];
        let parent = node.parent.expect("non-root trie node has a parent");
        let slot = usize::from(node.slot);

        let parent_node = &mut nodes[parent];
        debug_assert_eq!(parent_node.children[slot], Some(cur), "parent slot does not hold child");
        parent_node.children[slot] = None;
        parent_node.child_count -= 1;

        nodes.free(cur);
        freed += 1;
        cur = parent;
    }
    freed
}

/// Pre-order walk in increasing slot order, calling `visitor` with the
/// reassembled key of every node that carries a payload.
///
/// Recursion depth is the key length in units, not the node count.
pub fn visit<V, K, F>(
    nodes: &Nodes<V>,
    codec: &K,
    id: NodeId<V>,
    depth: usize,
    key: &mut KeyBuf,
    visitor: &mut F,
) -> ControlFlow<()>
where
    K: KeyCodec,
    F: FnMut(&[u8], &V) -> ControlFlow<()>,
{
    let node = &nodes[id];
    if let Some(payload) = &node.payload {
        visitor(key, payload)?;
    }
    for &child in node.children.iter().flatten() {
        codec.push_unit(key, depth, nodes[child].unit);
        let flow = visit(nodes, codec, child, depth + 1, key, visitor);
        codec.pop_unit(key, depth);
        flow?;
    }
    ControlFlow::Continue(())
}

/// Frees every node below `root` children-first, handing payloads to
/// `destroy`. The root itself stays, stripped of its payload and children.
/// Returns the number of payloads destroyed.
pub fn teardown<V, F>(nodes: &mut Nodes<V>, root: NodeId<V>, mut destroy: F) -> usize
where
    F: FnMut(V),
{
    let mut destroyed = 0;
    let mut cur = root;
    loop {
        let node = &nodes[cur];
        if let Some(&child) = node.children.iter().flatten().next() {
            cur = child;
            continue;
        }
        if cur == root {
            break;
        }

        let parent = node.parent.expect("non-root trie node has a parent");
        let slot = usize::from(node.slot);
        let parent_node = &mut nodes[parent];
        parent_node.children[slot] = None;
        parent_node.child_count -= 1;

        if let Some(payload) = nodes.free(cur).and_then(|node| node.payload) {
            destroy(payload);
            destroyed += 1;
        }
        cur = parent;
    }

    if let Some(payload) = nodes[root].payload.take() {
        destroy(payload);
        destroyed += 1;
    }
    destroyed
}
