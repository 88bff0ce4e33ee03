//! Prefix tries over byte keys.
//!
//! A [`Trie`] descends one key unit per level from a root sentinel. The
//! [`KeyCodec`](codec::KeyCodec) decides what a unit is: a whole byte mapped
//! through a conversion function ([`ByteTrie`]) or one nibble, low half
//! first ([`NibbleTrie`]). Keys are matched exactly; a stored key's prefix
//! is not itself found unless it was inserted too.

pub mod codec;
mod node;

mod byte;
mod nibble;

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use self::codec::{KeyBuf, KeyCodec};
use self::node::{Descent, NodeId, Nodes, TrieNode};
use crate::Insertion;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::monitor::{MemoryMonitor, MemoryUsage};
use crate::pool::{ChunkPool, PoolStats};

/// Trie with one byte per level.
pub type ByteTrie<V> = Trie<V, codec::ByteCodec>;

/// Trie with one nibble per level, two levels per key byte.
pub type NibbleTrie<V> = Trie<V, codec::NibbleCodec>;

/// Prefix trie storing one `V` per distinct key.
pub struct Trie<V, K> {
    nodes: Nodes<V>,
    root: NodeId<V>,
    codec: K,
    len: usize,
    /// Bytes of one node's child array.
    array_bytes: usize,
    /// Child arrays charged to the monitor, one per live node.
    arrays_charged: usize,
}

impl<V, K: KeyCodec> Trie<V, K> {
    fn with_codec(codec: K, pool: PoolConfig, monitor: Option<Arc<MemoryMonitor>>) -> Result<Self> {
        let mut nodes = ChunkPool::new(pool, monitor)?;
        let fanout = codec.alphabet_size();
        let children_bytes = Self::children_bytes(fanout);
        nodes.monitor().charge(children_bytes)?;
        let root = match nodes.alloc(TrieNode::new(None, 0, 0, fanout)) {
            Ok(root) => root,
            Err(err) => {
                nodes.monitor().refund(children_bytes);
                return Err(err);
            }
        };
        tracing::trace!(fanout, "trie created");
        Ok(Self {
            nodes,
            root,
            codec,
            len: 0,
            array_bytes: children_bytes,
            arrays_charged: 1,
        })
    }

    /// Stores `payload` under `key` unless the key is already present.
    ///
    /// Every node the key needs is paid for before the trie is touched, so a
    /// failed insert leaves it unchanged.
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](Error::InvalidArgument) if a key unit falls
    /// outside the alphabet, [`OutOfMemory`](Error::OutOfMemory) if the new
    /// nodes cannot be allocated.
    pub fn insert(&mut self, key: &[u8], payload: V) -> Result<Insertion<'_, V>> {
        let (from, matched) = match node::descend(&self.nodes, &self.codec, self.root, key) {
            Descent::OutOfAlphabet => {
                return Err(Error::invalid("key unit outside the alphabet"));
            }
            Descent::Complete(end) => (end, None),
            Descent::Partial { node: end, matched } => (end, Some(matched)),
        };

        let target = match matched {
            None => from,
            Some(matched) => {
                let missing = self.codec.units(key).count() - matched;
                self.charge_children(missing)?;
                if let Err(err) = self.nodes.reserve(missing) {
                    self.refund_children(missing);
                    return Err(err);
                }
                self.arrays_charged += missing;
                let units = self.codec.units(key).skip(matched);
                node::extend_path(&mut self.nodes, &self.codec, from, units)?
            }
        };

        if self.nodes[target].payload.is_some() {
            return Ok(Insertion::AlreadyPresent {
                existing: self.nodes[target].payload.as_ref().expect("payload checked above"),
                rejected: payload,
            });
        }
        self.nodes[target].payload = Some(payload);
        self.len += 1;
        Ok(Insertion::Inserted)
    }

    /// Payload stored under exactly `key`.
    #[must_use]
    pub fn search(&self, key: &[u8]) -> Option<&V> {
        match node::descend(&self.nodes, &self.codec, self.root, key) {
            Descent::Complete(end) => self.nodes[end].payload.as_ref(),
            Descent::Partial { .. } | Descent::OutOfAlphabet => None,
        }
    }

    /// Returns `true` if `key` is stored.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.search(key).is_some()
    }

    /// Removes `key`, pruning every node left without payload or children.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let Descent::Complete(end) = node::descend(&self.nodes, &self.codec, self.root, key) else {
            return None;
        };
        let payload = self.nodes[end].payload.take()?;
        self.len -= 1;
        let pruned = node::prune(&mut self.nodes, self.root, end);
        self.release_children(pruned);
        Some(payload)
    }

    /// Visits every stored key and payload, shorter keys before their
    /// extensions and siblings in increasing slot order. Returning
    /// [`ControlFlow::Break`] stops the walk at once.
    pub fn traverse<F>(&self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(&[u8], &V) -> ControlFlow<()>,
    {
        let mut key = KeyBuf::new();
        node::visit(&self.nodes, &self.codec, self.root, 0, &mut key, &mut visitor)
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.destroy_in_place(drop);
    }

    /// Tears the trie down children-first, handing every payload to
    /// `destroy` exactly once. Returns the number of payloads destroyed.
    pub fn destroy_with<F>(mut self, destroy: F) -> usize
    where
        F: FnMut(V),
    {
        self.destroy_in_place(destroy)
    }

    fn destroy_in_place<F>(&mut self, destroy: F) -> usize
    where
        F: FnMut(V),
    {
        let freed_nodes = self.node_count();
        let destroyed = node::teardown(&mut self.nodes, self.root, destroy);
        debug_assert_eq!(destroyed, self.len, "payload count disagrees with trie size");
        self.release_children(freed_nodes);
        self.nodes.restack();
        self.len = 0;
        tracing::debug!(destroyed, freed_nodes, "trie destroyed");
        destroyed
    }

    /// Charges one child array per node, all or nothing.
    fn charge_children(&self, nodes: usize) -> Result<()> {
        for charged in 0..nodes {
            if let Err(err) = self.nodes.monitor().charge(self.array_bytes) {
                self.refund_children(charged);
                return Err(err);
            }
        }
        Ok(())
    }

    fn refund_children(&self, nodes: usize) {
        for _ in 0..nodes {
            self.nodes.monitor().refund(self.array_bytes);
        }
    }

    fn release_children(&mut self, nodes: usize) {
        for _ in 0..nodes {
            self.nodes.monitor().release(self.array_bytes);
        }
        self.arrays_charged -= nodes;
    }

    const fn children_bytes(fanout: usize) -> usize {
        fanout * size_of::<node::Link<V>>()
    }
}

impl<V, K> Trie<V, K> {
    /// Number of stored keys.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no key is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nodes below the root sentinel.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Live memory of the monitor this trie accounts against.
    #[must_use]
    pub fn memory_usage(&self) -> MemoryUsage {
        self.nodes.monitor().usage()
    }

    /// Monitor this trie accounts against.
    #[must_use]
    pub const fn monitor(&self) -> &Arc<MemoryMonitor> {
        self.nodes.monitor()
    }

    /// Node pool counters. The root sentinel counts as one chunk in use.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.nodes.stats()
    }

    /// Releases idle node chunks back to the monitor.
    pub fn trim(&mut self) -> usize {
        self.nodes.trim()
    }
}

impl<V, K> Drop for Trie<V, K> {
    fn drop(&mut self) {
        for _ in 0..self.arrays_charged {
            self.nodes.monitor().release(self.array_bytes);
        }
    }
}

impl<V, K> fmt::Debug for Trie<V, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trie")
            .field("len", &self.len)
            .field("nodes", &self.node_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<V, K: KeyCodec> Trie<V, K> {
    /// Panics unless links, child counts, the key count and the dead-node
    /// rule are all consistent.
    pub(crate) fn assert_invariants(&self) {
        assert!(self.nodes[self.root].parent.is_none(), "root has a parent");
        let mut stack = vec![self.root];
        let mut reachable = 0;
        let mut payloads = 0;
        while let Some(id) = stack.pop() {
            reachable += 1;
            let node = &self.nodes[id];
            payloads += usize::from(node.payload.is_some());
            if id != self.root {
                assert!(!node.is_dead(), "dead node survived pruning");
            }
            let mut children = 0;
            for (slot, &child) in node.children.iter().enumerate() {
                let Some(child) = child else { continue };
                children += 1;
                let child_node = &self.nodes[child];
                assert_eq!(child_node.parent, Some(id), "child's parent link is stale");
                assert_eq!(usize::from(child_node.slot), slot, "child sits in the wrong slot");
                assert_eq!(
                    self.codec.slot(child_node.unit),
                    Some(child_node.slot),
                    "child's unit maps to another slot"
                );
                stack.push(child);
            }
            assert_eq!(usize::from(node.child_count), children, "child count is stale");
        }
        assert_eq!(payloads, self.len, "stored payloads must match len");
        assert_eq!(reachable, self.nodes.len(), "reachable nodes must match live chunks");
    }
}
