//! Nibble radix tree with a non-recursive traversal.
//!
//! Same key model as [`NibbleTrie`](crate::NibbleTrie): 16 children per node,
//! each key byte split into its low nibble then its high nibble. Nodes carry
//! their child links inline, so a node is exactly one pool chunk.
//!
//! The traversal keeps its cursor in an explicit frame stack of
//! `(node, next slot)` pairs instead of in the nodes, so it needs only shared
//! access, leaves nothing behind when it stops and may stop at any point.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::Insertion;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::monitor::{MemoryMonitor, MemoryUsage};
use crate::pool::{ChunkId, ChunkPool, PoolStats};
use crate::trie::codec::{KeyBuf, KeyCodec, NIBBLE_FANOUT, NibbleCodec};

type NodeId<V> = ChunkId<RadixNode<V>>;
type Link<V> = Option<NodeId<V>>;

/// One radix tree node.
struct RadixNode<V> {
    parent: Link<V>,
    children: [Link<V>; NIBBLE_FANOUT],
    nibble: u8,
    child_count: u8,
    payload: Option<V>,
}

impl<V> RadixNode<V> {
    const fn new(parent: Link<V>, nibble: u8) -> Self {
        Self {
            parent,
            children: [None; NIBBLE_FANOUT],
            nibble,
            child_count: 0,
            payload: None,
        }
    }

    const fn is_dead(&self) -> bool {
        self.payload.is_none() && self.child_count == 0
    }
}

/// Traversal frame: a node and the next child slot to look at.
struct Frame<V> {
    node: NodeId<V>,
    next: u8,
}

/// Frames stay inline for keys up to 31 bytes.
type Frames<V> = SmallVec<[Frame<V>; 64]>;

/// 16-way radix tree storing one `V` per distinct byte key.
pub struct RadixTree<V> {
    nodes: ChunkPool<RadixNode<V>>,
    root: NodeId<V>,
    len: usize,
}

impl<V> RadixTree<V> {
    /// Empty tree with a private monitor.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if the root sentinel cannot
    /// be allocated.
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default(), None)
    }

    /// Empty tree with explicit pool sizing, accounting against `monitor`
    /// (or a private monitor when `None`).
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](crate::Error::InvalidArgument) for an invalid pool
    /// configuration, [`OutOfMemory`](crate::Error::OutOfMemory) if the root
    /// sentinel cannot be allocated.
    pub fn with_config(pool: PoolConfig, monitor: Option<Arc<MemoryMonitor>>) -> Result<Self> {
        let mut nodes = ChunkPool::new(pool, monitor)?;
        let root = nodes.alloc(RadixNode::new(None, 0))?;
        tracing::trace!("radix tree created");
        Ok(Self {
            nodes,
            root,
            len: 0,
        })
    }

    /// Stores `payload` under `key` unless the key is already present.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if the new nodes cannot be
    /// allocated; the tree is unchanged.
    pub fn insert(&mut self, key: &[u8], payload: V) -> Result<Insertion<'_, V>> {
        let (mut cur, matched) = self.descend(key);
        let total = key.len() * 2;
        if matched < total {
            self.nodes.reserve(total - matched)?;
            for nibble in NibbleCodec.units(key).skip(matched) {
                let child = self.nodes.alloc(RadixNode::new(Some(cur), nibble))?;
                let parent = &mut self.nodes[cur];
                parent.children[usize::from(nibble)] = Some(child);
                parent.child_count += 1;
                cur = child;
            }
        }

        if self.nodes[cur].payload.is_some() {
            return Ok(Insertion::AlreadyPresent {
                existing: self.nodes[cur].payload.as_ref().expect("payload checked above"),
                rejected: payload,
            });
        }
        self.nodes[cur].payload = Some(payload);
        self.len += 1;
        Ok(Insertion::Inserted)
    }

    /// Payload stored under exactly `key`.
    #[must_use]
    pub fn search(&self, key: &[u8]) -> Option<&V> {
        let end = self.find(key)?;
        self.nodes[end].payload.as_ref()
    }

    /// Returns `true` if `key` is stored.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.search(key).is_some()
    }

    /// Removes `key`, pruning every node left without payload or children.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let end = self.find(key)?;
        let payload = self.nodes[end].payload.take()?;
        self.len -= 1;

        let mut cur = end;
        while cur != self.root && self.nodes[cur].is_dead() {
            let node = &self.nodes[cur];
            let parent = node.parent.expect("non-root radix node has a parent");
            let slot = usize::from(node.nibble);
            let parent_node = &mut self.nodes[parent];
            debug_assert_eq!(parent_node.children[slot], Some(cur), "parent slot does not hold child");
            parent_node.children[slot] = None;
            parent_node.child_count -= 1;
            self.nodes.free(cur);
            cur = parent;
        }
        Some(payload)
    }

    /// Visits every stored key and payload in post-order: a key's
    /// extensions come before the key itself, siblings in increasing nibble
    /// order. Returning [`ControlFlow::Break`] stops the walk at once.
    ///
    /// Runs without recursion; the frame stack grows with key length only.
    pub fn traverse<F>(&self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(&[u8], &V) -> ControlFlow<()>,
    {
        let mut key = KeyBuf::new();
        let mut frames: Frames<V> = SmallVec::new();
        frames.push(Frame {
            node: self.root,
            next: 0,
        });

        while let Some(frame) = frames.last_mut() {
            let node = &self.nodes[frame.node];
            let child = node.children[usize::from(frame.next)..]
                .iter()
                .position(Option::is_some);

            if let Some(offset) = child {
                let slot = usize::from(frame.next) + offset;
                frame.next = u8::try_from(slot + 1).expect("nibble slot fits in a byte");
                let child = node.children[slot].expect("slot located above");
                let depth = frames.len() - 1;
                NibbleCodec.push_unit(&mut key, depth, self.nodes[child].nibble);
                frames.push(Frame {
                    node: child,
                    next: 0,
                });
                continue;
            }

            if let Some(payload) = &node.payload {
                visitor(&key, payload)?;
            }
            frames.pop();
            if let Some(depth) = frames.len().checked_sub(1) {
                NibbleCodec.pop_unit(&mut key, depth);
            }
        }
        ControlFlow::Continue(())
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.destroy_in_place(drop);
    }

    /// Tears the tree down children-first, handing every payload to
    /// `destroy` exactly once. Returns the number of payloads destroyed.
    pub fn destroy_with<F>(mut self, destroy: F) -> usize
    where
        F: FnMut(V),
    {
        self.destroy_in_place(destroy)
    }

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

    /// Live memory of the monitor this tree accounts against.
    #[must_use]
    pub fn memory_usage(&self) -> MemoryUsage {
        self.nodes.monitor().usage()
    }

    /// Monitor this tree accounts against.
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

    /// Deepest existing node on `key`'s path and the nibbles consumed.
    fn descend(&self, key: &[u8]) -> (NodeId<V>, usize) {
        let mut cur = self.root;
        let mut matched = 0;
        for nibble in NibbleCodec.units(key) {
            match self.nodes[cur].children[usize::from(nibble)] {
                Some(child) => {
                    cur = child;
                    matched += 1;
                }
                None => break,
            }
        }
        (cur, matched)
    }

    fn find(&self, key: &[u8]) -> Option<NodeId<V>> {
        let (end, matched) = self.descend(key);
        (matched == key.len() * 2).then_some(end)
    }

    fn destroy_in_place<F>(&mut self, mut destroy: F) -> usize
    where
        F: FnMut(V),
    {
        let mut destroyed = 0;
        let mut cur = self.root;
        loop {
            let node = &self.nodes[cur];
            if let Some(&child) = node.children.iter().flatten().next() {
                cur = child;
                continue;
            }
            if cur == self.root {
                break;
            }

            let parent = node.parent.expect("non-root radix node has a parent");
            let slot = usize::from(node.nibble);
            let parent_node = &mut self.nodes[parent];
            parent_node.children[slot] = None;
            parent_node.child_count -= 1;

            if let Some(payload) = self.nodes.free(cur).and_then(|node| node.payload) {
                destroy(payload);
                destroyed += 1;
            }
            cur = parent;
        }
        if let Some(payload) = self.nodes[self.root].payload.take() {
            destroy(payload);
            destroyed += 1;
        }

        debug_assert_eq!(destroyed, self.len, "payload count disagrees with tree size");
        self.nodes.restack();
        self.len = 0;
        tracing::debug!(destroyed, "radix tree destroyed");
        destroyed
    }
}

impl<V> fmt::Debug for RadixTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadixTree")
            .field("len", &self.len)
            .field("nodes", &self.node_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<V> RadixTree<V> {
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
                assert_eq!(usize::from(child_node.nibble), slot, "child sits in the wrong slot");
                stack.push(child);
            }
            assert_eq!(usize::from(node.child_count), children, "child count is stale");
        }
        assert_eq!(payloads, self.len, "stored payloads must match len");
        assert_eq!(reachable, self.nodes.len(), "reachable nodes must match live chunks");
    }
}
