//! Self-balancing binary search tree (AVL).
//!
//! Nodes live in a [`ChunkPool`](crate::ChunkPool) and refer to each other by
//! [`ChunkId`](crate::ChunkId): children own their subtree, the parent link
//! is a back-reference used by rebalancing and iteration. The ordering comes
//! from a caller-supplied comparator; equal values are never stored twice.

mod insert;
mod node;
mod remove;
mod walk;

use std::cmp::Ordering;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

pub use walk::Iter;

use self::insert::InsertOutcome;
use self::node::{Link, NodeId, Nodes, leftmost, rightmost};
use crate::Insertion;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::monitor::{MemoryMonitor, MemoryUsage};
use crate::pool::{ChunkPool, PoolStats};

/// Comparator used by [`AvlTree::ordered`].
pub type OrdComparator<V> = fn(&V, &V) -> Ordering;

/// AVL tree of `V` ordered by `C`.
pub struct AvlTree<V, C = OrdComparator<V>> {
    nodes: Nodes<V>,
    root: Link<V>,
    len: usize,
    compare: C,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl<V: Ord> AvlTree<V> {
    /// Empty tree ordered by `V`'s [`Ord`] implementation.
    #[must_use]
    pub fn ordered() -> Self {
        Self::new(V::cmp)
    }
}

impl<V, C> AvlTree<V, C>
where
    C: Fn(&V, &V) -> Ordering,
{
    /// Empty tree ordered by `compare`, with a private monitor and the
    /// default pool sizing.
    #[must_use]
    pub fn new(compare: C) -> Self {
        tracing::trace!("avl tree created");
        Self {
            nodes: ChunkPool::default(),
            root: None,
            len: 0,
            compare,
        }
    }

    /// Empty tree with explicit pool sizing, accounting against `monitor`
    /// (or a private monitor when `None`).
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](crate::Error::InvalidArgument) for an invalid pool
    /// configuration, [`OutOfMemory`](crate::Error::OutOfMemory) if the
    /// initial chunks cannot be allocated.
    pub fn with_config(
        compare: C,
        pool: PoolConfig,
        monitor: Option<Arc<MemoryMonitor>>,
    ) -> Result<Self> {
        Ok(Self {
            nodes: ChunkPool::new(pool, monitor)?,
            root: None,
            len: 0,
            compare,
        })
    }

    /// Inserts `value` unless an equal value is already stored.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if the node cannot be
    /// allocated; the tree is unchanged.
    pub fn insert(&mut self, value: V) -> Result<Insertion<'_, V>> {
        match insert::insert(&mut self.nodes, &mut self.root, value, &self.compare)? {
            InsertOutcome::Inserted(_) => {
                self.len += 1;
                Ok(Insertion::Inserted)
            }
            InsertOutcome::Present(id, rejected) => Ok(Insertion::AlreadyPresent {
                existing: &self.nodes[id].value,
                rejected,
            }),
        }
    }

    /// Stored value equal to `probe`.
    #[must_use]
    pub fn search(&self, probe: &V) -> Option<&V> {
        self.search_by(|value| (self.compare)(probe, value))
    }

    /// Returns `true` if a value equal to `probe` is stored.
    #[must_use]
    pub fn contains(&self, probe: &V) -> bool {
        self.search(probe).is_some()
    }

    /// Removes and returns the stored value equal to `probe`.
    pub fn remove(&mut self, probe: &V) -> Option<V> {
        let id = self.find(|value| (self.compare)(probe, value))?;
        self.len -= 1;
        Some(remove::remove(&mut self.nodes, &mut self.root, id))
    }
}

// ---------------------------------------------------------------------------
// Accessors and walks, no comparator needed
// ---------------------------------------------------------------------------

impl<V, C> AvlTree<V, C> {
    /// Number of stored values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no value.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree; 0 when empty.
    ///
    /// Follows the taller child at every level, so it costs O(log n).
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cur = self.root;
        while let Some(id) = cur {
            height += 1;
            let node = &self.nodes[id];
            cur = if node.balance < 0 { node.left } else { node.right };
        }
        height
    }

    /// Searches with a probe closure: `probe(v)` tells whether the wanted
    /// value orders before (`Less`), after (`Greater`) or at `v`.
    #[must_use]
    pub fn search_by<F>(&self, probe: F) -> Option<&V>
    where
        F: FnMut(&V) -> Ordering,
    {
        self.find(probe).map(|id| &self.nodes[id].value)
    }

    /// Smallest value.
    #[must_use]
    pub fn first(&self) -> Option<&V> {
        self.root
            .map(|root| &self.nodes[leftmost(&self.nodes, root)].value)
    }

    /// Largest value.
    #[must_use]
    pub fn last(&self) -> Option<&V> {
        self.root
            .map(|root| &self.nodes[rightmost(&self.nodes, root)].value)
    }

    /// Ascending iterator needing only shared access.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(&self.nodes, self.root, self.len)
    }

    /// Visits every value in ascending order with a Morris traversal.
    ///
    /// Uses no auxiliary memory regardless of tree size. Returning
    /// [`ControlFlow::Break`] stops the visits; the walk itself still runs
    /// to the end to restore the links it borrowed.
    pub fn traverse<F>(&mut self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(&V) -> ControlFlow<()>,
    {
        walk::morris(&mut self.nodes, self.root, |_, value| visitor(value))
    }

    /// Every value in ascending order, gathered by the same Morris walk as
    /// [`traverse`](Self::traverse).
    #[must_use]
    pub fn collect_all(&mut self) -> Vec<&V> {
        let mut ids: Vec<NodeId<V>> = Vec::with_capacity(self.len);
        let _ = walk::morris(&mut self.nodes, self.root, |id, _| {
            ids.push(id);
            ControlFlow::Continue(())
        });
        let nodes = &self.nodes;
        ids.into_iter().map(|id| &nodes[id].value).collect()
    }

    /// Removes every value, children before parents, without recursion.
    pub fn clear(&mut self) {
        self.destroy_in_place(drop);
    }

    /// Tears the tree down children-first, handing every value to
    /// `destroy` exactly once. Returns the number of values destroyed.
    pub fn destroy_with<F>(mut self, destroy: F) -> usize
    where
        F: FnMut(V),
    {
        self.destroy_in_place(destroy)
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

    /// Node pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.nodes.stats()
    }

    /// Releases idle node chunks back to the monitor.
    pub fn trim(&mut self) -> usize {
        self.nodes.trim()
    }

    fn destroy_in_place<F>(&mut self, destroy: F) -> usize
    where
        F: FnMut(V),
    {
        let freed = walk::teardown(&mut self.nodes, self.root.take(), destroy);
        debug_assert_eq!(freed, self.len, "node count disagrees with tree size");
        debug_assert!(self.nodes.is_empty());
        self.nodes.restack();
        self.len = 0;
        tracing::debug!(freed, "avl tree destroyed");
        freed
    }

    fn find<F>(&self, mut probe: F) -> Option<NodeId<V>>
    where
        F: FnMut(&V) -> Ordering,
    {
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            cur = match probe(&node.value) {
                Ordering::Equal => return Some(id),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }
}

impl<V: Ord> Default for AvlTree<V> {
    fn default() -> Self {
        Self::ordered()
    }
}

impl<V, C> fmt::Debug for AvlTree<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvlTree")
            .field("len", &self.len)
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl<'a, V, C> IntoIterator for &'a AvlTree<V, C> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Iter<'a, V> {
        self.iter()
    }
}

impl<V, C> Extend<V> for AvlTree<V, C>
where
    C: Fn(&V, &V) -> Ordering,
{
    /// Inserts values in order, dropping duplicates. Stops at the first
    /// value refused for lack of memory; it and the rest of the iterator
    /// are dropped.
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            if self.insert(value).is_err() {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant checks
// ---------------------------------------------------------------------------

#[cfg(test)]
impl<V, C> AvlTree<V, C>
where
    C: Fn(&V, &V) -> Ordering,
{
    /// Panics unless parent links, balance factors, heights, ordering and
    /// the node count are all consistent.
    pub(crate) fn assert_invariants(&self) {
        if let Some(root) = self.root {
            assert!(self.nodes[root].parent.is_none(), "root has a parent");
        }
        let (count, _) = self.check_subtree(self.root);
        assert_eq!(count, self.len, "reachable nodes must match len");
        assert_eq!(self.nodes.len(), self.len, "live chunks must match len");

        let values: Vec<&V> = self.iter().collect();
        for pair in values.windows(2) {
            assert_eq!(
                (self.compare)(pair[0], pair[1]),
                Ordering::Less,
                "in-order walk must be strictly ascending"
            );
        }
    }

    /// Returns `(node count, height)` of the subtree.
    fn check_subtree(&self, link: Link<V>) -> (usize, usize) {
        let Some(id) = link else {
            return (0, 0);
        };
        let node = &self.nodes[id];
        for child in [node.left, node.right].into_iter().flatten() {
            assert_eq!(self.nodes[child].parent, Some(id), "child's parent link is stale");
        }
        let (left_count, left_height) = self.check_subtree(node.left);
        let (right_count, right_height) = self.check_subtree(node.right);
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let actual = right_height as i64 - left_height as i64;
        assert_eq!(i64::from(node.balance), actual, "stored balance is wrong");
        assert!(actual.abs() <= 1, "node is out of balance");
        (
            left_count + right_count + 1,
            left_height.max(right_height) + 1,
        )
    }
}
