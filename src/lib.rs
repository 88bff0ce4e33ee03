//! Allocator-aware ordered and prefix-indexed structures.
//!
//! Every structure keeps its nodes in a [`ChunkPool`]: a slab of fixed-size
//! chunks that grows by whole expansion groups and never moves a chunk once
//! handed out. Links between nodes are [`ChunkId`]s rather than pointers;
//! children own their subtree and parent links are plain back-references.
//! All storage is accounted by a [`MemoryMonitor`], private to one
//! structure or shared between several.
//!
//! # Structures
//!
//! - [`AvlTree`]: self-balancing BST with a Morris (threaded, stackless)
//!   traversal and iterative teardown.
//! - [`ByteTrie`]: one level per key byte, configurable alphabet and
//!   byte-to-slot conversion.
//! - [`NibbleTrie`]: 16-way, two levels per key byte (low nibble first).
//! - [`RadixTree`]: 16-way nibble tree with a non-recursive post-order
//!   traversal.
//!
//! Structures take `&mut self` for mutation and are not internally
//! synchronized. [`Shared`] adds a reader/writer lock and a traversal guard
//! on top: writers fail fast with [`Error::Busy`] while a traversal is live.
//!
//! # Example
//!
//! ```rust
//! use slabtree::{AvlTree, Insertion};
//!
//! let mut tree = AvlTree::ordered();
//! tree.insert(7).unwrap();
//! tree.insert(3).unwrap();
//! assert!(matches!(tree.insert(7).unwrap(), Insertion::AlreadyPresent { .. }));
//! assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![3, 7]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod avl;
pub mod config;
pub mod error;
pub mod monitor;
pub mod pool;
pub mod radix;
pub mod shared;
pub mod trie;

#[cfg(test)]
mod tests;

pub use avl::AvlTree;
pub use config::{MonitorConfig, PoolConfig, TrieConfig};
pub use error::{Error, Result};
pub use monitor::{Block, MemoryMonitor, MemoryStats, MemoryUsage};
pub use pool::{ChunkId, ChunkPool, PoolStats};
pub use radix::RadixTree;
pub use shared::Shared;
pub use trie::{ByteTrie, NibbleTrie, Trie};

/// Result of inserting into any structure of this crate.
///
/// Inserting never overwrites: an equal key keeps its stored payload and the
/// new one is handed back.
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion<'a, V> {
    /// The value was stored.
    Inserted,
    /// An equal key was already stored; nothing changed.
    AlreadyPresent {
        /// Payload already stored under the key.
        existing: &'a V,
        /// The payload passed to the insert.
        rejected: V,
    },
}

impl<V> Insertion<'_, V> {
    /// Returns `true` if the value was stored.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }

    /// Payload already stored under the key, if any.
    #[must_use]
    pub const fn existing(&self) -> Option<&V> {
        match self {
            Self::Inserted => None,
            Self::AlreadyPresent { existing, .. } => Some(*existing),
        }
    }
}
