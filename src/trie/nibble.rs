use std::sync::Arc;

use super::NibbleTrie;
use super::codec::NibbleCodec;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::monitor::MemoryMonitor;

impl<V> NibbleTrie<V> {
    /// Empty nibble trie with a private monitor.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if the root sentinel cannot
    /// be allocated.
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default(), None)
    }

    /// Empty nibble trie with explicit pool sizing, accounting against
    /// `monitor` (or a private monitor when `None`).
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](crate::Error::InvalidArgument) for an invalid pool
    /// configuration, [`OutOfMemory`](crate::Error::OutOfMemory) if the root
    /// sentinel cannot be allocated.
    pub fn with_config(pool: PoolConfig, monitor: Option<Arc<MemoryMonitor>>) -> Result<Self> {
        Self::with_codec(NibbleCodec, pool, monitor)
    }
}
