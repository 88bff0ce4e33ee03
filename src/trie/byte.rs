use std::sync::Arc;

use super::ByteTrie;
use super::codec::{ByteCodec, Convert, identity};
use crate::config::TrieConfig;
use crate::error::Result;
use crate::monitor::MemoryMonitor;

impl<V> ByteTrie<V> {
    /// Empty trie over `config.alphabet_size` symbols; `convert` maps each
    /// key byte to a child slot.
    ///
    /// Keys containing a byte that converts to a slot at or past the
    /// alphabet size are rejected on insert.
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](crate::Error::InvalidArgument) for an invalid
    /// configuration, [`OutOfMemory`](crate::Error::OutOfMemory) if the root
    /// sentinel cannot be allocated.
    pub fn new(config: TrieConfig, convert: Convert) -> Result<Self> {
        Self::with_monitor(config, convert, None)
    }

    /// Like [`new`](Self::new), accounting against `monitor`.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new).
    pub fn with_monitor(
        config: TrieConfig,
        convert: Convert,
        monitor: Option<Arc<MemoryMonitor>>,
    ) -> Result<Self> {
        config.validate()?;
        Self::with_codec(
            ByteCodec::new(config.alphabet_size, convert),
            config.pool,
            monitor,
        )
    }

    /// Empty trie over all 256 byte values.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if the root sentinel cannot
    /// be allocated.
    pub fn bytes() -> Result<Self> {
        Self::new(TrieConfig::default(), identity)
    }
}
