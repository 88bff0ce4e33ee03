//! Construction-time configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Memory monitor configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonitorConfig {
    /// Byte budget. Allocations that would push the live byte count past it
    /// fail with [`Error::OutOfMemory`]. `None` means unlimited.
    pub limit: Option<usize>,
}

impl MonitorConfig {
    /// Unlimited monitor.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { limit: None }
    }

    /// Monitor refusing to hold more than `bytes` live bytes.
    #[must_use]
    pub const fn with_limit(bytes: usize) -> Self {
        Self { limit: Some(bytes) }
    }
}

/// Chunk pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Chunks allocated eagerly at construction.
    pub initial_count: usize,
    /// Chunks added each time the free stack runs dry.
    pub expansion_increment: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_count: 0,
            expansion_increment: 64,
        }
    }
}

impl PoolConfig {
    /// Small footprint: grows a handful of chunks at a time.
    #[must_use]
    pub const fn small() -> Self {
        Self {
            initial_count: 0,
            expansion_increment: 8,
        }
    }

    /// Bulk loading: large expansion groups, fewer growth events.
    #[must_use]
    pub const fn bulk() -> Self {
        Self {
            initial_count: 4096,
            expansion_increment: 16_384,
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `expansion_increment` is zero.
    pub const fn validate(&self) -> Result<()> {
        if self.expansion_increment == 0 {
            return Err(Error::invalid("expansion increment must be non-zero"));
        }
        Ok(())
    }
}

/// Byte trie configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrieConfig {
    /// Children per node. Every key byte must convert to an index below it.
    pub alphabet_size: usize,
    /// Node pool sizing.
    pub pool: PoolConfig,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            alphabet_size: 256,
            pool: PoolConfig::default(),
        }
    }
}

impl TrieConfig {
    /// Byte trie over an alphabet of `alphabet_size` symbols.
    #[must_use]
    pub fn with_alphabet(alphabet_size: usize) -> Self {
        Self {
            alphabet_size,
            ..Self::default()
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the alphabet is empty or wider than a
    /// byte, or the pool configuration is invalid.
    pub const fn validate(&self) -> Result<()> {
        if self.alphabet_size == 0 || self.alphabet_size > 256 {
            return Err(Error::invalid("alphabet size must be in 1..=256"));
        }
        self.pool.validate()
    }
}
