//! Byte-accounting memory monitor.
//!
//! Every structure in the crate routes its allocations through a monitor,
//! either its own or a parent shared with other structures. The monitor only
//! counts; storage is owned by whoever asked for it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// A block of raw memory handed out by [`MemoryMonitor::allocate`].
///
/// The block records its own size, so [`MemoryMonitor::free`] and
/// [`MemoryMonitor::reallocate`] never need the caller to remember it.
/// A block dropped without being freed stays counted as live.
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Size of the block in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-sized block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Block contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable block contents.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("len", &self.len()).finish()
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Live bytes.
    pub bytes_used: usize,
    /// Highest value `bytes_used` has reached.
    pub peak_bytes: usize,
    /// Allocations performed.
    pub allocations: usize,
    /// Frees performed.
    pub frees: usize,
}

/// Live memory, in bytes and megabytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryUsage {
    /// Live bytes.
    pub bytes: usize,
    /// Live bytes expressed in megabytes (2^20 bytes).
    pub megabytes: f64,
}

/// Byte-accounting allocator front end.
///
/// Counters are atomics so a monitor can be shared through an [`Arc`], but
/// the monitor takes no locks; structures sharing one are serialized by
/// their callers.
pub struct MemoryMonitor {
    config: MonitorConfig,
    bytes_used: AtomicUsize,
    peak_bytes: AtomicUsize,
    allocations: AtomicUsize,
    frees: AtomicUsize,
}

impl MemoryMonitor {
    /// Unlimited monitor.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_config(MonitorConfig::unlimited())
    }

    /// Monitor with the given configuration.
    #[must_use]
    pub const fn with_config(config: MonitorConfig) -> Self {
        Self {
            config,
            bytes_used: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Unlimited monitor ready to be handed to several structures.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Configuration this monitor was built with.
    #[must_use]
    pub const fn config(&self) -> MonitorConfig {
        self.config
    }

    /// Allocates a zeroed block of `size` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the budget would be exceeded or the system
    /// allocator refuses the request. Counters are unchanged on failure.
    pub fn allocate(&self, size: usize) -> Result<Block> {
        self.charge(size)?;
        let mut data = Vec::new();
        if data.try_reserve_exact(size).is_err() {
            self.refund(size);
            return Err(self.refused(size));
        }
        data.resize(size, 0);
        Ok(Block {
            data: data.into_boxed_slice(),
        })
    }

    /// Returns a block to the monitor.
    pub fn free(&self, block: Block) {
        self.release(block.len());
    }

    /// Resizes `block` in place, preserving its prefix. Grown bytes are zeroed.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if growing would exceed the budget or the
    /// system allocator refuses. `block` is untouched on failure.
    pub fn reallocate(&self, block: &mut Block, new_size: usize) -> Result<()> {
        let old_size = block.len();
        if new_size <= old_size {
            let mut data = std::mem::take(&mut block.data).into_vec();
            data.truncate(new_size);
            block.data = data.into_boxed_slice();
            self.unreserve(old_size - new_size);
            return Ok(());
        }

        let grow = new_size - old_size;
        self.reserve(grow)?;
        let mut data = Vec::new();
        if data.try_reserve_exact(new_size).is_err() {
            self.unreserve(grow);
            return Err(self.refused(grow));
        }
        data.extend_from_slice(&block.data);
        data.resize(new_size, 0);
        block.data = data.into_boxed_slice();
        Ok(())
    }

    /// Live bytes.
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.bytes_used.load(Ordering::Relaxed)
    }

    /// Snapshot of every counter.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            bytes_used: self.bytes_used.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
        }
    }

    /// Live memory in bytes and megabytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage(&self) -> MemoryUsage {
        let bytes = self.bytes_used();
        MemoryUsage {
            bytes,
            megabytes: bytes as f64 / BYTES_PER_MEGABYTE,
        }
    }

    /// Accounts for `bytes` of storage obtained elsewhere, as one allocation.
    pub(crate) fn charge(&self, bytes: usize) -> Result<()> {
        self.reserve(bytes)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Reverses a [`charge`](Self::charge), as one free.
    pub(crate) fn release(&self, bytes: usize) {
        self.unreserve(bytes);
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    /// Undoes a [`charge`](Self::charge) whose storage never materialized.
    pub(crate) fn refund(&self, bytes: usize) {
        self.unreserve(bytes);
        self.allocations.fetch_sub(1, Ordering::Relaxed);
    }

    fn reserve(&self, bytes: usize) -> Result<()> {
        let limit = self.config.limit;
        let previous = self
            .bytes_used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                let next = used.checked_add(bytes)?;
                match limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            })
            .map_err(|_| self.refused(bytes))?;
        self.peak_bytes.fetch_max(previous + bytes, Ordering::Relaxed);
        Ok(())
    }

    fn unreserve(&self, bytes: usize) {
        let previous = self.bytes_used.fetch_sub(bytes, Ordering::Relaxed);
        debug_assert!(previous >= bytes, "monitor released more than it holds");
    }

    pub(crate) fn refused(&self, requested: usize) -> Error {
        let used = self.bytes_used();
        tracing::warn!(requested, used, limit = ?self.config.limit, "allocation refused");
        Error::OutOfMemory {
            requested,
            used,
            limit: self.config.limit,
        }
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("limit", &self.config.limit)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Resolves an optional parent monitor, creating a private one if absent.
pub(crate) fn resolve(parent: Option<Arc<MemoryMonitor>>) -> Arc<MemoryMonitor> {
    parent.unwrap_or_else(MemoryMonitor::shared)
}
