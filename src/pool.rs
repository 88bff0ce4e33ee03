//! Typed chunk (slab) pool.
//!
//! Chunks are handed out from a stack of free [`ChunkId`]s. When the stack
//! runs dry the pool grows by one *expansion group*: a boxed slice of
//! `expansion_increment` chunks that is never reallocated, so a chunk stays
//! at the same address for as long as the pool lives.
//!
//! Groups are journalled in a bump arena. Each journal record carries the
//! checkpoint taken just before it was appended, which lets [`trim`]
//! drop idle trailing groups by rolling the journal back.
//!
//! [`trim`]: ChunkPool::trim

use std::cmp::Reverse;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::num::NonZeroU32;
use std::ops;
use std::sync::Arc;

use safe_bump::{Checkpoint, Idx, SharedArena};

use crate::config::PoolConfig;
use crate::error::Result;
use crate::monitor::{self, MemoryMonitor};

/// Largest number of chunks a pool can address.
pub const MAX_CHUNKS: usize = u32::MAX as usize - 1;

/// Stable handle to a chunk of a [`ChunkPool<T>`].
///
/// Stored as `index + 1`, so `Option<ChunkId<T>>` is four bytes.
pub struct ChunkId<T> {
    raw: NonZeroU32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ChunkId<T> {
    fn new(index: usize) -> Self {
        debug_assert!(index < MAX_CHUNKS);
        #[allow(clippy::cast_possible_truncation)]
        let raw = NonZeroU32::MIN.saturating_add(index as u32);
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Position of the chunk inside its pool.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.raw.get() - 1) as usize
    }
}

// ChunkId is a plain integer, so no bounds on T.

impl<T> Clone for ChunkId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ChunkId<T> {}

impl<T> PartialEq for ChunkId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for ChunkId<T> {}

impl<T> Hash for ChunkId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for ChunkId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.index())
    }
}

/// Journal record for one expansion group.
struct Group {
    first: usize,
    len: usize,
    bytes: usize,
    /// Journal state before this record was appended.
    mark: Checkpoint<Self>,
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Bytes per chunk, including the slot tag.
    pub chunk_size: usize,
    /// Physical chunks owned by the pool.
    pub capacity: usize,
    /// Chunks currently held by callers.
    pub in_use: usize,
    /// Chunks on the free stack.
    pub free: usize,
    /// Expansion groups allocated over the pool's lifetime.
    pub grow_count: usize,
    /// Expansion groups currently held.
    pub groups: usize,
}

/// Fixed-size chunk allocator for values of type `T`.
pub struct ChunkPool<T> {
    config: PoolConfig,
    monitor: Arc<MemoryMonitor>,
    groups: Vec<Box<[Option<T>]>>,
    journal: SharedArena<Group>,
    free: Vec<ChunkId<T>>,
    capacity: usize,
    in_use: usize,
    grow_count: usize,
}

impl<T> ChunkPool<T> {
    /// Bytes charged to the monitor per chunk: the slot and its free-stack entry.
    pub const CHUNK_BYTES: usize = mem::size_of::<Option<T>>() + mem::size_of::<ChunkId<T>>();

    /// Creates a pool, eagerly allocating `config.initial_count` chunks.
    ///
    /// Without a parent `monitor` the pool accounts against a private one.
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](crate::Error::InvalidArgument) for an invalid
    /// configuration, [`OutOfMemory`](crate::Error::OutOfMemory) if the
    /// initial group cannot be allocated.
    pub fn new(config: PoolConfig, monitor: Option<Arc<MemoryMonitor>>) -> Result<Self> {
        config.validate()?;
        let mut pool = Self {
            config,
            monitor: monitor::resolve(monitor),
            groups: Vec::new(),
            journal: SharedArena::new(),
            free: Vec::new(),
            capacity: 0,
            in_use: 0,
            grow_count: 0,
        };
        if config.initial_count > 0 {
            pool.grow(config.initial_count)?;
        }
        Ok(pool)
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    /// Monitor the pool accounts against.
    #[must_use]
    pub const fn monitor(&self) -> &Arc<MemoryMonitor> {
        &self.monitor
    }

    /// Chunks currently held by callers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.in_use
    }

    /// Returns `true` if no chunk is held by a caller.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    /// Physical chunks owned by the pool.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            chunk_size: Self::CHUNK_BYTES,
            capacity: self.capacity,
            in_use: self.in_use,
            free: self.free.len(),
            grow_count: self.grow_count,
            groups: self.journal.len(),
        }
    }

    /// Stores `value` in a free chunk, growing the pool by one expansion
    /// group if none is free.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if the free stack is empty
    /// and the expansion group cannot be allocated. The pool is unchanged.
    pub fn alloc(&mut self, value: T) -> Result<ChunkId<T>> {
        if self.free.is_empty() {
            self.grow(self.config.expansion_increment)?;
        }
        let id = self
            .free
            .pop()
            .ok_or_else(|| self.monitor.refused(Self::CHUNK_BYTES))?;
        let slot = self.slot_mut(id);
        debug_assert!(slot.is_none(), "free stack held a live chunk");
        *slot = Some(value);
        self.in_use += 1;
        Ok(id)
    }

    /// Makes sure `count` chunks can be allocated without growing.
    ///
    /// # Errors
    ///
    /// [`OutOfMemory`](crate::Error::OutOfMemory) if an expansion group
    /// cannot be allocated. Groups added before the failure stay in the pool.
    pub fn reserve(&mut self, count: usize) -> Result<()> {
        while self.free.len() < count {
            self.grow(self.config.expansion_increment)?;
        }
        Ok(())
    }

    /// Takes the value out of chunk `id` and pushes the chunk back onto the
    /// free stack.
    ///
    /// Returns `None`, leaving the pool untouched, if the chunk is already
    /// free or does not belong to this pool.
    pub fn free(&mut self, id: ChunkId<T>) -> Option<T> {
        if id.index() >= self.capacity {
            return None;
        }
        let value = self.slot_mut(id).take()?;
        self.free.push(id);
        self.in_use -= 1;
        Some(value)
    }

    /// Value stored in chunk `id`, if it is live.
    #[must_use]
    pub fn get(&self, id: ChunkId<T>) -> Option<&T> {
        if id.index() >= self.capacity {
            return None;
        }
        self.slot(id).as_ref()
    }

    /// Mutable value stored in chunk `id`, if it is live.
    #[must_use]
    pub fn get_mut(&mut self, id: ChunkId<T>) -> Option<&mut T> {
        if id.index() >= self.capacity {
            return None;
        }
        self.slot_mut(id).as_mut()
    }

    /// Mutable values of two distinct live chunks at once.
    #[must_use]
    pub fn pair_mut(&mut self, a: ChunkId<T>, b: ChunkId<T>) -> Option<(&mut T, &mut T)> {
        if a == b || a.index() >= self.capacity || b.index() >= self.capacity {
            return None;
        }
        let (ga, oa) = self.locate(a.index());
        let (gb, ob) = self.locate(b.index());
        let (sa, sb) = if ga == gb {
            let group = &mut self.groups[ga];
            if oa < ob {
                let (lo, hi) = group.split_at_mut(ob);
                (&mut lo[oa], &mut hi[0])
            } else {
                let (lo, hi) = group.split_at_mut(oa);
                (&mut hi[0], &mut lo[ob])
            }
        } else if ga < gb {
            let (lo, hi) = self.groups.split_at_mut(gb);
            (&mut lo[ga][oa], &mut hi[0][ob])
        } else {
            let (lo, hi) = self.groups.split_at_mut(ga);
            (&mut hi[0][oa], &mut lo[gb][ob])
        };
        Some((sa.as_mut()?, sb.as_mut()?))
    }

    /// Releases trailing expansion groups whose chunks are all free.
    ///
    /// The initial group is never released. Returns the number of chunks
    /// reclaimed.
    pub fn trim(&mut self) -> usize {
        let floor = usize::from(self.config.initial_count > 0);
        let mut reclaimed = 0;
        while self.groups.len() > floor {
            let last = Idx::from_raw(self.journal.len() - 1);
            let (first, len, bytes, mark) = {
                let group: &Group = self.journal.get(last);
                (group.first, group.len, group.bytes, group.mark)
            };
            let idle = self
                .groups
                .last()
                .is_some_and(|slots| slots.iter().all(Option::is_none));
            if !idle {
                break;
            }

            self.free.retain(|id| id.index() < first);
            self.groups.pop();
            self.journal.rollback(mark);
            self.capacity = first;
            self.monitor.release(bytes);
            reclaimed += len;
        }
        if reclaimed > 0 {
            tracing::debug!(reclaimed, capacity = self.capacity, "chunk pool trimmed");
        }
        reclaimed
    }

    /// Drops every live value and puts all chunks back on the free stack.
    ///
    /// Physical chunks are kept; call [`trim`](Self::trim) to release them.
    pub fn clear(&mut self) {
        for slots in &mut self.groups {
            for slot in slots.iter_mut() {
                *slot = None;
            }
        }
        self.free.clear();
        self.free.extend((0..self.capacity).rev().map(ChunkId::new));
        self.in_use = 0;
    }

    /// Reorders the free stack so the lowest free chunk is handed out next.
    ///
    /// Structures call this after tearing themselves down, so that refilling
    /// packs into the leading groups and [`trim`](Self::trim) can release
    /// the trailing ones.
    pub fn restack(&mut self) {
        self.free.sort_unstable_by_key(|id| Reverse(id.index()));
    }

    fn grow(&mut self, count: usize) -> Result<()> {
        let first = self.capacity;
        let end = first
            .checked_add(count)
            .filter(|&end| end <= MAX_CHUNKS)
            .ok_or_else(|| self.monitor.refused(count.saturating_mul(Self::CHUNK_BYTES)))?;
        let bytes = count.saturating_mul(Self::CHUNK_BYTES);
        self.monitor.charge(bytes)?;

        let mut slots = Vec::new();
        if slots.try_reserve_exact(count).is_err() || self.free.try_reserve(count).is_err() {
            self.monitor.refund(bytes);
            return Err(self.monitor.refused(bytes));
        }
        slots.resize_with(count, || None);

        let mark = self.journal.checkpoint();
        let _record = self.journal.alloc(Group {
            first,
            len: count,
            bytes,
            mark,
        });
        self.groups.push(slots.into_boxed_slice());
        self.free.extend((first..end).rev().map(ChunkId::new));
        self.capacity = end;
        self.grow_count += 1;

        tracing::debug!(
            grow_count = self.grow_count,
            capacity = self.capacity,
            bytes,
            "chunk pool expanded"
        );
        Ok(())
    }

    /// Group and offset holding chunk `index`.
    ///
    /// The first group has `initial_count` chunks (when non-zero), every
    /// other group `expansion_increment`.
    fn locate(&self, index: usize) -> (usize, usize) {
        let initial = self.config.initial_count;
        let increment = self.config.expansion_increment;
        if index < initial {
            return (0, index);
        }
        let rest = index - initial;
        (usize::from(initial > 0) + rest / increment, rest % increment)
    }

    fn slot(&self, id: ChunkId<T>) -> &Option<T> {
        let (group, offset) = self.locate(id.index());
        &self.groups[group][offset]
    }

    fn slot_mut(&mut self, id: ChunkId<T>) -> &mut Option<T> {
        let (group, offset) = self.locate(id.index());
        &mut self.groups[group][offset]
    }
}

impl<T> Default for ChunkPool<T> {
    fn default() -> Self {
        // No initial group: construction cannot allocate, hence cannot fail.
        Self {
            config: PoolConfig::default(),
            monitor: MemoryMonitor::shared(),
            groups: Vec::new(),
            journal: SharedArena::new(),
            free: Vec::new(),
            capacity: 0,
            in_use: 0,
            grow_count: 0,
        }
    }
}

impl<T> Drop for ChunkPool<T> {
    fn drop(&mut self) {
        // One release per group, matching the charge taken when it grew.
        for raw in (0..self.journal.len()).rev() {
            let group: &Group = self.journal.get(Idx::from_raw(raw));
            self.monitor.release(group.bytes);
        }
    }
}

impl<T> ops::Index<ChunkId<T>> for ChunkPool<T> {
    type Output = T;

    fn index(&self, id: ChunkId<T>) -> &T {
        self.get(id).expect("vacant chunk")
    }
}

impl<T> ops::IndexMut<ChunkId<T>> for ChunkPool<T> {
    fn index_mut(&mut self, id: ChunkId<T>) -> &mut T {
        self.get_mut(id).expect("vacant chunk")
    }
}

impl<T> fmt::Debug for ChunkPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkPool")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
