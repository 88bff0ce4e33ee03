//! Lock wrapper enforcing the single-writer, no-mutation-during-traversal
//! contract of every structure in this crate.
//!
//! Structures mutate through `&mut self` and are not synchronized
//! themselves. [`Shared`] puts one behind a [`parking_lot::RwLock`] and
//! counts live traversal handles: while any exists, [`Shared::write`] fails
//! fast with [`Error::Busy`] instead of waiting for the walk to finish.

use std::fmt;
use std::ops;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

/// A structure behind a reader/writer lock and a traversal counter.
///
/// ```rust
/// use slabtree::{AvlTree, Error, Shared};
///
/// let shared = Shared::new(AvlTree::ordered());
/// shared.write().unwrap().insert(1).unwrap();
///
/// let walk = shared.shared_traversal();
/// assert_eq!(shared.write().err(), Some(Error::Busy));
/// drop(walk);
/// assert!(shared.write().is_ok());
/// ```
pub struct Shared<S> {
    inner: RwLock<S>,
    traversals: AtomicUsize,
}

impl<S> Shared<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner: RwLock::new(inner),
            traversals: AtomicUsize::new(0),
        }
    }

    /// Shared access for lookups. Blocks while a writer or an exclusive
    /// traversal holds the lock.
    pub fn read(&self) -> RwLockReadGuard<'_, S> {
        self.inner.read()
    }

    /// Exclusive access for structural mutation.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if a traversal handle is alive. The check happens
    /// before locking, so a thread holding a traversal handle gets the error
    /// rather than deadlocking on itself.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, S>> {
        if self.is_traversing() {
            return Err(Error::Busy);
        }
        Ok(self.inner.write())
    }

    /// Exclusive traversal handle, for walks that borrow links while they
    /// run (the AVL Morris traversal).
    pub fn traversal(&self) -> Traversal<'_, S> {
        let guard = self.inner.write();
        Traversal {
            guard,
            _mark: Mark::new(&self.traversals),
        }
    }

    /// Shared traversal handle, for walks that only read. Other readers may
    /// proceed; writers get [`Error::Busy`] until it is dropped.
    pub fn shared_traversal(&self) -> SharedTraversal<'_, S> {
        let guard = self.inner.read();
        SharedTraversal {
            guard,
            _mark: Mark::new(&self.traversals),
        }
    }

    /// Returns `true` while any traversal handle is alive.
    #[must_use]
    pub fn is_traversing(&self) -> bool {
        self.traversals.load(Ordering::Acquire) > 0
    }

    /// Unwraps the structure.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

impl<S: Default> Default for Shared<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> fmt::Debug for Shared<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("traversals", &self.traversals.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Registration in the traversal counter, undone on drop.
struct Mark<'a> {
    traversals: &'a AtomicUsize,
}

impl<'a> Mark<'a> {
    fn new(traversals: &'a AtomicUsize) -> Self {
        traversals.fetch_add(1, Ordering::AcqRel);
        Self { traversals }
    }
}

impl Drop for Mark<'_> {
    fn drop(&mut self) {
        self.traversals.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Exclusive traversal handle returned by [`Shared::traversal`].
pub struct Traversal<'a, S> {
    guard: RwLockWriteGuard<'a, S>,
    _mark: Mark<'a>,
}

impl<S> ops::Deref for Traversal<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> ops::DerefMut for Traversal<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}

/// Shared traversal handle returned by [`Shared::shared_traversal`].
pub struct SharedTraversal<'a, S> {
    guard: RwLockReadGuard<'a, S>,
    _mark: Mark<'a>,
}

impl<S> ops::Deref for SharedTraversal<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}
