//! Error taxonomy shared by every structure in the crate.
//!
//! Only exceptional conditions are errors. A missing key is `None` and a
//! duplicate insert is [`Insertion::AlreadyPresent`](crate::Insertion).

use thiserror::Error;

/// Failure of a structural operation.
///
/// Every fallible operation leaves the structure exactly as it was before the
/// call when it returns one of these.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An allocation was refused, either by the monitor's byte budget or by
    /// the system allocator.
    #[error("out of memory: requested {requested} bytes with {used} in use (limit {limit:?})")]
    OutOfMemory {
        /// Bytes requested by the failing allocation.
        requested: usize,
        /// Bytes live on the monitor when the request was made.
        used: usize,
        /// Budget configured on the monitor, if any.
        limit: Option<usize>,
    },

    /// Configuration or argument rejected, such as a zero expansion
    /// increment or a key byte outside a trie's alphabet.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: &'static str,
    },

    /// A structural mutation was attempted while a traversal holds the
    /// structure.
    #[error("structure is busy with a traversal")]
    Busy,
}

impl Error {
    /// Creates an [`Error::InvalidArgument`].
    #[must_use]
    pub const fn invalid(reason: &'static str) -> Self {
        Self::InvalidArgument { reason }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
