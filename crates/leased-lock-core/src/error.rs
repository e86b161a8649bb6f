//! Error types for leased lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
///
/// Configuration errors (`MissingName`, `ExpireTooSmall`, `ExpireTooLarge`)
/// are raised before any store I/O. `NotAcquired` is routine contention.
/// `LockNotHeld` means the lease lapsed or never existed. `Connection` and
/// `Backend` come from the store itself and are never folded into contention.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock was constructed without a resource name.
    #[error("empty lock name")]
    MissingName,

    /// An explicit lease duration was below the allowed floor.
    #[error("lock expire time too small: {expire:?} < {min:?}")]
    ExpireTooSmall { expire: Duration, min: Duration },

    /// An explicit lease duration exceeded what a store TTL can express.
    #[error("lock expire time too large: {expire:?} > {max:?}")]
    ExpireTooLarge { expire: Duration, max: Duration },

    /// The lock is held by another party.
    #[error("lock not acquired")]
    NotAcquired,

    /// Release found no record owned by this instance.
    #[error("lock not held")]
    LockNotHeld,

    /// Blocking acquisition gave up after the given duration.
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// Blocking acquisition was cancelled.
    #[error("lock operation was cancelled")]
    Cancelled,

    /// The instance already holds, or is acquiring, this lock.
    #[error("deadlock detected: {0}")]
    Deadlock(String),

    /// Could not reach the store.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The store rejected or failed a command.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Returns `true` for failures of the store rather than of the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Backend(_))
    }

    /// Builds a `Backend` error from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(Box::new(std::io::Error::other(message.into())))
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
