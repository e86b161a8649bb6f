//! Convenience prelude for leased lock types.

pub use crate::config::LockConfig;
pub use crate::error::{LockError, LockResult};
pub use crate::lock::LeaseLock;
pub use crate::state::LockState;
pub use crate::traits::{LockProvider, LockProviderExt, LockStore};
