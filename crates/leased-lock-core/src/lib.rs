//! Core types and lease protocol for store-backed distributed locks.
//!
//! A lock is a single key in a shared store: created with "set if absent"
//! and a TTL, extended and deleted only through atomic scripts that compare
//! the stored value against the instance's [`OwnershipToken`]. Store
//! backends implement [`LockStore`]; [`LeaseLock`] drives the protocol.

pub mod config;
pub mod error;
mod lease;
pub mod lock;
pub mod prelude;
pub mod script;
pub mod state;
pub mod token;
pub mod traits;
pub mod watchdog;

pub use config::{LockConfig, LockOptions};
pub use error::{LockError, LockResult};
pub use lock::LeaseLock;
pub use prelude::*;
pub use script::LockScript;
pub use state::LockState;
pub use token::OwnershipToken;
