//! Redis backend for leased locks.
//!
//! A single Redis server hosts each lock record. Quorum locking across
//! several independent servers is out of scope.

pub mod provider;
pub mod store;

pub use provider::{DEFAULT_KEY_PREFIX, RedisLockProvider, RedisLockProviderBuilder};
pub use store::RedisLockStore;
