//! In-process store for leased locks.
//!
//! Locks created here coordinate tasks within one process only. The store
//! honours TTLs and evaluates the ownership scripts atomically, which makes it
//! a faithful stand-in for a remote store in tests.

pub mod provider;
pub mod store;

pub use provider::MemoryLockProvider;
pub use store::MemoryStore;
