//! Lease-based distributed mutex over a shared key-value store.
//!
//! A lock is one key in a store such as Redis: it is created only if absent,
//! carries a TTL, and holds a random ownership token. Release and lease
//! extension run as atomic compare-then-act scripts, so an instance can never
//! delete or extend a lock that another holder acquired after its own lease
//! lapsed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use leased_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = RedisLockProvider::builder()
//!         .url("redis://localhost:6379")
//!         .config(LockConfig::new().expire(Duration::from_secs(5)).auto_refresh(true))
//!         .build()
//!         .await?;
//!
//!     let lock = provider.create_lock("my-resource")?;
//!     lock.acquire().await?;
//!
//!     // Critical section - the lease is extended in the background
//!     println!("Doing critical work...");
//!
//!     lock.release().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Acquisition modes
//!
//! - default: one attempt, `LockError::NotAcquired` when held elsewhere
//! - `auto_retry`: up to `retries` more attempts with a short jittered pause
//! - `block`: keep trying until acquired; see `acquire_with_cancel` and
//!   `acquire_timeout` to bound the wait
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `leased-lock-core`: protocol, configuration and traits
//! - `leased-lock-redis`: Redis store (feature `redis`)
//! - `leased-lock-memory`: in-process store (feature `memory`)

// Re-export core types and traits
pub use leased_lock_core::*;

#[cfg(feature = "redis")]
#[allow(ambiguous_glob_reexports)]
pub use leased_lock_redis::*;

#[cfg(feature = "memory")]
#[allow(ambiguous_glob_reexports)]
pub use leased_lock_memory::*;
