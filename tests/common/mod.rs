//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mock_store;

use std::sync::Arc;

use leased_lock_core::config::LockConfig;
use leased_lock_core::lock::LeaseLock;
use leased_lock_core::traits::LockStore;

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates a lock over `store`, panicking on configuration errors.
pub fn new_lock<S: LockStore>(store: &Arc<S>, name: &str, config: LockConfig) -> LeaseLock<S> {
    LeaseLock::new(store.clone(), name, None, config).unwrap()
}
