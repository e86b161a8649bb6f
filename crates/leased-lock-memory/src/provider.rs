//! Memory lock provider implementation.

use std::sync::Arc;

use leased_lock_core::config::LockConfig;
use leased_lock_core::traits::LockProvider;

use crate::store::MemoryStore;

/// Provider for locks held in a process-local [`MemoryStore`].
///
/// Clones share the same store, so locks created from any clone exclude each
/// other.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockProvider {
    store: Arc<MemoryStore>,
    config: LockConfig,
    key_prefix: String,
}

impl MemoryLockProvider {
    /// Creates a provider over a fresh store with default lock settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider over an existing store.
    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Sets the configuration used for created locks.
    pub fn with_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the prefix prepended to lock names.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl LockProvider for MemoryLockProvider {
    type Store = MemoryStore;

    fn store(&self) -> Arc<Self::Store> {
        self.store.clone()
    }

    fn config(&self) -> &LockConfig {
        &self.config
    }

    fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}
