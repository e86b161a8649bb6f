//! Core traits for leased locks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LockConfig;
use crate::error::LockResult;
use crate::lock::LeaseLock;
use crate::script::LockScript;

// ============================================================================
// Store Trait
// ============================================================================

/// The capabilities a shared key-value store must offer to host locks.
///
/// Both operations must be atomic on the store side. The lock never performs
/// a client-side read followed by a write.
///
/// # Example
///
/// ```rust,ignore
/// let created = store.set_if_absent("jobs:nightly", token, Duration::from_secs(3)).await?;
/// let deleted = store.eval_script(LockScript::Release, &["jobs:nightly"], &[token]).await?;
/// ```
pub trait LockStore: Send + Sync + 'static {
    /// Short backend name used in tracing spans.
    fn backend(&self) -> &'static str;

    /// Creates `key` with `value` and a `ttl` only if it does not exist.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The key was created
    /// * `Ok(false)` - The key already exists
    /// * `Err(...)` - The store could not be reached or rejected the command
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Runs one of the ownership scripts atomically.
    ///
    /// Returns the script's integer reply: 1 when the key held the given token
    /// (and the guarded action, if any, happened), 0 when it was absent or held
    /// a different value.
    fn eval_script(
        &self,
        script: LockScript,
        keys: &[&str],
        args: &[&str],
    ) -> impl Future<Output = LockResult<i64>> + Send;
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Factory for creating leased locks by name.
///
/// Providers bundle a store with default lock settings, allowing application
/// code to be backend-agnostic.
///
/// # Example
///
/// ```rust,ignore
/// // Configure once at startup
/// let provider = RedisLockProvider::new("redis://localhost:6379").await?;
///
/// // Create locks by name anywhere in the application
/// let lock = provider.create_lock("my-resource")?;
/// lock.acquire().await?;
/// ```
pub trait LockProvider: Send + Sync {
    /// The store the created locks live in.
    type Store: LockStore;

    /// Returns a handle to the shared store.
    fn store(&self) -> Arc<Self::Store>;

    /// Default configuration for created locks.
    fn config(&self) -> &LockConfig;

    /// Prefix prepended to lock names to form store keys.
    fn key_prefix(&self) -> &str {
        ""
    }

    /// Creates a lock with the given name and the provider's configuration.
    fn create_lock(&self, name: &str) -> LockResult<LeaseLock<Self::Store>> {
        self.create_lock_with(name, None, self.config().clone())
    }

    /// Creates a lock with a caller-chosen ownership token.
    fn create_lock_with_token(
        &self,
        name: &str,
        token: impl Into<String>,
    ) -> LockResult<LeaseLock<Self::Store>> {
        self.create_lock_with(name, Some(token.into()), self.config().clone())
    }

    /// Creates a lock overriding the provider's configuration.
    fn create_lock_with_config(
        &self,
        name: &str,
        config: LockConfig,
    ) -> LockResult<LeaseLock<Self::Store>> {
        self.create_lock_with(name, None, config)
    }

    #[doc(hidden)]
    fn create_lock_with(
        &self,
        name: &str,
        token: Option<String>,
        config: LockConfig,
    ) -> LockResult<LeaseLock<Self::Store>> {
        Ok(LeaseLock::new(self.store(), name, token, config)?.with_key_prefix(self.key_prefix()))
    }
}

// ============================================================================
// Convenience Extensions
// ============================================================================

/// Extension trait providing convenience methods for lock providers.
pub trait LockProviderExt: LockProvider {
    /// Creates a lock by name and acquires it.
    ///
    /// Convenience method combining `create_lock` and `acquire`.
    fn acquire_lock(
        &self,
        name: &str,
    ) -> impl Future<Output = LockResult<LeaseLock<Self::Store>>> + Send
    where
        Self: Sync,
    {
        let lock = self.create_lock(name);
        async move {
            let lock = lock?;
            lock.acquire().await?;
            Ok(lock)
        }
    }
}

// Blanket implementation for all LockProviders
impl<T: LockProvider> LockProviderExt for T {}
