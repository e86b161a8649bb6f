//! Redis lock provider implementation.

use std::sync::Arc;

use fred::prelude::*;
use leased_lock_core::config::LockConfig;
use leased_lock_core::error::{LockError, LockResult};
use leased_lock_core::traits::LockProvider;
use tracing::{debug, instrument};

use crate::store::{RedisLockStore, command_error};

/// Key prefix applied to lock names unless overridden.
pub const DEFAULT_KEY_PREFIX: &str = "leased-lock:";

/// Builder for Redis lock provider configuration.
pub struct RedisLockProviderBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
    key_prefix: String,
    config: LockConfig,
    script_caching: bool,
}

impl RedisLockProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            client: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            config: LockConfig::default(),
            script_caching: true,
        }
    }

    /// Sets the Redis server URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing Redis client instead of connecting from a URL.
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the prefix prepended to lock names to form Redis keys.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the configuration used for created locks.
    pub fn config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables or disables `EVALSHA` script caching.
    pub fn script_caching(mut self, enabled: bool) -> Self {
        self.script_caching = enabled;
        self
    }

    /// Builds the provider.
    ///
    /// The lock configuration is validated before any connection is made.
    #[instrument(skip(self), fields(backend = "redis"))]
    pub async fn build(self) -> LockResult<RedisLockProvider> {
        self.config.validate()?;

        let client = match (self.client, self.url) {
            (Some(client), _) => client,
            (None, Some(url)) => {
                let config = RedisConfig::from_url(&url).map_err(|e| {
                    LockError::Connection(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("invalid Redis URL: {}", e),
                    )))
                })?;

                let client = RedisClient::new(config, None, None, None);
                client.connect();
                client
                    .wait_for_connect()
                    .await
                    .map_err(|e| command_error("connect", e))?;
                debug!("connected to Redis");
                client
            }
            (None, None) => {
                return Err(LockError::Connection(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "no Redis client or URL provided",
                ))));
            }
        };

        let store = RedisLockStore::new(client).with_script_caching(self.script_caching);
        if self.script_caching {
            store.preload_scripts().await?;
        }

        Ok(RedisLockProvider {
            store: Arc::new(store),
            config: self.config,
            key_prefix: self.key_prefix,
        })
    }
}

impl Default for RedisLockProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider for Redis-backed leased locks.
pub struct RedisLockProvider {
    store: Arc<RedisLockStore>,
    config: LockConfig,
    key_prefix: String,
}

impl RedisLockProvider {
    /// Returns a new builder for configuring the provider.
    pub fn builder() -> RedisLockProviderBuilder {
        RedisLockProviderBuilder::new()
    }

    /// Creates a provider using the specified Redis URL.
    pub async fn new(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }
}

impl LockProvider for RedisLockProvider {
    type Store = RedisLockStore;

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
