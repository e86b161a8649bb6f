//! Redis store for leased locks.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use fred::error::{RedisError, RedisErrorKind};
use fred::prelude::*;
use leased_lock_core::error::{LockError, LockResult};
use leased_lock_core::script::LockScript;
use leased_lock_core::traits::LockStore;
use tracing::debug;

/// A [`LockStore`] on a single Redis server.
///
/// Acquisition uses `SET key token NX PX ttl`. The ownership scripts are
/// loaded once with `SCRIPT LOAD` and invoked through `EVALSHA`; when the
/// server has flushed its script cache the store falls back to `EVAL` and
/// reloads on the next call.
pub struct RedisLockStore {
    client: RedisClient,
    script_caching: bool,
    script_hashes: Mutex<HashMap<LockScript, String>>,
}

impl RedisLockStore {
    /// Wraps a connected client.
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            script_caching: true,
            script_hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Turns `EVALSHA` caching on or off; when off every call sends the source.
    pub fn with_script_caching(mut self, enabled: bool) -> Self {
        self.script_caching = enabled;
        self
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// Loads every ownership script into the server's script cache.
    pub async fn preload_scripts(&self) -> LockResult<()> {
        for script in LockScript::ALL {
            self.script_hash(script).await?;
        }
        Ok(())
    }

    async fn script_hash(&self, script: LockScript) -> LockResult<String> {
        if let Some(hash) = self.cached_hash(script) {
            return Ok(hash);
        }
        let hash: String = self
            .client
            .script_load(script.source())
            .await
            .map_err(|e| command_error("SCRIPT LOAD", e))?;
        debug!(script = script.name(), hash = %hash, "script loaded");
        self.script_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(script, hash.clone());
        Ok(hash)
    }

    fn cached_hash(&self, script: LockScript) -> Option<String> {
        self.script_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&script)
            .cloned()
    }

    fn forget_hash(&self, script: LockScript) {
        self.script_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&script);
    }
}

impl LockStore for RedisLockStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let expiry_millis = i64::try_from(ttl.as_millis())
            .map_err(|_| LockError::backend(format!("ttl {:?} out of range for PX", ttl)))?;

        // SET NX returns Some(value) if key was set, None if key already exists
        let result: Option<String> = self
            .client
            .set(
                key,
                value,
                Some(Expiration::PX(expiry_millis)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(|e| command_error("SET NX", e))?;

        Ok(result.is_some())
    }

    async fn eval_script(&self, script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<i64> {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();

        if self.script_caching {
            let hash = self.script_hash(script).await?;
            match self
                .client
                .evalsha::<i64, _, _, _>(hash, keys.clone(), args.clone())
                .await
            {
                Ok(reply) => return Ok(reply),
                Err(e) if is_missing_script(&e) => {
                    debug!(script = script.name(), "script missing on server, falling back to EVAL");
                    self.forget_hash(script);
                }
                Err(e) => return Err(command_error("EVALSHA", e)),
            }
        }

        self.client
            .eval::<i64, _, _, _>(script.source(), keys, args)
            .await
            .map_err(|e| command_error("EVAL", e))
    }
}

fn is_missing_script(error: &RedisError) -> bool {
    error.details().starts_with("NOSCRIPT")
}

/// Maps a client error to a connection or backend failure.
pub(crate) fn command_error(command: &str, error: RedisError) -> LockError {
    let message = format!("Redis {} failed: {}", command, error);
    match error.kind() {
        RedisErrorKind::IO | RedisErrorKind::Timeout | RedisErrorKind::Canceled => {
            LockError::Connection(Box::new(std::io::Error::other(message)))
        }
        _ => LockError::Backend(Box::new(std::io::Error::other(message))),
    }
}
