//! TTL-aware key-value store living in process memory.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use leased_lock_core::error::{LockError, LockResult};
use leased_lock_core::script::LockScript;
use leased_lock_core::traits::LockStore;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Map size below which inserts never trigger a sweep.
const MIN_SWEEP_LEN: usize = 64;

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    /// Size at which the next insert sweeps out expired entries.
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            sweep_at: MIN_SWEEP_LEN,
        }
    }
}

impl Entries {
    /// Drops expired entries once the map has doubled since the last sweep,
    /// so the map stays within twice the live key count.
    fn sweep_if_due(&mut self, now: Instant) {
        if self.map.len() < self.sweep_at {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live(now));
        self.sweep_at = (self.map.len() * 2).max(MIN_SWEEP_LEN);
        trace!(before, after = self.map.len(), "expired entries swept");
    }
}

/// A [`LockStore`] backed by a mutex-guarded map.
///
/// Every operation runs under one lock, which gives the scripts the same
/// atomicity Lua scripts have on a Redis server. Expired entries are treated
/// as absent; inserts sweep them out whenever the map has doubled in size,
/// and the scripts drop the expired entry they touch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // The map is never left half-updated, so a poisoned guard is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries()
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Returns the remaining time to live of `key`.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries()
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Removes `key` unconditionally, returning whether it was live.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries()
            .map
            .remove(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().map.values().filter(|entry| entry.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries().map.retain(|_, entry| entry.is_live(now));
    }

    fn compare_and_delete(&self, key: &str, token: &str) -> i64 {
        let now = Instant::now();
        let mut entries = self.entries();
        match entries.map.get(key) {
            Some(entry) if entry.is_live(now) && entry.value == token => {
                entries.map.remove(key);
                1
            }
            Some(entry) if !entry.is_live(now) => {
                entries.map.remove(key);
                0
            }
            _ => 0,
        }
    }

    fn compare(&self, key: &str, token: &str) -> i64 {
        let now = Instant::now();
        let owned = self
            .entries()
            .map
            .get(key)
            .is_some_and(|entry| entry.is_live(now) && entry.value == token);
        i64::from(owned)
    }

    fn compare_and_expire(&self, key: &str, token: &str, ttl: Duration) -> LockResult<i64> {
        let now = Instant::now();
        let expires_at = deadline(now, ttl)?;
        match self.entries().map.get_mut(key) {
            Some(entry) if entry.is_live(now) && entry.value == token => {
                entry.expires_at = expires_at;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

fn deadline(now: Instant, ttl: Duration) -> LockResult<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| LockError::backend(format!("ttl {:?} out of range", ttl)))
}

impl LockStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let now = Instant::now();
        let expires_at = deadline(now, ttl)?;
        let mut entries = self.entries();
        if entries.map.get(key).is_some_and(|entry| entry.is_live(now)) {
            trace!(key, "key present");
            return Ok(false);
        }
        entries.sweep_if_due(now);
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        trace!(key, ttl_ms = ttl.as_millis() as u64, "key created");
        Ok(true)
    }

    async fn eval_script(&self, script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<i64> {
        let (Some(key), Some(token)) = (keys.first(), args.first()) else {
            return Err(LockError::backend(format!(
                "{} script needs one key and a token",
                script.name()
            )));
        };

        let reply = match script {
            LockScript::Release => self.compare_and_delete(key, token),
            LockScript::Refresh => {
                let ttl_millis = args
                    .get(1)
                    .and_then(|ttl| ttl.parse::<u64>().ok())
                    .ok_or_else(|| LockError::backend("refresh script needs a ttl in milliseconds"))?;
                self.compare_and_expire(key, token, Duration::from_millis(ttl_millis))?
            }
            LockScript::Check => self.compare(key, token),
        };
        trace!(key, script = script.name(), reply, "script evaluated");
        Ok(reply)
    }
}
