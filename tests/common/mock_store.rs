//! Store wrapper that counts calls and injects failures.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use leased_lock_core::error::{LockError, LockResult};
use leased_lock_core::script::LockScript;
use leased_lock_core::traits::LockStore;
use leased_lock_memory::MemoryStore;

/// Wraps a [`MemoryStore`], recording how often each operation runs, failing
/// operations on demand as if the connection had dropped, and delaying
/// replies as if the network were slow.
///
/// A delayed `SET` is applied before the delay, so the record exists while
/// the caller is still waiting. A delayed release waits before deleting.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_set: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub fail_release: AtomicBool,
    pub set_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
    pub check_calls: AtomicUsize,
    pub set_delay_ms: AtomicU64,
    pub release_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.set_calls() + self.refresh_calls() + self.release_calls() + self.check_calls()
    }

    pub fn delay_set(&self, delay: Duration) {
        self.set_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn delay_release(&self, delay: Duration) {
        self.release_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn lag(delay_ms: &AtomicU64) {
        let millis = delay_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn connection_lost() -> LockError {
        LockError::Connection(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

impl LockStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(Self::connection_lost());
        }
        let created = self.inner.set_if_absent(key, value, ttl).await;
        Self::lag(&self.set_delay_ms).await;
        created
    }

    async fn eval_script(&self, script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<i64> {
        let (calls, fail) = match script {
            LockScript::Refresh => (&self.refresh_calls, &self.fail_refresh),
            LockScript::Release => (&self.release_calls, &self.fail_release),
            LockScript::Check => {
                self.check_calls.fetch_add(1, Ordering::SeqCst);
                return self.inner.eval_script(script, keys, args).await;
            }
        };
        calls.fetch_add(1, Ordering::SeqCst);
        if fail.load(Ordering::SeqCst) {
            return Err(Self::connection_lost());
        }
        if script == LockScript::Release {
            Self::lag(&self.release_delay_ms).await;
        }
        self.inner.eval_script(script, keys, args).await
    }
}
