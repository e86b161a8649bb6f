//! Lease lock state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, field, instrument, warn};

use crate::config::{LockConfig, LockOptions};
use crate::error::{LockError, LockResult};
use crate::lease::Lease;
use crate::state::{LockState, SharedState};
use crate::token::OwnershipToken;
use crate::traits::LockStore;
use crate::watchdog::RefreshWatchdog;

/// A mutual-exclusion lock whose record lives in a shared store.
///
/// The store record `key = token` with a TTL *is* the lock. Locally the
/// instance keeps only its token and a [`LockState`] cell; every release and
/// refresh is re-checked against the store with an atomic script.
///
/// # Example
///
/// ```rust,ignore
/// let lock = LeaseLock::new(store, "reports:daily", None, LockConfig::new().auto_refresh(true))?;
/// lock.acquire().await?;
/// // Critical section
/// lock.release().await?;
/// ```
pub struct LeaseLock<S: LockStore> {
    store: Arc<S>,
    name: String,
    key: String,
    token: OwnershipToken,
    options: LockOptions,
    state: SharedState,
    watchdog: Arc<Mutex<Option<RefreshWatchdog>>>,
    cleanup: Arc<Mutex<()>>,
}

impl<S: LockStore> LeaseLock<S> {
    /// Creates an unacquired lock. No store I/O happens here.
    ///
    /// # Errors
    ///
    /// * `LockError::MissingName` - `name` is empty
    /// * `LockError::ExpireTooSmall` - `config.expire` is below the floor
    /// * `LockError::ExpireTooLarge` - `config.expire` is above the ceiling
    pub fn new(
        store: Arc<S>,
        name: impl Into<String>,
        token: Option<String>,
        config: LockConfig,
    ) -> LockResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::MissingName);
        }
        let options = config.validate()?;

        Ok(Self {
            store,
            key: name.clone(),
            name,
            token: OwnershipToken::supplied_or_generate(token),
            options,
            state: SharedState::new(),
            watchdog: Arc::new(Mutex::new(None)),
            cleanup: Arc::new(Mutex::new(())),
        })
    }

    /// Namespaces the store key, e.g. `leased-lock:` + name.
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key = format!("{}{}", prefix, self.name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store key holding the lock record.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &OwnershipToken {
        &self.token
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Local view of the lifecycle; the store remains authoritative.
    pub fn state(&self) -> LockState {
        self.state.get()
    }

    /// Acquires the lock following the configured policy.
    ///
    /// Dropping the returned future abandons the acquisition: the instance
    /// moves to `Failed`, and a record created by an in-flight `SET` is
    /// removed by a background compare-and-delete.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Lock acquired
    /// * `Err(LockError::NotAcquired)` - Held elsewhere and attempts ran out
    /// * `Err(LockError::Deadlock)` - This instance is acquiring or releasing, or
    ///   the store confirms it still holds the lease
    /// * `Err(LockError::Connection | LockError::Backend)` - Store failure
    #[instrument(skip(self), fields(lock.name = %self.name, lock.key = %self.key, backend = self.store.backend(), acquired = field::Empty, attempts = field::Empty, elapsed_ms = field::Empty))]
    pub async fn acquire(&self) -> LockResult<()> {
        self.acquire_until(None, None).await
    }

    /// Like [`acquire`](Self::acquire), giving up with `LockError::Cancelled`
    /// once `cancel` turns `true`.
    ///
    /// Cancellation is observed between attempts, so an abandoned acquisition
    /// never leaves a record behind.
    #[instrument(skip(self, cancel), fields(lock.name = %self.name, lock.key = %self.key, backend = self.store.backend(), acquired = field::Empty, attempts = field::Empty, elapsed_ms = field::Empty))]
    pub async fn acquire_with_cancel(&self, cancel: watch::Receiver<bool>) -> LockResult<()> {
        self.acquire_until(Some(cancel), None).await
    }

    /// Like [`acquire`](Self::acquire), giving up with `LockError::Timeout`
    /// once `timeout` has elapsed.
    #[instrument(skip(self), fields(lock.name = %self.name, lock.key = %self.key, backend = self.store.backend(), acquired = field::Empty, attempts = field::Empty, elapsed_ms = field::Empty))]
    pub async fn acquire_timeout(&self, timeout: Duration) -> LockResult<()> {
        self.acquire_until(None, Some(timeout)).await
    }

    /// Makes a single attempt regardless of the retry policy.
    ///
    /// Returns `Ok(false)` when the lock is held elsewhere.
    #[instrument(skip(self), fields(lock.name = %self.name, lock.key = %self.key, backend = self.store.backend(), acquired = field::Empty))]
    pub async fn try_acquire(&self) -> LockResult<bool> {
        self.settle().await?;
        let mut guard = AcquireGuard::begin(self)?;
        let acquired = guard.try_set().await?;
        Span::current().record("acquired", acquired);
        if acquired {
            self.enter_held().await;
            guard.disarm();
        }
        Ok(acquired)
    }

    /// Releases the lock if, and only if, the store still shows our token.
    ///
    /// The refresh watchdog is stopped before the compare-and-delete runs. The
    /// work runs on a spawned task, so dropping this future does not interrupt
    /// it and the final state is still recorded.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Our record was deleted
    /// * `Err(LockError::LockNotHeld)` - No record of ours exists (never
    ///   acquired, already released, or the lease lapsed)
    /// * `Err(LockError::Connection | LockError::Backend)` - Store failure; the
    ///   previous state is restored and a stopped watchdog is restarted
    #[instrument(skip(self), fields(lock.name = %self.name, lock.key = %self.key, backend = self.store.backend(), released = field::Empty))]
    pub async fn release(&self) -> LockResult<()> {
        let previous = self
            .state
            .transition(LockState::can_release, LockState::Releasing)
            .map_err(|_| LockError::LockNotHeld)?;

        let lease = self.lease();
        let watchdog = self.watchdog.clone();
        let state = self.state.clone();
        let refresh_interval = self.options.refresh_interval();

        let task = tokio::spawn(
            async move {
                let mut slot = watchdog.lock().await;
                if let Some(running) = slot.take() {
                    running.stop().await;
                }

                let released = lease.release().await;
                match released {
                    Ok(true) => {
                        Span::current().record("released", true);
                        state.set(LockState::Released);
                        debug!("lock released");
                        Ok(())
                    }
                    Ok(false) => {
                        Span::current().record("released", false);
                        state.set(previous.after_mismatch());
                        debug!(previous = %previous, "no record owned by this instance");
                        Err(LockError::LockNotHeld)
                    }
                    Err(e) => {
                        if previous.is_held()
                            && let Some(interval) = refresh_interval
                        {
                            *slot = Some(RefreshWatchdog::spawn(lease, interval, state.clone()));
                        }
                        state.set(previous);
                        Err(e)
                    }
                }
            }
            .in_current_span(),
        );

        task.await
            .map_err(|e| LockError::backend(format!("release task failed: {}", e)))?
    }

    fn lease(&self) -> Lease<S> {
        Lease {
            store: self.store.clone(),
            key: self.key.clone(),
            token: self.token.clone(),
            expire: self.options.expire(),
        }
    }

    async fn try_set(&self) -> LockResult<bool> {
        self.store
            .set_if_absent(&self.key, self.token.as_str(), self.options.expire())
            .await
    }

    /// Waits for the cleanup of an abandoned acquisition, then re-checks a
    /// `Held` state that no watchdog is keeping alive.
    async fn settle(&self) -> LockResult<()> {
        drop(self.cleanup.lock().await);

        if self.options.auto_refresh() || !self.state.get().is_held() {
            return Ok(());
        }
        if !self.lease().is_owned().await? {
            debug!("lease lapsed while held, acquiring afresh");
            let _ = self.state.transition(LockState::is_held, LockState::Expired);
        }
        Ok(())
    }

    async fn acquire_until(
        &self,
        mut cancel: Option<watch::Receiver<bool>>,
        timeout: Option<Duration>,
    ) -> LockResult<()> {
        let start = Instant::now();
        self.settle().await?;
        let mut guard = AcquireGuard::begin(self)?;

        let result = self.attempt_loop(&mut guard, &mut cancel, timeout, start).await;
        let span = Span::current();
        span.record("elapsed_ms", start.elapsed().as_millis() as u64);

        match result {
            Ok(attempts) => {
                span.record("acquired", true);
                span.record("attempts", attempts);
                self.enter_held().await;
                guard.disarm();
                debug!(attempts, "lock acquired");
                Ok(())
            }
            Err(e) => {
                span.record("acquired", false);
                Err(e)
            }
        }
    }

    /// Runs attempts until success or until the policy gives up; returns the
    /// number of attempts made.
    async fn attempt_loop(
        &self,
        guard: &mut AcquireGuard<'_, S>,
        cancel: &mut Option<watch::Receiver<bool>>,
        timeout: Option<Duration>,
        start: Instant,
    ) -> LockResult<u32> {
        let deadline = timeout.map(|timeout| start + timeout);
        let max_attempts = self.options.max_attempts();
        let mut attempts = 0u32;

        loop {
            if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                return Err(LockError::Cancelled);
            }

            attempts = attempts.saturating_add(1);
            if guard.try_set().await? {
                return Ok(attempts);
            }

            if max_attempts.is_some_and(|max| attempts >= max) {
                debug!(attempts, "lock held elsewhere, giving up");
                return Err(LockError::NotAcquired);
            }

            let mut delay = self.options.retry_delay();
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                let now = Instant::now();
                if now >= deadline {
                    return Err(LockError::Timeout(timeout));
                }
                delay = delay.min(deadline - now);
            }

            debug!(attempts, delay_ms = delay.as_millis() as u64, "lock held elsewhere, retrying");
            pause(delay, cancel).await?;
        }
    }

    /// Marks the lock held, starting the watchdog first when auto-refresh is on.
    async fn enter_held(&self) {
        let mut slot = self.watchdog.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }
        if let Some(interval) = self.options.refresh_interval() {
            *slot = Some(RefreshWatchdog::spawn(self.lease(), interval, self.state.clone()));
        }
        self.state.set(LockState::Held);
    }

    /// Removes a record an abandoned acquisition may have created.
    ///
    /// Holds the cleanup gate until done, so the next acquisition on this
    /// instance cannot race the delete.
    fn spawn_cleanup(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(lock.key = %self.key, "no runtime for cleanup, abandoned record will expire on its own");
            return;
        };
        let gate = self.cleanup.clone().try_lock_owned().ok();
        let lease = self.lease();

        runtime.spawn(
            async move {
                let _gate = gate;
                match lease.release().await {
                    Ok(true) => debug!("removed record of abandoned acquisition"),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(error = %e, "could not remove record of abandoned acquisition, it will expire on its own")
                    }
                }
            }
            .in_current_span(),
        );
    }
}

/// Tracks one acquisition from `Acquiring` until it is held.
///
/// Dropped without [`disarm`](Self::disarm), it moves the instance to
/// `Failed` and cleans up after a `SET` whose outcome was never observed or
/// that succeeded without the lock reaching `Held`.
struct AcquireGuard<'a, S: LockStore> {
    lock: &'a LeaseLock<S>,
    set_pending: bool,
    armed: bool,
}

impl<'a, S: LockStore> AcquireGuard<'a, S> {
    fn begin(lock: &'a LeaseLock<S>) -> LockResult<Self> {
        lock.state
            .transition(LockState::can_acquire, LockState::Acquiring)
            .map_err(|current| {
                LockError::Deadlock(format!("lock '{}' is already {}", lock.name, current))
            })?;
        Ok(Self {
            lock,
            set_pending: false,
            armed: true,
        })
    }

    async fn try_set(&mut self) -> LockResult<bool> {
        self.set_pending = true;
        let acquired = self.lock.try_set().await;
        // A failed SET is left to expire; only a confirmed one needs undoing.
        self.set_pending = matches!(acquired, Ok(true));
        acquired
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S: LockStore> Drop for AcquireGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.lock.state.set(LockState::Failed);
        if self.set_pending {
            self.lock.spawn_cleanup();
        }
    }
}

impl<S: LockStore> Drop for LeaseLock<S> {
    fn drop(&mut self) {
        // Aborts the watchdog; an unreleased record expires on its own.
        if let Ok(mut slot) = self.watchdog.try_lock() {
            slot.take();
        }
    }
}

impl<S: LockStore> std::fmt::Debug for LeaseLock<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseLock")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("backend", &self.store.backend())
            .field("state", &self.state.get())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Sleeps for `delay`, returning early with `Cancelled` if `cancel` fires.
async fn pause(delay: Duration, cancel: &mut Option<watch::Receiver<bool>>) -> LockResult<()> {
    let Some(receiver) = cancel.as_mut() else {
        tokio::time::sleep(delay).await;
        return Ok(());
    };

    let changed = tokio::select! {
        _ = tokio::time::sleep(delay) => None,
        changed = receiver.changed() => Some(changed.is_ok()),
    };

    match changed {
        Some(true) if *receiver.borrow() => Err(LockError::Cancelled),
        // Sender gone: nobody can cancel any more.
        Some(false) => {
            *cancel = None;
            Ok(())
        }
        _ => Ok(()),
    }
}
