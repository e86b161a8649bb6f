//! Background lease extension for held locks.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info_span, warn};

use crate::lease::Lease;
use crate::state::{LockState, SharedState};
use crate::traits::LockStore;

/// Task that periodically extends a held lease.
///
/// The task ends on its own when ownership is lost, or when refreshes keep
/// failing for longer than one full lease. [`RefreshWatchdog::stop`] waits for
/// an in-flight refresh to finish, so no store call from the watchdog can land
/// after `stop` returns. Dropping the watchdog aborts the task.
pub struct RefreshWatchdog {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RefreshWatchdog {
    pub(crate) fn spawn<S: LockStore>(lease: Lease<S>, interval: Duration, state: SharedState) -> Self {
        let (stop, mut stop_receiver) = watch::channel(false);
        let span = info_span!("refresh_watchdog", lock.key = %lease.key, backend = lease.store.backend());

        let task = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut last_extended = Instant::now();

                loop {
                    tokio::select! {
                        biased;
                        _ = stop_receiver.changed() => break,
                        _ = ticker.tick() => {}
                    }

                    match lease.refresh().await {
                        Ok(true) => {
                            last_extended = Instant::now();
                            debug!("lease extended");
                        }
                        Ok(false) => {
                            warn!("lease no longer owned, stopping refresh");
                            mark_expired(&state);
                            break;
                        }
                        Err(e) if last_extended.elapsed() >= lease.expire => {
                            warn!(error = %e, "lease could not be extended before expiry, stopping refresh");
                            mark_expired(&state);
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "lease extension failed, retrying next cycle");
                        }
                    }
                }
            }
            .instrument(span),
        );

        Self {
            stop,
            task: Some(task),
        }
    }

    /// Returns `true` once the task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signals the task to stop and waits until it has exited.
    pub async fn stop(mut self) {
        // Fails only when the task already exited.
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && e.is_panic()
        {
            warn!("refresh watchdog panicked");
        }
    }
}

impl Drop for RefreshWatchdog {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn mark_expired(state: &SharedState) {
    // Leave Releasing alone: a release already owns the outcome.
    let _ = state.transition(LockState::is_held, LockState::Expired);
}
