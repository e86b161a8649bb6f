//! Lifecycle states of a lease lock.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Where a [`LeaseLock`](crate::lock::LeaseLock) instance believes it is.
///
/// This is a local view only. The record in the store decides who holds the
/// lock, so `Held` can be stale when the lease lapsed without auto-refresh;
/// acquire re-checks such a state against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Unacquired,
    Acquiring,
    Held,
    Releasing,
    Released,
    /// The last acquisition ended without the lock.
    Failed,
    /// Ownership was found to be lost after having been held.
    Expired,
}

impl LockState {
    pub fn is_held(self) -> bool {
        self == Self::Held
    }

    /// States from which an acquisition may start.
    pub(crate) fn can_acquire(self) -> bool {
        matches!(
            self,
            Self::Unacquired | Self::Released | Self::Failed | Self::Expired
        )
    }

    /// States from which a release may start.
    pub(crate) fn can_release(self) -> bool {
        !matches!(self, Self::Acquiring | Self::Releasing)
    }

    /// The state to fall back to when the store reports no record of ours.
    pub(crate) fn after_mismatch(self) -> Self {
        match self {
            Self::Held | Self::Expired => Self::Expired,
            other => other,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unacquired => "unacquired",
            Self::Acquiring => "acquiring",
            Self::Held => "held",
            Self::Releasing => "releasing",
            Self::Released => "released",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// State cell shared between a lock and its refresh watchdog.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<watch::Sender<LockState>>);

impl SharedState {
    pub(crate) fn new() -> Self {
        Self(Arc::new(watch::Sender::new(LockState::Unacquired)))
    }

    pub(crate) fn get(&self) -> LockState {
        *self.0.borrow()
    }

    pub(crate) fn set(&self, state: LockState) {
        self.0.send_replace(state);
    }

    /// Atomically moves to `next` if `allowed` accepts the current state.
    ///
    /// Returns the previous state on success and the unchanged current state
    /// on refusal.
    pub(crate) fn transition(
        &self,
        allowed: impl FnOnce(LockState) -> bool,
        next: LockState,
    ) -> Result<LockState, LockState> {
        let mut outcome = Err(LockState::Unacquired);
        self.0.send_if_modified(|current| {
            if allowed(*current) {
                outcome = Ok(*current);
                *current = next;
                true
            } else {
                outcome = Err(*current);
                false
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_accepts_allowed_state() {
        let state = SharedState::new();
        let previous = state.transition(LockState::can_acquire, LockState::Acquiring);
        assert_eq!(previous, Ok(LockState::Unacquired));
        assert_eq!(state.get(), LockState::Acquiring);
    }

    #[test]
    fn test_transition_refuses_and_keeps_state() {
        let state = SharedState::new();
        state.set(LockState::Held);
        let refused = state.transition(LockState::can_acquire, LockState::Acquiring);
        assert_eq!(refused, Err(LockState::Held));
        assert_eq!(state.get(), LockState::Held);
    }

    #[test]
    fn test_clones_share_the_cell() {
        let state = SharedState::new();
        let watchdog_view = state.clone();
        watchdog_view.set(LockState::Expired);
        assert_eq!(state.get(), LockState::Expired);
    }

    #[test]
    fn test_after_mismatch() {
        assert_eq!(LockState::Held.after_mismatch(), LockState::Expired);
        assert_eq!(LockState::Released.after_mismatch(), LockState::Released);
        assert_eq!(LockState::Unacquired.after_mismatch(), LockState::Unacquired);
    }

    #[test]
    fn test_release_blocked_while_in_flight() {
        assert!(!LockState::Acquiring.can_release());
        assert!(!LockState::Releasing.can_release());
        assert!(LockState::Released.can_release());
    }
}
