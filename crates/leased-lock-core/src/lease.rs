//! Ownership-checked operations on one lock record.

use std::sync::Arc;
use std::time::Duration;

use crate::error::LockResult;
use crate::script::LockScript;
use crate::token::OwnershipToken;
use crate::traits::LockStore;

/// An owned handle on `key = token` in a store.
///
/// Detached from the [`LeaseLock`](crate::lock::LeaseLock) so it can move into
/// spawned tasks.
pub(crate) struct Lease<S: LockStore> {
    pub(crate) store: Arc<S>,
    pub(crate) key: String,
    pub(crate) token: OwnershipToken,
    pub(crate) expire: Duration,
}

impl<S: LockStore> Lease<S> {
    async fn run(&self, script: LockScript, args: &[&str]) -> LockResult<bool> {
        let reply = self
            .store
            .eval_script(script, &[self.key.as_str()], args)
            .await?;
        Ok(reply == 1)
    }

    /// Resets the TTL if the key still carries our token.
    pub(crate) async fn refresh(&self) -> LockResult<bool> {
        let ttl = self.expire.as_millis().to_string();
        self.run(LockScript::Refresh, &[self.token.as_str(), ttl.as_str()])
            .await
    }

    /// Deletes the key if it still carries our token.
    pub(crate) async fn release(&self) -> LockResult<bool> {
        self.run(LockScript::Release, &[self.token.as_str()]).await
    }

    /// Reports whether the key still carries our token.
    pub(crate) async fn is_owned(&self) -> LockResult<bool> {
        self.run(LockScript::Check, &[self.token.as_str()]).await
    }
}
