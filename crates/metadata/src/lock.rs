//! Cluster-wide mutual exclusion keyed by strings derived from model
//! identity.
//!
//! Acquisition blocks without timeout until the lock is granted. Release is
//! guaranteed on every exit path within a live process (normal return,
//! error, or cancellation) because the guard signals a janitor task on
//! drop. A whole-process crash leaves the row behind; the key stays blocked
//! until an operator clears stale `sync_locks` rows by `acquired_at`.

use async_trait::async_trait;
use modelvault_core::ModelIdentity;
use tokio::sync::oneshot;

use crate::error::MetadataResult;

/// Capability to acquire cluster-wide locks.
///
/// Held by any component that needs scoped acquisition; callers in this
/// subsystem hold at most one lock at a time.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Acquire the lock for `key`, waiting indefinitely until granted.
    async fn acquire_lock(&self, key: &str) -> MetadataResult<LockGuard>;
}

/// A held lock. Dropping the guard releases the lock.
pub struct LockGuard {
    key: String,
    _release_tx: oneshot::Sender<()>,
}

impl LockGuard {
    pub(crate) fn new(key: String, release_tx: oneshot::Sender<()>) -> Self {
        Self {
            key,
            _release_tx: release_tx,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock explicitly. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LockGuard").field(&self.key).finish()
    }
}

/// Lock key for model-level sync operations.
pub fn model_lock_key(identity: &ModelIdentity) -> String {
    format!("sync_model_{}", identity.flat_key())
}

/// Lock key for component-level sync operations.
///
/// Distinct from the model-level key for the same identity, so model and
/// component transfers do not serialize against each other.
pub fn component_lock_key(identity: &ModelIdentity, component_name: &str) -> String {
    format!("sync_component_{}_{component_name}", identity.flat_key())
}
