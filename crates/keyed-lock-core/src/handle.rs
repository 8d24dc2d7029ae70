//! Guard for a held keyed lock.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::LockResult;
use crate::registry::ActiveLocks;
use crate::traits::LockStore;

/// Guard for a lock record this process created.
///
/// Call [`release`](Self::release) to delete the record and observe the
/// outcome. If the guard is dropped without being released (early return,
/// panic, or a cancelled future) it spawns a best-effort delete on the
/// current tokio runtime; outside a runtime the record is left to expire.
///
/// # Example
///
/// ```rust,ignore
/// let guard = manager.acquire("nightly-report", &LockCallOptions::new()).await?;
/// build_report().await;
/// guard.release().await?;
/// ```
pub struct LockGuard<S: LockStore> {
    store: Arc<S>,
    registry: Arc<ActiveLocks>,
    registration: u64,
    key: String,
    value: String,
    released: bool,
}

impl<S: LockStore> LockGuard<S> {
    /// Wraps a freshly created record and registers it as active.
    pub(crate) fn new(
        store: Arc<S>,
        registry: Arc<ActiveLocks>,
        key: String,
        value: String,
    ) -> Self {
        let registration = registry.add(&key);
        Self {
            store,
            registry,
            registration,
            key,
            value,
            released: false,
        }
    }

    /// Name of the held lock.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Token stored with the lock record.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Deletes the lock record and deregisters it.
    ///
    /// Returns `Ok(false)` if the record was already gone, typically because
    /// it expired while held.
    #[instrument(skip(self), fields(lock.key = %self.key, backend = self.store.backend_name()))]
    pub async fn release(self) -> LockResult<bool> {
        let mut guard = self;
        let result = guard.store.delete(&guard.key).await;
        guard.released = true;
        guard.registry.remove(&guard.key, guard.registration);
        if let Ok(false) = result {
            debug!("lock record was already gone at release");
        }
        result
    }
}

impl<S: LockStore> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.registry.remove(&self.key, self.registration);

        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let store = self.store.clone();
                runtime.spawn(async move {
                    if let Err(e) = store.delete(&key).await {
                        warn!(lock.key = %key, error = %e, "failed to release dropped lock");
                    }
                });
            }
            Err(_) => {
                warn!(lock.key = %key, "lock dropped outside a runtime; leaving it to expire");
            }
        }
    }
}

impl<S: LockStore> std::fmt::Debug for LockGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLockStore;
    use std::time::Duration;

    async fn held(
        store: &MemoryLockStore,
        registry: &Arc<ActiveLocks>,
        key: &str,
    ) -> LockGuard<MemoryLockStore> {
        assert!(store
            .set_if_absent(key, "true", Duration::from_secs(60))
            .await
            .unwrap());
        LockGuard::new(
            Arc::new(store.clone()),
            registry.clone(),
            key.to_string(),
            "true".to_string(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn release_deletes_and_deregisters() {
        let store = MemoryLockStore::new();
        let registry = Arc::new(ActiveLocks::new());
        let guard = held(&store, &registry, "jobs").await;
        assert!(registry.contains("jobs"));

        assert!(guard.release().await.unwrap());
        assert!(!store.contains("jobs"));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_after_expiry_reports_nothing_removed() {
        let store = MemoryLockStore::new();
        let registry = Arc::new(ActiveLocks::new());
        let guard = held(&store, &registry, "jobs").await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!guard.release().await.unwrap());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_spawns_release() {
        let store = MemoryLockStore::new();
        let registry = Arc::new(ActiveLocks::new());
        let guard = held(&store, &registry, "jobs").await;

        drop(guard);
        assert!(registry.is_empty());

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(!store.contains("jobs"));
    }
}
