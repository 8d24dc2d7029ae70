//! Store wrapper that counts acquisition attempts.

use keyed_lock::{LockResult, LockStore, MemoryLockStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Memory store that records how often it was asked to create a lock.
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryLockStore,
    attempts: Arc<AtomicUsize>,
    successes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }
}

impl LockStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let created = self.inner.set_if_absent(key, value, ttl).await?;
        if created {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(created)
    }

    async fn delete(&self, key: &str) -> LockResult<bool> {
        self.inner.delete(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> LockResult<u64> {
        self.inner.delete_many(keys).await
    }
}
