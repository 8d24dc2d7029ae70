//! In-process lock store with TTL expiry.
//!
//! Useful for tests and for single-process deployments. Clones share the same
//! underlying map, so several managers built from clones of one store behave
//! like separate processes talking to one shared server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::LockResult;
use crate::traits::{Clock, LockStore, TokioClock};

#[derive(Debug, Clone)]
struct Record {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Record {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// A [`LockStore`] kept in process memory.
#[derive(Debug, Clone)]
pub struct MemoryLockStore<C = TokioClock> {
    records: Arc<Mutex<HashMap<String, Record>>>,
    clock: C,
}

impl MemoryLockStore<TokioClock> {
    pub fn new() -> Self {
        Self::with_clock(TokioClock)
    }
}

impl Default for MemoryLockStore<TokioClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryLockStore<C> {
    /// Creates a store that judges expiry with `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Returns the value stored under `key`, if the record is still live.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        Self::purge_expired(&mut records, key, now);
        records.get(key).map(|record| record.value.clone())
    }

    /// Returns `true` if a live record exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the remaining lifetime of `key`.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        Self::purge_expired(&mut records, key, now);
        records
            .get(key)
            .map(|record| match record.expires_at {
                Some(expires_at) => expires_at.saturating_duration_since(now),
                None => Duration::MAX,
            })
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.lock();
        records.retain(|_, record| !record.is_expired(now));
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(records: &mut HashMap<String, Record>, key: &str, now: Instant) {
        if records.get(key).is_some_and(|record| record.is_expired(now)) {
            records.remove(key);
        }
    }

    fn remove_live(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.records.lock();
        Self::purge_expired(&mut records, key, now);
        records.remove(key).is_some()
    }
}

impl<C: Clock> LockStore for MemoryLockStore<C> {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        Self::purge_expired(&mut records, key, now);

        if records.contains_key(key) {
            return Ok(false);
        }

        records.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                expires_at: now.checked_add(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> LockResult<bool> {
        Ok(self.remove_live(key))
    }

    async fn delete_many(&self, keys: &[String]) -> LockResult<u64> {
        Ok(keys.iter().filter(|key| self.remove_live(key)).count() as u64)
    }
}
