//! Combined configuration for a Redis-backed lock manager.

use keyed_lock_core::error::LockResult;
use keyed_lock_core::manager::LockManager;
use keyed_lock_core::options::{LockOptions, LockSettings};
use keyed_lock_redis::{RedisLockStore, RedisSettings};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Top-level configuration: where the store lives and the lock defaults.
///
/// ```json
/// {
///   "redis": { "url": "redis://localhost:6379", "keyPrefix": "locks:" },
///   "lock": { "expire": 3600, "timeout": 60000, "lockSleep": 50 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub redis: RedisSettings,
    pub lock: LockSettings,
}

impl Settings {
    /// Lock defaults with unset fields filled in.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions::from(self.lock.clone())
    }

    /// Connects to Redis and builds a manager with these defaults.
    pub async fn connect(&self) -> LockResult<LockManager<RedisLockStore>> {
        let store = RedisLockStore::from_settings(&self.redis).await?;
        let options = self.lock_options();
        info!(
            expire_secs = options.expire.as_secs(),
            timeout_ms = options.timeout.as_millis() as u64,
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            "lock manager ready"
        );
        Ok(LockManager::builder(store).options(options).build())
    }
}
