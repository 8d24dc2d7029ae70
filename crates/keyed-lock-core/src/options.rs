//! Lock defaults, per-call overrides and their serde form.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LockError, LockResult};

/// Value stored with a lock record when the caller does not supply one.
pub const DEFAULT_VALUE: &str = "true";
/// Default lifetime of a lock record.
pub const DEFAULT_EXPIRE: Duration = Duration::from_secs(60 * 60);
/// Default time to wait for a busy lock.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default sleep between acquisition attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Manager-wide lock defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// TTL of the lock record in the store.
    pub expire: Duration,
    /// Maximum time to wait for acquisition.
    pub timeout: Duration,
    /// Fixed sleep between acquisition attempts.
    pub poll_interval: Duration,
    /// Token stored alongside the key.
    pub value: String,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            expire: DEFAULT_EXPIRE,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            value: DEFAULT_VALUE.to_string(),
        }
    }
}

impl LockOptions {
    /// Merges call-site overrides over these defaults.
    ///
    /// Only `None` falls back to the default; `Some(Duration::ZERO)` or an
    /// empty value are taken as given.
    pub fn resolve(&self, call: &LockCallOptions) -> LockParams {
        let value = if call.unique_value {
            Uuid::new_v4().to_string()
        } else {
            call.value.clone().unwrap_or_else(|| self.value.clone())
        };

        LockParams {
            expire: call.expire.unwrap_or(self.expire),
            timeout: call.timeout.unwrap_or(self.timeout),
            value,
        }
    }
}

/// Per-call overrides for a single lock acquisition.
///
/// # Example
///
/// ```rust
/// use keyed_lock_core::LockCallOptions;
/// use std::time::Duration;
///
/// let options = LockCallOptions::new()
///     .expire(Duration::from_secs(30))
///     .timeout(Duration::from_millis(500));
/// assert_eq!(options.timeout, Some(Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockCallOptions {
    pub expire: Option<Duration>,
    pub timeout: Option<Duration>,
    pub value: Option<String>,
    /// Store a fresh UUID instead of a fixed value.
    pub unique_value: bool,
}

impl LockCallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expire(mut self, expire: Duration) -> Self {
        self.expire = Some(expire);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self.unique_value = false;
        self
    }

    /// Stores a random per-acquisition token, so the record in the store
    /// identifies which attempt created it.
    pub fn unique_value(mut self) -> Self {
        self.value = None;
        self.unique_value = true;
        self
    }

    /// Non-blocking variant: a single attempt, no waiting.
    pub fn no_wait(self) -> Self {
        self.timeout(Duration::ZERO)
    }
}

/// Effective parameters for one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockParams {
    pub expire: Duration,
    pub timeout: Duration,
    pub value: String,
}

impl LockParams {
    /// Rejects parameters the store cannot honor.
    pub fn validate(&self) -> LockResult<()> {
        validate_expire(self.expire)
    }
}

/// Rejects an expire shorter than the 1ms store granularity.
pub(crate) fn validate_expire(expire: Duration) -> LockResult<()> {
    // PX 0 is refused by Redis and would create an already-dead record.
    if expire.as_millis() == 0 {
        return Err(LockError::InvalidOptions(format!(
            "lock expire must be at least 1ms, got {:?}",
            expire
        )));
    }
    Ok(())
}

/// Serialized lock configuration.
///
/// Durations use the units of the `lock` configuration section: `expire` in
/// seconds, `timeout` and `lockSleep` in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockSettings {
    pub expire: Option<u64>,
    pub timeout: Option<u64>,
    pub lock_sleep: Option<u64>,
    pub value: Option<String>,
}

impl From<LockSettings> for LockOptions {
    fn from(settings: LockSettings) -> Self {
        let defaults = LockOptions::default();
        Self {
            expire: settings
                .expire
                .map(Duration::from_secs)
                .unwrap_or(defaults.expire),
            timeout: settings
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            poll_interval: settings
                .lock_sleep
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            value: settings.value.unwrap_or(defaults.value),
        }
    }
}
