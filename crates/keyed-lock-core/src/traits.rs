//! Core traits for keyed locks.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::LockResult;

// ============================================================================
// Store Trait
// ============================================================================

/// A shared key-value store that can hold lock records.
///
/// The store is the only arbiter of exclusivity. Every process that uses the
/// same store and key name competes for the same lock, and nothing is cached
/// in process memory.
///
/// # Example
///
/// ```rust,ignore
/// // Acquire by creating the record, release by deleting it
/// if store.set_if_absent("reports", "true", Duration::from_secs(60)).await? {
///     build_report().await;
///     store.delete("reports").await?;
/// }
/// ```
pub trait LockStore: Send + Sync + 'static {
    /// Short backend name used in tracing fields.
    fn backend_name(&self) -> &'static str {
        "custom"
    }

    /// Creates `key` with `value` and a time-to-live of `ttl`, only if the key
    /// does not exist.
    ///
    /// Must be a single atomic operation on the store (no check-then-set).
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record was created; the caller holds the lock
    /// * `Ok(false)` - The key already exists
    /// * `Err(LockError::Connection)` - The store could not be reached
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes `key` unconditionally.
    ///
    /// Returns `Ok(true)` if a record was removed and `Ok(false)` if there was
    /// nothing to remove (already released or expired).
    fn delete(&self, key: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes every key in `keys`, returning how many records were removed.
    ///
    /// Stores with a multi-key delete should override this to issue a single
    /// round trip.
    fn delete_many(&self, keys: &[String]) -> impl Future<Output = LockResult<u64>> + Send {
        async move {
            let mut removed = 0;
            for key in keys {
                if self.delete(key).await? {
                    removed += 1;
                }
            }
            Ok(removed)
        }
    }
}

// ============================================================================
// Clock Trait
// ============================================================================

/// Time source used for acquisition deadlines and poll sleeps.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Clock backed by the tokio timer.
///
/// Honors tokio's paused test time, so deadline tests do not need to wait on
/// the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
