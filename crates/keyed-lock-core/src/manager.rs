//! Lock manager: polling acquisition, scoped execution and shutdown cleanup.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{Span, debug, instrument, warn};

use crate::error::{LockError, LockResult};
use crate::handle::LockGuard;
use crate::options::{LockCallOptions, LockOptions, LockParams, validate_expire};
use crate::registry::ActiveLocks;
use crate::traits::{Clock, LockStore, TokioClock};

/// Maximum number of keys removed by a single store call during shutdown.
pub const SHUTDOWN_CHUNK_SIZE: usize = 1000;

/// Default bound on the whole shutdown cleanup.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for [`LockManager`] configuration.
pub struct LockManagerBuilder<S, C = TokioClock> {
    store: Arc<S>,
    clock: C,
    options: LockOptions,
    registry: Option<Arc<ActiveLocks>>,
    shutdown_timeout: Duration,
}

impl<S: LockStore> LockManagerBuilder<S> {
    /// Creates a new builder with default settings.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Creates a builder around a store that is shared with other owners.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            clock: TokioClock,
            options: LockOptions::default(),
            registry: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl<S: LockStore, C: Clock> LockManagerBuilder<S, C> {
    /// Replaces all lock defaults at once.
    pub fn options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the default lock record lifetime.
    pub fn expire(mut self, expire: Duration) -> Self {
        self.options.expire = expire;
        self
    }

    /// Sets the default acquisition timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Sets the sleep between acquisition attempts.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.options.poll_interval = poll_interval;
        self
    }

    /// Sets the default value stored with each lock record.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.options.value = value.into();
        self
    }

    /// Uses an existing active-lock registry instead of a fresh one.
    pub fn registry(mut self, registry: Arc<ActiveLocks>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Bounds how long [`LockManager::shutdown`] may wait on the store.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Uses `clock` for deadlines and poll sleeps.
    pub fn clock<C2: Clock>(self, clock: C2) -> LockManagerBuilder<S, C2> {
        LockManagerBuilder {
            store: self.store,
            clock,
            options: self.options,
            registry: self.registry,
            shutdown_timeout: self.shutdown_timeout,
        }
    }

    /// Builds the manager.
    pub fn build(self) -> LockManager<S, C> {
        LockManager {
            store: self.store,
            clock: self.clock,
            options: self.options,
            registry: self.registry.unwrap_or_default(),
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

/// Named mutual-exclusion locks on top of a [`LockStore`].
///
/// A lock is held while its record exists in the store. Acquisition polls the
/// store at a fixed interval until the record can be created or the timeout
/// elapses. Records carry a TTL, so a crashed holder blocks others for at most
/// `expire`.
///
/// # Example
///
/// ```rust
/// use keyed_lock_core::{LockError, LockManager, MemoryLockStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), LockError> {
/// let manager = LockManager::new(MemoryLockStore::new());
///
/// let total = manager
///     .with_lock("invoices", || async { Ok::<_, LockError>(40 + 2) })
///     .await?;
/// assert_eq!(total, 42);
/// # Ok(())
/// # }
/// ```
pub struct LockManager<S, C = TokioClock> {
    store: Arc<S>,
    clock: C,
    options: LockOptions,
    registry: Arc<ActiveLocks>,
    shutdown_timeout: Duration,
}

impl<S: LockStore> LockManager<S> {
    /// Creates a manager with default options.
    pub fn new(store: S) -> Self {
        Self::builder(store).build()
    }

    /// Returns a new builder for configuring the manager.
    pub fn builder(store: S) -> LockManagerBuilder<S> {
        LockManagerBuilder::new(store)
    }
}

impl<S: LockStore, C: Clock> LockManager<S, C> {
    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Manager-wide lock defaults.
    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Locks currently held through this manager.
    pub fn active_locks(&self) -> &Arc<ActiveLocks> {
        &self.registry
    }

    /// Makes a single acquisition attempt.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - The record was created with `value`
    /// * `Ok(None)` - The lock is held by someone else
    /// * `Err(...)` - Invalid arguments or a store failure
    #[instrument(skip_all, fields(lock.key = %key, backend = self.store.backend_name()))]
    pub async fn try_acquire(
        &self,
        key: &str,
        expire: Duration,
        value: &str,
    ) -> LockResult<Option<String>> {
        validate(key, expire)?;
        let acquired = self.store.set_if_absent(key, value, expire).await?;
        Ok(acquired.then(|| value.to_string()))
    }

    /// Attempts acquisition until it succeeds or `timeout` elapses.
    ///
    /// The deadline is computed once, before the first attempt. Between
    /// attempts the caller sleeps for the configured poll interval. A zero
    /// `timeout` makes exactly one attempt. Store failures end the wait
    /// immediately and are returned as errors.
    #[instrument(skip_all, fields(lock.key = %key, timeout = ?timeout, backend = self.store.backend_name()))]
    pub async fn acquire_with_poll(
        &self,
        key: &str,
        expire: Duration,
        timeout: Duration,
        value: &str,
    ) -> LockResult<Option<String>> {
        validate(key, expire)?;

        let start = self.clock.now();
        // An unrepresentable deadline means "never give up".
        let deadline = start.checked_add(timeout);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if self.store.set_if_absent(key, value, expire).await? {
                let elapsed = self.clock.now().saturating_duration_since(start);
                debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "lock acquired");
                return Ok(Some(value.to_string()));
            }

            if deadline.is_some_and(|deadline| self.clock.now() >= deadline) {
                debug!(attempts, "lock still held at deadline");
                return Ok(None);
            }

            self.clock.sleep(self.options.poll_interval).await;
        }
    }

    /// Acquires `name` and returns a guard that releases it.
    ///
    /// Fails with [`LockError::Timeout`] if the lock stays busy for the whole
    /// timeout.
    pub async fn acquire(&self, name: &str, options: &LockCallOptions) -> LockResult<LockGuard<S>> {
        let params = self.options.resolve(options);
        self.acquire_resolved(name, &params).await
    }

    async fn acquire_resolved(&self, key: &str, params: &LockParams) -> LockResult<LockGuard<S>> {
        match self
            .acquire_with_poll(key, params.expire, params.timeout, &params.value)
            .await?
        {
            Some(value) => Ok(LockGuard::new(
                self.store.clone(),
                self.registry.clone(),
                key.to_string(),
                value,
            )),
            None => Err(LockError::Timeout {
                key: key.to_string(),
                waited: params.timeout,
            }),
        }
    }

    /// Runs `work` while holding `name`, using the manager defaults.
    ///
    /// See [`with_lock_options`](Self::with_lock_options).
    pub async fn with_lock<F, Fut, T, E>(&self, name: &str, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        self.with_lock_options(name, &LockCallOptions::default(), work)
            .await
    }

    /// Runs `work` while holding `name`, with per-call overrides.
    ///
    /// Unset overrides fall back to the manager defaults.
    pub async fn with_lock_options<F, Fut, T, E>(
        &self,
        name: &str,
        options: &LockCallOptions,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let params = self.options.resolve(options);
        self.run_exclusive(name, &params, work).await
    }

    /// Acquires `key`, runs `work`, and releases the lock on every exit path.
    ///
    /// * If the lock cannot be acquired in time, returns
    ///   [`LockError::Timeout`] converted into `E`; `work` is not called.
    /// * Otherwise the lock record is deleted exactly once after `work`
    ///   finishes, whether it returned `Ok`, returned `Err`, or panicked.
    ///   A failed delete is logged and does not replace the outcome of `work`.
    /// * The outcome of `work` is returned unchanged; panics are resumed after
    ///   the release.
    #[instrument(skip_all, fields(lock.key = %key, backend = self.store.backend_name(), acquired = tracing::field::Empty))]
    pub async fn run_exclusive<F, Fut, T, E>(
        &self,
        key: &str,
        params: &LockParams,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let guard = match self.acquire_resolved(key, params).await {
            Ok(guard) => guard,
            Err(e) => {
                Span::current().record("acquired", false);
                return Err(e.into());
            }
        };
        Span::current().record("acquired", true);

        let outcome = AssertUnwindSafe(work()).catch_unwind().await;

        match guard.release().await {
            Ok(true) => debug!("lock released"),
            Ok(false) => warn!("lock expired before release"),
            Err(e) => warn!(error = %e, "failed to release lock; it will expire on its own"),
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Deletes every lock still held through this manager.
    ///
    /// Intended for the host's graceful-shutdown sequence. Keys are removed in
    /// chunks of at most [`SHUTDOWN_CHUNK_SIZE`], with all chunks issued
    /// concurrently. The cleanup gives up after the configured shutdown
    /// timeout; anything left behind expires through its TTL.
    ///
    /// Returns the number of records removed.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn shutdown(&self) -> u64 {
        let keys = self.registry.drain();
        if keys.is_empty() {
            return 0;
        }

        let deletes = keys
            .chunks(SHUTDOWN_CHUNK_SIZE)
            .map(|chunk| self.store.delete_many(chunk));

        tokio::select! {
            results = join_all(deletes) => {
                let mut removed = 0;
                for result in results {
                    match result {
                        Ok(count) => removed += count,
                        Err(e) => warn!(error = %e, "failed to remove a chunk of active locks"),
                    }
                }
                debug!(held = keys.len(), removed, "active locks cleaned up");
                removed
            }
            _ = self.clock.sleep(self.shutdown_timeout) => {
                warn!(held = keys.len(), "active lock cleanup timed out");
                0
            }
        }
    }
}

fn validate(key: &str, expire: Duration) -> LockResult<()> {
    if key.is_empty() {
        return Err(LockError::InvalidName("lock name must not be empty".to_string()));
    }
    validate_expire(expire)
}
