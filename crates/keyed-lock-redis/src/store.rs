//! Redis lock store implementation.

use std::time::Duration;

use fred::error::{RedisError, RedisErrorKind};
use fred::prelude::*;
use keyed_lock_core::error::{LockError, LockResult};
use keyed_lock_core::traits::LockStore;
use tracing::{debug, instrument};

use crate::settings::RedisSettings;

/// Builder for Redis lock store configuration.
pub struct RedisLockStoreBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
    key_prefix: Option<String>,
}

impl RedisLockStoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            client: None,
            key_prefix: None,
        }
    }

    /// Sets the Redis server URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing, already connected Redis client.
    ///
    /// Takes precedence over [`url`](Self::url).
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Prepends `prefix` to every lock name before it reaches Redis.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Builds the store, connecting to Redis if a URL was given.
    pub async fn build(self) -> LockResult<RedisLockStore> {
        let client = match (self.client, self.url) {
            (Some(client), _) => client,
            (None, Some(url)) => connect(&url).await?,
            (None, None) => {
                return Err(LockError::InvalidOptions(
                    "no Redis client or URL provided".to_string(),
                ));
            }
        };

        Ok(RedisLockStore {
            client,
            key_prefix: self.key_prefix.unwrap_or_default(),
        })
    }
}

impl Default for RedisLockStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect(url: &str) -> LockResult<RedisClient> {
    let config = RedisConfig::from_url(url).map_err(|e| {
        LockError::Connection(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid Redis URL: {}", e),
        )))
    })?;

    let client = RedisClient::new(config, None, None, None);
    client.connect();
    client.wait_for_connect().await.map_err(|e| {
        LockError::Connection(Box::new(std::io::Error::other(format!(
            "failed to connect to Redis: {}",
            e
        ))))
    })?;

    debug!(url, "connected to Redis");
    Ok(client)
}

/// Lock store backed by a single Redis server or cluster.
///
/// Acquisition is `SET key value PX ttl NX`; release is `DEL key`.
#[derive(Clone)]
pub struct RedisLockStore {
    client: RedisClient,
    key_prefix: String,
}

impl RedisLockStore {
    /// Returns a new builder for configuring the store.
    pub fn builder() -> RedisLockStoreBuilder {
        RedisLockStoreBuilder::new()
    }

    /// Creates a store connected to the specified Redis URL.
    pub async fn new(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }

    /// Creates a store from serialized settings.
    pub async fn from_settings(settings: &RedisSettings) -> LockResult<Self> {
        let mut builder = Self::builder().url(settings.url.clone());
        if let Some(prefix) = &settings.key_prefix {
            builder = builder.key_prefix(prefix.clone());
        }
        builder.build().await
    }

    /// The underlying Redis client.
    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// Redis key used for lock `name`.
    pub fn redis_key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }

    /// Closes the connection to Redis.
    pub async fn quit(&self) -> LockResult<()> {
        self.client.quit().await.map_err(map_redis_error)
    }
}

impl LockStore for RedisLockStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self, value), fields(redis.key = %self.redis_key(key)))]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let expiry_millis = ttl.as_millis().min(i64::MAX as u128) as i64;

        // SET NX returns Some("OK") if the key was set, None if it already exists
        let result: Option<String> = self
            .client
            .set(
                self.redis_key(key),
                value,
                Some(Expiration::PX(expiry_millis)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(map_redis_error)?;

        Ok(result.is_some())
    }

    #[instrument(skip(self), fields(redis.key = %self.redis_key(key)))]
    async fn delete(&self, key: &str) -> LockResult<bool> {
        let removed: i64 = self
            .client
            .del(self.redis_key(key))
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    /// Removes `keys` with one multi-key `DEL`.
    ///
    /// Against a cluster the keys may live in different hash slots, which a
    /// multi-key `DEL` rejects with `CROSSSLOT`, so each key is deleted on its
    /// own there.
    #[instrument(skip_all, fields(keys = keys.len(), clustered = self.client.is_clustered()))]
    async fn delete_many(&self, keys: &[String]) -> LockResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        if self.client.is_clustered() {
            let mut removed = 0;
            for key in keys {
                if self.delete(key).await? {
                    removed += 1;
                }
            }
            return Ok(removed);
        }

        let redis_keys: Vec<String> = keys.iter().map(|key| self.redis_key(key)).collect();
        let removed: i64 = self
            .client
            .del(redis_keys)
            .await
            .map_err(map_redis_error)?;
        Ok(removed.max(0) as u64)
    }
}

/// Splits Redis failures into connectivity problems and everything else.
pub(crate) fn map_redis_error(e: RedisError) -> LockError {
    match e.kind() {
        RedisErrorKind::IO | RedisErrorKind::Timeout | RedisErrorKind::Canceled => {
            LockError::Connection(Box::new(e))
        }
        _ => LockError::Backend(Box::new(e)),
    }
}
