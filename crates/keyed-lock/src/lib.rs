//! Named mutual-exclusion locks on a shared key-value store.
//!
//! A lock is a record created with `SET key value PX ttl NX`. Acquisition
//! polls at a fixed interval until the record can be created or a timeout
//! elapses; the TTL bounds how long a crashed holder can block everyone
//! else. Protected work runs between acquisition and an unconditional
//! release.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use keyed_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RedisLockStore::new("redis://localhost:6379").await?;
//!     let manager = LockManager::builder(store)
//!         .timeout(Duration::from_secs(5))
//!         .build();
//!
//!     // Released on success, on error, and on panic
//!     let rows = manager
//!         .with_lock("nightly-import", || async { Ok::<_, LockError>(128) })
//!         .await?;
//!     println!("imported {rows} rows");
//!
//!     // Graceful shutdown: drop whatever is still held
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Guarantees
//!
//! This is not a consensus lock: there are no fencing tokens and no quorum.
//! If protected work outlives `expire`, another caller can acquire the lock
//! while it is still running.
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `keyed-lock-core`: traits, the lock manager, and an in-memory store
//! - `keyed-lock-redis`: the Redis store

pub mod settings;

// Re-export core types and traits
pub use keyed_lock_core::*;

// Re-export redis backend
pub use keyed_lock_redis::*;

pub use settings::Settings;
