//! Core traits and types for keyed expiring locks.
//!
//! A lock is a record in a shared key-value store, created atomically only
//! if absent and carrying a TTL. [`LockManager`] polls for the record,
//! runs protected work, and deletes the record again on every exit path.

pub mod error;
pub mod handle;
pub mod manager;
pub mod memory;
pub mod options;
pub mod prelude;
pub mod registry;
pub mod traits;

pub use error::{LockError, LockResult};
pub use prelude::*;
