//! Redis backend for keyed expiring locks.

pub mod settings;
pub mod store;

pub use settings::RedisSettings;
pub use store::{RedisLockStore, RedisLockStoreBuilder};
