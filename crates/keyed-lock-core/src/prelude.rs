//! Convenience prelude for keyed lock types.

pub use crate::error::{LockError, LockResult};
pub use crate::handle::LockGuard;
pub use crate::manager::{LockManager, LockManagerBuilder};
pub use crate::memory::MemoryLockStore;
pub use crate::options::{LockCallOptions, LockOptions, LockParams, LockSettings};
pub use crate::registry::ActiveLocks;
pub use crate::traits::{Clock, LockStore, TokioClock};
