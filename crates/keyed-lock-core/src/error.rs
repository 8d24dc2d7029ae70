//! Error types for keyed lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock could not be acquired before the deadline.
    #[error("Steps lock failed: {key}")]
    Timeout {
        /// Name of the lock that stayed busy.
        key: String,
        /// How long the caller was willing to wait.
        waited: Duration,
    },

    /// Invalid lock name.
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// Lock options that the store cannot honor.
    #[error("invalid lock options: {0}")]
    InvalidOptions(String),

    /// Store connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Store-specific error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Returns `true` if this error means the lock stayed busy until the deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }

    /// Returns the lock name carried by a timeout error.
    pub fn key(&self) -> Option<&str> {
        match self {
            LockError::Timeout { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
