//! Error types for store operations

use std::fmt;

use crate::MonitorId;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when talking to the persistence collaborator
#[derive(Debug)]
pub enum StoreError {
    /// No monitor exists under the given id
    MonitorNotFound(MonitorId),

    /// The backing store rejected or failed the operation
    BackendError(String),

    /// The backing store is unreachable
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::MonitorNotFound(id) => write!(f, "monitor {} not found", id),
            StoreError::BackendError(msg) => write!(f, "store backend error: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
