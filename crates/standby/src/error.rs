//! Error types for the waiter and for individual waits.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or running a [`Waiter`](crate::Waiter).
#[derive(Debug, Error)]
pub enum WaiterError {
    #[error("invalid artifact pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("waiter is already serving")]
    AlreadyServing,

    #[error("failed to resolve watch directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a wait that did not end with the artifact becoming available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The caller's cancellation token fired.
    #[error("wait cancelled")]
    Cancelled,

    /// The caller's deadline passed.
    #[error("wait deadline exceeded")]
    DeadlineExceeded,

    /// The waiter shut down while the wait was suspended.
    #[error("waiter closed")]
    Closed,
}

impl WaitError {
    /// True when the wait ended because of the caller's own context.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WaitError::Cancelled | WaitError::DeadlineExceeded)
    }
}
