//! Error types for housekeeping operations

use thiserror::Error;

/// Errors that can occur during housekeeping operations
#[derive(Error, Debug)]
pub enum HousekeepingError {
    /// Lock could not be acquired (held elsewhere or lock service failure)
    #[error("Lock error on {key}: {message}")]
    Lock {
        /// Lock that was being acquired
        key: String,
        /// Error reported by the coordinator
        message: String,
    },

    /// Lease was lost while the sweep held it, so the sweep was abandoned
    #[error("Lease lost on {key}: {message}")]
    LeaseLost {
        /// Lock whose lease could not be renewed
        key: String,
        /// Error reported by the coordinator
        message: String,
    },

    /// Storage layer error (listing, candidate lookup or action)
    #[error("Storage error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker lifecycle error (tokio task issues, invalid start/stop)
    #[error("Worker error: {0}")]
    Worker(String),
}

impl HousekeepingError {
    pub(crate) fn store(e: impl std::fmt::Display) -> Self {
        HousekeepingError::Store(e.to_string())
    }
}
