//! Store error type

use thiserror::Error;

/// Failure reported by a store implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend I/O failed; retrying may succeed
    #[error("store I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be decoded
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Returns true if the failure may clear up on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
