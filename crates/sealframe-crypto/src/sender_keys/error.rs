//! Error types for Sender Keys operations

use thiserror::Error;

/// Errors from sender key chain and encryption operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SenderKeyError {
    /// Chain iteration would overflow
    #[error("sender chain iteration overflow at {current}")]
    IterationOverflow {
        /// Iteration when overflow was detected
        current: u32,
    },

    /// Decryption failed (authentication tag mismatch)
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: String,
    },
}

impl SenderKeyError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate a protocol violation or bug. A decryption
    /// failure may stem from a stale chain and clears up once the sender
    /// redistributes its key.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::IterationOverflow { .. } => true,
            Self::DecryptionFailed { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_is_fatal() {
        let err = SenderKeyError::IterationOverflow { current: u32::MAX };
        assert!(err.is_fatal());
    }

    #[test]
    fn decryption_failed_is_not_fatal() {
        let err = SenderKeyError::DecryptionFailed { reason: "tag mismatch".to_string() };
        assert!(!err.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = SenderKeyError::DecryptionFailed { reason: "tag mismatch".to_string() };
        assert_eq!(err.to_string(), "decryption failed: tag mismatch");
    }
}
