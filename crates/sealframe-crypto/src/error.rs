//! Error types for key handling and primitive operations

use thiserror::Error;

/// Errors from key parsing, signatures, AEAD and KEM operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Serialized key starts with an unknown type byte
    #[error("unknown key type: {0:#04x}")]
    UnknownKeyType(u8),

    /// Public key does not decode to a usable curve point
    #[error("public key is not a valid curve point")]
    InvalidPublicKey,

    /// Signature is not 64 bytes
    #[error("invalid signature length: {0}")]
    InvalidSignatureLength(usize),

    /// AEAD authentication tag did not verify
    #[error("AEAD authentication failed")]
    AeadFailure,

    /// Chain index would overflow
    #[error("chain index overflow at {current}")]
    ChainExhausted {
        /// Index when overflow was detected
        current: u32,
    },

    /// KEM backend rejected an input
    #[error("KEM operation failed: {reason}")]
    Kem {
        /// Backend error description
        reason: String,
    },
}
