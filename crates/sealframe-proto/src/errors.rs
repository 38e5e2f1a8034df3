//! Wire format errors

use sealframe_crypto::CryptoError;
use thiserror::Error;

/// Result alias for wire operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors from parsing or building wire artifacts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended before a required field
    #[error("input too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Version byte is not supported
    #[error("unsupported version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Message type nibble is not known
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// Message has a known type but not the one expected here
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessageType {
        /// Type expected by the caller
        expected: u8,
        /// Type found on the wire
        actual: u8,
    },

    /// Service id text or bytes are malformed
    #[error("invalid service id: {0}")]
    InvalidServiceId(String),

    /// Device id outside `[0, 127]`
    #[error("invalid device id: {device_id}")]
    InvalidDeviceId {
        /// Rejected value
        device_id: u32,
    },

    /// Embedded key failed to parse
    #[error("invalid key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// Structure is well-formed CBOR or binary but semantically invalid
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Envelope would list more recipients than the format allows
    #[error("too many recipients: {count}")]
    TooManyRecipients {
        /// Number of requested entries
        count: usize,
    },

    /// CBOR serialization failed
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}
