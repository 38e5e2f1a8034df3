//! Error types for the Sealframe protocol core.
//!
//! Protocol failures (bad signatures, unknown sessions, replays) are kept
//! apart from store failures so callers can tell a broken or malicious peer
//! from a storage hiccup. Lower-layer errors from the wire and crypto crates
//! are wrapped transparently.

use sealframe_crypto::{CryptoError, SenderKeyError};
use sealframe_proto::{KyberPreKeyId, PreKeyId, ProtocolAddress, SignedPreKeyId, WireError};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::StoreError;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors returned by session, sealed sender and group operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Registration id outside the 14-bit range
    #[error("invalid registration id {registration_id:#x} for {address}")]
    InvalidRegistrationId {
        /// Address the registration id belongs to
        address: ProtocolAddress,
        /// Offending registration id
        registration_id: u32,
    },

    /// A signature did not verify
    #[error("invalid signature on {what}")]
    InvalidSignature {
        /// What was signed
        what: &'static str,
    },

    /// The identity key for an address is not trusted in this direction
    #[error("untrusted identity for {address}")]
    UntrustedIdentity {
        /// Address whose identity was rejected
        address: ProtocolAddress,
    },

    /// No usable session for an address
    #[error("session with {address} not found")]
    SessionNotFound {
        /// Address without a session
        address: ProtocolAddress,
    },

    /// Sealed sender message from our own device
    #[error("sealed sender message sent by this device")]
    SealedSenderSelfSend,

    /// A Kyber pre-key was used with two different base keys
    #[error("kyber pre-key {kyber_pre_key_id} reused with signed pre-key {signed_pre_key_id}")]
    DuplicatedKyberPreKeyUsage {
        /// Kyber pre-key that was used
        kyber_pre_key_id: KyberPreKeyId,
        /// Signed pre-key it was paired with
        signed_pre_key_id: SignedPreKeyId,
    },

    /// Message key already consumed and evicted
    #[error("duplicate message with counter {counter}")]
    DuplicatedMessage {
        /// Counter or iteration of the message
        counter: u32,
    },

    /// Message failed authentication or is structurally unusable
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// What was wrong
        reason: String,
    },

    /// Unknown one-time pre-key
    #[error("unknown pre-key {0}")]
    InvalidPreKeyId(PreKeyId),

    /// Unknown signed pre-key
    #[error("unknown signed pre-key {0}")]
    InvalidSignedPreKeyId(SignedPreKeyId),

    /// Unknown Kyber pre-key
    #[error("unknown kyber pre-key {0}")]
    InvalidKyberPreKeyId(KyberPreKeyId),

    /// No sender key state for a distribution
    #[error("no sender key state for distribution {distribution_id}")]
    NoSenderKeyState {
        /// Distribution that has no state
        distribution_id: Uuid,
    },

    /// Sender key state exists but cannot be used for the operation
    #[error("invalid sender key session for distribution {distribution_id}")]
    InvalidSenderKeySession {
        /// Distribution of the unusable state
        distribution_id: Uuid,
    },

    /// Sender or server certificate failed validation
    #[error("invalid certificate: {reason}")]
    InvalidCertificate {
        /// Why validation failed
        reason: String,
    },

    /// Sealed sender envelope could not be opened
    #[error("invalid sealed sender message: {reason}")]
    InvalidSealedSenderMessage {
        /// What was wrong
        reason: String,
    },

    /// Caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored state does not allow the operation
    #[error("invalid state for {operation}: {reason}")]
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// Why it cannot proceed
        reason: String,
    },

    /// Wire format error
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Cryptographic primitive error
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Sender key chain error
    #[error(transparent)]
    SenderKey(#[from] SenderKeyError),

    /// Store I/O error, propagated unchanged
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProtocolError {
    /// Returns true if the operation may succeed when retried unchanged.
    ///
    /// Only store failures qualify. Protocol violations indicate a broken or
    /// malicious peer and will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_transient())
    }

    pub(crate) fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage { reason: reason.into() }
    }

    pub(crate) fn invalid_sealed_sender(reason: impl Into<String>) -> Self {
        Self::InvalidSealedSenderMessage { reason: reason.into() }
    }
}
