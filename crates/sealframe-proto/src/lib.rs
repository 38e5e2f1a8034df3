//! Sealframe Protocol
//!
//! Addressing types and wire formats shared by every Sealframe participant.
//!
//! # Architecture
//!
//! Direct and group messages start with a single byte carrying the message
//! version (high nibble) and message type (low nibble), so a receiver can
//! pick the decrypt path without out-of-band hints. Structured bodies are
//! CBOR; MACs and signatures are appended as raw bytes.
//!
//! Sealed sender envelopes carry their own version byte (`0x11` single
//! recipient, `0x23` multi-recipient as sent, `0x22` multi-recipient as
//! received). The multi-recipient recipient table is raw big-endian binary
//! so a delivery service can fan it out without understanding CBOR.
//!
//! # Invariants
//!
//! - `DeviceId` never holds a value above 127.
//! - `ServiceId` equality and ordering consider the kind before the UUID.
//! - Parsing never panics on untrusted input; malformed bytes produce a
//!   [`WireError`].

#![forbid(unsafe_code)]

pub mod address;
pub mod errors;
pub mod ids;
pub mod messages;
pub mod sealed;
pub mod service_id;

pub use address::{DeviceId, ProtocolAddress};
pub use errors::{Result, WireError};
pub use ids::{KyberPreKeyId, PreKeyId, SignedPreKeyId};
pub use messages::{
    CIPHERTEXT_MESSAGE_CURRENT_VERSION, CiphertextMessage, CiphertextMessageType,
    PreKeySignalMessage, SenderKeyDistributionMessage, SenderKeyMessage, SignalMessage,
};
pub use sealed::{
    RecipientKeyBlock, SEALED_SENDER_V1_VERSION, SEALED_SENDER_V2_RECEIVED_VERSION,
    SEALED_SENDER_V2_SENT_VERSION, SealedSenderV1Message, SealedSenderV2ReceivedMessage,
    SealedSenderV2SentMessage, SentRecipient, encode_sent_message, sealed_sender_version,
};
pub use service_id::{ServiceId, ServiceIdKind};
