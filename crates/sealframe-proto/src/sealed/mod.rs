//! Sealed sender envelope framing
//!
//! Byte layouts only. Key agreement and encryption of the contents happen in
//! `sealframe-core`; this module parses and builds the outer structure so a
//! delivery service can route envelopes without any keys.

mod v1;
mod v2;

pub use v1::SealedSenderV1Message;
pub use v2::{
    RecipientKeyBlock, SealedSenderV2ReceivedMessage, SealedSenderV2SentMessage, SentRecipient,
    encode_sent_message,
};

use crate::errors::{Result, WireError};

/// Version byte of single-recipient envelopes.
pub const SEALED_SENDER_V1_VERSION: u8 = 0x11;

/// Version byte of multi-recipient envelopes as delivered to one recipient.
pub const SEALED_SENDER_V2_RECEIVED_VERSION: u8 = 0x22;

/// Version byte of multi-recipient envelopes as uploaded by the sender.
pub const SEALED_SENDER_V2_SENT_VERSION: u8 = 0x23;

/// Leading version byte of an envelope, validated against the known ones.
pub fn sealed_sender_version(bytes: &[u8]) -> Result<u8> {
    let Some(&version) = bytes.first() else {
        return Err(WireError::TooShort { expected: 1, actual: 0 });
    };

    match version {
        SEALED_SENDER_V1_VERSION
        | SEALED_SENDER_V2_RECEIVED_VERSION
        | SEALED_SENDER_V2_SENT_VERSION => Ok(version),
        other => Err(WireError::UnsupportedVersion(other)),
    }
}
