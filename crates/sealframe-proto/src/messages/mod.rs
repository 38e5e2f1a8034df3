//! Session and group messages
//!
//! Every message starts with one byte: `version << 4 | type`. The body is
//! CBOR, followed by a MAC or signature where the message type has one.
//!
//! # Invariants
//!
//! - `serialize()` returns exactly the bytes that were parsed or built; MACs
//!   and signatures are computed over those bytes, so messages are never
//!   re-encoded after construction.

mod prekey;
mod sender_key;
mod signal;

pub use prekey::PreKeySignalMessage;
pub use sender_key::{SenderKeyDistributionMessage, SenderKeyMessage};
pub use signal::{MAC_LENGTH, SignalMessage};

use bytes::BufMut;
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{Result, WireError};

/// Message version written by this implementation.
pub const CIPHERTEXT_MESSAGE_CURRENT_VERSION: u8 = 4;

/// Type nibble of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CiphertextMessageType {
    /// Ratchet message in an established session
    Whisper = 2,
    /// First message(s) of a session, carrying pre-key material
    PreKey = 3,
    /// Sender key distribution (content, not ciphertext)
    SenderKeyDistribution = 5,
    /// Group message under a sender key
    SenderKey = 7,
}

impl CiphertextMessageType {
    /// Parse a type value.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            2 => Ok(Self::Whisper),
            3 => Ok(Self::PreKey),
            5 => Ok(Self::SenderKeyDistribution),
            7 => Ok(Self::SenderKey),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }

    /// Raw type value.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Any message that can be decrypted by the session or group cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiphertextMessage {
    /// Ratchet message
    Signal(SignalMessage),
    /// Session-initiating message
    PreKey(PreKeySignalMessage),
    /// Group message
    SenderKey(SenderKeyMessage),
}

impl CiphertextMessage {
    /// Parse any ciphertext message by its leading type nibble.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let Some(&first) = bytes.first() else {
            return Err(WireError::TooShort { expected: 1, actual: 0 });
        };

        match CiphertextMessageType::from_u8(first & 0x0F)? {
            CiphertextMessageType::Whisper => SignalMessage::deserialize(bytes).map(Self::Signal),
            CiphertextMessageType::PreKey => PreKeySignalMessage::deserialize(bytes).map(Self::PreKey),
            CiphertextMessageType::SenderKey => SenderKeyMessage::deserialize(bytes).map(Self::SenderKey),
            CiphertextMessageType::SenderKeyDistribution => {
                Err(WireError::UnknownMessageType(first & 0x0F))
            },
        }
    }

    /// Type of the wrapped message.
    pub fn message_type(&self) -> CiphertextMessageType {
        match self {
            Self::Signal(_) => CiphertextMessageType::Whisper,
            Self::PreKey(_) => CiphertextMessageType::PreKey,
            Self::SenderKey(_) => CiphertextMessageType::SenderKey,
        }
    }

    /// Wire bytes of the wrapped message.
    pub fn serialize(&self) -> &[u8] {
        match self {
            Self::Signal(message) => message.serialized(),
            Self::PreKey(message) => message.serialized(),
            Self::SenderKey(message) => message.serialized(),
        }
    }
}

/// Leading byte for a message of type `message_type`.
pub(crate) const fn version_byte(message_type: CiphertextMessageType) -> u8 {
    (CIPHERTEXT_MESSAGE_CURRENT_VERSION << 4) | message_type.to_u8()
}

/// Check the leading byte and return the message version.
pub(crate) fn check_version_byte(bytes: &[u8], expected: CiphertextMessageType) -> Result<u8> {
    let Some(&first) = bytes.first() else {
        return Err(WireError::TooShort { expected: 1, actual: 0 });
    };

    let version = first >> 4;
    if version != CIPHERTEXT_MESSAGE_CURRENT_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }

    let message_type = first & 0x0F;
    if message_type != expected.to_u8() {
        return Err(WireError::UnexpectedMessageType {
            expected: expected.to_u8(),
            actual: message_type,
        });
    }

    Ok(version)
}

/// Append the CBOR encoding of `value` to `dst`.
pub(crate) fn encode_cbor<T: Serialize>(value: &T, dst: &mut impl BufMut) -> Result<()> {
    let mut writer = dst.writer();
    ciborium::ser::into_writer(value, &mut writer).map_err(|e| WireError::CborEncode(e.to_string()))
}

/// Decode a CBOR value from the start of `bytes`.
pub(crate) fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::CborDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_byte_packs_version_and_type() {
        assert_eq!(version_byte(CiphertextMessageType::Whisper), 0x42);
        assert_eq!(version_byte(CiphertextMessageType::PreKey), 0x43);
        assert_eq!(version_byte(CiphertextMessageType::SenderKey), 0x47);
    }

    #[test]
    fn check_version_byte_rejects_old_version() {
        assert_eq!(
            check_version_byte(&[0x32], CiphertextMessageType::Whisper),
            Err(WireError::UnsupportedVersion(3))
        );
    }

    #[test]
    fn check_version_byte_rejects_wrong_type() {
        assert_eq!(
            check_version_byte(&[0x43], CiphertextMessageType::Whisper),
            Err(WireError::UnexpectedMessageType { expected: 2, actual: 3 })
        );
    }

    #[test]
    fn deserialize_rejects_empty_and_unknown() {
        assert!(matches!(CiphertextMessage::deserialize(&[]), Err(WireError::TooShort { .. })));
        assert_eq!(CiphertextMessage::deserialize(&[0x49]), Err(WireError::UnknownMessageType(9)));
        assert_eq!(CiphertextMessage::deserialize(&[0x45]), Err(WireError::UnknownMessageType(5)));
    }
}
