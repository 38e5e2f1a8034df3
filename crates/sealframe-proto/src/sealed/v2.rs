//! Multi-recipient envelope layouts
//!
//! Sent form (uploaded once by the sender):
//!
//! ```text
//! 0x23
//! u16 entry count
//! per recipient account:
//!     service id (17, fixed width)
//!     per device: device id (1, non-zero) || registration id (u16, 0x8000 = more devices)
//!     encrypted message key C (32) || auth tag AT (16)
//! per excluded account:
//!     service id (17, fixed width) || 0x00
//! ephemeral public key E (33)
//! shared ciphertext
//! ```
//!
//! Received form (one per recipient, produced by the delivery service):
//!
//! ```text
//! 0x22 || C (32) || AT (16) || E (33) || shared ciphertext
//! ```

use std::ops::Range;

use bytes::BufMut;
use sealframe_crypto::{PublicKey, curve::SERIALIZED_PUBLIC_KEY_LENGTH};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{SEALED_SENDER_V2_RECEIVED_VERSION, SEALED_SENDER_V2_SENT_VERSION};
use crate::{
    address::DeviceId,
    errors::{Result, WireError},
    service_id::{FIXED_WIDTH_LENGTH, ServiceId},
};

/// Length of the per-recipient encrypted message key.
pub const ENCRYPTED_KEY_LENGTH: usize = 32;

/// Length of the per-recipient authentication tag.
pub const AUTH_TAG_LENGTH: usize = 16;

/// Flag on a registration id meaning another device entry follows.
const HAS_MORE_DEVICES: u16 = 0x8000;

/// Registration ids are 14-bit.
const REGISTRATION_ID_MASK: u16 = 0x3FFF;

/// Device id marking an excluded account.
const EXCLUDED_DEVICE_ID: u8 = 0;

/// Key material for one recipient account, input to [`encode_sent_message`].
#[derive(Debug, Clone)]
pub struct RecipientKeyBlock {
    /// Recipient account
    pub service_id: ServiceId,
    /// Devices of the account with their registration ids
    pub devices: Vec<(DeviceId, u16)>,
    /// Message secret masked for this account
    pub encrypted_key: [u8; ENCRYPTED_KEY_LENGTH],
    /// Sender authentication tag for this account
    pub auth_tag: [u8; AUTH_TAG_LENGTH],
}

/// Build a sent-form envelope.
///
/// Device ids must be non-zero and registration ids 14-bit; both are
/// validated upstream, a violation here is reported as `Malformed`.
pub fn encode_sent_message(
    recipients: &[RecipientKeyBlock],
    excluded: &[ServiceId],
    ephemeral_public: &PublicKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let count = recipients.len() + excluded.len();
    let entry_count = u16::try_from(count).map_err(|_| WireError::TooManyRecipients { count })?;

    let mut out = Vec::with_capacity(
        3 + recipients.len() * (FIXED_WIDTH_LENGTH + 3 + ENCRYPTED_KEY_LENGTH + AUTH_TAG_LENGTH)
            + excluded.len() * (FIXED_WIDTH_LENGTH + 1)
            + SERIALIZED_PUBLIC_KEY_LENGTH
            + ciphertext.len(),
    );
    out.put_u8(SEALED_SENDER_V2_SENT_VERSION);
    out.put_u16(entry_count);

    for recipient in recipients {
        if recipient.devices.is_empty() {
            return Err(WireError::Malformed(format!("{} has no devices", recipient.service_id)));
        }

        out.put_slice(&recipient.service_id.service_id_fixed_width_binary());
        for (index, &(device_id, registration_id)) in recipient.devices.iter().enumerate() {
            if device_id.value() == EXCLUDED_DEVICE_ID {
                return Err(WireError::Malformed("recipient device id 0 is reserved".to_string()));
            }
            if registration_id > REGISTRATION_ID_MASK {
                return Err(WireError::Malformed(format!(
                    "registration id {registration_id:#06x} exceeds 14 bits"
                )));
            }

            let more = if index + 1 < recipient.devices.len() { HAS_MORE_DEVICES } else { 0 };
            out.put_u8(device_id.value());
            out.put_u16(registration_id | more);
        }
        out.put_slice(&recipient.encrypted_key);
        out.put_slice(&recipient.auth_tag);
    }

    for service_id in excluded {
        out.put_slice(&service_id.service_id_fixed_width_binary());
        out.put_u8(EXCLUDED_DEVICE_ID);
    }

    out.put_slice(&ephemeral_public.serialize());
    out.put_slice(ciphertext);
    Ok(out)
}

/// One recipient account listed in a sent-form envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecipient {
    /// Recipient account
    pub service_id: ServiceId,
    /// Devices with their registration ids
    pub devices: Vec<(DeviceId, u16)>,
    key_material: Range<usize>,
}

/// Parsed sent-form envelope borrowing the original bytes.
#[derive(Debug, Clone)]
pub struct SealedSenderV2SentMessage<'a> {
    bytes: &'a [u8],
    /// Accounts that receive the message, in envelope order
    pub recipients: Vec<SentRecipient>,
    /// Accounts listed as intentionally excluded
    pub excluded: Vec<ServiceId>,
    ephemeral_public: PublicKey,
    shared: Range<usize>,
}

impl<'a> SealedSenderV2SentMessage<'a> {
    /// Parse a sent-form envelope.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let version = reader.read_u8()?;
        if version != SEALED_SENDER_V2_SENT_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let entry_count = reader.read_u16()?;
        let mut recipients = Vec::new();
        let mut excluded = Vec::new();

        for _ in 0..entry_count {
            let mut fixed = [0u8; FIXED_WIDTH_LENGTH];
            fixed.copy_from_slice(reader.take(FIXED_WIDTH_LENGTH)?);
            let service_id = ServiceId::parse_from_service_id_fixed_width_binary(&fixed)?;

            let mut devices = Vec::new();
            loop {
                let device_id = reader.read_u8()?;
                if device_id == EXCLUDED_DEVICE_ID {
                    if !devices.is_empty() {
                        return Err(WireError::Malformed(format!(
                            "{service_id} mixes devices with an exclusion marker"
                        )));
                    }
                    break;
                }

                let raw = reader.read_u16()?;
                devices.push((DeviceId::new(u32::from(device_id))?, raw & REGISTRATION_ID_MASK));
                if raw & HAS_MORE_DEVICES == 0 {
                    break;
                }
            }

            if devices.is_empty() {
                excluded.push(service_id);
            } else {
                let start = reader.position();
                reader.take(ENCRYPTED_KEY_LENGTH + AUTH_TAG_LENGTH)?;
                recipients.push(SentRecipient {
                    service_id,
                    devices,
                    key_material: start..reader.position(),
                });
            }
        }

        let shared = reader.position()..bytes.len();
        let ephemeral_public = PublicKey::deserialize(reader.take(SERIALIZED_PUBLIC_KEY_LENGTH)?)?;

        Ok(Self { bytes, recipients, excluded, ephemeral_public, shared })
    }

    /// Sender's ephemeral public key E.
    pub fn ephemeral_public(&self) -> &PublicKey {
        &self.ephemeral_public
    }

    /// Shared AEAD ciphertext.
    pub fn ciphertext(&self) -> &'a [u8] {
        &self.bytes[self.shared.start + SERIALIZED_PUBLIC_KEY_LENGTH..]
    }

    /// The three slices whose concatenation is `recipient`'s received form.
    pub fn received_message_parts_for_recipient(&self, recipient: &SentRecipient) -> [&'a [u8]; 3] {
        [
            &[SEALED_SENDER_V2_RECEIVED_VERSION],
            &self.bytes[recipient.key_material.clone()],
            &self.bytes[self.shared.clone()],
        ]
    }

    /// Received form for `recipient`.
    pub fn received_message_for_recipient(&self, recipient: &SentRecipient) -> Vec<u8> {
        self.received_message_parts_for_recipient(recipient).concat()
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct ReceivedHeader {
    version: u8,
    encrypted_key: [u8; ENCRYPTED_KEY_LENGTH],
    auth_tag: [u8; AUTH_TAG_LENGTH],
    ephemeral_public: [u8; SERIALIZED_PUBLIC_KEY_LENGTH],
}

impl ReceivedHeader {
    const SIZE: usize = 1 + ENCRYPTED_KEY_LENGTH + AUTH_TAG_LENGTH + SERIALIZED_PUBLIC_KEY_LENGTH;
}

/// Parsed received-form envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSenderV2ReceivedMessage {
    /// Message secret masked for this recipient
    pub encrypted_key: [u8; ENCRYPTED_KEY_LENGTH],
    /// Sender authentication tag
    pub auth_tag: [u8; AUTH_TAG_LENGTH],
    /// Sender's ephemeral public key E
    pub ephemeral_public: PublicKey,
    /// Shared AEAD ciphertext
    pub ciphertext: Vec<u8>,
}

impl SealedSenderV2ReceivedMessage {
    /// Parse a received-form envelope.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (header, ciphertext) = ReceivedHeader::ref_from_prefix(bytes).map_err(|_| {
            WireError::TooShort { expected: ReceivedHeader::SIZE, actual: bytes.len() }
        })?;

        if header.version != SEALED_SENDER_V2_RECEIVED_VERSION {
            return Err(WireError::UnsupportedVersion(header.version));
        }

        Ok(Self {
            encrypted_key: header.encrypted_key,
            auth_tag: header.auth_tag,
            ephemeral_public: PublicKey::deserialize(&header.ephemeral_public)?,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Encode with the leading version byte.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ReceivedHeader::SIZE + self.ciphertext.len());
        out.put_u8(SEALED_SENDER_V2_RECEIVED_VERSION);
        out.put_slice(&self.encrypted_key);
        out.put_slice(&self.auth_tag);
        out.put_slice(&self.ephemeral_public.serialize());
        out.put_slice(&self.ciphertext);
        out
    }
}

/// Bounds-checked cursor over untrusted bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.position.saturating_add(len);
        let slice = self.bytes.get(self.position..end).ok_or(WireError::TooShort {
            expected: end,
            actual: self.bytes.len(),
        })?;
        self.position = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}
