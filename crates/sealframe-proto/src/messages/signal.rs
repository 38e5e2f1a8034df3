//! Ratchet message of an established session

use sealframe_crypto::{IdentityKey, PublicKey, kdf::hmac_sha256};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::{CiphertextMessageType, check_version_byte, decode_cbor, encode_cbor, version_byte};
use crate::errors::{Result, WireError};

/// Truncated MAC length appended to every ratchet message.
pub const MAC_LENGTH: usize = 8;

#[derive(Serialize, Deserialize)]
struct SignalMessageBody {
    #[serde(with = "serde_bytes")]
    ratchet_key: Vec<u8>,
    counter: u32,
    previous_counter: u32,
    #[serde(with = "serde_bytes")]
    ciphertext: Vec<u8>,
}

/// Ratchet message: sender ratchet key, chain counters, AEAD ciphertext and
/// a truncated MAC binding both identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMessage {
    message_version: u8,
    sender_ratchet_key: PublicKey,
    counter: u32,
    previous_counter: u32,
    ciphertext: Vec<u8>,
    serialized: Vec<u8>,
}

impl SignalMessage {
    /// Build and MAC a new message.
    ///
    /// The MAC covers the sender identity, the receiver identity and the
    /// serialized message, so a message cannot be replayed into a session
    /// between different identities.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mac_key: &[u8; 32],
        sender_ratchet_key: PublicKey,
        counter: u32,
        previous_counter: u32,
        ciphertext: Vec<u8>,
        sender_identity: &IdentityKey,
        receiver_identity: &IdentityKey,
    ) -> Result<Self> {
        let body = SignalMessageBody {
            ratchet_key: sender_ratchet_key.serialize().to_vec(),
            counter,
            previous_counter,
            ciphertext,
        };

        let mut serialized = vec![version_byte(CiphertextMessageType::Whisper)];
        encode_cbor(&body, &mut serialized)?;
        let mac = compute_mac(sender_identity, receiver_identity, mac_key, &serialized);
        serialized.extend_from_slice(&mac);

        Ok(Self {
            message_version: super::CIPHERTEXT_MESSAGE_CURRENT_VERSION,
            sender_ratchet_key,
            counter,
            previous_counter,
            ciphertext: body.ciphertext,
            serialized,
        })
    }

    /// Parse a ratchet message. The MAC is checked separately with
    /// [`verify_mac`](Self::verify_mac) once the keys are known.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 1 + MAC_LENGTH {
            return Err(WireError::TooShort { expected: 1 + MAC_LENGTH, actual: bytes.len() });
        }
        let message_version = check_version_byte(bytes, CiphertextMessageType::Whisper)?;

        let body: SignalMessageBody = decode_cbor(&bytes[1..bytes.len() - MAC_LENGTH])?;
        let sender_ratchet_key = PublicKey::deserialize(&body.ratchet_key)?;

        Ok(Self {
            message_version,
            sender_ratchet_key,
            counter: body.counter,
            previous_counter: body.previous_counter,
            ciphertext: body.ciphertext,
            serialized: bytes.to_vec(),
        })
    }

    /// Check the truncated MAC.
    pub fn verify_mac(
        &self,
        sender_identity: &IdentityKey,
        receiver_identity: &IdentityKey,
        mac_key: &[u8; 32],
    ) -> bool {
        let (content, their_mac) = self.serialized.split_at(self.serialized.len() - MAC_LENGTH);
        let our_mac = compute_mac(sender_identity, receiver_identity, mac_key, content);
        our_mac[..].ct_eq(their_mac).into()
    }

    /// Message version.
    pub fn message_version(&self) -> u8 {
        self.message_version
    }

    /// Sender's current ratchet public key.
    pub fn sender_ratchet_key(&self) -> &PublicKey {
        &self.sender_ratchet_key
    }

    /// Index in the sender's chain.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Length of the sender's previous chain.
    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    /// AEAD ciphertext.
    pub fn body(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Wire bytes.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

fn compute_mac(
    sender_identity: &IdentityKey,
    receiver_identity: &IdentityKey,
    mac_key: &[u8; 32],
    message: &[u8],
) -> [u8; MAC_LENGTH] {
    let full = hmac_sha256(
        mac_key,
        &[&sender_identity.serialize()[..], &receiver_identity.serialize()[..], message],
    );
    let mut mac = [0u8; MAC_LENGTH];
    mac.copy_from_slice(&full[..MAC_LENGTH]);
    mac
}
