//! Session-initiating message
//!
//! Wraps a ratchet message together with everything the responder needs to
//! run the key agreement: which of its pre-keys were used, the initiator's
//! base key and identity, and the Kyber ciphertext.

use sealframe_crypto::{IdentityKey, PublicKey};
use serde::{Deserialize, Serialize};

use super::{
    CiphertextMessageType, check_version_byte, decode_cbor, encode_cbor, signal::SignalMessage,
    version_byte,
};
use crate::{
    errors::Result,
    ids::{KyberPreKeyId, PreKeyId, SignedPreKeyId},
};

#[derive(Serialize, Deserialize)]
struct PreKeySignalMessageBody {
    registration_id: u32,
    pre_key_id: Option<PreKeyId>,
    signed_pre_key_id: SignedPreKeyId,
    kyber_pre_key_id: KyberPreKeyId,
    #[serde(with = "serde_bytes")]
    kyber_ciphertext: Vec<u8>,
    #[serde(with = "serde_bytes")]
    base_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    identity_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    message: Vec<u8>,
}

/// Pre-key message: key agreement inputs plus the first ratchet message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeySignalMessage {
    message_version: u8,
    registration_id: u32,
    pre_key_id: Option<PreKeyId>,
    signed_pre_key_id: SignedPreKeyId,
    kyber_pre_key_id: KyberPreKeyId,
    kyber_ciphertext: Vec<u8>,
    base_key: PublicKey,
    identity_key: IdentityKey,
    message: SignalMessage,
    serialized: Vec<u8>,
}

impl PreKeySignalMessage {
    /// Build a pre-key message around `message`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registration_id: u32,
        pre_key_id: Option<PreKeyId>,
        signed_pre_key_id: SignedPreKeyId,
        kyber_pre_key_id: KyberPreKeyId,
        kyber_ciphertext: Vec<u8>,
        base_key: PublicKey,
        identity_key: IdentityKey,
        message: SignalMessage,
    ) -> Result<Self> {
        let body = PreKeySignalMessageBody {
            registration_id,
            pre_key_id,
            signed_pre_key_id,
            kyber_pre_key_id,
            kyber_ciphertext,
            base_key: base_key.serialize().to_vec(),
            identity_key: identity_key.serialize().to_vec(),
            message: message.serialized().to_vec(),
        };

        let mut serialized = vec![version_byte(CiphertextMessageType::PreKey)];
        encode_cbor(&body, &mut serialized)?;

        Ok(Self {
            message_version: super::CIPHERTEXT_MESSAGE_CURRENT_VERSION,
            registration_id,
            pre_key_id,
            signed_pre_key_id,
            kyber_pre_key_id,
            kyber_ciphertext: body.kyber_ciphertext,
            base_key,
            identity_key,
            message,
            serialized,
        })
    }

    /// Parse a pre-key message, including the embedded ratchet message.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let message_version = check_version_byte(bytes, CiphertextMessageType::PreKey)?;
        let body: PreKeySignalMessageBody = decode_cbor(&bytes[1..])?;

        Ok(Self {
            message_version,
            registration_id: body.registration_id,
            pre_key_id: body.pre_key_id,
            signed_pre_key_id: body.signed_pre_key_id,
            kyber_pre_key_id: body.kyber_pre_key_id,
            kyber_ciphertext: body.kyber_ciphertext,
            base_key: PublicKey::deserialize(&body.base_key)?,
            identity_key: IdentityKey::deserialize(&body.identity_key)?,
            message: SignalMessage::deserialize(&body.message)?,
            serialized: bytes.to_vec(),
        })
    }

    /// Message version.
    pub fn message_version(&self) -> u8 {
        self.message_version
    }

    /// Sender's registration id, as claimed by the sender.
    pub fn registration_id(&self) -> u32 {
        self.registration_id
    }

    /// One-time pre-key used, if the bundle had one.
    pub fn pre_key_id(&self) -> Option<PreKeyId> {
        self.pre_key_id
    }

    /// Signed pre-key used.
    pub fn signed_pre_key_id(&self) -> SignedPreKeyId {
        self.signed_pre_key_id
    }

    /// Kyber pre-key used.
    pub fn kyber_pre_key_id(&self) -> KyberPreKeyId {
        self.kyber_pre_key_id
    }

    /// KEM ciphertext for the Kyber pre-key.
    pub fn kyber_ciphertext(&self) -> &[u8] {
        &self.kyber_ciphertext
    }

    /// Initiator's ephemeral base key.
    pub fn base_key(&self) -> &PublicKey {
        &self.base_key
    }

    /// Initiator's identity key.
    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    /// Embedded ratchet message.
    pub fn message(&self) -> &SignalMessage {
        &self.message
    }

    /// Wire bytes.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}
