//! Group messages and sender key distribution

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{PrivateKey, PublicKey, SIGNATURE_LENGTH};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CiphertextMessageType, check_version_byte, decode_cbor, encode_cbor, version_byte};
use crate::errors::{Result, WireError};

#[derive(Serialize, Deserialize)]
struct SenderKeyMessageBody {
    distribution_id: Uuid,
    chain_id: u32,
    iteration: u32,
    #[serde(with = "serde_bytes")]
    ciphertext: Vec<u8>,
}

/// Group message encrypted under a sender key and signed by the sender's
/// per-chain signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderKeyMessage {
    message_version: u8,
    distribution_id: Uuid,
    chain_id: u32,
    iteration: u32,
    ciphertext: Vec<u8>,
    serialized: Vec<u8>,
}

impl SenderKeyMessage {
    /// Build and sign a group message.
    pub fn new<R: RngCore + CryptoRng>(
        distribution_id: Uuid,
        chain_id: u32,
        iteration: u32,
        ciphertext: Vec<u8>,
        signing_key: &PrivateKey,
        rng: &mut R,
    ) -> Result<Self> {
        let body = SenderKeyMessageBody { distribution_id, chain_id, iteration, ciphertext };

        let mut serialized = vec![version_byte(CiphertextMessageType::SenderKey)];
        encode_cbor(&body, &mut serialized)?;
        let signature = signing_key.calculate_signature(&serialized, rng);
        serialized.extend_from_slice(&signature);

        Ok(Self {
            message_version: super::CIPHERTEXT_MESSAGE_CURRENT_VERSION,
            distribution_id,
            chain_id,
            iteration,
            ciphertext: body.ciphertext,
            serialized,
        })
    }

    /// Parse a group message. The signature is checked separately with
    /// [`verify_signature`](Self::verify_signature).
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 1 + SIGNATURE_LENGTH {
            return Err(WireError::TooShort { expected: 1 + SIGNATURE_LENGTH, actual: bytes.len() });
        }
        let message_version = check_version_byte(bytes, CiphertextMessageType::SenderKey)?;
        let body: SenderKeyMessageBody = decode_cbor(&bytes[1..bytes.len() - SIGNATURE_LENGTH])?;

        Ok(Self {
            message_version,
            distribution_id: body.distribution_id,
            chain_id: body.chain_id,
            iteration: body.iteration,
            ciphertext: body.ciphertext,
            serialized: bytes.to_vec(),
        })
    }

    /// Check the signature against the chain's signing key.
    pub fn verify_signature(&self, signing_key: &PublicKey) -> bool {
        let (content, signature) = self.serialized.split_at(self.serialized.len() - SIGNATURE_LENGTH);
        signing_key.verify_signature(content, signature)
    }

    /// Message version.
    pub fn message_version(&self) -> u8 {
        self.message_version
    }

    /// Distribution the chain belongs to.
    pub fn distribution_id(&self) -> Uuid {
        self.distribution_id
    }

    /// Chain within the distribution.
    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    /// Chain iteration the message key came from.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// AEAD ciphertext.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Wire bytes.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

#[derive(Serialize, Deserialize)]
struct SenderKeyDistributionMessageBody {
    distribution_id: Uuid,
    chain_id: u32,
    iteration: u32,
    #[serde(with = "serde_bytes")]
    chain_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signing_key: Vec<u8>,
}

/// Announces a sender chain to group members.
///
/// Carries secret chain material, so it must only travel inside a pairwise
/// encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderKeyDistributionMessage {
    message_version: u8,
    distribution_id: Uuid,
    chain_id: u32,
    iteration: u32,
    chain_key: [u8; 32],
    signing_key: PublicKey,
    serialized: Vec<u8>,
}

impl SenderKeyDistributionMessage {
    /// Build a distribution message.
    pub fn new(
        distribution_id: Uuid,
        chain_id: u32,
        iteration: u32,
        chain_key: [u8; 32],
        signing_key: PublicKey,
    ) -> Result<Self> {
        let body = SenderKeyDistributionMessageBody {
            distribution_id,
            chain_id,
            iteration,
            chain_key: chain_key.to_vec(),
            signing_key: signing_key.serialize().to_vec(),
        };

        let mut serialized = vec![version_byte(CiphertextMessageType::SenderKeyDistribution)];
        encode_cbor(&body, &mut serialized)?;

        Ok(Self {
            message_version: super::CIPHERTEXT_MESSAGE_CURRENT_VERSION,
            distribution_id,
            chain_id,
            iteration,
            chain_key,
            signing_key,
            serialized,
        })
    }

    /// Parse a distribution message.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let message_version =
            check_version_byte(bytes, CiphertextMessageType::SenderKeyDistribution)?;
        let body: SenderKeyDistributionMessageBody = decode_cbor(&bytes[1..])?;

        let chain_key: [u8; 32] = body.chain_key.as_slice().try_into().map_err(|_| {
            WireError::Malformed(format!("chain key has {} bytes", body.chain_key.len()))
        })?;

        Ok(Self {
            message_version,
            distribution_id: body.distribution_id,
            chain_id: body.chain_id,
            iteration: body.iteration,
            chain_key,
            signing_key: PublicKey::deserialize(&body.signing_key)?,
            serialized: bytes.to_vec(),
        })
    }

    /// Message version.
    pub fn message_version(&self) -> u8 {
        self.message_version
    }

    /// Distribution being announced.
    pub fn distribution_id(&self) -> Uuid {
        self.distribution_id
    }

    /// Chain within the distribution.
    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    /// Iteration the chain key is positioned at.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Chain seed at [`iteration`](Self::iteration).
    pub fn chain_key(&self) -> &[u8; 32] {
        &self.chain_key
    }

    /// Public key that verifies the chain's messages.
    pub fn signing_key(&self) -> &PublicKey {
        &self.signing_key
    }

    /// Wire bytes.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}
