//! Single-recipient envelope: `0x11 || CBOR(ephemeral, static, message)`

use sealframe_crypto::PublicKey;
use serde::{Deserialize, Serialize};

use super::SEALED_SENDER_V1_VERSION;
use crate::{
    errors::{Result, WireError},
    messages::{decode_cbor, encode_cbor},
};

#[derive(Serialize, Deserialize)]
struct SealedSenderV1Body {
    #[serde(with = "serde_bytes")]
    ephemeral_public: Vec<u8>,
    #[serde(with = "serde_bytes")]
    encrypted_static: Vec<u8>,
    #[serde(with = "serde_bytes")]
    encrypted_message: Vec<u8>,
}

/// Parsed single-recipient envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSenderV1Message {
    /// Sender's ephemeral public key
    pub ephemeral_public: PublicKey,
    /// Sender identity key, encrypted under the ephemeral agreement
    pub encrypted_static: Vec<u8>,
    /// Message content, encrypted under the static agreement
    pub encrypted_message: Vec<u8>,
}

impl SealedSenderV1Message {
    /// Encode with the leading version byte.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = SealedSenderV1Body {
            ephemeral_public: self.ephemeral_public.serialize().to_vec(),
            encrypted_static: self.encrypted_static.clone(),
            encrypted_message: self.encrypted_message.clone(),
        };

        let mut out = vec![SEALED_SENDER_V1_VERSION];
        encode_cbor(&body, &mut out)?;
        Ok(out)
    }

    /// Parse an envelope starting with the version byte.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let Some((&version, rest)) = bytes.split_first() else {
            return Err(WireError::TooShort { expected: 1, actual: 0 });
        };
        if version != SEALED_SENDER_V1_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let body: SealedSenderV1Body = decode_cbor(rest)?;
        Ok(Self {
            ephemeral_public: PublicKey::deserialize(&body.ephemeral_public)?,
            encrypted_static: body.encrypted_static,
            encrypted_message: body.encrypted_message,
        })
    }
}
