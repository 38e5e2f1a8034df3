//! Decrypted content of a sealed sender envelope

use sealframe_proto::CiphertextMessageType;
use serde::{Deserialize, Serialize};

use crate::{
    certificate::SenderCertificate,
    error::Result,
    state::{from_cbor, to_cbor},
};

/// How a recipient should treat a message it cannot decrypt.
///
/// Purely advisory. Unknown values are carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentHint {
    /// Show an error to the user
    #[default]
    Default,
    /// The sender can resend; request it quietly
    Resendable,
    /// Drop silently
    Implicit,
    /// Value this version does not know
    Unknown(u32),
}

impl ContentHint {
    /// Wire value of the hint.
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::Default => 0,
            Self::Resendable => 1,
            Self::Implicit => 2,
            Self::Unknown(value) => value,
        }
    }
}

impl From<u32> for ContentHint {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Default,
            1 => Self::Resendable,
            2 => Self::Implicit,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ContentBody {
    message_type: u8,
    #[serde(with = "serde_bytes")]
    sender_certificate: Vec<u8>,
    #[serde(with = "serde_bytes")]
    contents: Vec<u8>,
    content_hint: u32,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    group_id: Option<Vec<u8>>,
}

/// Inner message of a sealed sender envelope together with the sender's
/// certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnidentifiedSenderMessageContent {
    message_type: CiphertextMessageType,
    sender: SenderCertificate,
    contents: Vec<u8>,
    content_hint: ContentHint,
    group_id: Option<Vec<u8>>,
    serialized: Vec<u8>,
}

impl UnidentifiedSenderMessageContent {
    /// Wrap an inner message with the sender certificate.
    pub fn new(
        message_type: CiphertextMessageType,
        sender: SenderCertificate,
        contents: Vec<u8>,
        content_hint: ContentHint,
        group_id: Option<Vec<u8>>,
    ) -> Result<Self> {
        let serialized = to_cbor(&ContentBody {
            message_type: message_type.to_u8(),
            sender_certificate: sender.serialized().to_vec(),
            contents: contents.clone(),
            content_hint: content_hint.to_u32(),
            group_id: group_id.clone(),
        })?;

        Ok(Self { message_type, sender, contents, content_hint, group_id, serialized })
    }

    /// Parse decrypted content, including the enclosed certificate.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let body: ContentBody = from_cbor(bytes)?;

        Ok(Self {
            message_type: CiphertextMessageType::from_u8(body.message_type)?,
            sender: SenderCertificate::deserialize(&body.sender_certificate)?,
            contents: body.contents,
            content_hint: ContentHint::from(body.content_hint),
            group_id: body.group_id,
            serialized: bytes.to_vec(),
        })
    }

    /// Type of the inner message.
    pub fn message_type(&self) -> CiphertextMessageType {
        self.message_type
    }

    /// Certificate naming the sender.
    pub fn sender(&self) -> &SenderCertificate {
        &self.sender
    }

    /// Serialized inner message.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Advisory hint from the sender.
    pub fn content_hint(&self) -> ContentHint {
        self.content_hint
    }

    /// Group the message belongs to, if named.
    pub fn group_id(&self) -> Option<&[u8]> {
        self.group_id.as_deref()
    }

    /// Wire form sealed into the envelope.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use sealframe_crypto::KeyPair;
    use sealframe_proto::DeviceId;

    use super::*;
    use crate::{certificate::ServerCertificate, timestamp::Timestamp};

    fn certificate() -> SenderCertificate {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let root = KeyPair::generate(&mut rng);
        let server = KeyPair::generate(&mut rng);
        let sender = KeyPair::generate(&mut rng);
        let server_cert =
            ServerCertificate::new(1, server.public_key, &root.private_key, &mut rng).unwrap();
        SenderCertificate::new(
            "sender".to_string(),
            None,
            sender.public_key,
            DeviceId::new(1).unwrap(),
            Timestamp::from_epoch_millis(100),
            server_cert,
            &server.private_key,
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn unknown_content_hint_survives_reparse() {
        let content = UnidentifiedSenderMessageContent::new(
            CiphertextMessageType::Whisper,
            certificate(),
            b"inner".to_vec(),
            ContentHint::Unknown(0x77),
            Some(b"group".to_vec()),
        )
        .unwrap();

        let parsed = UnidentifiedSenderMessageContent::deserialize(content.serialized()).unwrap();
        assert_eq!(parsed.content_hint(), ContentHint::Unknown(0x77));
        assert_eq!(parsed.group_id(), Some(&b"group"[..]));
        assert_eq!(parsed, content);
    }

    #[test]
    fn known_hints_map_to_variants() {
        assert_eq!(ContentHint::from(0), ContentHint::Default);
        assert_eq!(ContentHint::from(1), ContentHint::Resendable);
        assert_eq!(ContentHint::from(2), ContentHint::Implicit);
        assert_eq!(ContentHint::Implicit.to_u32(), 2);
    }

    #[test]
    fn rejects_unknown_message_type() {
        let content = UnidentifiedSenderMessageContent::new(
            CiphertextMessageType::PreKey,
            certificate(),
            Vec::new(),
            ContentHint::Default,
            None,
        )
        .unwrap();
        let mut body: ContentBody = from_cbor(content.serialized()).unwrap();
        body.message_type = 9;
        let bytes = to_cbor(&body).unwrap();
        assert!(UnidentifiedSenderMessageContent::deserialize(&bytes).is_err());
    }
}
