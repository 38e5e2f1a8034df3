//! Sealed sender
//!
//! Hides the sender of a direct message from the delivery service. The
//! recipient learns and authenticates the sender from a
//! [`SenderCertificate`] carried inside the encryption.
//!
//! # Envelopes
//!
//! - `0x11`: one recipient, see [`sealed_sender_encrypt_from_usmc`]
//! - `0x23`: many recipients as uploaded by the sender, see
//!   [`sealed_sender_multi_recipient_encrypt`]
//! - `0x22`: the per-recipient projection of a `0x23` envelope that the
//!   delivery service hands out
//!
//! [`sealed_sender_decrypt_to_usmc`] opens `0x11` and `0x22`.
//! [`sealed_sender_decrypt`] also validates the certificate, rejects the
//! local device as sender and decrypts the inner direct or group message.

mod content;
mod multi;
mod single;

pub use content::{ContentHint, UnidentifiedSenderMessageContent};
pub use multi::{
    sealed_sender_multi_recipient_encrypt, sealed_sender_multi_recipient_message_for_single_recipient,
};
pub use single::sealed_sender_encrypt_from_usmc;

use rand::{CryptoRng, RngCore};
use sealframe_proto::{
    CiphertextMessageType, DeviceId, PreKeySignalMessage, ProtocolAddress,
    SEALED_SENDER_V1_VERSION, SEALED_SENDER_V2_RECEIVED_VERSION, SEALED_SENDER_V2_SENT_VERSION,
    SealedSenderV1Message, SealedSenderV2ReceivedMessage, SignalMessage, WireError,
    sealed_sender_version,
};
use tracing::{debug, warn};

use crate::{
    certificate::{CertificateValidator, SenderCertificate},
    error::{ProtocolError, Result},
    group_cipher::group_decrypt,
    session_cipher::{message_decrypt_prekey, message_decrypt_signal, message_encrypt},
    storage::{
        IdentityKeyStore, KyberPreKeyStore, PreKeyStore, SenderKeyStore, SessionStore,
        SignedPreKeyStore,
    },
    timestamp::Timestamp,
};

/// Direct-encrypt `plaintext` for `destination` and seal the result.
pub async fn sealed_sender_encrypt<R: RngCore + CryptoRng>(
    destination: &ProtocolAddress,
    sender_certificate: &SenderCertificate,
    plaintext: &[u8],
    session_store: &mut dyn SessionStore,
    identity_store: &mut dyn IdentityKeyStore,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let message = message_encrypt(plaintext, destination, session_store, identity_store).await?;
    let content = UnidentifiedSenderMessageContent::new(
        message.message_type(),
        sender_certificate.clone(),
        message.serialize().to_vec(),
        ContentHint::Default,
        None,
    )?;
    sealed_sender_encrypt_from_usmc(destination, &content, &*identity_store, rng).await
}

/// Open a `0x11` or `0x22` envelope without validating the certificate.
///
/// The sender identity recovered from the envelope must equal the key in
/// the enclosed certificate.
pub async fn sealed_sender_decrypt_to_usmc(
    ciphertext: &[u8],
    identity_store: &dyn IdentityKeyStore,
) -> Result<UnidentifiedSenderMessageContent> {
    let our_identity = identity_store.identity_key_pair().await?;

    match sealed_sender_version(ciphertext)? {
        SEALED_SENDER_V1_VERSION => {
            single::open(&SealedSenderV1Message::deserialize(ciphertext)?, &our_identity)
        },
        SEALED_SENDER_V2_RECEIVED_VERSION => {
            multi::open(&SealedSenderV2ReceivedMessage::deserialize(ciphertext)?, &our_identity)
        },
        SEALED_SENDER_V2_SENT_VERSION => Err(ProtocolError::invalid_sealed_sender(
            "sent-form envelope must be projected for one recipient first",
        )),
        other => Err(WireError::UnsupportedVersion(other).into()),
    }
}

/// Sender and plaintext of a decrypted sealed sender message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSenderDecryptionResult {
    /// Sender account from the certificate
    pub sender_uuid: String,
    /// Sender phone number, when the certificate carries one
    pub sender_e164: Option<String>,
    /// Sending device
    pub device_id: DeviceId,
    /// Type of the inner message
    pub message_type: CiphertextMessageType,
    /// Advisory hint from the sender
    pub content_hint: ContentHint,
    /// Group the message belongs to, when the sender named one
    pub group_id: Option<Vec<u8>>,
    /// Decrypted plaintext
    pub message: Vec<u8>,
}

impl SealedSenderDecryptionResult {
    /// Address of the sending device.
    pub fn sender_address(&self) -> ProtocolAddress {
        ProtocolAddress::from_parts(self.sender_uuid.clone(), self.device_id)
    }
}

/// Where the receiving device lives, for self-send detection.
#[derive(Debug, Clone, Copy)]
pub struct LocalAccount<'a> {
    /// Our account UUID in service id string form
    pub uuid: &'a str,
    /// Our phone number, if known
    pub e164: Option<&'a str>,
    /// This device
    pub device_id: DeviceId,
}

impl LocalAccount<'_> {
    fn sent(&self, certificate: &SenderCertificate) -> bool {
        let same_account = certificate.sender_uuid() == self.uuid
            || matches!((certificate.sender_e164(), self.e164), (Some(theirs), Some(ours)) if theirs == ours);
        same_account && certificate.sender_device_id() == self.device_id
    }
}

/// Open a sealed envelope, validate its certificate at `timestamp` and
/// decrypt the inner message.
///
/// Pre-key inner messages establish the session as in
/// [`message_decrypt_prekey`]. Sender-key messages are decrypted with
/// [`group_decrypt`] under the certified sender's address. Distribution
/// messages are not accepted as sealed content.
///
/// # Errors
///
/// - [`ProtocolError::InvalidCertificate`] from the validator
/// - [`ProtocolError::SealedSenderSelfSend`] if the certificate names the
///   local account on the local device
/// - any error of the direct message path
#[allow(clippy::too_many_arguments)]
pub async fn sealed_sender_decrypt<R: RngCore + CryptoRng>(
    ciphertext: &[u8],
    validator: &CertificateValidator,
    timestamp: Timestamp,
    local: LocalAccount<'_>,
    identity_store: &mut dyn IdentityKeyStore,
    session_store: &mut dyn SessionStore,
    pre_key_store: &mut dyn PreKeyStore,
    signed_pre_key_store: &dyn SignedPreKeyStore,
    kyber_pre_key_store: &mut dyn KyberPreKeyStore,
    sender_key_store: &mut dyn SenderKeyStore,
    rng: &mut R,
) -> Result<SealedSenderDecryptionResult> {
    let content = sealed_sender_decrypt_to_usmc(ciphertext, &*identity_store).await?;
    let certificate = content.sender();
    validator.validate(certificate, timestamp)?;

    if local.sent(certificate) {
        warn!(device = %local.device_id, "sealed sender message from this device");
        return Err(ProtocolError::SealedSenderSelfSend);
    }

    let remote_address =
        ProtocolAddress::from_parts(certificate.sender_uuid(), certificate.sender_device_id());

    let message = match content.message_type() {
        CiphertextMessageType::Whisper => {
            let message = SignalMessage::deserialize(content.contents())?;
            message_decrypt_signal(&message, &remote_address, session_store, identity_store, rng).await?
        },
        CiphertextMessageType::PreKey => {
            let message = PreKeySignalMessage::deserialize(content.contents())?;
            message_decrypt_prekey(
                &message,
                &remote_address,
                session_store,
                identity_store,
                pre_key_store,
                signed_pre_key_store,
                kyber_pre_key_store,
                rng,
            )
            .await?
        },
        CiphertextMessageType::SenderKey => {
            group_decrypt(content.contents(), &remote_address, sender_key_store).await?
        },
        other => {
            return Err(ProtocolError::invalid_sealed_sender(format!(
                "unsupported inner message type {other:?}"
            )));
        },
    };

    debug!(%remote_address, "sealed sender message decrypted");
    Ok(SealedSenderDecryptionResult {
        sender_uuid: certificate.sender_uuid().to_string(),
        sender_e164: certificate.sender_e164().map(str::to_string),
        device_id: certificate.sender_device_id(),
        message_type: content.message_type(),
        content_hint: content.content_hint(),
        group_id: content.group_id().map(<[u8]>::to_vec),
        message,
    })
}
