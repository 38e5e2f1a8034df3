//! Multi-recipient envelopes (sent `0x23`, received `0x22`)
//!
//! The sender encrypts the content once under a key derived from a random
//! message secret `M`, then hands each recipient account `M` masked with a
//! per-account agreement:
//!
//! ```text
//! E || K = HKDF(M)                          ephemeral key pair, payload key
//! C_i    = M xor HKDF(DH(E, R_i), E || R_i)
//! AT_i   = HKDF(DH(S, R_i), E || R_i || C_i)[..16]
//! ```
//!
//! A recipient recovers `M`, re-derives `E` and `K`, and rejects the
//! envelope if the derived `E` differs from the one it was given or the
//! authentication tag does not match the certified sender identity.

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{
    IdentityKey, IdentityKeyPair, KeyPair, PrivateKey, PublicKey,
    aead::{aead_decrypt, aead_encrypt},
    kdf::hkdf_sha256_multi,
};
use sealframe_proto::{
    DeviceId, ProtocolAddress, RecipientKeyBlock, SealedSenderV2ReceivedMessage,
    SealedSenderV2SentMessage, ServiceId, encode_sent_message,
};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroize;

use super::{UnidentifiedSenderMessageContent, single::ZERO_NONCE};
use crate::{
    consts::MAX_REGISTRATION_ID,
    error::{ProtocolError, Result},
    storage::{IdentityKeyStore, SessionStore},
};

const DERIVED_KEYS_LABEL: &[u8] = b"Sealframe_SealedSender_v2_DerivedKeys";
const MASK_LABEL: &[u8] = b"Sealframe_SealedSender_v2_Mask";
const AUTH_TAG_LABEL: &[u8] = b"Sealframe_SealedSender_v2_AuthTag";

struct DerivedKeys {
    ephemeral: KeyPair,
    payload_key: [u8; 32],
}

impl DerivedKeys {
    fn from_secret(message_secret: &[u8; 32]) -> Self {
        let mut okm: [u8; 64] = hkdf_sha256_multi(None, message_secret, &[DERIVED_KEYS_LABEL]);
        let mut ephemeral_private = [0u8; 32];
        let mut payload_key = [0u8; 32];
        ephemeral_private.copy_from_slice(&okm[..32]);
        payload_key.copy_from_slice(&okm[32..]);
        okm.zeroize();

        let ephemeral = KeyPair::from_private_key(PrivateKey::from_bytes(ephemeral_private));
        ephemeral_private.zeroize();
        Self { ephemeral, payload_key }
    }
}

impl Drop for DerivedKeys {
    fn drop(&mut self) {
        self.payload_key.zeroize();
    }
}

fn mask(shared: &[u8; 32], ephemeral_public: &PublicKey, recipient: &PublicKey) -> [u8; 32] {
    hkdf_sha256_multi(
        None,
        shared,
        &[MASK_LABEL, &ephemeral_public.serialize(), &recipient.serialize()],
    )
}

fn auth_tag(
    shared: &[u8; 32],
    ephemeral_public: &PublicKey,
    recipient: &PublicKey,
    encrypted_key: &[u8; 32],
) -> [u8; 16] {
    hkdf_sha256_multi(
        None,
        shared,
        &[AUTH_TAG_LABEL, &ephemeral_public.serialize(), &recipient.serialize(), encrypted_key],
    )
}

fn xor(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for ((out, l), r) in out.iter_mut().zip(left).zip(right) {
        *out = l ^ r;
    }
    out
}

struct Account {
    service_id: ServiceId,
    identity: IdentityKey,
    devices: Vec<(DeviceId, u16)>,
}

/// Seal `content` once for every address in `recipients`.
///
/// All recipients are validated before any key is derived: each needs a
/// current session with a 14-bit registration id, a name that parses as a
/// [`ServiceId`], a non-zero device id and a known identity key, and devices
/// of one account must share an identity key. An address listed twice is
/// rejected. The first violation is returned and no envelope is produced.
///
/// `excluded` accounts are listed in the envelope without key material.
pub async fn sealed_sender_multi_recipient_encrypt<R: RngCore + CryptoRng>(
    recipients: &[&ProtocolAddress],
    excluded: &[ServiceId],
    content: &UnidentifiedSenderMessageContent,
    identity_store: &dyn IdentityKeyStore,
    session_store: &dyn SessionStore,
    rng: &mut R,
) -> Result<Vec<u8>> {
    const OPERATION: &str = "sealed_sender_multi_recipient_encrypt";

    let mut accounts: Vec<Account> = Vec::new();
    for &address in recipients {
        let record = session_store
            .load_session(address)
            .await?
            .ok_or_else(|| ProtocolError::SessionNotFound { address: address.clone() })?;
        let registration_id = record
            .session_state()
            .ok_or_else(|| ProtocolError::SessionNotFound { address: address.clone() })?
            .remote_registration_id();
        let registration_id = u16::try_from(registration_id)
            .ok()
            .filter(|id| u32::from(*id) <= MAX_REGISTRATION_ID)
            .ok_or_else(|| ProtocolError::InvalidRegistrationId {
                address: address.clone(),
                registration_id,
            })?;

        let service_id = address.service_id().ok_or_else(|| {
            ProtocolError::InvalidArgument(format!("{address} is not named by a service id"))
        })?;
        if address.device_id().value() == 0 {
            return Err(ProtocolError::InvalidArgument(format!(
                "{address} uses device id 0, which marks excluded accounts"
            )));
        }
        let identity = identity_store.identity(address).await?.ok_or_else(|| {
            ProtocolError::InvalidState { operation: OPERATION, reason: format!("no identity key for {address}") }
        })?;

        match accounts.iter_mut().find(|account| account.service_id == service_id) {
            Some(account) if account.identity != identity => {
                return Err(ProtocolError::InvalidArgument(format!(
                    "devices of {service_id} have different identity keys"
                )));
            },
            Some(account) if account.devices.iter().any(|(device, _)| *device == address.device_id()) => {
                return Err(ProtocolError::InvalidArgument(format!("{address} is listed twice")));
            },
            Some(account) => account.devices.push((address.device_id(), registration_id)),
            None => accounts.push(Account {
                service_id,
                identity,
                devices: vec![(address.device_id(), registration_id)],
            }),
        }
    }

    let our_identity = identity_store.identity_key_pair().await?;

    let mut message_secret = [0u8; 32];
    rng.fill_bytes(&mut message_secret);
    let keys = DerivedKeys::from_secret(&message_secret);
    let ephemeral_public = keys.ephemeral.public_key;

    let ciphertext = aead_encrypt(&keys.payload_key, &ZERO_NONCE, content.serialized(), &[]);

    let blocks: Vec<RecipientKeyBlock> = accounts
        .into_iter()
        .map(|account| {
            let recipient = account.identity.public_key();

            let mut shared = keys.ephemeral.private_key.calculate_agreement(recipient);
            let mut key_mask = mask(&shared, &ephemeral_public, recipient);
            let encrypted_key = xor(&message_secret, &key_mask);
            key_mask.zeroize();
            shared.zeroize();

            let mut shared = our_identity.private_key().calculate_agreement(recipient);
            let tag = auth_tag(&shared, &ephemeral_public, recipient, &encrypted_key);
            shared.zeroize();

            RecipientKeyBlock {
                service_id: account.service_id,
                devices: account.devices,
                encrypted_key,
                auth_tag: tag,
            }
        })
        .collect();
    message_secret.zeroize();

    debug!(accounts = blocks.len(), excluded = excluded.len(), "multi-recipient envelope sealed");
    Ok(encode_sent_message(&blocks, excluded, &ephemeral_public, &ciphertext)?)
}

/// Received form for the only recipient of a sent-form envelope.
///
/// # Errors
///
/// [`ProtocolError::InvalidArgument`] if the envelope lists more or fewer
/// than one recipient account.
pub fn sealed_sender_multi_recipient_message_for_single_recipient(sent: &[u8]) -> Result<Vec<u8>> {
    let message = SealedSenderV2SentMessage::parse(sent)?;
    let [recipient] = message.recipients.as_slice() else {
        return Err(ProtocolError::InvalidArgument(format!(
            "expected exactly one recipient, found {}",
            message.recipients.len()
        )));
    };
    Ok(message.received_message_for_recipient(recipient))
}

/// Open a received-form envelope addressed to `our_identity`.
pub(super) fn open(
    envelope: &SealedSenderV2ReceivedMessage,
    our_identity: &IdentityKeyPair,
) -> Result<UnidentifiedSenderMessageContent> {
    let our_public = our_identity.public_key();
    let our_private = our_identity.private_key();

    let mut shared = our_private.calculate_agreement(&envelope.ephemeral_public);
    let mut key_mask = mask(&shared, &envelope.ephemeral_public, our_public);
    shared.zeroize();
    let mut message_secret = xor(&envelope.encrypted_key, &key_mask);
    key_mask.zeroize();

    let keys = DerivedKeys::from_secret(&message_secret);
    message_secret.zeroize();
    if !bool::from(keys.ephemeral.public_key.ct_eq(&envelope.ephemeral_public)) {
        return Err(ProtocolError::invalid_sealed_sender("derived ephemeral key does not match"));
    }

    let content_bytes = aead_decrypt(&keys.payload_key, &ZERO_NONCE, &envelope.ciphertext, &[])
        .map_err(|_| ProtocolError::invalid_sealed_sender("message failed to decrypt"))?;
    let content = UnidentifiedSenderMessageContent::deserialize(&content_bytes)?;

    let mut shared = our_private.calculate_agreement(&content.sender().key());
    let expected_tag = auth_tag(&shared, &envelope.ephemeral_public, our_public, &envelope.encrypted_key);
    shared.zeroize();
    if !bool::from(expected_tag[..].ct_eq(&envelope.auth_tag[..])) {
        return Err(ProtocolError::invalid_sealed_sender("sender authentication tag mismatch"));
    }

    Ok(content)
}
