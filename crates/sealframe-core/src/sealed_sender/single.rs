//! Single-recipient envelope (version `0x11`)
//!
//! ```text
//! e = fresh ephemeral key, R = recipient identity, S = sender identity
//!
//! chain_key || k1 = HKDF(salt = label || R || e_pub, DH(e, R))
//! encrypted_static = AEAD(k1, S)
//! k2 = HKDF(salt = chain_key || encrypted_static, DH(S, R))
//! encrypted_message = AEAD(k2, content)
//! ```
//!
//! Both AEAD keys are single use, so the nonce is fixed at zero.

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{
    IdentityKey, IdentityKeyPair, KeyPair, PrivateKey, PublicKey,
    aead::{NONCE_SIZE, aead_decrypt, aead_encrypt},
    kdf::hkdf_sha256,
};
use sealframe_proto::{ProtocolAddress, SealedSenderV1Message};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::UnidentifiedSenderMessageContent;
use crate::{
    error::{ProtocolError, Result},
    storage::IdentityKeyStore,
};

const EPHEMERAL_LABEL: &[u8] = b"Sealframe_SealedSender_v1";

pub(super) const ZERO_NONCE: [u8; NONCE_SIZE] = [0; NONCE_SIZE];

struct EphemeralKeys {
    chain_key: [u8; 32],
    cipher_key: [u8; 32],
}

impl EphemeralKeys {
    fn derive(recipient: &PublicKey, ephemeral_public: &PublicKey, shared: &[u8; 32]) -> Self {
        let salt_parts: [&[u8]; 3] = [EPHEMERAL_LABEL, &recipient.serialize(), &ephemeral_public.serialize()];
        let salt = salt_parts.concat();
        let mut okm: [u8; 64] = hkdf_sha256(Some(&salt), shared, &[]);

        let mut keys = Self { chain_key: [0; 32], cipher_key: [0; 32] };
        keys.chain_key.copy_from_slice(&okm[..32]);
        keys.cipher_key.copy_from_slice(&okm[32..]);
        okm.zeroize();
        keys
    }
}

impl Drop for EphemeralKeys {
    fn drop(&mut self) {
        self.chain_key.zeroize();
        self.cipher_key.zeroize();
    }
}

fn static_key(chain_key: &[u8; 32], encrypted_static: &[u8], shared: &[u8; 32]) -> [u8; 32] {
    let salt = [&chain_key[..], encrypted_static].concat();
    hkdf_sha256(Some(&salt), shared, &[])
}

/// Seal `content` for `destination`.
///
/// # Errors
///
/// [`ProtocolError::InvalidState`] if no identity key is known for
/// `destination`.
pub async fn sealed_sender_encrypt_from_usmc<R: RngCore + CryptoRng>(
    destination: &ProtocolAddress,
    content: &UnidentifiedSenderMessageContent,
    identity_store: &dyn IdentityKeyStore,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let our_identity = identity_store.identity_key_pair().await?;
    let their_identity = identity_store.identity(destination).await?.ok_or_else(|| {
        ProtocolError::InvalidState {
            operation: "sealed_sender_encrypt",
            reason: format!("no identity key for {destination}"),
        }
    })?;

    let envelope = seal(&our_identity, their_identity.public_key(), content.serialized(), rng);
    Ok(envelope.serialize()?)
}

fn seal<R: RngCore + CryptoRng>(
    our_identity: &IdentityKeyPair,
    recipient: &PublicKey,
    content: &[u8],
    rng: &mut R,
) -> SealedSenderV1Message {
    let ephemeral = KeyPair::generate(rng);

    let mut shared = ephemeral.private_key.calculate_agreement(recipient);
    let ephemeral_keys = EphemeralKeys::derive(recipient, &ephemeral.public_key, &shared);
    shared.zeroize();

    let encrypted_static = aead_encrypt(
        &ephemeral_keys.cipher_key,
        &ZERO_NONCE,
        &our_identity.identity_key().serialize(),
        &[],
    );

    let mut shared = our_identity.private_key().calculate_agreement(recipient);
    let mut message_key = static_key(&ephemeral_keys.chain_key, &encrypted_static, &shared);
    shared.zeroize();

    let encrypted_message = aead_encrypt(&message_key, &ZERO_NONCE, content, &[]);
    message_key.zeroize();

    SealedSenderV1Message { ephemeral_public: ephemeral.public_key, encrypted_static, encrypted_message }
}

/// Open a single-recipient envelope addressed to `our_identity`.
pub(super) fn open(
    envelope: &SealedSenderV1Message,
    our_identity: &IdentityKeyPair,
) -> Result<UnidentifiedSenderMessageContent> {
    let our_private: &PrivateKey = our_identity.private_key();

    let mut shared = our_private.calculate_agreement(&envelope.ephemeral_public);
    let ephemeral_keys = EphemeralKeys::derive(our_identity.public_key(), &envelope.ephemeral_public, &shared);
    shared.zeroize();

    let static_bytes = aead_decrypt(&ephemeral_keys.cipher_key, &ZERO_NONCE, &envelope.encrypted_static, &[])
        .map_err(|_| ProtocolError::invalid_sealed_sender("sender identity failed to decrypt"))?;
    let sender_identity = IdentityKey::deserialize(&static_bytes)?;

    let mut shared = our_private.calculate_agreement(sender_identity.public_key());
    let mut message_key = static_key(&ephemeral_keys.chain_key, &envelope.encrypted_static, &shared);
    shared.zeroize();

    let decrypted = aead_decrypt(&message_key, &ZERO_NONCE, &envelope.encrypted_message, &[]);
    message_key.zeroize();
    let content_bytes =
        decrypted.map_err(|_| ProtocolError::invalid_sealed_sender("message failed to decrypt"))?;

    let content = UnidentifiedSenderMessageContent::deserialize(&content_bytes)?;
    if !bool::from(content.sender().key().ct_eq(sender_identity.public_key())) {
        return Err(ProtocolError::invalid_sealed_sender(
            "sender certificate key does not match envelope identity",
        ));
    }

    Ok(content)
}
