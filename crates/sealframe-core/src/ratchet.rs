//! PQXDH key agreement
//!
//! Derives the first root and chain keys of a session from the initiator's
//! ("Alice") base key and the responder's ("Bob") published pre-keys:
//!
//! ```text
//! secrets = 0xFF * 32
//!        || DH(IK_A, SPK_B) || DH(EK_A, IK_B) || DH(EK_A, SPK_B)
//!        || [DH(EK_A, OPK_B)]
//!        || KEM shared secret for KPK_B
//! root || chain = HKDF-SHA256(secrets, info)
//! ```
//!
//! Alice then performs the first sending ratchet step against `SPK_B`; Bob
//! sends on `SPK_B` until he receives Alice's ratchet key.

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{
    ChainKey, IdentityKey, IdentityKeyPair, KemKeyPair, KemPublicKey, KeyPair, PublicKey, RootKey,
    kdf::hkdf_sha256,
};
use zeroize::Zeroize;

use crate::{error::Result, state::SessionState};

const DISCONTINUITY_BYTES: [u8; 32] = [0xFF; 32];

const PQXDH_INFO: &[u8] = b"Sealframe_PQXDH_X25519_SHA-256_ML-KEM-1024";

/// Inputs on the initiating side.
pub(crate) struct AliceParameters<'a> {
    pub(crate) our_identity: &'a IdentityKeyPair,
    pub(crate) our_base_key: &'a KeyPair,
    pub(crate) their_identity: &'a IdentityKey,
    pub(crate) their_signed_pre_key: &'a PublicKey,
    pub(crate) their_one_time_pre_key: Option<&'a PublicKey>,
    pub(crate) their_kyber_pre_key: &'a KemPublicKey,
}

/// Inputs on the responding side.
pub(crate) struct BobParameters<'a> {
    pub(crate) our_identity: &'a IdentityKeyPair,
    pub(crate) our_signed_pre_key: &'a KeyPair,
    pub(crate) our_one_time_pre_key: Option<&'a KeyPair>,
    pub(crate) our_kyber_pre_key: &'a KemKeyPair,
    pub(crate) their_identity: &'a IdentityKey,
    pub(crate) their_base_key: &'a PublicKey,
    pub(crate) their_kyber_ciphertext: &'a [u8],
}

fn derive_keys(secrets: &mut Vec<u8>) -> (RootKey, ChainKey) {
    let mut okm: [u8; 64] = hkdf_sha256(None, secrets, PQXDH_INFO);
    secrets.zeroize();

    let mut root = [0u8; 32];
    let mut chain = [0u8; 32];
    root.copy_from_slice(&okm[..32]);
    chain.copy_from_slice(&okm[32..]);
    okm.zeroize();

    (RootKey::new(root), ChainKey::new(chain, 0))
}

/// Initiator state plus the KEM ciphertext to send to the responder.
pub(crate) fn initialize_alice_session<R: RngCore + CryptoRng>(
    parameters: &AliceParameters<'_>,
    rng: &mut R,
) -> Result<(SessionState, Vec<u8>)> {
    let our_base_private = &parameters.our_base_key.private_key;

    let mut secrets = Vec::with_capacity(32 * 6);
    secrets.extend_from_slice(&DISCONTINUITY_BYTES);
    secrets.extend_from_slice(
        &parameters.our_identity.private_key().calculate_agreement(parameters.their_signed_pre_key),
    );
    secrets.extend_from_slice(
        &our_base_private.calculate_agreement(parameters.their_identity.public_key()),
    );
    secrets.extend_from_slice(&our_base_private.calculate_agreement(parameters.their_signed_pre_key));
    if let Some(one_time) = parameters.their_one_time_pre_key {
        secrets.extend_from_slice(&our_base_private.calculate_agreement(one_time));
    }
    let (mut kem_secret, kyber_ciphertext) = parameters.their_kyber_pre_key.encapsulate()?;
    secrets.extend_from_slice(&kem_secret);
    kem_secret.zeroize();

    let (root_key, receiver_chain) = derive_keys(&mut secrets);

    let sending_ratchet = KeyPair::generate(rng);
    let (root_key, sending_chain) =
        root_key.create_chain(parameters.their_signed_pre_key, &sending_ratchet.private_key);

    let mut state = SessionState::new(
        parameters.our_identity.identity_key(),
        parameters.their_identity,
        &root_key,
        &parameters.our_base_key.public_key,
        &sending_ratchet,
        &sending_chain,
    );
    state.add_receiver_chain(parameters.their_signed_pre_key, &receiver_chain);

    Ok((state, kyber_ciphertext))
}

/// Responder state.
pub(crate) fn initialize_bob_session(parameters: &BobParameters<'_>) -> Result<SessionState> {
    let signed_private = &parameters.our_signed_pre_key.private_key;

    let mut secrets = Vec::with_capacity(32 * 6);
    secrets.extend_from_slice(&DISCONTINUITY_BYTES);
    secrets.extend_from_slice(
        &signed_private.calculate_agreement(parameters.their_identity.public_key()),
    );
    secrets.extend_from_slice(
        &parameters.our_identity.private_key().calculate_agreement(parameters.their_base_key),
    );
    secrets.extend_from_slice(&signed_private.calculate_agreement(parameters.their_base_key));
    if let Some(one_time) = parameters.our_one_time_pre_key {
        secrets.extend_from_slice(&one_time.private_key.calculate_agreement(parameters.their_base_key));
    }
    let mut kem_secret =
        parameters.our_kyber_pre_key.secret_key.decapsulate(parameters.their_kyber_ciphertext)?;
    secrets.extend_from_slice(&kem_secret);
    kem_secret.zeroize();

    let (root_key, sending_chain) = derive_keys(&mut secrets);

    Ok(SessionState::new(
        parameters.our_identity.identity_key(),
        parameters.their_identity,
        &root_key,
        parameters.their_base_key,
        parameters.our_signed_pre_key,
        &sending_chain,
    ))
}
