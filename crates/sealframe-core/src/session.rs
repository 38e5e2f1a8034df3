//! Session establishment
//!
//! The initiator processes a peer's [`PreKeyBundle`] and gets a session it
//! can encrypt to immediately. The responder builds its side from the first
//! pre-key message it receives.

use rand::{CryptoRng, RngCore};
use sealframe_crypto::KeyPair;
use sealframe_proto::{PreKeyId, PreKeySignalMessage, ProtocolAddress};
use tracing::{debug, info, warn};

use crate::{
    consts::{MAX_REGISTRATION_ID, SESSION_STATE_VERSION},
    error::{ProtocolError, Result},
    ratchet::{AliceParameters, BobParameters, initialize_alice_session, initialize_bob_session},
    state::{PendingPreKey, PreKeyBundle, SessionRecord},
    storage::{
        Direction, IdentityChange, IdentityKeyStore, KyberPreKeyStore, PreKeyStore, SessionStore,
        SignedPreKeyStore,
    },
};

/// Establish a session with `remote_address` from its published bundle.
///
/// Checks, in order: the registration id range, both pre-key signatures,
/// and trust in the bundle's identity for sending. On success the new state
/// becomes current (archiving any previous one) and outgoing messages carry
/// pre-key material until the peer replies.
pub async fn process_prekey_bundle<R: RngCore + CryptoRng>(
    remote_address: &ProtocolAddress,
    session_store: &mut dyn SessionStore,
    identity_store: &mut dyn IdentityKeyStore,
    bundle: &PreKeyBundle,
    rng: &mut R,
) -> Result<()> {
    if bundle.registration_id() > MAX_REGISTRATION_ID {
        return Err(ProtocolError::InvalidRegistrationId {
            address: remote_address.clone(),
            registration_id: bundle.registration_id(),
        });
    }

    if !bundle.verify_signed_pre_key() {
        warn!(%remote_address, "bundle signed pre-key signature invalid");
        return Err(ProtocolError::InvalidSignature { what: "signed pre-key" });
    }
    if !bundle.verify_kyber_pre_key() {
        warn!(%remote_address, "bundle kyber pre-key signature invalid");
        return Err(ProtocolError::InvalidSignature { what: "kyber pre-key" });
    }

    let their_identity = bundle.identity_key();
    if !identity_store
        .is_trusted_identity(remote_address, their_identity, Direction::Sending)
        .await?
    {
        warn!(%remote_address, "bundle identity not trusted");
        return Err(ProtocolError::UntrustedIdentity { address: remote_address.clone() });
    }

    let our_identity = identity_store.identity_key_pair().await?;
    let local_registration_id = identity_store.local_registration_id().await?;
    let our_base_key = KeyPair::generate(rng);

    let (mut state, kyber_ciphertext) = initialize_alice_session(
        &AliceParameters {
            our_identity: &our_identity,
            our_base_key: &our_base_key,
            their_identity,
            their_signed_pre_key: bundle.signed_pre_key_public(),
            their_one_time_pre_key: bundle.pre_key_public(),
            their_kyber_pre_key: bundle.kyber_pre_key_public(),
        },
        rng,
    )?;

    state.set_registration_ids(local_registration_id, bundle.registration_id());
    state.set_pending_pre_key(PendingPreKey {
        pre_key_id: bundle.pre_key_id(),
        signed_pre_key_id: bundle.signed_pre_key_id(),
        kyber_pre_key_id: bundle.kyber_pre_key_id(),
        kyber_ciphertext,
        base_key: *our_base_key.public_key.as_bytes(),
    });

    let mut record = session_store.load_session(remote_address).await?.unwrap_or_default();
    record.promote_state(state);

    if identity_store.save_identity(remote_address, their_identity).await?
        == IdentityChange::ReplacedExisting
    {
        info!(%remote_address, "peer identity replaced");
    }
    session_store.store_session(remote_address, &record).await?;

    debug!(%remote_address, registration_id = bundle.registration_id(), "session established from bundle");
    Ok(())
}

/// Responder-side outcome of a pre-key message, applied by the caller once
/// the embedded message has decrypted.
pub(crate) struct PreKeyOutcome {
    /// One-time pre-key to remove after the session is stored
    pub(crate) pre_key_used: Option<PreKeyId>,
    /// Whether a new state was created (false for a replayed establishment)
    pub(crate) new_session: bool,
}

/// Build (or find) the responder state for `message` inside `record`.
///
/// Nothing is written to any store here. If `record` already holds a state
/// with the message's base key the establishment is a replay and no pre-key
/// is touched.
pub(crate) async fn process_prekey(
    message: &PreKeySignalMessage,
    remote_address: &ProtocolAddress,
    record: &mut SessionRecord,
    identity_store: &dyn IdentityKeyStore,
    pre_key_store: &dyn PreKeyStore,
    signed_pre_key_store: &dyn SignedPreKeyStore,
    kyber_pre_key_store: &dyn KyberPreKeyStore,
) -> Result<PreKeyOutcome> {
    let their_identity = message.identity_key();
    if !identity_store
        .is_trusted_identity(remote_address, their_identity, Direction::Receiving)
        .await?
    {
        warn!(%remote_address, "pre-key message identity not trusted");
        return Err(ProtocolError::UntrustedIdentity { address: remote_address.clone() });
    }

    if record.has_session_state(SESSION_STATE_VERSION, message.base_key()) {
        debug!(%remote_address, "pre-key message for existing session");
        return Ok(PreKeyOutcome { pre_key_used: None, new_session: false });
    }

    let signed_pre_key = signed_pre_key_store
        .get_signed_pre_key(message.signed_pre_key_id())
        .await?
        .ok_or(ProtocolError::InvalidSignedPreKeyId(message.signed_pre_key_id()))?;

    let kyber_pre_key = kyber_pre_key_store
        .get_kyber_pre_key(message.kyber_pre_key_id())
        .await?
        .ok_or(ProtocolError::InvalidKyberPreKeyId(message.kyber_pre_key_id()))?;

    let one_time_pre_key = match message.pre_key_id() {
        Some(id) => Some(
            pre_key_store.get_pre_key(id).await?.ok_or(ProtocolError::InvalidPreKeyId(id))?.key_pair(),
        ),
        None => None,
    };

    let our_identity = identity_store.identity_key_pair().await?;
    let local_registration_id = identity_store.local_registration_id().await?;
    let signed_key_pair = signed_pre_key.key_pair();
    let kyber_key_pair = kyber_pre_key.key_pair()?;

    let mut state = initialize_bob_session(&BobParameters {
        our_identity: &our_identity,
        our_signed_pre_key: &signed_key_pair,
        our_one_time_pre_key: one_time_pre_key.as_ref(),
        our_kyber_pre_key: &kyber_key_pair,
        their_identity,
        their_base_key: message.base_key(),
        their_kyber_ciphertext: message.kyber_ciphertext(),
    })?;
    state.set_registration_ids(local_registration_id, message.registration_id());

    record.promote_state(state);
    info!(%remote_address, registration_id = message.registration_id(), "session established from pre-key message");

    Ok(PreKeyOutcome { pre_key_used: message.pre_key_id(), new_session: true })
}
