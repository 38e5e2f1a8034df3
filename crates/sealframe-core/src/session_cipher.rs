//! Direct message cipher
//!
//! Double-ratchet encryption for an established session.
//!
//! # Replays and Gaps
//!
//! Every receiving chain keeps a bounded window of message keys: keys for
//! skipped counters and keys already used. Decrypting a message whose key
//! is still in the window succeeds and returns the same plaintext without
//! moving any chain. Once a used key has left the window the message fails
//! with [`ProtocolError::DuplicatedMessage`].
//!
//! # Failure Atomicity
//!
//! Decryption runs on a copy of the session state. The stored record is only
//! replaced after the MAC and AEAD both verify, so a forged or corrupted
//! message never changes the session.

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{
    ChainKey, KeyPair, MessageKeys, PublicKey,
    aead::{aead_decrypt, aead_encrypt},
};
use sealframe_proto::{
    CiphertextMessage, PreKeySignalMessage, ProtocolAddress, SignalMessage,
};
use tracing::{debug, info, warn};

use crate::{
    consts::MAX_FORWARD_JUMPS,
    error::{ProtocolError, Result},
    session::process_prekey,
    state::{SessionRecord, SessionState},
    storage::{
        Direction, IdentityChange, IdentityKeyStore, KyberPreKeyStore, PreKeyStore, SessionStore,
        SignedPreKeyStore,
    },
};

/// Encrypt `plaintext` for `remote_address`.
///
/// Returns a pre-key message while the peer has not yet answered this
/// session, a plain ratchet message afterwards.
pub async fn message_encrypt(
    plaintext: &[u8],
    remote_address: &ProtocolAddress,
    session_store: &mut dyn SessionStore,
    identity_store: &mut dyn IdentityKeyStore,
) -> Result<CiphertextMessage> {
    let mut record = session_store
        .load_session(remote_address)
        .await?
        .ok_or_else(|| ProtocolError::SessionNotFound { address: remote_address.clone() })?;
    let mut state = record
        .session_state()
        .cloned()
        .ok_or_else(|| ProtocolError::SessionNotFound { address: remote_address.clone() })?;

    let chain_key = state.sender_chain_key();
    let message_keys = chain_key.message_keys();
    let sender_ephemeral = state.sender_ratchet_key_pair().public_key;
    let local_identity = state.local_identity_key();
    let their_identity = state.remote_identity_key();

    let ciphertext = aead_encrypt(message_keys.cipher_key(), message_keys.nonce(), plaintext, &[]);
    let message = SignalMessage::new(
        message_keys.mac_key(),
        sender_ephemeral,
        chain_key.index(),
        state.previous_counter(),
        ciphertext,
        &local_identity,
        &their_identity,
    )?;

    let message = match state.pending_pre_key() {
        Some(pending) => CiphertextMessage::PreKey(PreKeySignalMessage::new(
            state.local_registration_id(),
            pending.pre_key_id,
            pending.signed_pre_key_id,
            pending.kyber_pre_key_id,
            pending.kyber_ciphertext.clone(),
            PublicKey::from_bytes(pending.base_key),
            local_identity,
            message,
        )?),
        None => CiphertextMessage::Signal(message),
    };

    if !identity_store
        .is_trusted_identity(remote_address, &their_identity, Direction::Sending)
        .await?
    {
        warn!(%remote_address, "refusing to encrypt to untrusted identity");
        return Err(ProtocolError::UntrustedIdentity { address: remote_address.clone() });
    }

    state.set_sender_chain_key(&chain_key.next()?);
    record.set_session_state(state);

    identity_store.save_identity(remote_address, &their_identity).await?;
    session_store.store_session(remote_address, &record).await?;

    debug!(%remote_address, counter = chain_key.index(), "message encrypted");
    Ok(message)
}

/// Decrypt a ratchet or pre-key message from `remote_address`.
///
/// Pre-key messages establish the responder side of a session first; see
/// [`message_decrypt_prekey`].
#[allow(clippy::too_many_arguments)]
pub async fn message_decrypt<R: RngCore + CryptoRng>(
    ciphertext: &CiphertextMessage,
    remote_address: &ProtocolAddress,
    session_store: &mut dyn SessionStore,
    identity_store: &mut dyn IdentityKeyStore,
    pre_key_store: &mut dyn PreKeyStore,
    signed_pre_key_store: &dyn SignedPreKeyStore,
    kyber_pre_key_store: &mut dyn KyberPreKeyStore,
    rng: &mut R,
) -> Result<Vec<u8>> {
    match ciphertext {
        CiphertextMessage::Signal(message) => {
            message_decrypt_signal(message, remote_address, session_store, identity_store, rng).await
        },
        CiphertextMessage::PreKey(message) => {
            message_decrypt_prekey(
                message,
                remote_address,
                session_store,
                identity_store,
                pre_key_store,
                signed_pre_key_store,
                kyber_pre_key_store,
                rng,
            )
            .await
        },
        CiphertextMessage::SenderKey(_) => Err(ProtocolError::invalid_message(
            "sender key messages are decrypted with group_decrypt",
        )),
    }
}

/// Decrypt a ratchet message in an existing session.
pub async fn message_decrypt_signal<R: RngCore + CryptoRng>(
    message: &SignalMessage,
    remote_address: &ProtocolAddress,
    session_store: &mut dyn SessionStore,
    identity_store: &mut dyn IdentityKeyStore,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut record = session_store
        .load_session(remote_address)
        .await?
        .ok_or_else(|| ProtocolError::SessionNotFound { address: remote_address.clone() })?;

    let plaintext = decrypt_message_with_record(remote_address, &mut record, message, rng)?;

    let their_identity = record
        .session_state()
        .map(SessionState::remote_identity_key)
        .ok_or_else(|| ProtocolError::SessionNotFound { address: remote_address.clone() })?;
    if !identity_store
        .is_trusted_identity(remote_address, &their_identity, Direction::Receiving)
        .await?
    {
        warn!(%remote_address, "message from untrusted identity");
        return Err(ProtocolError::UntrustedIdentity { address: remote_address.clone() });
    }

    identity_store.save_identity(remote_address, &their_identity).await?;
    session_store.store_session(remote_address, &record).await?;
    Ok(plaintext)
}

/// Decrypt a pre-key message, establishing the session if needed.
///
/// Writes happen only after the embedded message decrypts, in this order:
/// peer identity, Kyber pre-key usage, session record, one-time pre-key
/// removal.
#[allow(clippy::too_many_arguments)]
pub async fn message_decrypt_prekey<R: RngCore + CryptoRng>(
    message: &PreKeySignalMessage,
    remote_address: &ProtocolAddress,
    session_store: &mut dyn SessionStore,
    identity_store: &mut dyn IdentityKeyStore,
    pre_key_store: &mut dyn PreKeyStore,
    signed_pre_key_store: &dyn SignedPreKeyStore,
    kyber_pre_key_store: &mut dyn KyberPreKeyStore,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut record = session_store.load_session(remote_address).await?.unwrap_or_default();

    let outcome = process_prekey(
        message,
        remote_address,
        &mut record,
        &*identity_store,
        &*pre_key_store,
        signed_pre_key_store,
        &*kyber_pre_key_store,
    )
    .await?;

    let plaintext = decrypt_message_with_record(remote_address, &mut record, message.message(), rng)?;

    if identity_store.save_identity(remote_address, message.identity_key()).await?
        == IdentityChange::ReplacedExisting
    {
        info!(%remote_address, "peer identity replaced");
    }
    if outcome.new_session {
        kyber_pre_key_store
            .mark_kyber_pre_key_used(
                message.kyber_pre_key_id(),
                message.signed_pre_key_id(),
                message.base_key(),
            )
            .await?;
    }
    session_store.store_session(remote_address, &record).await?;
    if let Some(pre_key_id) = outcome.pre_key_used {
        pre_key_store.remove_pre_key(pre_key_id).await?;
    }

    Ok(plaintext)
}

/// Try the current state, then archived states newest first. A state that
/// decrypts becomes current.
fn decrypt_message_with_record<R: RngCore + CryptoRng>(
    remote_address: &ProtocolAddress,
    record: &mut SessionRecord,
    message: &SignalMessage,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut first_error = None;

    if let Some(current) = record.session_state() {
        let mut state = current.clone();
        match decrypt_message_with_state(&mut state, message, rng) {
            Ok(plaintext) => {
                record.set_session_state(state);
                return Ok(plaintext);
            },
            Err(err @ ProtocolError::DuplicatedMessage { .. }) => return Err(err),
            Err(err) => first_error = Some(err),
        }
    }

    let mut promoted = None;
    for (index, previous) in record.previous_session_states().enumerate() {
        let mut state = previous.clone();
        match decrypt_message_with_state(&mut state, message, rng) {
            Ok(plaintext) => {
                promoted = Some((index, state, plaintext));
                break;
            },
            Err(err @ ProtocolError::DuplicatedMessage { .. }) => return Err(err),
            Err(_) => {},
        }
    }

    if let Some((index, state, plaintext)) = promoted {
        debug!(%remote_address, index, "archived session state promoted");
        record.promote_old_session(index, state);
        return Ok(plaintext);
    }

    match first_error {
        Some(err) => {
            warn!(%remote_address, error = %err, "message decryption failed");
            Err(err)
        },
        None if record.previous_session_states().next().is_none() => {
            Err(ProtocolError::SessionNotFound { address: remote_address.clone() })
        },
        None => Err(ProtocolError::invalid_message("no archived session state decrypts the message")),
    }
}

fn decrypt_message_with_state<R: RngCore + CryptoRng>(
    state: &mut SessionState,
    message: &SignalMessage,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let their_ephemeral = message.sender_ratchet_key();
    let counter = message.counter();

    let chain_key = get_or_create_chain_key(state, their_ephemeral, rng)?;
    let message_keys = get_or_create_message_keys(state, their_ephemeral, &chain_key, counter)?;

    let their_identity = state.remote_identity_key();
    let local_identity = state.local_identity_key();
    if !message.verify_mac(&their_identity, &local_identity, message_keys.mac_key()) {
        return Err(ProtocolError::invalid_message("MAC verification failed"));
    }

    let plaintext = aead_decrypt(message_keys.cipher_key(), message_keys.nonce(), message.body(), &[])
        .map_err(|_| ProtocolError::invalid_message("AEAD decryption failed"))?;

    state.clear_pending_pre_key();
    Ok(plaintext)
}

/// Receiving chain for `their_ephemeral`, performing a DH ratchet step if
/// the key is new.
fn get_or_create_chain_key<R: RngCore + CryptoRng>(
    state: &mut SessionState,
    their_ephemeral: &PublicKey,
    rng: &mut R,
) -> Result<ChainKey> {
    if let Some(chain_key) = state.receiver_chain_key(their_ephemeral) {
        return Ok(chain_key);
    }

    let our_ephemeral = state.sender_ratchet_key_pair();
    let (receiver_root, receiver_chain) =
        state.root_key().create_chain(their_ephemeral, &our_ephemeral.private_key);

    let new_ephemeral = KeyPair::generate(rng);
    let (sender_root, sender_chain) =
        receiver_root.create_chain(their_ephemeral, &new_ephemeral.private_key);

    let current_index = state.sender_chain_key().index();
    state.set_root_key(&sender_root);
    state.add_receiver_chain(their_ephemeral, &receiver_chain);
    state.set_previous_counter(current_index.saturating_sub(1));
    state.set_sender_chain(&new_ephemeral, &sender_chain);

    debug!(previous_counter = current_index.saturating_sub(1), "ratchet step");
    Ok(receiver_chain)
}

fn get_or_create_message_keys(
    state: &mut SessionState,
    their_ephemeral: &PublicKey,
    chain_key: &ChainKey,
    counter: u32,
) -> Result<MessageKeys> {
    let chain_index = chain_key.index();

    if chain_index > counter {
        return match state.message_keys(their_ephemeral, counter) {
            Some((keys, consumed)) => {
                if consumed {
                    debug!(counter, "replayed message within retained window");
                } else {
                    state.set_message_keys(their_ephemeral, &keys, true)?;
                }
                Ok(keys)
            },
            None => {
                warn!(counter, "duplicate message outside retained window");
                Err(ProtocolError::DuplicatedMessage { counter })
            },
        };
    }

    if counter - chain_index > MAX_FORWARD_JUMPS {
        return Err(ProtocolError::invalid_message(format!(
            "counter {counter} is more than {MAX_FORWARD_JUMPS} ahead of {chain_index}"
        )));
    }

    let mut chain = chain_key.clone();
    while chain.index() < counter {
        state.set_message_keys(their_ephemeral, &chain.message_keys(), false)?;
        chain = chain.next()?;
    }

    let keys = chain.message_keys();
    state.set_message_keys(their_ephemeral, &keys, true)?;
    state.set_receiver_chain_key(their_ephemeral, &chain.next()?)?;
    Ok(keys)
}
