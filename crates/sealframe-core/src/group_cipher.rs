//! Sender-key group messaging
//!
//! A sender creates one chain per distribution id and announces it to every
//! member in a [`SenderKeyDistributionMessage`], sent over pairwise
//! sessions. Group messages are then encrypted once under the chain's
//! current message key and signed with the chain's signing key.
//!
//! Receivers tolerate reordering: keys for skipped iterations are retained
//! (bounded) and each is handed out exactly once, so a replayed group
//! message fails with [`ProtocolError::DuplicatedMessage`].

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{
    KeyPair, SenderChainKey, SenderMessageKey, decrypt_sender_message, encrypt_sender_message,
};
use sealframe_proto::{ProtocolAddress, SenderKeyDistributionMessage, SenderKeyMessage};
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::{
    consts::MAX_FORWARD_JUMPS,
    error::{ProtocolError, Result},
    state::{SenderKeyState, StateUpdate},
    storage::SenderKeyStore,
};

/// Distribution message for our chain in `distribution_id`, creating the
/// chain on first use.
///
/// The message announces the chain at its current iteration, so members
/// added later cannot decrypt earlier messages.
pub async fn create_sender_key_distribution_message<R: RngCore + CryptoRng>(
    sender: &ProtocolAddress,
    distribution_id: Uuid,
    store: &mut dyn SenderKeyStore,
    rng: &mut R,
) -> Result<SenderKeyDistributionMessage> {
    let mut record = store.load_sender_key(sender, distribution_id).await?.unwrap_or_default();

    if record.is_empty() {
        // Chain ids are 31-bit.
        let chain_id = rng.next_u32() >> 1;
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let signing_key = KeyPair::generate(rng);

        record.add_sender_key_state(
            chain_id,
            &SenderChainKey::new(0, seed),
            &signing_key.public_key,
            Some(&signing_key.private_key),
        );
        seed.zeroize();

        store.store_sender_key(sender, distribution_id, &record).await?;
        debug!(%sender, %distribution_id, chain_id, "sender key created");
    }

    let state = record
        .sender_key_state()
        .ok_or(ProtocolError::InvalidSenderKeySession { distribution_id })?;
    let chain_key = state.sender_chain_key();

    Ok(SenderKeyDistributionMessage::new(
        distribution_id,
        state.chain_id(),
        chain_key.iteration(),
        *chain_key.seed(),
        state.signing_key_public(),
    )?)
}

/// Store the chain announced by `message` for `sender`.
///
/// A chain already held with the same signing key is left untouched, so
/// repeated delivery cannot rewind it. The same chain id with a different
/// signing key replaces the held state. At most
/// [`MAX_SENDER_KEY_STATES`](crate::consts::MAX_SENDER_KEY_STATES) states
/// are kept per sender and distribution.
pub async fn process_sender_key_distribution_message(
    sender: &ProtocolAddress,
    message: &SenderKeyDistributionMessage,
    store: &mut dyn SenderKeyStore,
) -> Result<()> {
    let distribution_id = message.distribution_id();
    let chain_id = message.chain_id();
    let mut record = store.load_sender_key(sender, distribution_id).await?.unwrap_or_default();

    let update = record.add_sender_key_state(
        chain_id,
        &SenderChainKey::new(message.iteration(), *message.chain_key()),
        message.signing_key(),
        None,
    );
    match update {
        StateUpdate::Unchanged => {
            debug!(%sender, %distribution_id, chain_id, "sender key distribution already processed");
            return Ok(());
        },
        StateUpdate::Replaced => {
            warn!(%sender, %distribution_id, chain_id, "sender key chain replaced with a new signing key");
        },
        StateUpdate::Added => {},
    }
    store.store_sender_key(sender, distribution_id, &record).await?;

    debug!(
        %sender,
        %distribution_id,
        chain_id,
        iteration = message.iteration(),
        "sender key distribution processed"
    );
    Ok(())
}

/// Encrypt `plaintext` to the group under our newest chain.
///
/// # Errors
///
/// - [`ProtocolError::NoSenderKeyState`] if no chain exists yet
/// - [`ProtocolError::InvalidSenderKeySession`] if the chain was received
///   from someone else and has no signing key
pub async fn group_encrypt<R: RngCore + CryptoRng>(
    sender: &ProtocolAddress,
    distribution_id: Uuid,
    plaintext: &[u8],
    store: &mut dyn SenderKeyStore,
    rng: &mut R,
) -> Result<SenderKeyMessage> {
    let mut record = store
        .load_sender_key(sender, distribution_id)
        .await?
        .ok_or(ProtocolError::NoSenderKeyState { distribution_id })?;
    let state = record
        .sender_key_state_mut()
        .ok_or(ProtocolError::NoSenderKeyState { distribution_id })?;

    let signing_key = state
        .signing_key_private()
        .ok_or(ProtocolError::InvalidSenderKeySession { distribution_id })?;
    let chain_key = state.sender_chain_key();
    let message_key = chain_key.sender_message_key();

    let ciphertext = encrypt_sender_message(plaintext, &message_key);
    let message = SenderKeyMessage::new(
        distribution_id,
        state.chain_id(),
        message_key.iteration(),
        ciphertext,
        &signing_key,
        rng,
    )?;

    state.set_sender_chain_key(&chain_key.next()?);
    store.store_sender_key(sender, distribution_id, &record).await?;

    Ok(message)
}

/// Decrypt a serialized group message from `sender`.
///
/// # Errors
///
/// - [`ProtocolError::NoSenderKeyState`] if the message's chain is unknown
/// - [`ProtocolError::InvalidSignature`] if the chain's signing key does not
///   verify the message
/// - [`ProtocolError::DuplicatedMessage`] if the iteration was already
///   consumed
pub async fn group_decrypt(
    message: &[u8],
    sender: &ProtocolAddress,
    store: &mut dyn SenderKeyStore,
) -> Result<Vec<u8>> {
    let message = SenderKeyMessage::deserialize(message)?;
    let distribution_id = message.distribution_id();

    let mut record = store
        .load_sender_key(sender, distribution_id)
        .await?
        .ok_or(ProtocolError::NoSenderKeyState { distribution_id })?;
    let Some(state) = record.sender_key_state_for_chain_id(message.chain_id()) else {
        warn!(%sender, %distribution_id, chain_id = message.chain_id(), "no sender key state for chain");
        return Err(ProtocolError::NoSenderKeyState { distribution_id });
    };

    if !message.verify_signature(&state.signing_key_public()) {
        warn!(%sender, %distribution_id, "sender key message signature invalid");
        return Err(ProtocolError::InvalidSignature { what: "sender key message" });
    }

    let message_key = sender_message_key(state, message.iteration())?;
    let plaintext = decrypt_sender_message(message.ciphertext(), &message_key)
        .map_err(|_| ProtocolError::invalid_message("sender key message failed to decrypt"))?;

    store.store_sender_key(sender, distribution_id, &record).await?;
    Ok(plaintext)
}

fn sender_message_key(state: &mut SenderKeyState, iteration: u32) -> Result<SenderMessageKey> {
    let chain_key = state.sender_chain_key();
    let current = chain_key.iteration();

    if current > iteration {
        return state.remove_sender_message_key(iteration).ok_or_else(|| {
            warn!(iteration, current, "sender key message already consumed");
            ProtocolError::DuplicatedMessage { counter: iteration }
        });
    }

    if iteration - current > MAX_FORWARD_JUMPS {
        return Err(ProtocolError::invalid_message(format!(
            "sender key iteration {iteration} is more than {MAX_FORWARD_JUMPS} ahead of {current}"
        )));
    }

    let mut chain = chain_key;
    while chain.iteration() < iteration {
        state.add_sender_message_key(&chain.sender_message_key());
        chain = chain.next()?;
    }
    state.set_sender_chain_key(&chain.next()?);

    Ok(chain.sender_message_key())
}
