//! Session records
//!
//! A [`SessionRecord`] holds the current [`SessionState`] for one peer device
//! plus a bounded list of archived states. Archived states stay usable for
//! decryption so messages in flight during a re-establishment still open.
//!
//! # Invariants
//!
//! - At most [`MAX_RECEIVER_CHAINS`] receiver chains per state; the oldest
//!   is dropped first.
//! - At most [`MAX_MESSAGE_KEYS`] retained message keys per receiver chain;
//!   the oldest is dropped first.
//! - At most [`ARCHIVED_STATES_MAX`] archived states; the oldest is dropped
//!   first.

use std::collections::VecDeque;

use sealframe_crypto::{
    ChainKey, IdentityKey, KeyPair, MessageKeys, PrivateKey, PublicKey, RootKey, aead::NONCE_SIZE,
};
use sealframe_proto::{KyberPreKeyId, PreKeyId, SignedPreKeyId};
use serde::{Deserialize, Serialize};

use super::{from_cbor, to_cbor};
use crate::{
    consts::{ARCHIVED_STATES_MAX, MAX_MESSAGE_KEYS, MAX_RECEIVER_CHAINS, SESSION_STATE_VERSION},
    error::{ProtocolError, Result},
};

#[derive(Clone, Serialize, Deserialize)]
struct StoredChainKey {
    key: [u8; 32],
    index: u32,
}

impl StoredChainKey {
    fn from_chain_key(chain_key: &ChainKey) -> Self {
        Self { key: *chain_key.key(), index: chain_key.index() }
    }

    fn chain_key(&self) -> ChainKey {
        ChainKey::new(self.key, self.index)
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredMessageKey {
    counter: u32,
    cipher_key: [u8; 32],
    mac_key: [u8; 32],
    nonce: [u8; NONCE_SIZE],
    consumed: bool,
}

impl StoredMessageKey {
    fn message_keys(&self) -> MessageKeys {
        MessageKeys::new(self.cipher_key, self.mac_key, self.nonce, self.counter)
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct SenderChain {
    ratchet_private_key: [u8; 32],
    chain_key: StoredChainKey,
}

#[derive(Clone, Serialize, Deserialize)]
struct ReceiverChain {
    sender_ratchet_key: [u8; 32],
    chain_key: StoredChainKey,
    message_keys: VecDeque<StoredMessageKey>,
}

/// Pre-key material attached to outgoing messages until the peer answers.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct PendingPreKey {
    pub(crate) pre_key_id: Option<PreKeyId>,
    pub(crate) signed_pre_key_id: SignedPreKeyId,
    pub(crate) kyber_pre_key_id: KyberPreKeyId,
    #[serde(with = "serde_bytes")]
    pub(crate) kyber_ciphertext: Vec<u8>,
    pub(crate) base_key: [u8; 32],
}

/// Ratchet state shared with one peer device.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionState {
    version: u8,
    local_identity_key: [u8; 32],
    remote_identity_key: [u8; 32],
    root_key: [u8; 32],
    previous_counter: u32,
    sender_chain: SenderChain,
    receiver_chains: VecDeque<ReceiverChain>,
    pending_pre_key: Option<PendingPreKey>,
    local_registration_id: u32,
    remote_registration_id: u32,
    alice_base_key: [u8; 32],
}

impl SessionState {
    pub(crate) fn new(
        local_identity_key: &IdentityKey,
        remote_identity_key: &IdentityKey,
        root_key: &RootKey,
        alice_base_key: &PublicKey,
        sender_ratchet: &KeyPair,
        sender_chain_key: &ChainKey,
    ) -> Self {
        Self {
            version: SESSION_STATE_VERSION,
            local_identity_key: *local_identity_key.public_key().as_bytes(),
            remote_identity_key: *remote_identity_key.public_key().as_bytes(),
            root_key: *root_key.key(),
            previous_counter: 0,
            sender_chain: SenderChain {
                ratchet_private_key: sender_ratchet.private_key.serialize(),
                chain_key: StoredChainKey::from_chain_key(sender_chain_key),
            },
            receiver_chains: VecDeque::new(),
            pending_pre_key: None,
            local_registration_id: 0,
            remote_registration_id: 0,
            alice_base_key: *alice_base_key.as_bytes(),
        }
    }

    /// Session version.
    pub fn session_version(&self) -> u8 {
        self.version
    }

    /// Our identity key as recorded at establishment.
    pub fn local_identity_key(&self) -> IdentityKey {
        IdentityKey::new(PublicKey::from_bytes(self.local_identity_key))
    }

    /// Peer identity key as recorded at establishment.
    pub fn remote_identity_key(&self) -> IdentityKey {
        IdentityKey::new(PublicKey::from_bytes(self.remote_identity_key))
    }

    /// Our registration id.
    pub fn local_registration_id(&self) -> u32 {
        self.local_registration_id
    }

    /// Peer registration id as it announced it.
    pub fn remote_registration_id(&self) -> u32 {
        self.remote_registration_id
    }

    /// Base key of the session initiator, unique per establishment.
    pub fn alice_base_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.alice_base_key)
    }

    /// Whether outgoing messages still carry pre-key material.
    pub fn has_unacknowledged_pre_key_message(&self) -> bool {
        self.pending_pre_key.is_some()
    }

    pub(crate) fn set_registration_ids(&mut self, local: u32, remote: u32) {
        self.local_registration_id = local;
        self.remote_registration_id = remote;
    }

    pub(crate) fn root_key(&self) -> RootKey {
        RootKey::new(self.root_key)
    }

    pub(crate) fn set_root_key(&mut self, root_key: &RootKey) {
        self.root_key = *root_key.key();
    }

    pub(crate) fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    pub(crate) fn set_previous_counter(&mut self, previous_counter: u32) {
        self.previous_counter = previous_counter;
    }

    pub(crate) fn sender_ratchet_key_pair(&self) -> KeyPair {
        KeyPair::from_private_key(PrivateKey::from_bytes(self.sender_chain.ratchet_private_key))
    }

    pub(crate) fn sender_chain_key(&self) -> ChainKey {
        self.sender_chain.chain_key.chain_key()
    }

    pub(crate) fn set_sender_chain_key(&mut self, chain_key: &ChainKey) {
        self.sender_chain.chain_key = StoredChainKey::from_chain_key(chain_key);
    }

    pub(crate) fn set_sender_chain(&mut self, ratchet: &KeyPair, chain_key: &ChainKey) {
        self.sender_chain = SenderChain {
            ratchet_private_key: ratchet.private_key.serialize(),
            chain_key: StoredChainKey::from_chain_key(chain_key),
        };
    }

    fn receiver_chain(&self, sender: &PublicKey) -> Option<&ReceiverChain> {
        self.receiver_chains.iter().find(|chain| chain.sender_ratchet_key == *sender.as_bytes())
    }

    fn receiver_chain_mut(&mut self, sender: &PublicKey) -> Option<&mut ReceiverChain> {
        self.receiver_chains.iter_mut().find(|chain| chain.sender_ratchet_key == *sender.as_bytes())
    }

    pub(crate) fn receiver_chain_key(&self, sender: &PublicKey) -> Option<ChainKey> {
        self.receiver_chain(sender).map(|chain| chain.chain_key.chain_key())
    }

    pub(crate) fn add_receiver_chain(&mut self, sender: &PublicKey, chain_key: &ChainKey) {
        self.receiver_chains.push_back(ReceiverChain {
            sender_ratchet_key: *sender.as_bytes(),
            chain_key: StoredChainKey::from_chain_key(chain_key),
            message_keys: VecDeque::new(),
        });
        while self.receiver_chains.len() > MAX_RECEIVER_CHAINS {
            self.receiver_chains.pop_front();
        }
    }

    pub(crate) fn set_receiver_chain_key(&mut self, sender: &PublicKey, chain_key: &ChainKey) -> Result<()> {
        let chain = self.receiver_chain_mut(sender).ok_or_else(|| ProtocolError::InvalidState {
            operation: "set_receiver_chain_key",
            reason: "no receiver chain for ratchet key".to_string(),
        })?;
        chain.chain_key = StoredChainKey::from_chain_key(chain_key);
        Ok(())
    }

    /// Retained keys for `counter` on `sender`'s chain, with their consumed flag.
    pub(crate) fn message_keys(&self, sender: &PublicKey, counter: u32) -> Option<(MessageKeys, bool)> {
        self.receiver_chain(sender)?
            .message_keys
            .iter()
            .find(|key| key.counter == counter)
            .map(|key| (key.message_keys(), key.consumed))
    }

    /// Retain keys on `sender`'s chain, replacing any entry for the same counter.
    pub(crate) fn set_message_keys(
        &mut self,
        sender: &PublicKey,
        keys: &MessageKeys,
        consumed: bool,
    ) -> Result<()> {
        let chain = self.receiver_chain_mut(sender).ok_or_else(|| ProtocolError::InvalidState {
            operation: "set_message_keys",
            reason: "no receiver chain for ratchet key".to_string(),
        })?;

        chain.message_keys.retain(|key| key.counter != keys.counter());
        chain.message_keys.push_back(StoredMessageKey {
            counter: keys.counter(),
            cipher_key: *keys.cipher_key(),
            mac_key: *keys.mac_key(),
            nonce: *keys.nonce(),
            consumed,
        });
        while chain.message_keys.len() > MAX_MESSAGE_KEYS {
            chain.message_keys.pop_front();
        }
        Ok(())
    }

    pub(crate) fn pending_pre_key(&self) -> Option<&PendingPreKey> {
        self.pending_pre_key.as_ref()
    }

    pub(crate) fn set_pending_pre_key(&mut self, pending: PendingPreKey) {
        self.pending_pre_key = Some(pending);
    }

    pub(crate) fn clear_pending_pre_key(&mut self) {
        self.pending_pre_key = None;
    }
}

/// Current session state plus archived predecessors for one peer device.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    current: Option<SessionState>,
    previous: VecDeque<SessionState>,
}

impl SessionRecord {
    /// Record without any state.
    pub fn new_fresh() -> Self {
        Self::default()
    }

    /// Record whose current state is `state`.
    pub fn new(state: SessionState) -> Self {
        Self { current: Some(state), previous: VecDeque::new() }
    }

    /// Current state, if any.
    pub fn session_state(&self) -> Option<&SessionState> {
        self.current.as_ref()
    }

    /// Whether a current state exists.
    pub fn has_current_state(&self) -> bool {
        self.current.is_some()
    }

    /// Archived states, newest first.
    pub fn previous_session_states(&self) -> impl Iterator<Item = &SessionState> {
        self.previous.iter()
    }

    /// Whether any state (current or archived) was established with `base_key`.
    pub fn has_session_state(&self, version: u8, alice_base_key: &PublicKey) -> bool {
        self.current
            .iter()
            .chain(self.previous.iter())
            .any(|state| state.version == version && state.alice_base_key == *alice_base_key.as_bytes())
    }

    /// Make `state` current, archiving the existing current state.
    pub fn promote_state(&mut self, state: SessionState) {
        self.archive_current_state();
        self.current = Some(state);
    }

    /// Move the current state to the archive. Messages to the peer then
    /// require a new establishment; incoming messages can still use it.
    pub fn archive_current_state(&mut self) {
        if let Some(state) = self.current.take() {
            self.previous.push_front(state);
            self.previous.truncate(ARCHIVED_STATES_MAX);
        }
    }

    /// Replace the current state in place.
    pub(crate) fn set_session_state(&mut self, state: SessionState) {
        self.current = Some(state);
    }

    /// Remove the archived state at `index` and make `state` (its updated
    /// form) current.
    pub(crate) fn promote_old_session(&mut self, index: usize, state: SessionState) {
        self.previous.remove(index);
        self.promote_state(state);
    }

    /// Peer registration id of the current state.
    pub fn remote_registration_id(&self) -> Result<u32> {
        self.current.as_ref().map(SessionState::remote_registration_id).ok_or_else(|| {
            ProtocolError::InvalidState {
                operation: "remote_registration_id",
                reason: "no current session state".to_string(),
            }
        })
    }

    /// CBOR encoding.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }

    /// Parse a CBOR encoding.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        from_cbor(bytes)
    }
}
