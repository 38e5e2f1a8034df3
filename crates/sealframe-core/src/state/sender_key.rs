//! Sender-key records
//!
//! One record per (sender device, distribution id). Each state is one
//! sender chain; the newest state is first and is the one used to send.

use std::collections::VecDeque;

use sealframe_crypto::{PrivateKey, PublicKey, SenderChainKey, SenderMessageKey};
use serde::{Deserialize, Serialize};

use super::{from_cbor, to_cbor};
use crate::{
    consts::{MAX_MESSAGE_KEYS, MAX_SENDER_KEY_STATES},
    error::Result,
};

#[derive(Clone, Serialize, Deserialize)]
struct StoredSenderMessageKey {
    iteration: u32,
    seed: [u8; 32],
}

/// One sender chain: chain key, signing key and skipped message keys.
#[derive(Clone, Serialize, Deserialize)]
pub struct SenderKeyState {
    chain_id: u32,
    iteration: u32,
    chain_seed: [u8; 32],
    signing_public_key: [u8; 32],
    signing_private_key: Option<[u8; 32]>,
    message_keys: VecDeque<StoredSenderMessageKey>,
}

impl SenderKeyState {
    fn new(
        chain_id: u32,
        chain_key: &SenderChainKey,
        signing_public_key: &PublicKey,
        signing_private_key: Option<&PrivateKey>,
    ) -> Self {
        Self {
            chain_id,
            iteration: chain_key.iteration(),
            chain_seed: *chain_key.seed(),
            signing_public_key: *signing_public_key.as_bytes(),
            signing_private_key: signing_private_key.map(PrivateKey::serialize),
            message_keys: VecDeque::new(),
        }
    }

    /// Chain id announced in distribution messages.
    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    /// Current chain key.
    pub fn sender_chain_key(&self) -> SenderChainKey {
        SenderChainKey::new(self.iteration, self.chain_seed)
    }

    pub(crate) fn set_sender_chain_key(&mut self, chain_key: &SenderChainKey) {
        self.iteration = chain_key.iteration();
        self.chain_seed = *chain_key.seed();
    }

    /// Public key that verifies this chain's messages.
    pub fn signing_key_public(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_public_key)
    }

    /// Private signing key; present only on the sending side.
    pub fn signing_key_private(&self) -> Option<PrivateKey> {
        self.signing_private_key.map(PrivateKey::from_bytes)
    }

    pub(crate) fn add_sender_message_key(&mut self, key: &SenderMessageKey) {
        self.message_keys
            .push_back(StoredSenderMessageKey { iteration: key.iteration(), seed: *key.seed() });
        while self.message_keys.len() > MAX_MESSAGE_KEYS {
            self.message_keys.pop_front();
        }
    }

    /// Take the retained key for `iteration`; each key is handed out once.
    pub(crate) fn remove_sender_message_key(&mut self, iteration: u32) -> Option<SenderMessageKey> {
        let position = self.message_keys.iter().position(|key| key.iteration == iteration)?;
        self.message_keys
            .remove(position)
            .map(|key| SenderMessageKey::from_seed(key.iteration, key.seed))
    }
}

/// What [`SenderKeyRecord::add_sender_key_state`] did with a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateUpdate {
    /// New chain id
    Added,
    /// Chain already held with the same signing key
    Unchanged,
    /// Chain id reused with a different signing key
    Replaced,
}

/// All retained sender chains for one (sender, distribution) pair.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SenderKeyRecord {
    states: VecDeque<SenderKeyState>,
}

impl SenderKeyRecord {
    /// Record without any state.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Whether the record holds no state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Newest state, used for sending.
    pub fn sender_key_state(&self) -> Option<&SenderKeyState> {
        self.states.front()
    }

    pub(crate) fn sender_key_state_mut(&mut self) -> Option<&mut SenderKeyState> {
        self.states.front_mut()
    }

    pub(crate) fn sender_key_state_for_chain_id(&mut self, chain_id: u32) -> Option<&mut SenderKeyState> {
        self.states.iter_mut().find(|state| state.chain_id == chain_id)
    }

    /// Chain ids of every retained state, newest first.
    pub fn chain_ids(&self) -> Vec<u32> {
        self.states.iter().map(SenderKeyState::chain_id).collect()
    }

    /// Add a state as the newest, dropping the oldest beyond
    /// [`MAX_SENDER_KEY_STATES`].
    ///
    /// A state with the same chain id and signing key is kept as it is, so
    /// its position and consumed keys survive a repeated announcement. A
    /// state with the same chain id but another signing key is replaced.
    pub(crate) fn add_sender_key_state(
        &mut self,
        chain_id: u32,
        chain_key: &SenderChainKey,
        signing_public_key: &PublicKey,
        signing_private_key: Option<&PrivateKey>,
    ) -> StateUpdate {
        let update = match self.states.iter().find(|state| state.chain_id == chain_id) {
            Some(existing) if existing.signing_key_public() == *signing_public_key => {
                return StateUpdate::Unchanged;
            },
            Some(_) => StateUpdate::Replaced,
            None => StateUpdate::Added,
        };

        self.states.retain(|state| state.chain_id != chain_id);
        self.states.push_front(SenderKeyState::new(
            chain_id,
            chain_key,
            signing_public_key,
            signing_private_key,
        ));
        self.states.truncate(MAX_SENDER_KEY_STATES);
        update
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

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use sealframe_crypto::KeyPair;

    use super::*;

    fn signing_key() -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(1))
    }

    #[test]
    fn states_are_bounded_and_newest_first() {
        let key = signing_key();
        let mut record = SenderKeyRecord::new_empty();
        for chain_id in 0..(MAX_SENDER_KEY_STATES as u32 + 2) {
            record.add_sender_key_state(chain_id, &SenderChainKey::new(0, [1; 32]), &key.public_key, None);
        }

        assert_eq!(record.chain_ids(), vec![6, 5, 4, 3, 2]);
        assert_eq!(record.sender_key_state().unwrap().chain_id(), 6);
    }

    #[test]
    fn repeated_chain_keeps_existing_state() {
        let key = signing_key();
        let mut record = SenderKeyRecord::new_empty();
        record.add_sender_key_state(9, &SenderChainKey::new(0, [1; 32]), &key.public_key, None);
        record.add_sender_key_state(10, &SenderChainKey::new(0, [3; 32]), &key.public_key, None);

        let update = record.add_sender_key_state(9, &SenderChainKey::new(4, [2; 32]), &key.public_key, None);
        assert_eq!(update, StateUpdate::Unchanged);
        assert_eq!(record.chain_ids(), vec![10, 9]);
        assert_eq!(record.sender_key_state_for_chain_id(9).unwrap().sender_chain_key().iteration(), 0);
    }

    #[test]
    fn chain_with_new_signing_key_replaces_state() {
        let key = signing_key();
        let other = KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(2));
        let mut record = SenderKeyRecord::new_empty();
        record.add_sender_key_state(9, &SenderChainKey::new(0, [1; 32]), &key.public_key, None);

        let update = record.add_sender_key_state(9, &SenderChainKey::new(4, [2; 32]), &other.public_key, None);
        assert_eq!(update, StateUpdate::Replaced);
        assert_eq!(record.chain_ids(), vec![9]);
        let state = record.sender_key_state().unwrap();
        assert_eq!(state.sender_chain_key().iteration(), 4);
        assert_eq!(state.signing_key_public(), other.public_key);
    }

    #[test]
    fn skipped_key_is_handed_out_once() {
        let key = signing_key();
        let mut record = SenderKeyRecord::new_empty();
        record.add_sender_key_state(1, &SenderChainKey::new(0, [1; 32]), &key.public_key, None);

        let state = record.sender_key_state_for_chain_id(1).unwrap();
        let message_key = state.sender_chain_key().sender_message_key();
        state.add_sender_message_key(&message_key);

        assert!(state.remove_sender_message_key(0).is_some());
        assert!(state.remove_sender_message_key(0).is_none());
    }

    #[test]
    fn private_key_survives_serialization() {
        let key = signing_key();
        let mut record = SenderKeyRecord::new_empty();
        record.add_sender_key_state(
            3,
            &SenderChainKey::new(2, [7; 32]),
            &key.public_key,
            Some(&key.private_key),
        );

        let restored = SenderKeyRecord::deserialize(&record.serialize().unwrap()).unwrap();
        let state = restored.sender_key_state().unwrap();
        assert_eq!(state.signing_key_private().unwrap().public_key(), key.public_key);
        assert_eq!(state.sender_chain_key().seed(), &[7; 32]);
    }
}
