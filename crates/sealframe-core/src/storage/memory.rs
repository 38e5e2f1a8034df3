//! In-memory store implementations
//!
//! Every store shares its map through `Arc<RwLock<..>>`, so clones see the
//! same data. Identity trust is trust-on-first-use: an unknown peer is
//! trusted, a known peer only with the identity stored for it.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use sealframe_crypto::{IdentityKey, IdentityKeyPair, PublicKey};
use sealframe_proto::{KyberPreKeyId, PreKeyId, ProtocolAddress, SignedPreKeyId};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::{
    Direction, IdentityChange, IdentityKeyStore, KyberPreKeyStore, PreKeyStore, SenderKeyStore,
    SessionStore, SignedPreKeyStore,
};
use crate::{
    error::{ProtocolError, Result},
    state::{KyberPreKeyRecord, PreKeyRecord, SenderKeyRecord, SessionRecord, SignedPreKeyRecord},
};

/// In-memory [`IdentityKeyStore`].
#[derive(Clone)]
pub struct InMemIdentityKeyStore {
    key_pair: IdentityKeyPair,
    registration_id: u32,
    known_keys: Arc<RwLock<HashMap<ProtocolAddress, IdentityKey>>>,
}

impl InMemIdentityKeyStore {
    /// Store for the local identity `key_pair` and `registration_id`.
    pub fn new(key_pair: IdentityKeyPair, registration_id: u32) -> Self {
        Self { key_pair, registration_id, known_keys: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Forget the identity stored for `address`.
    pub async fn reset(&mut self, address: &ProtocolAddress) {
        self.known_keys.write().await.remove(address);
    }
}

#[async_trait]
impl IdentityKeyStore for InMemIdentityKeyStore {
    async fn identity_key_pair(&self) -> Result<IdentityKeyPair> {
        Ok(self.key_pair.clone())
    }

    async fn local_registration_id(&self) -> Result<u32> {
        Ok(self.registration_id)
    }

    async fn save_identity(
        &mut self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> Result<IdentityChange> {
        let previous = self.known_keys.write().await.insert(address.clone(), *identity);
        Ok(match previous {
            Some(previous) if previous != *identity => IdentityChange::ReplacedExisting,
            _ => IdentityChange::NewOrUnchanged,
        })
    }

    async fn is_trusted_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
        _direction: Direction,
    ) -> Result<bool> {
        Ok(self.known_keys.read().await.get(address).is_none_or(|known| known == identity))
    }

    async fn identity(&self, address: &ProtocolAddress) -> Result<Option<IdentityKey>> {
        Ok(self.known_keys.read().await.get(address).copied())
    }
}

/// In-memory [`SessionStore`].
#[derive(Clone, Default)]
pub struct InMemSessionStore {
    sessions: Arc<RwLock<HashMap<ProtocolAddress, SessionRecord>>>,
}

impl InMemSessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with a stored record.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemSessionStore {
    async fn load_session(&self, address: &ProtocolAddress) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(address).cloned())
    }

    async fn store_session(&mut self, address: &ProtocolAddress, record: &SessionRecord) -> Result<()> {
        self.sessions.write().await.insert(address.clone(), record.clone());
        Ok(())
    }
}

/// In-memory [`PreKeyStore`].
#[derive(Clone, Default)]
pub struct InMemPreKeyStore {
    pre_keys: Arc<RwLock<HashMap<PreKeyId, PreKeyRecord>>>,
}

impl InMemPreKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreKeyStore for InMemPreKeyStore {
    async fn get_pre_key(&self, id: PreKeyId) -> Result<Option<PreKeyRecord>> {
        Ok(self.pre_keys.read().await.get(&id).cloned())
    }

    async fn save_pre_key(&mut self, id: PreKeyId, record: &PreKeyRecord) -> Result<()> {
        self.pre_keys.write().await.insert(id, record.clone());
        Ok(())
    }

    async fn remove_pre_key(&mut self, id: PreKeyId) -> Result<()> {
        self.pre_keys.write().await.remove(&id);
        Ok(())
    }
}

/// In-memory [`SignedPreKeyStore`].
#[derive(Clone, Default)]
pub struct InMemSignedPreKeyStore {
    signed_pre_keys: Arc<RwLock<HashMap<SignedPreKeyId, SignedPreKeyRecord>>>,
}

impl InMemSignedPreKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignedPreKeyStore for InMemSignedPreKeyStore {
    async fn get_signed_pre_key(&self, id: SignedPreKeyId) -> Result<Option<SignedPreKeyRecord>> {
        Ok(self.signed_pre_keys.read().await.get(&id).cloned())
    }

    async fn save_signed_pre_key(&mut self, id: SignedPreKeyId, record: &SignedPreKeyRecord) -> Result<()> {
        self.signed_pre_keys.write().await.insert(id, record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct KyberPreKeys {
    records: HashMap<KyberPreKeyId, KyberPreKeyRecord>,
    base_keys_seen: HashMap<(KyberPreKeyId, SignedPreKeyId), PublicKey>,
    used: HashSet<(KyberPreKeyId, SignedPreKeyId)>,
}

/// In-memory [`KyberPreKeyStore`].
///
/// Kyber pre-keys are last-resort keys and are never removed; the first
/// base key seen for each (Kyber, signed) pair is remembered so a second
/// session reusing the pair is refused.
#[derive(Clone, Default)]
pub struct InMemKyberPreKeyStore {
    inner: Arc<RwLock<KyberPreKeys>>,
}

impl InMemKyberPreKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KyberPreKeyStore for InMemKyberPreKeyStore {
    async fn get_kyber_pre_key(&self, id: KyberPreKeyId) -> Result<Option<KyberPreKeyRecord>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn save_kyber_pre_key(&mut self, id: KyberPreKeyId, record: &KyberPreKeyRecord) -> Result<()> {
        self.inner.write().await.records.insert(id, record.clone());
        Ok(())
    }

    async fn kyber_pre_key_used(&self, id: KyberPreKeyId, signed_id: SignedPreKeyId) -> Result<bool> {
        Ok(self.inner.read().await.used.contains(&(id, signed_id)))
    }

    async fn mark_kyber_pre_key_used(
        &mut self,
        id: KyberPreKeyId,
        signed_id: SignedPreKeyId,
        base_key: &PublicKey,
    ) -> Result<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let seen = inner.base_keys_seen.entry((id, signed_id)).or_insert(*base_key);
        if *seen != *base_key {
            return Err(ProtocolError::DuplicatedKyberPreKeyUsage {
                kyber_pre_key_id: id,
                signed_pre_key_id: signed_id,
            });
        }
        inner.used.insert((id, signed_id));
        Ok(())
    }
}

/// In-memory [`SenderKeyStore`].
#[derive(Clone, Default)]
pub struct InMemSenderKeyStore {
    keys: Arc<RwLock<HashMap<(ProtocolAddress, Uuid), SenderKeyRecord>>>,
}

impl InMemSenderKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SenderKeyStore for InMemSenderKeyStore {
    async fn load_sender_key(
        &self,
        sender: &ProtocolAddress,
        distribution_id: Uuid,
    ) -> Result<Option<SenderKeyRecord>> {
        Ok(self.keys.read().await.get(&(sender.clone(), distribution_id)).cloned())
    }

    async fn store_sender_key(
        &mut self,
        sender: &ProtocolAddress,
        distribution_id: Uuid,
        record: &SenderKeyRecord,
    ) -> Result<()> {
        self.keys.write().await.insert((sender.clone(), distribution_id), record.clone());
        Ok(())
    }
}

/// All six in-memory stores for one local device.
#[derive(Clone)]
pub struct InMemProtocolStore {
    /// Sessions
    pub session_store: InMemSessionStore,
    /// One-time pre-keys
    pub pre_key_store: InMemPreKeyStore,
    /// Signed pre-keys
    pub signed_pre_key_store: InMemSignedPreKeyStore,
    /// Kyber pre-keys
    pub kyber_pre_key_store: InMemKyberPreKeyStore,
    /// Local and peer identities
    pub identity_store: InMemIdentityKeyStore,
    /// Sender keys
    pub sender_key_store: InMemSenderKeyStore,
}

impl InMemProtocolStore {
    /// Empty stores for the local identity `key_pair` and `registration_id`.
    pub fn new(key_pair: IdentityKeyPair, registration_id: u32) -> Self {
        Self {
            session_store: InMemSessionStore::new(),
            pre_key_store: InMemPreKeyStore::new(),
            signed_pre_key_store: InMemSignedPreKeyStore::new(),
            kyber_pre_key_store: InMemKyberPreKeyStore::new(),
            identity_store: InMemIdentityKeyStore::new(key_pair, registration_id),
            sender_key_store: InMemSenderKeyStore::new(),
        }
    }
}
