//! Store contracts
//!
//! Reads take `&self`, writes take `&mut self`: a single store handle drives
//! at most one mutating operation at a time. Hosts sharing stores between
//! tasks serialize per address with [`AddressLocks`](super::AddressLocks).

use async_trait::async_trait;
use sealframe_crypto::{IdentityKey, IdentityKeyPair, PublicKey};
use sealframe_proto::{KyberPreKeyId, PreKeyId, ProtocolAddress, SignedPreKeyId};
use uuid::Uuid;

use crate::{
    error::Result,
    state::{KyberPreKeyRecord, PreKeyRecord, SenderKeyRecord, SessionRecord, SignedPreKeyRecord},
};

/// Direction a trust decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// We are about to encrypt to the identity
    Sending,
    /// We received a message from the identity
    Receiving,
}

/// Outcome of saving a peer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityChange {
    /// First identity for the address, or the same as before
    NewOrUnchanged,
    /// A different identity was stored before and has been replaced
    ReplacedExisting,
}

/// Our identity and the identities of our peers.
#[async_trait]
pub trait IdentityKeyStore: Send + Sync {
    /// Our identity key pair.
    async fn identity_key_pair(&self) -> Result<IdentityKeyPair>;

    /// Our registration id.
    async fn local_registration_id(&self) -> Result<u32>;

    /// Record `identity` as the identity of `address`.
    async fn save_identity(
        &mut self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> Result<IdentityChange>;

    /// Whether `identity` is trusted for `address` in `direction`.
    async fn is_trusted_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
        direction: Direction,
    ) -> Result<bool>;

    /// Stored identity of `address`, if any.
    async fn identity(&self, address: &ProtocolAddress) -> Result<Option<IdentityKey>>;
}

/// Session records keyed by peer address.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Session record for `address`, if any.
    async fn load_session(&self, address: &ProtocolAddress) -> Result<Option<SessionRecord>>;

    /// Replace the session record for `address`.
    async fn store_session(&mut self, address: &ProtocolAddress, record: &SessionRecord) -> Result<()>;
}

/// One-time pre-keys.
#[async_trait]
pub trait PreKeyStore: Send + Sync {
    /// Pre-key `id`, if present.
    async fn get_pre_key(&self, id: PreKeyId) -> Result<Option<PreKeyRecord>>;

    /// Store pre-key `id`.
    async fn save_pre_key(&mut self, id: PreKeyId, record: &PreKeyRecord) -> Result<()>;

    /// Remove pre-key `id`; removing an absent key is not an error.
    async fn remove_pre_key(&mut self, id: PreKeyId) -> Result<()>;
}

/// Signed pre-keys.
#[async_trait]
pub trait SignedPreKeyStore: Send + Sync {
    /// Signed pre-key `id`, if present.
    async fn get_signed_pre_key(&self, id: SignedPreKeyId) -> Result<Option<SignedPreKeyRecord>>;

    /// Store signed pre-key `id`.
    async fn save_signed_pre_key(&mut self, id: SignedPreKeyId, record: &SignedPreKeyRecord) -> Result<()>;
}

/// Kyber pre-keys and their usage log.
#[async_trait]
pub trait KyberPreKeyStore: Send + Sync {
    /// Kyber pre-key `id`, if present.
    async fn get_kyber_pre_key(&self, id: KyberPreKeyId) -> Result<Option<KyberPreKeyRecord>>;

    /// Store Kyber pre-key `id`.
    async fn save_kyber_pre_key(&mut self, id: KyberPreKeyId, record: &KyberPreKeyRecord) -> Result<()>;

    /// Whether Kyber pre-key `id` has been used with signed pre-key `signed_id`.
    async fn kyber_pre_key_used(&self, id: KyberPreKeyId, signed_id: SignedPreKeyId) -> Result<bool>;

    /// Record that `id` was used with `signed_id` by a session based on
    /// `base_key`.
    ///
    /// Marking again with the same base key succeeds without change; a
    /// different base key for the same pair fails with
    /// [`DuplicatedKyberPreKeyUsage`](crate::ProtocolError::DuplicatedKyberPreKeyUsage).
    async fn mark_kyber_pre_key_used(
        &mut self,
        id: KyberPreKeyId,
        signed_id: SignedPreKeyId,
        base_key: &PublicKey,
    ) -> Result<()>;
}

/// Sender-key records keyed by (sender address, distribution id).
#[async_trait]
pub trait SenderKeyStore: Send + Sync {
    /// Record for `sender` in `distribution_id`, if any.
    async fn load_sender_key(
        &self,
        sender: &ProtocolAddress,
        distribution_id: Uuid,
    ) -> Result<Option<SenderKeyRecord>>;

    /// Replace the record for `sender` in `distribution_id`.
    async fn store_sender_key(
        &mut self,
        sender: &ProtocolAddress,
        distribution_id: Uuid,
        record: &SenderKeyRecord,
    ) -> Result<()>;
}
