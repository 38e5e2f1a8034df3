//! Locally held pre-key records

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{IdentityKeyPair, KemKeyPair, KeyPair, PrivateKey, PublicKey};
use sealframe_proto::{KyberPreKeyId, PreKeyId, SignedPreKeyId};
use serde::{Deserialize, Serialize};

use super::{from_cbor, to_cbor};
use crate::{error::Result, timestamp::Timestamp};

/// One-time pre-key: consumed by the first session that uses it.
#[derive(Clone, Serialize, Deserialize)]
pub struct PreKeyRecord {
    id: PreKeyId,
    private_key: [u8; 32],
}

impl PreKeyRecord {
    /// Record for an existing key pair.
    pub fn new(id: PreKeyId, key_pair: &KeyPair) -> Self {
        Self { id, private_key: key_pair.private_key.serialize() }
    }

    /// Generate a fresh one-time pre-key.
    pub fn generate<R: RngCore + CryptoRng>(id: PreKeyId, rng: &mut R) -> Self {
        Self::new(id, &KeyPair::generate(rng))
    }

    /// Pre-key id.
    pub fn id(&self) -> PreKeyId {
        self.id
    }

    /// Key pair.
    pub fn key_pair(&self) -> KeyPair {
        KeyPair::from_private_key(PrivateKey::from_bytes(self.private_key))
    }

    /// Public half, as published in bundles.
    pub fn public_key(&self) -> PublicKey {
        self.key_pair().public_key
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

/// Medium-term pre-key signed by the identity key.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignedPreKeyRecord {
    id: SignedPreKeyId,
    timestamp: Timestamp,
    private_key: [u8; 32],
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
}

impl SignedPreKeyRecord {
    /// Record for an existing key pair and signature.
    pub fn new(id: SignedPreKeyId, timestamp: Timestamp, key_pair: &KeyPair, signature: &[u8]) -> Self {
        Self {
            id,
            timestamp,
            private_key: key_pair.private_key.serialize(),
            signature: signature.to_vec(),
        }
    }

    /// Generate a key pair and sign its public key with `identity`.
    pub fn generate<R: RngCore + CryptoRng>(
        id: SignedPreKeyId,
        timestamp: Timestamp,
        identity: &IdentityKeyPair,
        rng: &mut R,
    ) -> Self {
        let key_pair = KeyPair::generate(rng);
        let signature = identity.sign(&key_pair.public_key.serialize(), rng);
        Self::new(id, timestamp, &key_pair, &signature)
    }

    /// Signed pre-key id.
    pub fn id(&self) -> SignedPreKeyId {
        self.id
    }

    /// Creation time.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Key pair.
    pub fn key_pair(&self) -> KeyPair {
        KeyPair::from_private_key(PrivateKey::from_bytes(self.private_key))
    }

    /// Public half.
    pub fn public_key(&self) -> PublicKey {
        self.key_pair().public_key
    }

    /// Identity signature over the serialized public key.
    pub fn signature(&self) -> &[u8] {
        &self.signature
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

/// ML-KEM-1024 pre-key signed by the identity key.
#[derive(Clone, Serialize, Deserialize)]
pub struct KyberPreKeyRecord {
    id: KyberPreKeyId,
    timestamp: Timestamp,
    #[serde(with = "serde_bytes")]
    public_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    secret_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
}

impl KyberPreKeyRecord {
    /// Record for an existing key pair and signature.
    pub fn new(id: KyberPreKeyId, timestamp: Timestamp, key_pair: &KemKeyPair, signature: &[u8]) -> Self {
        Self {
            id,
            timestamp,
            public_key: key_pair.public_key.serialize(),
            secret_key: key_pair.secret_key.serialize(),
            signature: signature.to_vec(),
        }
    }

    /// Generate a key pair and sign its public key with `identity`.
    pub fn generate<R: RngCore + CryptoRng>(
        id: KyberPreKeyId,
        timestamp: Timestamp,
        identity: &IdentityKeyPair,
        rng: &mut R,
    ) -> Self {
        let key_pair = KemKeyPair::generate();
        let signature = identity.sign(&key_pair.public_key.serialize(), rng);
        Self::new(id, timestamp, &key_pair, &signature)
    }

    /// Kyber pre-key id.
    pub fn id(&self) -> KyberPreKeyId {
        self.id
    }

    /// Creation time.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Key pair, validated on reconstruction.
    pub fn key_pair(&self) -> Result<KemKeyPair> {
        Ok(KemKeyPair::from_parts(&self.public_key, &self.secret_key)?)
    }

    /// Serialized (type-prefixed) public key.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    /// Identity signature over the serialized public key.
    pub fn signature(&self) -> &[u8] {
        &self.signature
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
