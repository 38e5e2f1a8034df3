//! Double ratchet key schedule
//!
//! # Security Properties
//!
//! - Forward Secrecy: a chain step replaces the chain key with its successor
//! - Key Uniqueness: each chain index yields distinct message keys
//! - Determinism: the same root and ratchet keys give the same chains

use zeroize::Zeroize;

use crate::{
    aead::NONCE_SIZE,
    curve::{PrivateKey, PublicKey},
    error::CryptoError,
    kdf::{hkdf_sha256, hmac_sha256},
};

/// Input for deriving a message key seed from a chain key
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// Input for deriving the next chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

const MESSAGE_KEYS_INFO: &[u8] = b"Sealframe_MessageKeys";
const RATCHET_INFO: &[u8] = b"Sealframe_Ratchet";

/// Keys protecting exactly one direct message.
#[derive(Clone)]
pub struct MessageKeys {
    cipher_key: [u8; 32],
    mac_key: [u8; 32],
    nonce: [u8; NONCE_SIZE],
    counter: u32,
}

impl MessageKeys {
    /// Reassemble message keys from stored parts.
    pub fn new(cipher_key: [u8; 32], mac_key: [u8; 32], nonce: [u8; NONCE_SIZE], counter: u32) -> Self {
        Self { cipher_key, mac_key, nonce, counter }
    }

    /// AEAD key.
    pub fn cipher_key(&self) -> &[u8; 32] {
        &self.cipher_key
    }

    /// Key for the envelope MAC.
    pub fn mac_key(&self) -> &[u8; 32] {
        &self.mac_key
    }

    /// AEAD nonce.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Chain index these keys belong to.
    pub fn counter(&self) -> u32 {
        self.counter
    }
}

impl Drop for MessageKeys {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
    }
}

/// Symmetric chain key at a given index.
#[derive(Clone)]
pub struct ChainKey {
    key: [u8; 32],
    index: u32,
}

impl ChainKey {
    /// Chain key `key` positioned at `index`.
    pub fn new(key: [u8; 32], index: u32) -> Self {
        Self { key, index }
    }

    /// Raw chain key.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Position in the chain.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Successor chain key.
    pub fn next(&self) -> Result<Self, CryptoError> {
        let index = self
            .index
            .checked_add(1)
            .ok_or(CryptoError::ChainExhausted { current: self.index })?;
        Ok(Self { key: hmac_sha256(&self.key, &[CHAIN_KEY_SEED]), index })
    }

    /// Message keys for the current index.
    pub fn message_keys(&self) -> MessageKeys {
        let mut seed = hmac_sha256(&self.key, &[MESSAGE_KEY_SEED]);
        let mut okm: [u8; 76] = hkdf_sha256(None, &seed, MESSAGE_KEYS_INFO);
        seed.zeroize();

        let mut cipher_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        let mut nonce = [0u8; NONCE_SIZE];
        cipher_key.copy_from_slice(&okm[..32]);
        mac_key.copy_from_slice(&okm[32..64]);
        nonce.copy_from_slice(&okm[64..]);
        okm.zeroize();

        MessageKeys { cipher_key, mac_key, nonce, counter: self.index }
    }
}

impl Drop for ChainKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Root key of the asymmetric ratchet.
#[derive(Clone)]
pub struct RootKey {
    key: [u8; 32],
}

impl RootKey {
    /// Wrap a raw root key.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Raw root key.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// DH ratchet step: mix `DH(our_ratchet_key, their_ratchet_key)` into
    /// the root and branch a fresh chain at index 0.
    pub fn create_chain(
        &self,
        their_ratchet_key: &PublicKey,
        our_ratchet_key: &PrivateKey,
    ) -> (RootKey, ChainKey) {
        let mut shared = our_ratchet_key.calculate_agreement(their_ratchet_key);
        let mut okm: [u8; 64] = hkdf_sha256(Some(&self.key), &shared, RATCHET_INFO);
        shared.zeroize();

        let mut root = [0u8; 32];
        let mut chain = [0u8; 32];
        root.copy_from_slice(&okm[..32]);
        chain.copy_from_slice(&okm[32..]);
        okm.zeroize();

        (RootKey { key: root }, ChainKey { key: chain, index: 0 })
    }
}

impl Drop for RootKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
