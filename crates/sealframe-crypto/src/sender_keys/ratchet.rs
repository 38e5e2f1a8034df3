//! Sender chain for forward-secure group message keys
//!
//! # Security Properties
//!
//! - Forward Secrecy: the chain only moves forward; earlier seeds are not
//!   recoverable from later ones
//! - Key Uniqueness: each iteration produces a unique key and nonce
//! - Determinism: same seed always produces same key sequence

use zeroize::Zeroize;

use super::error::SenderKeyError;
use crate::kdf::{hkdf_sha256, hmac_sha256};

/// Input for deriving a message key seed
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// Input for deriving the next chain seed
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// HKDF info for expanding a message key seed
const SENDER_KEY_INFO: &[u8] = b"Sealframe_SenderKey";

/// A message key derived from the sender chain.
///
/// Protects a single group message. Receivers may keep the seed of a
/// skipped iteration and rebuild the key later with
/// [`from_seed`](Self::from_seed).
#[derive(Clone)]
pub struct SenderMessageKey {
    iteration: u32,
    seed: [u8; 32],
    /// 32-byte key for XChaCha20-Poly1305
    cipher_key: [u8; 32],
    /// 24-byte XChaCha20 nonce
    nonce: [u8; 24],
}

impl SenderMessageKey {
    /// Rebuild the key for `iteration` from its stored seed.
    pub fn from_seed(iteration: u32, seed: [u8; 32]) -> Self {
        let mut okm: [u8; 56] = hkdf_sha256(None, &seed, SENDER_KEY_INFO);

        let mut cipher_key = [0u8; 32];
        let mut nonce = [0u8; 24];
        cipher_key.copy_from_slice(&okm[..32]);
        nonce.copy_from_slice(&okm[32..]);
        okm.zeroize();

        Self { iteration, seed, cipher_key, nonce }
    }

    /// Chain iteration this key was derived from.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Seed the key material expands from.
    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    /// 32-byte symmetric key for XChaCha20-Poly1305.
    pub fn cipher_key(&self) -> &[u8; 32] {
        &self.cipher_key
    }

    /// 24-byte nonce for XChaCha20-Poly1305.
    pub fn nonce(&self) -> &[u8; 24] {
        &self.nonce
    }
}

impl Drop for SenderMessageKey {
    fn drop(&mut self) {
        self.seed.zeroize();
        self.cipher_key.zeroize();
    }
}

/// Position in a sender chain: iteration plus the chain seed.
#[derive(Clone)]
pub struct SenderChainKey {
    iteration: u32,
    seed: [u8; 32],
}

impl SenderChainKey {
    /// Chain at `iteration` with the given seed.
    pub fn new(iteration: u32, seed: [u8; 32]) -> Self {
        Self { iteration, seed }
    }

    /// Current iteration.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Current chain seed.
    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    /// Message key for the current iteration.
    pub fn sender_message_key(&self) -> SenderMessageKey {
        SenderMessageKey::from_seed(self.iteration, hmac_sha256(&self.seed, &[MESSAGE_KEY_SEED]))
    }

    /// Chain key for the next iteration.
    pub fn next(&self) -> Result<Self, SenderKeyError> {
        let iteration = self
            .iteration
            .checked_add(1)
            .ok_or(SenderKeyError::IterationOverflow { current: self.iteration })?;
        Ok(Self { iteration, seed: hmac_sha256(&self.seed, &[CHAIN_KEY_SEED]) })
    }
}

impl Drop for SenderChainKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}
