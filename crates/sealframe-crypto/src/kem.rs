//! ML-KEM-1024 ("Kyber") encapsulation keys
//!
//! Used for the post-quantum share of session establishment. The backend
//! draws randomness from the operating system, so key generation and
//! encapsulation are not reproducible from a seeded RNG.

use std::fmt;

use pqcrypto_mlkem::mlkem1024;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Type byte prefixed to serialized ML-KEM-1024 public keys.
pub const KYBER_1024_KEY_TYPE: u8 = 0x08;

/// Shared secret length produced by encapsulation.
pub const SHARED_SECRET_LENGTH: usize = 32;

/// ML-KEM-1024 public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KemPublicKey(Vec<u8>);

impl KemPublicKey {
    /// Type-prefixed encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        out.push(KYBER_1024_KEY_TYPE);
        out.extend_from_slice(&self.0);
        out
    }

    /// Parse the type-prefixed encoding.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Some((&key_type, key)) = bytes.split_first() else {
            return Err(CryptoError::Kem { reason: "empty public key".to_string() });
        };
        if key_type != KYBER_1024_KEY_TYPE {
            return Err(CryptoError::UnknownKeyType(key_type));
        }
        mlkem1024::PublicKey::from_bytes(key).map_err(kem_error)?;
        Ok(Self(key.to_vec()))
    }

    /// Encapsulate a fresh shared secret to this key.
    ///
    /// Returns the shared secret and the ciphertext for the key holder.
    pub fn encapsulate(&self) -> Result<([u8; SHARED_SECRET_LENGTH], Vec<u8>), CryptoError> {
        let public_key = mlkem1024::PublicKey::from_bytes(&self.0).map_err(kem_error)?;
        let (shared_secret, ciphertext) = mlkem1024::encapsulate(&public_key);
        Ok((copy_secret(shared_secret.as_bytes())?, ciphertext.as_bytes().to_vec()))
    }
}

impl fmt::Debug for KemPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KemPublicKey({} bytes)", self.0.len())
    }
}

/// ML-KEM-1024 secret key.
#[derive(Clone)]
pub struct KemSecretKey(Vec<u8>);

impl KemSecretKey {
    /// Raw secret key bytes.
    pub fn serialize(&self) -> Vec<u8> {
        self.0.clone()
    }

    /// Parse raw secret key bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        mlkem1024::SecretKey::from_bytes(bytes).map_err(kem_error)?;
        Ok(Self(bytes.to_vec()))
    }

    /// Recover the shared secret from a ciphertext.
    pub fn decapsulate(&self, ciphertext: &[u8]) -> Result<[u8; SHARED_SECRET_LENGTH], CryptoError> {
        let secret_key = mlkem1024::SecretKey::from_bytes(&self.0).map_err(kem_error)?;
        let ciphertext = mlkem1024::Ciphertext::from_bytes(ciphertext).map_err(kem_error)?;
        let shared_secret = mlkem1024::decapsulate(&ciphertext, &secret_key);
        copy_secret(shared_secret.as_bytes())
    }
}

impl Drop for KemSecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for KemSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KemSecretKey(..)")
    }
}

/// ML-KEM-1024 key pair.
#[derive(Clone, Debug)]
pub struct KemKeyPair {
    /// Encapsulation key
    pub public_key: KemPublicKey,
    /// Decapsulation key
    pub secret_key: KemSecretKey,
}

impl KemKeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let (public_key, secret_key) = mlkem1024::keypair();
        Self {
            public_key: KemPublicKey(public_key.as_bytes().to_vec()),
            secret_key: KemSecretKey(secret_key.as_bytes().to_vec()),
        }
    }

    /// Reassemble a key pair from serialized halves.
    pub fn from_parts(public_key: &[u8], secret_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            public_key: KemPublicKey::deserialize(public_key)?,
            secret_key: KemSecretKey::deserialize(secret_key)?,
        })
    }
}

fn copy_secret(bytes: &[u8]) -> Result<[u8; SHARED_SECRET_LENGTH], CryptoError> {
    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: SHARED_SECRET_LENGTH,
        actual: bytes.len(),
    })
}

fn kem_error(err: pqcrypto_traits::Error) -> CryptoError {
    CryptoError::Kem { reason: format!("{err:?}") }
}
