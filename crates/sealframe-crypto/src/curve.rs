//! Curve25519 key pairs
//!
//! One key type serves both Diffie-Hellman agreement (X25519) and
//! signatures (XEdDSA). Public keys serialize with a one-byte type prefix so
//! a different key family can be introduced without ambiguity.

use std::fmt;

use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    xeddsa::{self, SIGNATURE_LENGTH},
};

/// Type byte prefixed to serialized Curve25519 public keys.
pub const DJB_KEY_TYPE: u8 = 0x05;

/// Raw public key length (Montgomery u-coordinate).
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Serialized public key length (type byte + key).
pub const SERIALIZED_PUBLIC_KEY_LENGTH: usize = PUBLIC_KEY_LENGTH + 1;

/// Private key length.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Curve25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    /// Wrap a raw 32-byte u-coordinate.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse the type-prefixed form produced by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Some((&key_type, key)) = bytes.split_first() else {
            return Err(CryptoError::InvalidKeyLength {
                expected: SERIALIZED_PUBLIC_KEY_LENGTH,
                actual: 0,
            });
        };

        if key_type != DJB_KEY_TYPE {
            return Err(CryptoError::UnknownKeyType(key_type));
        }

        let raw: [u8; PUBLIC_KEY_LENGTH] =
            key.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: SERIALIZED_PUBLIC_KEY_LENGTH,
                actual: bytes.len(),
            })?;

        Ok(Self(raw))
    }

    /// Type-prefixed 33-byte encoding.
    pub fn serialize(&self) -> [u8; SERIALIZED_PUBLIC_KEY_LENGTH] {
        let mut out = [0u8; SERIALIZED_PUBLIC_KEY_LENGTH];
        out[0] = DJB_KEY_TYPE;
        out[1..].copy_from_slice(&self.0);
        out
    }

    /// Raw u-coordinate.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Verify an XEdDSA signature made by the matching private key.
    ///
    /// Returns `false` for malformed signatures rather than an error.
    pub fn verify_signature(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = <&[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
            return false;
        };
        xeddsa::verify(&self.0, message, signature)
    }
}

impl ConstantTimeEq for PublicKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Curve25519 private key.
#[derive(Clone)]
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    /// Generate a fresh private key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(StaticSecret::random_from_rng(rng))
    }

    /// Wrap raw private key bytes.
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_LENGTH]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Parse a 32-byte private key.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut raw: [u8; PRIVATE_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_LENGTH,
                actual: bytes.len(),
            })?;
        let key = Self::from_bytes(raw);
        raw.zeroize();
        Ok(key)
    }

    /// Raw private key bytes. Callers own zeroizing the copy.
    pub fn serialize(&self) -> [u8; PRIVATE_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(X25519PublicKey::from(&self.0).to_bytes())
    }

    /// X25519 shared secret with `their_key`.
    pub fn calculate_agreement(&self, their_key: &PublicKey) -> [u8; 32] {
        self.0.diffie_hellman(&X25519PublicKey::from(their_key.0)).to_bytes()
    }

    /// XEdDSA signature over `message`.
    pub fn calculate_signature<R: RngCore + CryptoRng>(
        &self,
        message: &[u8],
        rng: &mut R,
    ) -> [u8; SIGNATURE_LENGTH] {
        let mut random = [0u8; 64];
        rng.fill_bytes(&mut random);
        let mut secret = self.0.to_bytes();
        let signature = xeddsa::sign(&secret, message, &random);
        secret.zeroize();
        random.zeroize();
        signature
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Curve25519 key pair.
#[derive(Clone, Debug)]
pub struct KeyPair {
    /// Public half
    pub public_key: PublicKey,
    /// Private half
    pub private_key: PrivateKey,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_private_key(PrivateKey::generate(rng))
    }

    /// Derive the key pair for an existing private key.
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        Self { public_key: private_key.public_key(), private_key }
    }

    /// X25519 shared secret with `their_key`.
    pub fn calculate_agreement(&self, their_key: &PublicKey) -> [u8; 32] {
        self.private_key.calculate_agreement(their_key)
    }

    /// XEdDSA signature over `message`.
    pub fn calculate_signature<R: RngCore + CryptoRng>(
        &self,
        message: &[u8],
        rng: &mut R,
    ) -> [u8; SIGNATURE_LENGTH] {
        self.private_key.calculate_signature(message, rng)
    }
}
