//! Long-term identity keys

use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use crate::{
    curve::{KeyPair, PRIVATE_KEY_LENGTH, PrivateKey, PublicKey, SERIALIZED_PUBLIC_KEY_LENGTH},
    error::CryptoError,
    xeddsa::SIGNATURE_LENGTH,
};

/// Public identity key of an account or device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(PublicKey);

impl IdentityKey {
    /// Wrap a public key as an identity key.
    pub fn new(public_key: PublicKey) -> Self {
        Self(public_key)
    }

    /// Underlying public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    /// Type-prefixed encoding.
    pub fn serialize(&self) -> [u8; SERIALIZED_PUBLIC_KEY_LENGTH] {
        self.0.serialize()
    }

    /// Parse the type-prefixed encoding.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        PublicKey::deserialize(bytes).map(Self)
    }
}

impl From<PublicKey> for IdentityKey {
    fn from(public_key: PublicKey) -> Self {
        Self(public_key)
    }
}

impl ConstantTimeEq for IdentityKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

/// Identity key together with its private half.
#[derive(Clone, Debug)]
pub struct IdentityKeyPair {
    identity_key: IdentityKey,
    private_key: PrivateKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        KeyPair::generate(rng).into()
    }

    /// Assemble from parts. The caller guarantees they match.
    pub fn new(identity_key: IdentityKey, private_key: PrivateKey) -> Self {
        Self { identity_key, private_key }
    }

    /// Public identity key.
    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    /// Public identity key as a plain public key.
    pub fn public_key(&self) -> &PublicKey {
        self.identity_key.public_key()
    }

    /// Private identity key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Sign with the identity key.
    pub fn sign<R: RngCore + CryptoRng>(
        &self,
        message: &[u8],
        rng: &mut R,
    ) -> [u8; SIGNATURE_LENGTH] {
        self.private_key.calculate_signature(message, rng)
    }

    /// Public key followed by the raw private key.
    pub fn serialize(&self) -> Vec<u8> {
        let mut private = self.private_key.serialize();
        let mut out = Vec::with_capacity(SERIALIZED_PUBLIC_KEY_LENGTH + PRIVATE_KEY_LENGTH);
        out.extend_from_slice(&self.identity_key.serialize());
        out.extend_from_slice(&private);
        private.zeroize();
        out
    }

    /// Parse the form produced by [`serialize`](Self::serialize).
    ///
    /// The public half is recomputed from the private key and must match.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SERIALIZED_PUBLIC_KEY_LENGTH + PRIVATE_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: SERIALIZED_PUBLIC_KEY_LENGTH + PRIVATE_KEY_LENGTH,
                actual: bytes.len(),
            });
        }
        let (public, private) = bytes.split_at(SERIALIZED_PUBLIC_KEY_LENGTH);
        let identity_key = IdentityKey::deserialize(public)?;
        let private_key = PrivateKey::deserialize(private)?;

        if private_key.public_key() != *identity_key.public_key() {
            return Err(CryptoError::InvalidPublicKey);
        }

        Ok(Self { identity_key, private_key })
    }
}

impl From<KeyPair> for IdentityKeyPair {
    fn from(pair: KeyPair) -> Self {
        Self { identity_key: IdentityKey(pair.public_key), private_key: pair.private_key }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn identity_key_pair_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let pair = IdentityKeyPair::generate(&mut rng);
        let restored = IdentityKeyPair::deserialize(&pair.serialize()).unwrap();
        assert_eq!(restored.identity_key(), pair.identity_key());
    }

    #[test]
    fn deserialize_rejects_mismatched_halves() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let first = IdentityKeyPair::generate(&mut rng);
        let second = IdentityKeyPair::generate(&mut rng);

        let mut bytes = first.identity_key().serialize().to_vec();
        bytes.extend_from_slice(&second.private_key().serialize());

        assert_eq!(IdentityKeyPair::deserialize(&bytes).unwrap_err(), CryptoError::InvalidPublicKey);
    }

    #[test]
    fn identity_signature_verifies() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let pair = IdentityKeyPair::generate(&mut rng);
        let signature = pair.sign(b"certificate", &mut rng);
        assert!(pair.public_key().verify_signature(b"certificate", &signature));
    }
}
