//! Sealframe Cryptographic Primitives
//!
//! Cryptographic building blocks for Sealframe: Curve25519 keys with XEdDSA
//! signatures, ML-KEM-1024 ("Kyber") encapsulation keys, HKDF/HMAC chain
//! steps for the double ratchet and sender keys, and AEAD helpers.
//!
//! Functions that need randomness take the RNG as an argument so callers
//! can drive them deterministically in tests. The one exception is ML-KEM,
//! whose backend draws from the operating system.
//!
//! # Key Lifecycle
//!
//! ```text
//! PQXDH shared secret
//!        │
//!        ▼
//! HKDF → Root Key ──DH ratchet step──► Root Key' + Chain Key
//!                                            │
//!                                            ▼
//!                          HMAC chain step → Message Keys
//!                                            │
//!                                            ▼
//!                          ChaCha20-Poly1305 → Ciphertext
//! ```
//!
//! Group messages use a separate per-sender chain:
//!
//! ```text
//! Sender Chain Key (iteration, seed)
//!        │
//!        ├── HMAC(seed, 0x02) → next Sender Chain Key
//!        ▼
//! HMAC(seed, 0x01) → HKDF → XChaCha20-Poly1305 key + nonce
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are replaced by their successor after every step
//! - Message keys are used for a single message and zeroized on drop
//!
//! Authenticity:
//! - Identity keys sign pre-keys and certificates with XEdDSA
//! - AEAD tag failure rejects the message

#![forbid(unsafe_code)]

pub mod aead;
pub mod chain;
pub mod curve;
pub mod error;
pub mod identity;
pub mod kdf;
pub mod kem;
pub mod sender_keys;
pub mod xeddsa;

pub use chain::{ChainKey, MessageKeys, RootKey};
pub use curve::{KeyPair, PrivateKey, PublicKey};
pub use error::CryptoError;
pub use identity::{IdentityKey, IdentityKeyPair};
pub use kem::{KemKeyPair, KemPublicKey, KemSecretKey};
pub use sender_keys::{
    SenderChainKey, SenderKeyError, SenderMessageKey, decrypt_sender_message,
    encrypt_sender_message,
};
pub use xeddsa::SIGNATURE_LENGTH;
