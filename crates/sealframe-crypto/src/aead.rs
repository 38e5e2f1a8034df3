//! ChaCha20-Poly1305 helpers for session and sealed sender payloads

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::error::CryptoError;

/// Poly1305 tag size appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Nonce size for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Encrypt `plaintext` with associated data `aad`.
///
/// A (key, nonce) pair must never be reused. Callers in this workspace use
/// single-use derived keys, which makes a fixed nonce safe.
pub fn aead_encrypt(key: &[u8; 32], nonce: &[u8; NONCE_SIZE], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    ciphertext
}

/// Decrypt and authenticate `ciphertext` with associated data `aad`.
pub fn aead_decrypt(
    key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AeadFailure)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = [7u8; 32];
        let nonce = [0u8; NONCE_SIZE];
        let mut ciphertext = aead_encrypt(&key, &nonce, b"hello", b"");
        ciphertext[0] ^= 0x80;
        assert_eq!(aead_decrypt(&key, &nonce, &ciphertext, b""), Err(CryptoError::AeadFailure));
    }

    #[test]
    fn wrong_associated_data_is_rejected() {
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_SIZE];
        let ciphertext = aead_encrypt(&key, &nonce, b"hello", b"header-a");
        assert!(aead_decrypt(&key, &nonce, &ciphertext, b"header-b").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_ciphertext_carries_tag(
            key in any::<[u8; 32]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let nonce = [0u8; NONCE_SIZE];
            let ciphertext = aead_encrypt(&key, &nonce, &plaintext, b"");
            prop_assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
            prop_assert_eq!(aead_decrypt(&key, &nonce, &ciphertext, b"").unwrap(), plaintext);
        }
    }
}
