//! Group message encryption using `XChaCha20-Poly1305`
//!
//! Key and nonce both come from the per-iteration message key, so the
//! functions are pure and need no randomness.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use super::{error::SenderKeyError, ratchet::SenderMessageKey};

/// Encrypt a group message under `message_key`.
pub fn encrypt_sender_message(plaintext: &[u8], message_key: &SenderMessageKey) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(message_key.cipher_key().into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(message_key.nonce()), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    ciphertext
}

/// Decrypt a group message under `message_key`.
///
/// # Errors
///
/// - `DecryptionFailed`: If authentication tag or key is incorrect (tamper)
pub fn decrypt_sender_message(
    ciphertext: &[u8],
    message_key: &SenderMessageKey,
) -> Result<Vec<u8>, SenderKeyError> {
    let cipher = XChaCha20Poly1305::new(message_key.cipher_key().into());

    cipher.decrypt(XNonce::from_slice(message_key.nonce()), ciphertext).map_err(|_| {
        SenderKeyError::DecryptionFailed {
            reason: format!("authentication failed at iteration {}", message_key.iteration()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{super::ratchet::SenderChainKey, *};

    fn test_message_key(iteration: u32) -> SenderMessageKey {
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = (i + iteration as usize) as u8;
        }
        SenderChainKey::new(iteration, seed).sender_message_key()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let message_key = test_message_key(0);
        let plaintext = b"Hello, World!";

        let ciphertext = encrypt_sender_message(plaintext, &message_key);
        let decrypted = decrypt_sender_message(&ciphertext, &message_key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn encrypt_decrypt_empty_message() {
        let message_key = test_message_key(0);

        let ciphertext = encrypt_sender_message(b"", &message_key);
        let decrypted = decrypt_sender_message(&ciphertext, &message_key).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn encrypt_decrypt_large_message() {
        let message_key = test_message_key(9);
        let plaintext = vec![0x42u8; 64 * 1024]; // 64KB

        let ciphertext = encrypt_sender_message(&plaintext, &message_key);
        let decrypted = decrypt_sender_message(&ciphertext, &message_key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let ciphertext = encrypt_sender_message(b"secret", &test_message_key(1));
        let result = decrypt_sender_message(&ciphertext, &test_message_key(2));

        assert!(matches!(result, Err(SenderKeyError::DecryptionFailed { .. })));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let message_key = test_message_key(4);
        let mut ciphertext = encrypt_sender_message(b"secret", &message_key);
        ciphertext[0] ^= 0xFF;

        assert!(decrypt_sender_message(&ciphertext, &message_key).is_err());
    }
}
