//! Fuzz target for the sender key chain
//!
//! # Strategy
//!
//! - Arbitrary seeds and starting iterations, including the top of the range
//! - Random step sequences with encryptions in between
//! - Tampered ciphertexts and keys from other iterations
//!
//! # Invariants
//!
//! - Iteration increases by exactly one per step and overflow is an error
//! - Derivation is deterministic
//! - Encrypt then decrypt under the same key returns the plaintext
//! - A flipped bit or another iteration's key fails authentication

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_crypto::{SenderChainKey, decrypt_sender_message, encrypt_sender_message};

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: [u8; 32],
    start: u32,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Step,
    Encrypt { plaintext: Vec<u8> },
    Tamper { plaintext: Vec<u8>, position: u16, bit: u8 },
    WrongKey { plaintext: Vec<u8> },
}

fuzz_target!(|scenario: Scenario| {
    let mut chain = SenderChainKey::new(scenario.start, scenario.seed);

    for operation in scenario.operations.into_iter().take(256) {
        match operation {
            Operation::Step => match chain.next() {
                Ok(next) => {
                    assert_eq!(next.iteration(), chain.iteration() + 1);
                    assert_eq!(chain.next().ok().map(|again| *again.seed()), Some(*next.seed()));
                    chain = next;
                },
                Err(_) => assert_eq!(chain.iteration(), u32::MAX),
            },
            Operation::Encrypt { plaintext } => {
                let key = chain.sender_message_key();
                assert_eq!(key.iteration(), chain.iteration());

                let ciphertext = encrypt_sender_message(&plaintext, &key);
                let decrypted = decrypt_sender_message(&ciphertext, &chain.sender_message_key());
                assert_eq!(decrypted.ok(), Some(plaintext));
            },
            Operation::Tamper { plaintext, position, bit } => {
                let key = chain.sender_message_key();
                let mut ciphertext = encrypt_sender_message(&plaintext, &key);
                let index = usize::from(position) % ciphertext.len();
                ciphertext[index] ^= 1 << (bit % 8);
                assert!(decrypt_sender_message(&ciphertext, &key).is_err());
            },
            Operation::WrongKey { plaintext } => {
                let Ok(next) = chain.next() else {
                    continue;
                };
                let ciphertext = encrypt_sender_message(&plaintext, &chain.sender_message_key());
                assert!(decrypt_sender_message(&ciphertext, &next.sender_message_key()).is_err());
            },
        }
    }
});
