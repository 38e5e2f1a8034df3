//! Property-based tests for message encoding
//!
//! Parsers face untrusted bytes: they must never panic, and every message
//! they accept must reproduce its exact wire bytes. MACs and signatures
//! must reject any single-byte modification.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sealframe_crypto::{IdentityKeyPair, KeyPair};
use sealframe_proto::{
    CiphertextMessage, CiphertextMessageType, KyberPreKeyId, PreKeyId, PreKeySignalMessage,
    SealedSenderV2ReceivedMessage, SealedSenderV2SentMessage, SenderKeyDistributionMessage,
    SenderKeyMessage, SignalMessage, SignedPreKeyId,
};
use uuid::Uuid;

fn identities() -> (IdentityKeyPair, IdentityKeyPair) {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    (IdentityKeyPair::generate(&mut rng), IdentityKeyPair::generate(&mut rng))
}

fn signal_message(ciphertext: Vec<u8>, counter: u32) -> SignalMessage {
    let (alice, bob) = identities();
    let ratchet = KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(2)).public_key;
    SignalMessage::new(
        &[7u8; 32],
        ratchet,
        counter,
        counter.saturating_sub(1),
        ciphertext,
        alice.identity_key(),
        bob.identity_key(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_parsers_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = CiphertextMessage::deserialize(&bytes);
        let _ = SenderKeyDistributionMessage::deserialize(&bytes);
        let _ = SealedSenderV2SentMessage::parse(&bytes);
        let _ = SealedSenderV2ReceivedMessage::deserialize(&bytes);
    }

    #[test]
    fn prop_signal_message_reparses_to_same_bytes(
        ciphertext in prop::collection::vec(any::<u8>(), 0..128),
        counter in any::<u32>(),
    ) {
        let message = signal_message(ciphertext.clone(), counter);
        let parsed = SignalMessage::deserialize(message.serialized())?;

        prop_assert_eq!(parsed.serialized(), message.serialized());
        prop_assert_eq!(parsed.counter(), counter);
        prop_assert_eq!(parsed.body(), &ciphertext[..]);
    }

    #[test]
    fn prop_signal_mac_detects_tampering(index in any::<prop::sample::Index>(), flip in 1u8..) {
        let (alice, bob) = identities();
        let message = signal_message(b"hello".to_vec(), 3);

        let mut bytes = message.serialized().to_vec();
        let position = index.index(bytes.len());
        bytes[position] ^= flip;

        if let Ok(parsed) = SignalMessage::deserialize(&bytes) {
            prop_assert!(!parsed.verify_mac(alice.identity_key(), bob.identity_key(), &[7u8; 32]));
        }
    }
}

#[test]
fn signal_mac_binds_identities() {
    let (alice, bob) = identities();
    let message = signal_message(b"hi".to_vec(), 0);

    assert!(message.verify_mac(alice.identity_key(), bob.identity_key(), &[7u8; 32]));
    assert!(!message.verify_mac(bob.identity_key(), alice.identity_key(), &[7u8; 32]));
    assert!(!message.verify_mac(alice.identity_key(), bob.identity_key(), &[8u8; 32]));
}

#[test]
fn prekey_message_dispatches_by_type() {
    let (alice, _) = identities();
    let base_key = KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(3)).public_key;
    let inner = signal_message(b"first".to_vec(), 0);

    let message = PreKeySignalMessage::new(
        0x1234,
        Some(PreKeyId::from(9)),
        SignedPreKeyId::from(5),
        KyberPreKeyId::from(11),
        vec![1, 2, 3],
        base_key,
        *alice.identity_key(),
        inner.clone(),
    )
    .unwrap();

    let parsed = CiphertextMessage::deserialize(message.serialized()).unwrap();
    assert_eq!(parsed.message_type(), CiphertextMessageType::PreKey);
    let CiphertextMessage::PreKey(parsed) = parsed else {
        panic!("expected a pre-key message");
    };
    assert_eq!(parsed.registration_id(), 0x1234);
    assert_eq!(parsed.pre_key_id(), Some(PreKeyId::from(9)));
    assert_eq!(u32::from(parsed.signed_pre_key_id()), 5);
    assert_eq!(parsed.kyber_ciphertext(), &[1, 2, 3]);
    assert_eq!(parsed.base_key(), &base_key);
    assert_eq!(parsed.message(), &inner);
}

#[test]
fn sender_key_message_signature() {
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let signing = KeyPair::generate(&mut rng);
    let other = KeyPair::generate(&mut rng);
    let distribution_id = Uuid::from_bytes([3; 16]);

    let message =
        SenderKeyMessage::new(distribution_id, 42, 7, b"group".to_vec(), &signing.private_key, &mut rng)
            .unwrap();
    let parsed = SenderKeyMessage::deserialize(message.serialized()).unwrap();

    assert_eq!(parsed.distribution_id(), distribution_id);
    assert_eq!(parsed.chain_id(), 42);
    assert_eq!(parsed.iteration(), 7);
    assert!(parsed.verify_signature(&signing.public_key));
    assert!(!parsed.verify_signature(&other.public_key));

    let mut tampered = message.serialized().to_vec();
    tampered[3] ^= 0x01;
    if let Ok(tampered) = SenderKeyMessage::deserialize(&tampered) {
        assert!(!tampered.verify_signature(&signing.public_key));
    }
}

#[test]
fn distribution_message_round_trip() {
    let signing = KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(5)).public_key;
    let message =
        SenderKeyDistributionMessage::new(Uuid::from_bytes([8; 16]), 1, 0, [9; 32], signing).unwrap();

    let parsed = SenderKeyDistributionMessage::deserialize(message.serialized()).unwrap();
    assert_eq!(parsed, message);
    assert_eq!(parsed.chain_key(), &[9; 32]);
    assert_eq!(parsed.signing_key(), &signing);
}

#[test]
fn distribution_message_is_not_a_ciphertext_message() {
    let signing = KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(6)).public_key;
    let message =
        SenderKeyDistributionMessage::new(Uuid::nil(), 1, 0, [0; 32], signing).unwrap();
    assert!(CiphertextMessage::deserialize(message.serialized()).is_err());
}
