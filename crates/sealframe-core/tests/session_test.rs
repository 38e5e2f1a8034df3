//! Pairwise session tests
//!
//! Two [`TestClient`]s establish a session from a pre-key bundle and
//! exchange messages through the public API. Covers:
//! - pre-key message until the first reply, ratchet messages afterwards
//! - out-of-order delivery and replay within the retained window
//! - tampered messages leave the stored session unchanged
//! - one-time pre-key consumption and Kyber pre-key reuse tracking
//! - concurrent encrypts over shared store handles under [`AddressLocks`]

use std::collections::HashSet;

use rand_chacha::ChaCha20Rng;
use sealframe_core::{
    AddressLocks, InMemKyberPreKeyStore, KyberPreKeyStore, PreKeyStore, ProtocolError,
    message_encrypt, process_prekey_bundle,
};
use sealframe_crypto::KeyPair;
use sealframe_harness::{TestClient, seeded_rng};
use sealframe_proto::{
    CiphertextMessage, CiphertextMessageType, KyberPreKeyId, ProtocolAddress, SignedPreKeyId,
};

/// Alice and Bob with a session Bob has acknowledged.
async fn established(seed: u64) -> (TestClient, TestClient, ChaCha20Rng) {
    let mut rng = seeded_rng(seed);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();

    alice.establish_with(&mut bob, &mut rng).await.unwrap();
    let hello = alice.encrypt(bob.address(), b"hello").await.unwrap();
    assert_eq!(bob.decrypt(alice.address(), &hello, &mut rng).await.unwrap(), b"hello");

    let ack = bob.encrypt(alice.address(), b"ack").await.unwrap();
    assert_eq!(alice.decrypt(bob.address(), &ack, &mut rng).await.unwrap(), b"ack");

    (alice, bob, rng)
}

#[tokio::test]
async fn first_message_is_prekey_until_answered() {
    let mut rng = seeded_rng(1);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();
    alice.establish_with(&mut bob, &mut rng).await.unwrap();

    let first = alice.encrypt(bob.address(), b"one").await.unwrap();
    let second = alice.encrypt(bob.address(), b"two").await.unwrap();
    assert_eq!(first.message_type(), CiphertextMessageType::PreKey);
    assert_eq!(second.message_type(), CiphertextMessageType::PreKey);

    assert_eq!(bob.decrypt(alice.address(), &first, &mut rng).await.unwrap(), b"one");
    assert_eq!(bob.decrypt(alice.address(), &second, &mut rng).await.unwrap(), b"two");

    let reply = bob.encrypt(alice.address(), b"three").await.unwrap();
    assert_eq!(reply.message_type(), CiphertextMessageType::Whisper);
    assert_eq!(alice.decrypt(bob.address(), &reply, &mut rng).await.unwrap(), b"three");

    let after = alice.encrypt(bob.address(), b"four").await.unwrap();
    assert_eq!(after.message_type(), CiphertextMessageType::Whisper);
    assert_eq!(bob.decrypt(alice.address(), &after, &mut rng).await.unwrap(), b"four");
}

#[tokio::test]
async fn encrypt_without_session_fails() {
    let mut rng = seeded_rng(2);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let nobody = ProtocolAddress::new("nobody", 1).unwrap();

    let err = alice.encrypt(&nobody, b"hi").await.unwrap_err();
    assert_eq!(err, ProtocolError::SessionNotFound { address: nobody });
}

#[tokio::test]
async fn ratchet_survives_many_turns() {
    let (mut alice, mut bob, mut rng) = established(3).await;

    for round in 0u32..20 {
        let burst = (round % 3) + 1;
        for i in 0..burst {
            let text = format!("alice {round}.{i}");
            let message = alice.encrypt(bob.address(), text.as_bytes()).await.unwrap();
            assert_eq!(bob.decrypt(alice.address(), &message, &mut rng).await.unwrap(), text.as_bytes());
        }

        let text = format!("bob {round}");
        let message = bob.encrypt(alice.address(), text.as_bytes()).await.unwrap();
        assert_eq!(alice.decrypt(bob.address(), &message, &mut rng).await.unwrap(), text.as_bytes());
    }
}

#[tokio::test]
async fn out_of_order_delivery() {
    let (mut alice, mut bob, mut rng) = established(4).await;

    let mut messages = Vec::new();
    for i in 0..5u8 {
        messages.push(alice.encrypt(bob.address(), &[i]).await.unwrap());
    }

    for i in [4usize, 0, 3, 1, 2] {
        let plaintext = bob.decrypt(alice.address(), &messages[i], &mut rng).await.unwrap();
        assert_eq!(plaintext, [u8::try_from(i).unwrap()]);
    }
}

#[tokio::test]
async fn out_of_order_across_ratchet_steps() {
    let (mut alice, mut bob, mut rng) = established(5).await;

    let early = alice.encrypt(bob.address(), b"early").await.unwrap();
    let on_time = alice.encrypt(bob.address(), b"on time").await.unwrap();
    assert_eq!(bob.decrypt(alice.address(), &on_time, &mut rng).await.unwrap(), b"on time");

    let reply = bob.encrypt(alice.address(), b"reply").await.unwrap();
    assert_eq!(alice.decrypt(bob.address(), &reply, &mut rng).await.unwrap(), b"reply");
    let next_chain = alice.encrypt(bob.address(), b"next chain").await.unwrap();
    assert_eq!(bob.decrypt(alice.address(), &next_chain, &mut rng).await.unwrap(), b"next chain");

    assert_eq!(bob.decrypt(alice.address(), &early, &mut rng).await.unwrap(), b"early");
}

#[tokio::test]
async fn replayed_message_decrypts_to_same_plaintext() {
    let (mut alice, mut bob, mut rng) = established(6).await;

    let message = alice.encrypt(bob.address(), b"once").await.unwrap();
    let first = bob.decrypt(alice.address(), &message, &mut rng).await.unwrap();
    let second = bob.decrypt(alice.address(), &message, &mut rng).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn replayed_prekey_message_does_not_need_the_prekey_again() {
    let mut rng = seeded_rng(7);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();
    alice.establish_with(&mut bob, &mut rng).await.unwrap();

    let message = alice.encrypt(bob.address(), b"hello").await.unwrap();
    let CiphertextMessage::PreKey(prekey) = &message else {
        panic!("expected a pre-key message");
    };
    let one_time = prekey.pre_key_id().unwrap();

    assert_eq!(bob.decrypt(alice.address(), &message, &mut rng).await.unwrap(), b"hello");
    assert!(bob.store.pre_key_store.get_pre_key(one_time).await.unwrap().is_none());

    assert_eq!(bob.decrypt(alice.address(), &message, &mut rng).await.unwrap(), b"hello");
}

#[tokio::test]
async fn tampered_mac_leaves_session_unchanged() {
    let (mut alice, mut bob, mut rng) = established(8).await;

    let message = alice.encrypt(bob.address(), b"intact").await.unwrap();
    let mut bytes = message.serialize().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let tampered = CiphertextMessage::deserialize(&bytes).unwrap();

    let before = bob.session_with(alice.address()).await.unwrap().unwrap().serialize().unwrap();
    let err = bob.decrypt(alice.address(), &tampered, &mut rng).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    let after = bob.session_with(alice.address()).await.unwrap().unwrap().serialize().unwrap();
    assert_eq!(before, after);

    assert_eq!(bob.decrypt(alice.address(), &message, &mut rng).await.unwrap(), b"intact");
}

#[tokio::test]
async fn new_session_archives_the_old_one() {
    let (mut alice, mut bob, mut rng) = established(9).await;

    let in_flight = bob.encrypt(alice.address(), b"old session").await.unwrap();

    alice.establish_with(&mut bob, &mut rng).await.unwrap();
    let fresh = alice.encrypt(bob.address(), b"new session").await.unwrap();
    assert_eq!(fresh.message_type(), CiphertextMessageType::PreKey);
    assert_eq!(bob.decrypt(alice.address(), &fresh, &mut rng).await.unwrap(), b"new session");

    assert_eq!(alice.decrypt(bob.address(), &in_flight, &mut rng).await.unwrap(), b"old session");
    let record = alice.session_with(bob.address()).await.unwrap().unwrap();
    assert_eq!(record.previous_session_states().count(), 1);
}

#[tokio::test]
async fn unknown_signed_prekey_is_reported() {
    let mut rng = seeded_rng(10);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();
    let mut stranger = TestClient::new(1, &mut rng).unwrap();

    // Bob never published the pre-keys this bundle names.
    let bundle = stranger.bundle(false, &mut rng).await.unwrap();
    process_prekey_bundle(
        bob.address(),
        &mut alice.store.session_store,
        &mut alice.store.identity_store,
        &bundle,
        &mut rng,
    )
    .await
    .unwrap();
    let message =
        message_encrypt(b"hi", bob.address(), &mut alice.store.session_store, &mut alice.store.identity_store)
            .await
            .unwrap();

    let err = bob.decrypt(alice.address(), &message, &mut rng).await.unwrap_err();
    assert_eq!(err, ProtocolError::InvalidSignedPreKeyId(bundle.signed_pre_key_id()));
    assert!(bob.session_with(alice.address()).await.unwrap().is_none());
}

#[tokio::test]
async fn bundle_with_oversized_registration_id_is_rejected() {
    let mut rng = seeded_rng(11);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::with_registration_id(1, 0x4000, &mut rng).unwrap();

    let err = alice.establish_with(&mut bob, &mut rng).await.unwrap_err();
    assert_eq!(
        err,
        ProtocolError::InvalidRegistrationId { address: bob.address().clone(), registration_id: 0x4000 }
    );
    assert!(alice.session_with(bob.address()).await.unwrap().is_none());
}

#[tokio::test]
async fn kyber_prekey_reuse_tracking() {
    let mut rng = seeded_rng(12);
    let mut store = InMemKyberPreKeyStore::new();
    let id = KyberPreKeyId::from(7);
    let signed = SignedPreKeyId::from(3);
    let first = KeyPair::generate(&mut rng).public_key;
    let second = KeyPair::generate(&mut rng).public_key;

    assert!(!store.kyber_pre_key_used(id, signed).await.unwrap());
    store.mark_kyber_pre_key_used(id, signed, &first).await.unwrap();
    store.mark_kyber_pre_key_used(id, signed, &first).await.unwrap();
    assert!(store.kyber_pre_key_used(id, signed).await.unwrap());

    let err = store.mark_kyber_pre_key_used(id, signed, &second).await.unwrap_err();
    assert_eq!(
        err,
        ProtocolError::DuplicatedKyberPreKeyUsage { kyber_pre_key_id: id, signed_pre_key_id: signed }
    );

    store.mark_kyber_pre_key_used(id, SignedPreKeyId::from(4), &second).await.unwrap();
}

#[tokio::test]
async fn linked_devices_hold_separate_sessions() {
    let mut rng = seeded_rng(13);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();
    let mut bob_tablet = bob.linked_device(2, &mut rng).unwrap();

    alice.establish_with(&mut bob, &mut rng).await.unwrap();
    alice.establish_with(&mut bob_tablet, &mut rng).await.unwrap();

    let to_phone = alice.encrypt(bob.address(), b"phone").await.unwrap();
    let to_tablet = alice.encrypt(bob_tablet.address(), b"tablet").await.unwrap();
    assert_eq!(bob.decrypt(alice.address(), &to_phone, &mut rng).await.unwrap(), b"phone");
    assert_eq!(bob_tablet.decrypt(alice.address(), &to_tablet, &mut rng).await.unwrap(), b"tablet");

    assert!(bob.decrypt(alice.address(), &to_tablet, &mut rng).await.is_err());
    assert_eq!(bob.service_id(), bob_tablet.service_id());
}

#[tokio::test]
async fn concurrent_encrypts_under_address_lock_use_distinct_counters() {
    const SENDERS: usize = 8;

    let (alice, mut bob, mut rng) = established(14).await;
    let locks = AddressLocks::new();

    let mut handles = Vec::with_capacity(SENDERS);
    for i in 0..SENDERS {
        let mut store = alice.store.clone();
        let locks = locks.clone();
        let to = bob.address().clone();
        handles.push(tokio::spawn(async move {
            let _guard = locks.lock(&to).await;
            tokio::task::yield_now().await;
            let plaintext = format!("message {i}");
            message_encrypt(plaintext.as_bytes(), &to, &mut store.session_store, &mut store.identity_store)
                .await
                .map(|message| (plaintext, message))
        }));
    }

    let mut sent = Vec::with_capacity(SENDERS);
    for handle in handles {
        sent.push(handle.await.unwrap().unwrap());
    }

    let counters: HashSet<u32> = sent
        .iter()
        .map(|(_, message)| match message {
            CiphertextMessage::Signal(message) => message.counter(),
            other => panic!("expected a ratchet message, got {:?}", other.message_type()),
        })
        .collect();
    assert_eq!(counters.len(), SENDERS);

    for (plaintext, message) in &sent {
        assert_eq!(bob.decrypt(alice.address(), message, &mut rng).await.unwrap(), plaintext.as_bytes());
    }
}
