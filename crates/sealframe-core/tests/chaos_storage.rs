//! Chaos tests for session operations
//!
//! Session stores are wrapped in `ChaoticSessionStore` so loads and stores
//! fail at random. Verifies:
//! - injected store failures surface unchanged as transient errors
//! - a failed operation leaves the stored session exactly as it was
//! - every ciphertext handed out decrypts, retries included

use proptest::prelude::*;
use rand_chacha::ChaCha20Rng;
use sealframe_core::{InMemSessionStore, ProtocolError, StoreError, message_decrypt, message_encrypt};
use sealframe_harness::{ChaoticSessionStore, TestClient, chaotic::INJECTED_FAILURE, seeded_rng};
use sealframe_proto::CiphertextMessage;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

async fn established(seed: u64) -> (TestClient, TestClient, ChaCha20Rng) {
    let mut rng = seeded_rng(seed);
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();
    alice.establish_with(&mut bob, &mut rng).await.unwrap();
    let hello = alice.encrypt(bob.address(), b"hello").await.unwrap();
    bob.decrypt(alice.address(), &hello, &mut rng).await.unwrap();
    (alice, bob, rng)
}

async fn encrypt_through(
    sessions: &mut ChaoticSessionStore<InMemSessionStore>,
    alice: &mut TestClient,
    bob: &TestClient,
    plaintext: &[u8],
) -> Result<CiphertextMessage, ProtocolError> {
    message_encrypt(plaintext, bob.address(), sessions, &mut alice.store.identity_store).await
}

async fn decrypt_through(
    sessions: &mut ChaoticSessionStore<InMemSessionStore>,
    bob: &mut TestClient,
    alice: &TestClient,
    message: &CiphertextMessage,
    rng: &mut ChaCha20Rng,
) -> Result<Vec<u8>, ProtocolError> {
    let store = &mut bob.store;
    message_decrypt(
        message,
        alice.address(),
        sessions,
        &mut store.identity_store,
        &mut store.pre_key_store,
        &store.signed_pre_key_store,
        &mut store.kyber_pre_key_store,
        rng,
    )
    .await
}

#[tokio::test]
async fn failed_store_leaves_session_untouched() {
    let (mut alice, bob, _rng) = established(1).await;
    let mut sessions = ChaoticSessionStore::new(alice.store.session_store.clone(), 1.0).writes_only();

    let before = alice.session_with(bob.address()).await.unwrap().unwrap().serialize().unwrap();
    let err = encrypt_through(&mut sessions, &mut alice, &bob, b"lost").await.unwrap_err();
    assert_eq!(err, ProtocolError::Store(StoreError::Io(INJECTED_FAILURE.to_string())));
    assert!(err.is_transient());

    let after = alice.session_with(bob.address()).await.unwrap().unwrap().serialize().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn failed_decrypt_can_be_retried() {
    let (mut alice, mut bob, mut rng) = established(2).await;
    let message = alice.encrypt(bob.address(), b"retry me").await.unwrap();

    let mut failing = ChaoticSessionStore::new(bob.store.session_store.clone(), 1.0).writes_only();
    let err = decrypt_through(&mut failing, &mut bob, &alice, &message, &mut rng).await.unwrap_err();
    assert!(err.is_transient());

    assert_eq!(bob.decrypt(alice.address(), &message, &mut rng).await.unwrap(), b"retry me");
}

#[test]
fn prop_chaotic_sessions_never_lose_messages() {
    proptest!(ProptestConfig::with_cases(16), |(
        failure_rate in 0.0..0.6,
        seed in any::<u64>(),
        count in 1usize..12,
    )| {
        runtime().block_on(async {
            let (mut alice, mut bob, mut rng) = established(seed).await;
            let mut alice_sessions =
                ChaoticSessionStore::with_seed(alice.store.session_store.clone(), failure_rate, seed);
            let mut bob_sessions =
                ChaoticSessionStore::with_seed(bob.store.session_store.clone(), failure_rate, !seed);

            for i in 0..count {
                let plaintext = format!("message {i}");

                let message = loop {
                    match encrypt_through(&mut alice_sessions, &mut alice, &bob, plaintext.as_bytes()).await {
                        Ok(message) => break message,
                        Err(err) => assert!(err.is_transient(), "unexpected error {err:?}"),
                    }
                };

                let received = loop {
                    match decrypt_through(&mut bob_sessions, &mut bob, &alice, &message, &mut rng).await {
                        Ok(received) => break received,
                        Err(err) => assert!(err.is_transient(), "unexpected error {err:?}"),
                    }
                };
                assert_eq!(received, plaintext.as_bytes());
            }
        });
    });
}
