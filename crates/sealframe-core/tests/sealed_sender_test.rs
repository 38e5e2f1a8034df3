//! Sealed sender tests
//!
//! Single-recipient envelopes carrying pairwise messages, and
//! multi-recipient envelopes as the delivery service would fan them out.
//! Covers:
//! - round trip with and without an established session
//! - certificate validation happens before any session state changes
//! - self-send detection by UUID or phone number
//! - multi-recipient validation, exclusions and per-recipient projection
//! - sealed content types the receiver refuses

use rand_chacha::ChaCha20Rng;
use sealframe_core::{
    ContentHint, LocalAccount, ProtocolError, SealedSenderDecryptionResult, SenderCertificate,
    Timestamp, UnidentifiedSenderMessageContent, sealed_sender_decrypt,
    sealed_sender_decrypt_to_usmc, sealed_sender_encrypt, sealed_sender_multi_recipient_encrypt,
    sealed_sender_multi_recipient_message_for_single_recipient,
};
use sealframe_harness::{TestAuthority, TestClient, seeded_rng};
use sealframe_proto::{
    CiphertextMessageType, ProtocolAddress, SealedSenderV2SentMessage, ServiceId,
    service_id::FIXED_WIDTH_LENGTH,
};

const NOW: Timestamp = Timestamp::from_epoch_millis(1_800_000_000_000);
const EXPIRES: Timestamp = Timestamp::from_epoch_millis(1_800_000_000_000 + 86_400_000);

struct World {
    rng: ChaCha20Rng,
    authority: TestAuthority,
    alice: TestClient,
    bob: TestClient,
    alice_cert: SenderCertificate,
}

/// Alice holds a session with Bob that Bob has not seen yet.
async fn world(seed: u64) -> World {
    let mut rng = seeded_rng(seed);
    let authority = TestAuthority::new(1, &mut rng).unwrap();
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::new(1, &mut rng).unwrap();
    alice.establish_with(&mut bob, &mut rng).await.unwrap();
    let alice_cert = authority.sender_certificate(&alice, EXPIRES, &mut rng).unwrap();
    World { rng, authority, alice, bob, alice_cert }
}

async fn seal_to_bob(world: &mut World, plaintext: &[u8]) -> Vec<u8> {
    sealed_sender_encrypt(
        world.bob.address(),
        &world.alice_cert,
        plaintext,
        &mut world.alice.store.session_store,
        &mut world.alice.store.identity_store,
        &mut world.rng,
    )
    .await
    .unwrap()
}

async fn open_as(
    receiver: &mut TestClient,
    local: LocalAccount<'_>,
    authority: &TestAuthority,
    ciphertext: &[u8],
    at: Timestamp,
    rng: &mut ChaCha20Rng,
) -> Result<SealedSenderDecryptionResult, ProtocolError> {
    let store = &mut receiver.store;
    sealed_sender_decrypt(
        ciphertext,
        &authority.validator(),
        at,
        local,
        &mut store.identity_store,
        &mut store.session_store,
        &mut store.pre_key_store,
        &store.signed_pre_key_store,
        &mut store.kyber_pre_key_store,
        &mut store.sender_key_store,
        rng,
    )
    .await
}

async fn open_as_bob(
    world: &mut World,
    ciphertext: &[u8],
    at: Timestamp,
) -> Result<SealedSenderDecryptionResult, ProtocolError> {
    let uuid = world.bob.uuid_string();
    let local = LocalAccount { uuid: &uuid, e164: None, device_id: world.bob.device_id() };
    open_as(&mut world.bob, local, &world.authority, ciphertext, at, &mut world.rng).await
}

#[tokio::test]
async fn sealed_round_trip_bootstraps_the_session() {
    let mut world = world(1).await;

    let sealed = seal_to_bob(&mut world, b"who sent this?").await;
    let result = open_as_bob(&mut world, &sealed, NOW).await.unwrap();

    assert_eq!(result.message, b"who sent this?");
    assert_eq!(result.sender_uuid, world.alice.uuid_string());
    assert_eq!(result.sender_e164, None);
    assert_eq!(result.sender_address(), *world.alice.address());
    assert!(world.bob.session_with(world.alice.address()).await.unwrap().is_some());

    let bob_cert = world.authority.sender_certificate(&world.bob, EXPIRES, &mut world.rng).unwrap();
    let reply = sealed_sender_encrypt(
        world.alice.address(),
        &bob_cert,
        b"you did",
        &mut world.bob.store.session_store,
        &mut world.bob.store.identity_store,
        &mut world.rng,
    )
    .await
    .unwrap();

    let uuid = world.alice.uuid_string();
    let local = LocalAccount { uuid: &uuid, e164: None, device_id: world.alice.device_id() };
    let result = open_as(&mut world.alice, local, &world.authority, &reply, NOW, &mut world.rng)
        .await
        .unwrap();
    assert_eq!(result.message, b"you did");
    assert_eq!(result.sender_uuid, world.bob.uuid_string());
}

#[tokio::test]
async fn usmc_exposes_inner_message() {
    let mut world = world(2).await;

    let sealed = seal_to_bob(&mut world, b"inner").await;
    let content = sealed_sender_decrypt_to_usmc(&sealed, &world.bob.store.identity_store).await.unwrap();

    assert_eq!(content.message_type(), CiphertextMessageType::PreKey);
    assert_eq!(content.content_hint(), ContentHint::Default);
    assert_eq!(content.group_id(), None);
    assert_eq!(content.sender(), &world.alice_cert);
}

#[tokio::test]
async fn expired_certificate_is_rejected_before_decrypting() {
    let mut world = world(3).await;

    let sealed = seal_to_bob(&mut world, b"late").await;
    let err = open_as_bob(&mut world, &sealed, EXPIRES).await.unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidCertificate { .. }));
    assert!(world.bob.session_with(world.alice.address()).await.unwrap().is_none());

    let result = open_as_bob(&mut world, &sealed, NOW).await.unwrap();
    assert_eq!(result.message, b"late");
}

#[tokio::test]
async fn certificate_from_unknown_root_is_rejected() {
    let mut world = world(4).await;
    let rogue = TestAuthority::new(1, &mut world.rng).unwrap();
    world.alice_cert = rogue.sender_certificate(&world.alice, EXPIRES, &mut world.rng).unwrap();

    let sealed = seal_to_bob(&mut world, b"forged").await;
    let err = open_as_bob(&mut world, &sealed, NOW).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidCertificate { .. }));
}

#[tokio::test]
async fn message_from_own_device_is_rejected() {
    let mut world = world(5).await;

    let sealed = seal_to_bob(&mut world, b"echo").await;
    let uuid = world.alice.uuid_string();
    let local = LocalAccount { uuid: &uuid, e164: None, device_id: world.alice.device_id() };
    let err = open_as(&mut world.bob, local, &world.authority, &sealed, NOW, &mut world.rng)
        .await
        .unwrap_err();

    assert_eq!(err, ProtocolError::SealedSenderSelfSend);
}

#[tokio::test]
async fn self_send_matches_on_phone_number() {
    let mut world = world(6).await;
    world.alice_cert = world
        .authority
        .sender_certificate_with_e164(&world.alice, "+14155550123", EXPIRES, &mut world.rng)
        .unwrap();

    let sealed = seal_to_bob(&mut world, b"echo").await;
    let local = LocalAccount {
        uuid: "00000000-0000-0000-0000-000000000000",
        e164: Some("+14155550123"),
        device_id: world.alice.device_id(),
    };
    let err = open_as(&mut world.bob, local, &world.authority, &sealed, NOW, &mut world.rng)
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::SealedSenderSelfSend);

    let result = open_as_bob(&mut world, &sealed, NOW).await.unwrap();
    assert_eq!(result.sender_e164.as_deref(), Some("+14155550123"));
}

/// Alice with acknowledged sessions to every client in `recipients`.
async fn connect(alice: &mut TestClient, recipients: &mut [&mut TestClient], rng: &mut ChaCha20Rng) {
    for recipient in recipients.iter_mut() {
        let recipient = &mut **recipient;
        alice.establish_with(recipient, rng).await.unwrap();
        let hello = alice.encrypt(recipient.address(), b"hello").await.unwrap();
        recipient.decrypt(alice.address(), &hello, rng).await.unwrap();
    }
}

fn group_content(world: &World, contents: &[u8]) -> UnidentifiedSenderMessageContent {
    UnidentifiedSenderMessageContent::new(
        CiphertextMessageType::SenderKey,
        world.alice_cert.clone(),
        contents.to_vec(),
        ContentHint::Resendable,
        Some(b"group-1".to_vec()),
    )
    .unwrap()
}

fn received_for(sent: &[u8], service_id: ServiceId) -> Vec<u8> {
    let parsed = SealedSenderV2SentMessage::parse(sent).unwrap();
    let recipient = parsed.recipients.iter().find(|r| r.service_id == service_id).unwrap();
    parsed.received_message_for_recipient(recipient)
}

#[tokio::test]
async fn multi_recipient_fan_out() {
    let mut world = world(7).await;
    let mut rng = seeded_rng(70);
    let mut bob_tablet = world.bob.linked_device(2, &mut rng).unwrap();
    let mut carol = TestClient::new(1, &mut rng).unwrap();
    connect(&mut world.alice, &mut [&mut world.bob, &mut bob_tablet, &mut carol], &mut rng).await;

    let content = group_content(&world, b"to everyone");
    let recipients = [world.bob.address(), bob_tablet.address(), carol.address()];
    let sent = sealed_sender_multi_recipient_encrypt(
        &recipients,
        &[],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap();

    let parsed = SealedSenderV2SentMessage::parse(&sent).unwrap();
    assert_eq!(parsed.recipients.len(), 2);
    assert_eq!(parsed.recipients[0].service_id, world.bob.service_id());
    assert_eq!(parsed.recipients[0].devices.len(), 2);

    let for_bob = received_for(&sent, world.bob.service_id());
    for receiver in [&world.bob, &bob_tablet] {
        let opened = sealed_sender_decrypt_to_usmc(&for_bob, &receiver.store.identity_store).await.unwrap();
        assert_eq!(opened, content);
    }

    let for_carol = received_for(&sent, carol.service_id());
    let opened = sealed_sender_decrypt_to_usmc(&for_carol, &carol.store.identity_store).await.unwrap();
    assert_eq!(opened.contents(), b"to everyone");
    assert_eq!(opened.group_id(), Some(&b"group-1"[..]));

    assert!(sealed_sender_decrypt_to_usmc(&for_bob, &carol.store.identity_store).await.is_err());
}

#[tokio::test]
async fn excluded_accounts_carry_no_key_material() {
    let mut world = world(8).await;
    let mut rng = seeded_rng(80);
    let dave = TestClient::new(1, &mut rng).unwrap();
    connect(&mut world.alice, &mut [&mut world.bob], &mut rng).await;

    let content = group_content(&world, b"not for dave");
    let sent = sealed_sender_multi_recipient_encrypt(
        &[world.bob.address()],
        &[dave.service_id()],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap();

    let parsed = SealedSenderV2SentMessage::parse(&sent).unwrap();
    assert_eq!(parsed.excluded, vec![dave.service_id()]);
    assert_eq!(parsed.recipients.len(), 1);

    let marker = dave.service_id().service_id_fixed_width_binary();
    let at = sent.windows(FIXED_WIDTH_LENGTH).position(|window| window == marker).unwrap();
    assert_eq!(sent[at + FIXED_WIDTH_LENGTH], 0);
}

#[tokio::test]
async fn single_recipient_projection() {
    let mut world = world(9).await;
    let mut rng = seeded_rng(90);
    let mut carol = TestClient::new(1, &mut rng).unwrap();
    connect(&mut world.alice, &mut [&mut world.bob, &mut carol], &mut rng).await;
    let content = group_content(&world, b"just bob");

    let sent = sealed_sender_multi_recipient_encrypt(
        &[world.bob.address()],
        &[],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap();
    let received = sealed_sender_multi_recipient_message_for_single_recipient(&sent).unwrap();
    let opened = sealed_sender_decrypt_to_usmc(&received, &world.bob.store.identity_store).await.unwrap();
    assert_eq!(opened.contents(), b"just bob");

    let err = sealed_sender_decrypt_to_usmc(&sent, &world.bob.store.identity_store).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidSealedSenderMessage { .. }));

    let both = sealed_sender_multi_recipient_encrypt(
        &[world.bob.address(), carol.address()],
        &[],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap();
    let err = sealed_sender_multi_recipient_message_for_single_recipient(&both).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidArgument(_)));
}

#[tokio::test]
async fn sealed_distribution_message_is_rejected() {
    let mut world = world(10).await;
    let mut rng = seeded_rng(100);
    connect(&mut world.alice, &mut [&mut world.bob], &mut rng).await;
    let content = UnidentifiedSenderMessageContent::new(
        CiphertextMessageType::SenderKeyDistribution,
        world.alice_cert.clone(),
        b"distribution bytes".to_vec(),
        ContentHint::Default,
        None,
    )
    .unwrap();

    let received = sealed_sender_multi_recipient_message_for_single_recipient(
        &sealed_sender_multi_recipient_encrypt(
            &[world.bob.address()],
            &[],
            &content,
            &world.alice.store.identity_store,
            &world.alice.store.session_store,
            &mut rng,
        )
        .await
        .unwrap(),
    )
    .unwrap();

    let err = open_as_bob(&mut world, &received, NOW).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidSealedSenderMessage { .. }));
}

#[tokio::test]
async fn multi_recipient_rejects_wide_registration_id() {
    let mut rng = seeded_rng(11);
    let authority = TestAuthority::new(1, &mut rng).unwrap();
    let mut alice = TestClient::new(1, &mut rng).unwrap();
    let mut bob = TestClient::with_registration_id(1, 0x4000, &mut rng).unwrap();

    // Bob opens the session, so Alice learns his registration id from the
    // pre-key message rather than a bundle.
    bob.establish_with(&mut alice, &mut rng).await.unwrap();
    let hello = bob.encrypt(alice.address(), b"hello").await.unwrap();
    alice.decrypt(bob.address(), &hello, &mut rng).await.unwrap();

    let cert = authority.sender_certificate(&alice, EXPIRES, &mut rng).unwrap();
    let content = UnidentifiedSenderMessageContent::new(
        CiphertextMessageType::SenderKey,
        cert,
        b"group".to_vec(),
        ContentHint::Default,
        None,
    )
    .unwrap();

    let err = sealed_sender_multi_recipient_encrypt(
        &[bob.address()],
        &[],
        &content,
        &alice.store.identity_store,
        &alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::InvalidRegistrationId { address: bob.address().clone(), registration_id: 0x4000 }
    );
}

#[tokio::test]
async fn multi_recipient_requires_sessions_and_service_ids() {
    let mut world = world(12).await;
    let mut rng = seeded_rng(120);
    let content = group_content(&world, b"nobody");

    let stranger = ProtocolAddress::new(TestClient::new(1, &mut rng).unwrap().uuid_string(), 1).unwrap();
    let err = sealed_sender_multi_recipient_encrypt(
        &[&stranger],
        &[],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert_eq!(err, ProtocolError::SessionNotFound { address: stranger });

    // Session exists but the address is not named by a service id.
    let mut nameless = TestClient::new(1, &mut rng).unwrap();
    let bundle = nameless.bundle(true, &mut rng).await.unwrap();
    let plain_name = ProtocolAddress::new("not-a-service-id", 1).unwrap();
    sealframe_core::process_prekey_bundle(
        &plain_name,
        &mut world.alice.store.session_store,
        &mut world.alice.store.identity_store,
        &bundle,
        &mut rng,
    )
    .await
    .unwrap();
    let err = sealed_sender_multi_recipient_encrypt(
        &[&plain_name],
        &[],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidArgument(_)));
}

#[tokio::test]
async fn multi_recipient_rejects_repeated_address() {
    let mut world = world(13).await;
    let mut rng = seeded_rng(130);
    connect(&mut world.alice, &mut [&mut world.bob], &mut rng).await;
    let content = group_content(&world, b"twice");

    let err = sealed_sender_multi_recipient_encrypt(
        &[world.bob.address(), world.bob.address()],
        &[],
        &content,
        &world.alice.store.identity_store,
        &world.alice.store.session_store,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert_eq!(err, ProtocolError::InvalidArgument(format!("{} is listed twice", world.bob.address())));
}
