//! End-to-end walkthrough with in-memory stores
//!
//! Two accounts publish pre-keys, exchange a direct message, a sealed
//! sender message and a group message, and report each step.

use std::io::Write;

use rand::{CryptoRng, RngCore};
use sealframe_core::{
    CertificateValidator, InMemProtocolStore, KyberPreKeyRecord, KyberPreKeyStore, LocalAccount,
    PreKeyBundle, PreKeyRecord, PreKeyStore, SenderCertificate, ServerCertificate,
    SignedPreKeyRecord, SignedPreKeyStore, Timestamp, consts::MAX_REGISTRATION_ID,
    create_sender_key_distribution_message, group_decrypt, group_encrypt, message_decrypt,
    message_encrypt, process_prekey_bundle, process_sender_key_distribution_message,
    sealed_sender_decrypt, sealed_sender_encrypt,
};
use sealframe_crypto::{IdentityKeyPair, KemPublicKey, KeyPair};
use sealframe_proto::{DeviceId, KyberPreKeyId, PreKeyId, ProtocolAddress, ServiceId, SignedPreKeyId};
use tracing::info;
use uuid::Uuid;

use crate::error::CliError;

/// One day, the lifetime of the demo sender certificate.
const CERTIFICATE_LIFETIME_MILLIS: u64 = 86_400_000;

struct Account {
    uuid: String,
    address: ProtocolAddress,
    identity: IdentityKeyPair,
    registration_id: u32,
    store: InMemProtocolStore,
}

impl Account {
    fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CliError> {
        let mut raw = [0u8; 16];
        rng.fill_bytes(&mut raw);
        let uuid = ServiceId::aci(Uuid::from_bytes(raw)).service_id_string();
        let device_id = DeviceId::new(1)?;
        let identity = IdentityKeyPair::generate(rng);
        let registration_id = (rng.next_u32() & MAX_REGISTRATION_ID).max(1);

        Ok(Self {
            address: ProtocolAddress::from_parts(uuid.clone(), device_id),
            uuid,
            store: InMemProtocolStore::new(identity.clone(), registration_id),
            identity,
            registration_id,
        })
    }

    async fn publish<R: RngCore + CryptoRng>(
        &mut self,
        now: Timestamp,
        rng: &mut R,
    ) -> Result<PreKeyBundle, CliError> {
        let signed = SignedPreKeyRecord::generate(SignedPreKeyId::from(1), now, &self.identity, rng);
        let kyber = KyberPreKeyRecord::generate(KyberPreKeyId::from(1), now, &self.identity, rng);
        let one_time = PreKeyRecord::generate(PreKeyId::from(1), rng);

        self.store.signed_pre_key_store.save_signed_pre_key(signed.id(), &signed).await?;
        self.store.kyber_pre_key_store.save_kyber_pre_key(kyber.id(), &kyber).await?;
        self.store.pre_key_store.save_pre_key(one_time.id(), &one_time).await?;

        Ok(PreKeyBundle::new(
            self.registration_id,
            self.address.device_id(),
            Some((one_time.id(), one_time.public_key())),
            signed.id(),
            signed.public_key(),
            signed.signature().to_vec(),
            *self.identity.identity_key(),
            kyber.id(),
            KemPublicKey::deserialize(kyber.public_key_bytes())?,
            kyber.signature().to_vec(),
        ))
    }
}

/// Run the walkthrough at wall-clock time `now`.
pub async fn run<W: Write, R: RngCore + CryptoRng>(
    out: &mut W,
    now: Timestamp,
    rng: &mut R,
) -> Result<(), CliError> {
    let mut alice = Account::new(rng)?;
    let mut bob = Account::new(rng)?;
    writeln!(out, "alice: {}", alice.address)?;
    writeln!(out, "bob:   {}", bob.address)?;

    let bundle = bob.publish(now, rng).await?;
    process_prekey_bundle(
        &bob.address,
        &mut alice.store.session_store,
        &mut alice.store.identity_store,
        &bundle,
        rng,
    )
    .await?;
    writeln!(out, "session: alice -> bob from bundle (registration id {:#06x})", bundle.registration_id())?;

    let message = message_encrypt(
        b"hello bob",
        &bob.address,
        &mut alice.store.session_store,
        &mut alice.store.identity_store,
    )
    .await?;
    let plaintext = message_decrypt(
        &message,
        &alice.address,
        &mut bob.store.session_store,
        &mut bob.store.identity_store,
        &mut bob.store.pre_key_store,
        &bob.store.signed_pre_key_store,
        &mut bob.store.kyber_pre_key_store,
        rng,
    )
    .await?;
    writeln!(
        out,
        "direct:  {:?} message, {} bytes -> {:?}",
        message.message_type(),
        message.serialize().len(),
        String::from_utf8_lossy(&plaintext)
    )?;

    let trust_root = KeyPair::generate(rng);
    let server_key = KeyPair::generate(rng);
    let server_certificate = ServerCertificate::new(1, server_key.public_key, &trust_root.private_key, rng)?;
    let sender_certificate = SenderCertificate::new(
        bob.uuid.clone(),
        None,
        *bob.identity.public_key(),
        bob.address.device_id(),
        now.add_millis(CERTIFICATE_LIFETIME_MILLIS),
        server_certificate,
        &server_key.private_key,
        rng,
    )?;

    let sealed = sealed_sender_encrypt(
        &alice.address,
        &sender_certificate,
        b"sealed reply",
        &mut bob.store.session_store,
        &mut bob.store.identity_store,
        rng,
    )
    .await?;
    let validator = CertificateValidator::new(vec![trust_root.public_key]);
    let local = LocalAccount { uuid: &alice.uuid, e164: None, device_id: alice.address.device_id() };
    let opened = sealed_sender_decrypt(
        &sealed,
        &validator,
        now,
        local,
        &mut alice.store.identity_store,
        &mut alice.store.session_store,
        &mut alice.store.pre_key_store,
        &alice.store.signed_pre_key_store,
        &mut alice.store.kyber_pre_key_store,
        &mut alice.store.sender_key_store,
        rng,
    )
    .await?;
    writeln!(
        out,
        "sealed:  {} bytes from {} -> {:?}",
        sealed.len(),
        opened.sender_address(),
        String::from_utf8_lossy(&opened.message)
    )?;

    let mut raw = [0u8; 16];
    rng.fill_bytes(&mut raw);
    let distribution_id = Uuid::from_bytes(raw);
    let distribution = create_sender_key_distribution_message(
        &alice.address,
        distribution_id,
        &mut alice.store.sender_key_store,
        rng,
    )
    .await?;
    process_sender_key_distribution_message(&alice.address, &distribution, &mut bob.store.sender_key_store)
        .await?;
    let group_message = group_encrypt(
        &alice.address,
        distribution_id,
        b"hello group",
        &mut alice.store.sender_key_store,
        rng,
    )
    .await?;
    let plaintext =
        group_decrypt(group_message.serialized(), &alice.address, &mut bob.store.sender_key_store).await?;
    writeln!(
        out,
        "group:   distribution {distribution_id}, chain {:#x} -> {:?}",
        group_message.chain_id(),
        String::from_utf8_lossy(&plaintext)
    )?;

    info!("demo complete");
    Ok(())
}
