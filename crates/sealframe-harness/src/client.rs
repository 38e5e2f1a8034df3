//! Test participant
//!
//! A [`TestClient`] is one device of one account: an identity key, a
//! registration id and a full set of in-memory stores. It publishes fresh
//! pre-keys on demand, so any number of peers can establish sessions with
//! it.

use rand::{CryptoRng, RngCore};
use sealframe_core::{
    InMemProtocolStore, KyberPreKeyRecord, KyberPreKeyStore, PreKeyBundle, PreKeyRecord,
    PreKeyStore, Result, SessionRecord, SessionStore, SignedPreKeyRecord, SignedPreKeyStore,
    Timestamp, consts::MAX_REGISTRATION_ID, message_decrypt, message_encrypt,
    process_prekey_bundle,
};
use sealframe_crypto::{IdentityKey, IdentityKeyPair, KemPublicKey};
use sealframe_proto::{
    CiphertextMessage, DeviceId, KyberPreKeyId, PreKeyId, ProtocolAddress, ServiceId,
    SignedPreKeyId,
};
use tracing::debug;
use uuid::Uuid;

/// Creation time recorded on published pre-keys.
const PUBLISHED_AT: Timestamp = Timestamp::from_epoch_millis(1_700_000_000_000);

/// One device with in-memory protocol stores.
pub struct TestClient {
    service_id: ServiceId,
    address: ProtocolAddress,
    identity: IdentityKeyPair,
    registration_id: u32,
    next_pre_key_id: u32,
    /// Every store of this device
    pub store: InMemProtocolStore,
}

impl TestClient {
    /// New account with a random ACI and a random 14-bit registration id.
    pub fn new<R: RngCore + CryptoRng>(device_id: u32, rng: &mut R) -> Result<Self> {
        let registration_id = (rng.next_u32() & MAX_REGISTRATION_ID).max(1);
        Self::with_registration_id(device_id, registration_id, rng)
    }

    /// New account with an explicit registration id, which may lie outside
    /// the 14-bit range.
    pub fn with_registration_id<R: RngCore + CryptoRng>(
        device_id: u32,
        registration_id: u32,
        rng: &mut R,
    ) -> Result<Self> {
        let mut uuid = [0u8; 16];
        rng.fill_bytes(&mut uuid);
        let service_id = ServiceId::aci(Uuid::from_bytes(uuid));
        let identity = IdentityKeyPair::generate(rng);
        Self::from_parts(service_id, device_id, identity, registration_id)
    }

    /// Another device of the same account, sharing its identity key.
    pub fn linked_device<R: RngCore + CryptoRng>(&self, device_id: u32, rng: &mut R) -> Result<Self> {
        let registration_id = (rng.next_u32() & MAX_REGISTRATION_ID).max(1);
        Self::from_parts(self.service_id, device_id, self.identity.clone(), registration_id)
    }

    fn from_parts(
        service_id: ServiceId,
        device_id: u32,
        identity: IdentityKeyPair,
        registration_id: u32,
    ) -> Result<Self> {
        let address =
            ProtocolAddress::from_parts(service_id.service_id_string(), DeviceId::new(device_id)?);
        Ok(Self {
            service_id,
            address,
            store: InMemProtocolStore::new(identity.clone(), registration_id),
            identity,
            registration_id,
            next_pre_key_id: 1,
        })
    }

    /// Account identifier.
    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    /// Address peers use for this device.
    pub fn address(&self) -> &ProtocolAddress {
        &self.address
    }

    /// Account UUID in text form, as written into sender certificates.
    pub fn uuid_string(&self) -> String {
        self.service_id.service_id_string()
    }

    /// Device id of this client.
    pub fn device_id(&self) -> DeviceId {
        self.address.device_id()
    }

    /// Public identity key, shared by every device of the account.
    pub fn identity_key(&self) -> IdentityKey {
        *self.identity.identity_key()
    }

    /// Identity key pair, for opening sealed sender envelopes directly.
    pub fn identity_key_pair(&self) -> &IdentityKeyPair {
        &self.identity
    }

    /// Registration id published in bundles.
    pub fn registration_id(&self) -> u32 {
        self.registration_id
    }

    /// Generate and store fresh pre-keys and return the bundle announcing
    /// them.
    pub async fn bundle<R: RngCore + CryptoRng>(
        &mut self,
        include_one_time: bool,
        rng: &mut R,
    ) -> Result<PreKeyBundle> {
        let id = self.next_pre_key_id;
        self.next_pre_key_id += 1;

        let signed = SignedPreKeyRecord::generate(SignedPreKeyId::from(id), PUBLISHED_AT, &self.identity, rng);
        self.store.signed_pre_key_store.save_signed_pre_key(signed.id(), &signed).await?;

        let kyber = KyberPreKeyRecord::generate(KyberPreKeyId::from(id), PUBLISHED_AT, &self.identity, rng);
        self.store.kyber_pre_key_store.save_kyber_pre_key(kyber.id(), &kyber).await?;

        let one_time = if include_one_time {
            let record = PreKeyRecord::generate(PreKeyId::from(id), rng);
            self.store.pre_key_store.save_pre_key(record.id(), &record).await?;
            Some((record.id(), record.public_key()))
        } else {
            None
        };

        debug!(address = %self.address, id, include_one_time, "published pre-keys");
        Ok(PreKeyBundle::new(
            self.registration_id,
            self.device_id(),
            one_time,
            signed.id(),
            signed.public_key(),
            signed.signature().to_vec(),
            self.identity_key(),
            kyber.id(),
            KemPublicKey::deserialize(kyber.public_key_bytes())?,
            kyber.signature().to_vec(),
        ))
    }

    /// Establish a session to `peer` from a freshly published bundle.
    pub async fn establish_with<R: RngCore + CryptoRng>(
        &mut self,
        peer: &mut TestClient,
        rng: &mut R,
    ) -> Result<()> {
        let bundle = peer.bundle(true, rng).await?;
        process_prekey_bundle(
            peer.address(),
            &mut self.store.session_store,
            &mut self.store.identity_store,
            &bundle,
            rng,
        )
        .await
    }

    /// Encrypt `plaintext` to `to`.
    pub async fn encrypt(&mut self, to: &ProtocolAddress, plaintext: &[u8]) -> Result<CiphertextMessage> {
        message_encrypt(plaintext, to, &mut self.store.session_store, &mut self.store.identity_store).await
    }

    /// Decrypt `message` from `from`.
    pub async fn decrypt<R: RngCore + CryptoRng>(
        &mut self,
        from: &ProtocolAddress,
        message: &CiphertextMessage,
        rng: &mut R,
    ) -> Result<Vec<u8>> {
        message_decrypt(
            message,
            from,
            &mut self.store.session_store,
            &mut self.store.identity_store,
            &mut self.store.pre_key_store,
            &self.store.signed_pre_key_store,
            &mut self.store.kyber_pre_key_store,
            rng,
        )
        .await
    }

    /// Stored session with `peer`, if any.
    pub async fn session_with(&self, peer: &ProtocolAddress) -> Result<Option<SessionRecord>> {
        self.store.session_store.load_session(peer).await
    }
}
