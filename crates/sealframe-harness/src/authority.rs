//! Certificate authority for sealed sender tests

use rand::{CryptoRng, RngCore};
use sealframe_core::{
    CertificateValidator, Result, SenderCertificate, ServerCertificate, Timestamp,
};
use sealframe_crypto::{KeyPair, PublicKey};

use crate::client::TestClient;

/// Trust root plus one certified server key.
pub struct TestAuthority {
    trust_root: KeyPair,
    server_key: KeyPair,
    server_certificate: ServerCertificate,
}

impl TestAuthority {
    /// Fresh trust root and server key; the server certificate carries
    /// `key_id`.
    pub fn new<R: RngCore + CryptoRng>(key_id: u32, rng: &mut R) -> Result<Self> {
        let trust_root = KeyPair::generate(rng);
        let server_key = KeyPair::generate(rng);
        let server_certificate =
            ServerCertificate::new(key_id, server_key.public_key, &trust_root.private_key, rng)?;
        Ok(Self { trust_root, server_key, server_certificate })
    }

    /// Public trust root.
    pub fn trust_root(&self) -> PublicKey {
        self.trust_root.public_key
    }

    /// Certificate of the server key.
    pub fn server_certificate(&self) -> &ServerCertificate {
        &self.server_certificate
    }

    /// Validator trusting only this authority.
    pub fn validator(&self) -> CertificateValidator {
        CertificateValidator::new(vec![self.trust_root()])
    }

    /// Sender certificate for `client` without a phone number.
    pub fn sender_certificate<R: RngCore + CryptoRng>(
        &self,
        client: &TestClient,
        expiration: Timestamp,
        rng: &mut R,
    ) -> Result<SenderCertificate> {
        self.issue(client, None, expiration, rng)
    }

    /// Sender certificate for `client` that also names `e164`.
    pub fn sender_certificate_with_e164<R: RngCore + CryptoRng>(
        &self,
        client: &TestClient,
        e164: &str,
        expiration: Timestamp,
        rng: &mut R,
    ) -> Result<SenderCertificate> {
        self.issue(client, Some(e164.to_string()), expiration, rng)
    }

    fn issue<R: RngCore + CryptoRng>(
        &self,
        client: &TestClient,
        e164: Option<String>,
        expiration: Timestamp,
        rng: &mut R,
    ) -> Result<SenderCertificate> {
        SenderCertificate::new(
            client.uuid_string(),
            e164,
            *client.identity_key().public_key(),
            client.device_id(),
            expiration,
            self.server_certificate.clone(),
            &self.server_key.private_key,
            rng,
        )
    }
}
