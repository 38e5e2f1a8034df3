//! Server and sender certificates
//!
//! A trust root signs a [`ServerCertificate`]; the server key it names signs
//! [`SenderCertificate`]s that bind an account and device to an identity key
//! for a limited time. Both serialize as CBOR `{ certificate, signature }`
//! where `certificate` is itself the CBOR body that was signed.
//!
//! Validation is a pure function of the certificate, the trust roots and the
//! validation time. When several roots are supplied, every one is checked
//! and the results are combined without branching on which root matched.

use rand::{CryptoRng, RngCore};
use sealframe_crypto::{PrivateKey, PublicKey};
use sealframe_proto::DeviceId;
use serde::{Deserialize, Serialize};
use subtle::Choice;
use tracing::{debug, warn};

use crate::{
    consts::REVOKED_SERVER_CERTIFICATE_KEY_IDS,
    error::{ProtocolError, Result},
    state::{from_cbor, to_cbor},
    timestamp::Timestamp,
};

#[derive(Serialize, Deserialize)]
struct SignedEnvelope {
    #[serde(with = "serde_bytes")]
    certificate: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct ServerCertificateBody {
    key_id: u32,
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SenderCertificateBody {
    sender_uuid: String,
    sender_e164: Option<String>,
    sender_device: u32,
    expires: Timestamp,
    #[serde(with = "serde_bytes")]
    identity_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signer: Vec<u8>,
}

/// Server signing key, certified by a trust root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCertificate {
    key_id: u32,
    key: PublicKey,
    certificate: Vec<u8>,
    signature: Vec<u8>,
    serialized: Vec<u8>,
}

impl ServerCertificate {
    /// Issue a certificate for `key`, signed with the trust root's private key.
    pub fn new<R: RngCore + CryptoRng>(
        key_id: u32,
        key: PublicKey,
        trust_root: &PrivateKey,
        rng: &mut R,
    ) -> Result<Self> {
        let certificate = to_cbor(&ServerCertificateBody { key_id, key: key.serialize().to_vec() })?;
        let signature = trust_root.calculate_signature(&certificate, rng).to_vec();
        let serialized =
            to_cbor(&SignedEnvelope { certificate: certificate.clone(), signature: signature.clone() })?;

        Ok(Self { key_id, key, certificate, signature, serialized })
    }

    /// Parse a certificate without checking its signature.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let envelope: SignedEnvelope = from_cbor(bytes)?;
        let body: ServerCertificateBody = from_cbor(&envelope.certificate)?;

        Ok(Self {
            key_id: body.key_id,
            key: PublicKey::deserialize(&body.key)?,
            certificate: envelope.certificate,
            signature: envelope.signature,
            serialized: bytes.to_vec(),
        })
    }

    /// Whether `trust_root` signed this certificate and its key id is not
    /// revoked.
    pub fn validate(&self, trust_root: &PublicKey) -> bool {
        if REVOKED_SERVER_CERTIFICATE_KEY_IDS.contains(&self.key_id) {
            warn!(key_id = self.key_id, "server certificate key id is revoked");
            return false;
        }
        trust_root.verify_signature(&self.certificate, &self.signature)
    }

    /// Key id, checked against the revocation list.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Server public key used to sign sender certificates.
    pub fn public_key(&self) -> PublicKey {
        self.key
    }

    /// Signed body bytes.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Trust root signature over [`Self::certificate`].
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Full wire form.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

/// Why a sender certificate failed to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    UntrustedServer,
    BadSenderSignature,
    Expired,
}

impl Rejection {
    fn reason(self) -> &'static str {
        match self {
            Self::UntrustedServer => "server certificate not signed by a trust root",
            Self::BadSenderSignature => "sender certificate signature invalid",
            Self::Expired => "sender certificate expired",
        }
    }
}

/// Account, device and identity key of a sealed sender, vouched for by a
/// server certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderCertificate {
    signer: ServerCertificate,
    key: PublicKey,
    sender_device_id: DeviceId,
    sender_uuid: String,
    sender_e164: Option<String>,
    expiration: Timestamp,
    certificate: Vec<u8>,
    signature: Vec<u8>,
    serialized: Vec<u8>,
}

impl SenderCertificate {
    /// Issue a sender certificate signed with the server key `signer_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: RngCore + CryptoRng>(
        sender_uuid: String,
        sender_e164: Option<String>,
        key: PublicKey,
        sender_device_id: DeviceId,
        expiration: Timestamp,
        signer: ServerCertificate,
        signer_key: &PrivateKey,
        rng: &mut R,
    ) -> Result<Self> {
        let certificate = to_cbor(&SenderCertificateBody {
            sender_uuid: sender_uuid.clone(),
            sender_e164: sender_e164.clone(),
            sender_device: sender_device_id.into(),
            expires: expiration,
            identity_key: key.serialize().to_vec(),
            signer: signer.serialized().to_vec(),
        })?;
        let signature = signer_key.calculate_signature(&certificate, rng).to_vec();
        let serialized =
            to_cbor(&SignedEnvelope { certificate: certificate.clone(), signature: signature.clone() })?;

        Ok(Self {
            signer,
            key,
            sender_device_id,
            sender_uuid,
            sender_e164,
            expiration,
            certificate,
            signature,
            serialized,
        })
    }

    /// Parse a certificate and its embedded server certificate without validating either.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let envelope: SignedEnvelope = from_cbor(bytes)?;
        let body: SenderCertificateBody = from_cbor(&envelope.certificate)?;

        Ok(Self {
            signer: ServerCertificate::deserialize(&body.signer)?,
            key: PublicKey::deserialize(&body.identity_key)?,
            sender_device_id: DeviceId::new(body.sender_device)?,
            sender_uuid: body.sender_uuid,
            sender_e164: body.sender_e164,
            expiration: body.expires,
            certificate: envelope.certificate,
            signature: envelope.signature,
            serialized: bytes.to_vec(),
        })
    }

    /// Validate against a single trust root at `validation_time`.
    pub fn validate(&self, trust_root: &PublicKey, validation_time: Timestamp) -> bool {
        self.validate_with_trust_roots(&[trust_root], validation_time)
    }

    /// Validate against any of `trust_roots` at `validation_time`.
    ///
    /// Every root is tried, including after a match.
    pub fn validate_with_trust_roots(&self, trust_roots: &[&PublicKey], validation_time: Timestamp) -> bool {
        self.check(trust_roots, validation_time).is_ok()
    }

    fn check(&self, trust_roots: &[&PublicKey], validation_time: Timestamp) -> std::result::Result<(), Rejection> {
        let trusted = trust_roots
            .iter()
            .fold(Choice::from(0), |acc, root| acc | Choice::from(u8::from(self.signer.validate(root))));
        if !bool::from(trusted) {
            warn!(key_id = self.signer.key_id(), "sender certificate has untrusted signer");
            return Err(Rejection::UntrustedServer);
        }

        if !self.signer.public_key().verify_signature(&self.certificate, &self.signature) {
            warn!(sender = %self.sender_uuid, "sender certificate signature invalid");
            return Err(Rejection::BadSenderSignature);
        }

        if validation_time >= self.expiration {
            debug!(
                sender = %self.sender_uuid,
                %validation_time,
                expiration = %self.expiration,
                "sender certificate expired"
            );
            return Err(Rejection::Expired);
        }

        Ok(())
    }

    /// Server certificate that signed this one.
    pub fn signer(&self) -> &ServerCertificate {
        &self.signer
    }

    /// Sender identity key.
    pub fn key(&self) -> PublicKey {
        self.key
    }

    /// Sending device.
    pub fn sender_device_id(&self) -> DeviceId {
        self.sender_device_id
    }

    /// Sender account UUID in text form.
    pub fn sender_uuid(&self) -> &str {
        &self.sender_uuid
    }

    /// Sender phone number, if certified.
    pub fn sender_e164(&self) -> Option<&str> {
        self.sender_e164.as_deref()
    }

    /// Instant from which the certificate is no longer valid.
    pub fn expiration(&self) -> Timestamp {
        self.expiration
    }

    /// Signed body bytes.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Server signature over [`Self::certificate`].
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Full wire form.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

/// Trust roots a receiver accepts sender certificates from.
#[derive(Debug, Clone)]
pub struct CertificateValidator {
    trust_roots: Vec<PublicKey>,
}

impl CertificateValidator {
    /// Validator accepting any of `trust_roots`.
    pub fn new(trust_roots: Vec<PublicKey>) -> Self {
        Self { trust_roots }
    }

    /// Accepted trust roots.
    pub fn trust_roots(&self) -> &[PublicKey] {
        &self.trust_roots
    }

    /// Validate `certificate` at `validation_time`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidCertificate`] naming the failed check.
    pub fn validate(&self, certificate: &SenderCertificate, validation_time: Timestamp) -> Result<()> {
        let roots: Vec<&PublicKey> = self.trust_roots.iter().collect();
        certificate
            .check(&roots, validation_time)
            .map_err(|rejection| ProtocolError::InvalidCertificate { reason: rejection.reason().to_string() })
    }
}
