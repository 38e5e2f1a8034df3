//! Command implementations
//!
//! Every command writes its report to `out`; nothing is printed directly so
//! the commands can be exercised against a buffer.

use std::io::Write;

use rand::{CryptoRng, RngCore};
use sealframe_core::{
    SenderCertificate, ServerCertificate, Timestamp, consts::REVOKED_SERVER_CERTIFICATE_KEY_IDS,
};
use sealframe_crypto::{KeyPair, PrivateKey, PublicKey};
use sealframe_proto::{
    DeviceId, SEALED_SENDER_V1_VERSION, SEALED_SENDER_V2_RECEIVED_VERSION,
    SEALED_SENDER_V2_SENT_VERSION, SealedSenderV1Message, SealedSenderV2ReceivedMessage,
    SealedSenderV2SentMessage, WireError, sealed_sender_version,
};
use tracing::{debug, info};

use crate::error::{CliError, decode_hex};

pub mod demo;

/// Certificate kinds understood by `inspect-cert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CertificateKind {
    /// Server certificate signed by a trust root
    Server,
    /// Sender certificate signed by a server key
    Sender,
}

/// Parse a hex-encoded 32-byte private key.
pub fn private_key(field: &'static str, text: &str) -> Result<PrivateKey, CliError> {
    Ok(PrivateKey::deserialize(&decode_hex(field, text)?)?)
}

/// Parse a hex-encoded, type-prefixed public key.
pub fn public_key(field: &'static str, text: &str) -> Result<PublicKey, CliError> {
    Ok(PublicKey::deserialize(&decode_hex(field, text)?)?)
}

/// Generate a key pair and write both halves as hex.
pub fn keygen<W: Write, R: RngCore + CryptoRng>(out: &mut W, rng: &mut R) -> Result<(), CliError> {
    let key_pair = KeyPair::generate(rng);
    writeln!(out, "private: {}", hex::encode(key_pair.private_key.serialize()))?;
    writeln!(out, "public:  {}", hex::encode(key_pair.public_key.serialize()))?;
    Ok(())
}

/// Certify `server_public` under `key_id` with the trust root's private key.
pub fn issue_server_certificate<W: Write, R: RngCore + CryptoRng>(
    out: &mut W,
    key_id: u32,
    trust_root_private: &PrivateKey,
    server_public: PublicKey,
    rng: &mut R,
) -> Result<(), CliError> {
    if REVOKED_SERVER_CERTIFICATE_KEY_IDS.contains(&key_id) {
        return Err(CliError::InvalidArgument {
            field: "key-id",
            reason: format!("{key_id:#x} is revoked"),
        });
    }

    let certificate = ServerCertificate::new(key_id, server_public, trust_root_private, rng)?;
    info!(key_id, "server certificate issued");
    writeln!(out, "{}", hex::encode(certificate.serialized()))?;
    Ok(())
}

/// Inputs of `issue-sender-cert` other than the signing key.
pub struct SenderCertificateRequest {
    /// Account UUID
    pub uuid: String,
    /// Optional phone number
    pub e164: Option<String>,
    /// Sending device
    pub device_id: u32,
    /// Sender identity public key
    pub identity: PublicKey,
    /// Expiration, milliseconds since the epoch
    pub expires: u64,
}

/// Issue a sender certificate signed by the server key `server_private`,
/// which `server_certificate` must certify.
pub fn issue_sender_certificate<W: Write, R: RngCore + CryptoRng>(
    out: &mut W,
    request: SenderCertificateRequest,
    server_certificate: ServerCertificate,
    server_private: &PrivateKey,
    rng: &mut R,
) -> Result<(), CliError> {
    if server_private.public_key() != server_certificate.public_key() {
        return Err(CliError::InvalidArgument {
            field: "server-private",
            reason: "does not match the key in the server certificate".to_string(),
        });
    }

    let device_id = DeviceId::new(request.device_id).map_err(|err| CliError::InvalidArgument {
        field: "device",
        reason: err.to_string(),
    })?;
    let certificate = SenderCertificate::new(
        request.uuid,
        request.e164,
        request.identity,
        device_id,
        Timestamp::from_epoch_millis(request.expires),
        server_certificate,
        server_private,
        rng,
    )?;

    info!(device = %device_id, expires = request.expires, "sender certificate issued");
    writeln!(out, "{}", hex::encode(certificate.serialized()))?;
    Ok(())
}

/// Decode a certificate and report its fields, validating it when a trust
/// root is given.
pub fn inspect_certificate<W: Write>(
    out: &mut W,
    kind: CertificateKind,
    bytes: &[u8],
    trust_root: Option<&PublicKey>,
    at: Timestamp,
) -> Result<(), CliError> {
    match kind {
        CertificateKind::Server => {
            let certificate = ServerCertificate::deserialize(bytes)?;
            write_server_certificate(out, &certificate, "")?;
            if let Some(root) = trust_root {
                writeln!(out, "valid:       {}", certificate.validate(root))?;
            }
        },
        CertificateKind::Sender => {
            let certificate = SenderCertificate::deserialize(bytes)?;
            writeln!(out, "sender:      {}", certificate.sender_uuid())?;
            writeln!(out, "e164:        {}", certificate.sender_e164().unwrap_or("-"))?;
            writeln!(out, "device:      {}", certificate.sender_device_id())?;
            writeln!(out, "identity:    {}", hex::encode(certificate.key().serialize()))?;
            writeln!(out, "expires:     {}", certificate.expiration())?;
            write_server_certificate(out, certificate.signer(), "signer ")?;
            if let Some(root) = trust_root {
                writeln!(out, "valid:       {}", certificate.validate(root, at))?;
            }
        },
    }
    Ok(())
}

fn write_server_certificate<W: Write>(
    out: &mut W,
    certificate: &ServerCertificate,
    prefix: &str,
) -> Result<(), CliError> {
    let label = format!("{prefix}key id:");
    writeln!(out, "{label:<13}{:#x}", certificate.key_id())?;
    let label = format!("{prefix}key:");
    writeln!(out, "{label:<13}{}", hex::encode(certificate.public_key().serialize()))?;
    Ok(())
}

/// Report the layout of a sealed sender envelope without decrypting it.
pub fn inspect_envelope<W: Write>(out: &mut W, bytes: &[u8]) -> Result<(), CliError> {
    let version = sealed_sender_version(bytes)?;
    debug!(version, len = bytes.len(), "inspecting envelope");

    match version {
        SEALED_SENDER_V1_VERSION => {
            let message = SealedSenderV1Message::deserialize(bytes)?;
            writeln!(out, "version:     {version:#04x} (single recipient)")?;
            writeln!(out, "ephemeral:   {}", hex::encode(message.ephemeral_public.serialize()))?;
            writeln!(out, "static:      {} bytes", message.encrypted_static.len())?;
            writeln!(out, "message:     {} bytes", message.encrypted_message.len())?;
        },
        SEALED_SENDER_V2_RECEIVED_VERSION => {
            let message = SealedSenderV2ReceivedMessage::deserialize(bytes)?;
            writeln!(out, "version:     {version:#04x} (multi-recipient, received)")?;
            writeln!(out, "ephemeral:   {}", hex::encode(message.ephemeral_public.serialize()))?;
            writeln!(out, "message:     {} bytes", message.ciphertext.len())?;
        },
        SEALED_SENDER_V2_SENT_VERSION => {
            let message = SealedSenderV2SentMessage::parse(bytes)?;
            writeln!(out, "version:     {version:#04x} (multi-recipient, sent)")?;
            writeln!(out, "ephemeral:   {}", hex::encode(message.ephemeral_public().serialize()))?;
            writeln!(out, "message:     {} bytes", message.ciphertext().len())?;
            for recipient in &message.recipients {
                let devices: Vec<String> = recipient
                    .devices
                    .iter()
                    .map(|(device, registration_id)| format!("{device}:{registration_id:#06x}"))
                    .collect();
                writeln!(out, "recipient:   {} [{}]", recipient.service_id, devices.join(", "))?;
            }
            for service_id in &message.excluded {
                writeln!(out, "excluded:    {service_id}")?;
            }
        },
        other => return Err(WireError::UnsupportedVersion(other).into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn output(run: impl FnOnce(&mut Vec<u8>) -> Result<(), CliError>) -> String {
        let mut out = Vec::new();
        run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn field<'a>(text: &'a str, name: &str) -> &'a str {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .map(str::trim)
            .unwrap()
    }

    #[test]
    fn keygen_output_parses_back() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let text = output(|out| keygen(out, &mut rng));

        let private = private_key("private", field(&text, "private:")).unwrap();
        let public = public_key("public", field(&text, "public:")).unwrap();
        assert_eq!(private.public_key(), public);
    }

    #[test]
    fn issued_certificates_inspect_as_valid() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let root = KeyPair::generate(&mut rng);
        let server = KeyPair::generate(&mut rng);
        let identity = KeyPair::generate(&mut rng);

        let server_hex = output(|out| {
            issue_server_certificate(out, 3, &root.private_key, server.public_key, &mut rng)
        });
        let server_cert = ServerCertificate::deserialize(&decode_hex("cert", &server_hex).unwrap()).unwrap();

        let request = SenderCertificateRequest {
            uuid: "9d0652a3-dcc3-4d11-975f-74d61598733f".to_string(),
            e164: None,
            device_id: 2,
            identity: identity.public_key,
            expires: 1_000,
        };
        let sender_hex = output(|out| {
            issue_sender_certificate(out, request, server_cert, &server.private_key, &mut rng)
        });
        let sender_bytes = decode_hex("cert", &sender_hex).unwrap();

        let report = output(|out| {
            inspect_certificate(
                out,
                CertificateKind::Sender,
                &sender_bytes,
                Some(&root.public_key),
                Timestamp::from_epoch_millis(999),
            )
        });
        assert_eq!(field(&report, "sender:"), "9d0652a3-dcc3-4d11-975f-74d61598733f");
        assert_eq!(field(&report, "device:"), "2");
        assert_eq!(field(&report, "signer key id:"), "0x3");
        assert_eq!(field(&report, "valid:"), "true");

        let expired = output(|out| {
            inspect_certificate(
                out,
                CertificateKind::Sender,
                &sender_bytes,
                Some(&root.public_key),
                Timestamp::from_epoch_millis(1_000),
            )
        });
        assert_eq!(field(&expired, "valid:"), "false");
    }

    #[test]
    fn revoked_key_id_is_refused() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let root = KeyPair::generate(&mut rng);
        let server = KeyPair::generate(&mut rng);
        let mut out = Vec::new();

        let err = issue_server_certificate(
            &mut out,
            REVOKED_SERVER_CERTIFICATE_KEY_IDS[0],
            &root.private_key,
            server.public_key,
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { field: "key-id", .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn mismatched_server_key_is_refused() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let root = KeyPair::generate(&mut rng);
        let server = KeyPair::generate(&mut rng);
        let other = KeyPair::generate(&mut rng);
        let server_cert = ServerCertificate::new(1, server.public_key, &root.private_key, &mut rng).unwrap();
        let request = SenderCertificateRequest {
            uuid: "9d0652a3-dcc3-4d11-975f-74d61598733f".to_string(),
            e164: Some("+14155550100".to_string()),
            device_id: 1,
            identity: other.public_key,
            expires: 1,
        };

        let err = issue_sender_certificate(&mut Vec::new(), request, server_cert, &other.private_key, &mut rng)
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { field: "server-private", .. }));
    }

    #[test]
    fn unknown_envelope_version_is_reported() {
        let err = inspect_envelope(&mut Vec::new(), &[0x77, 0, 0]).unwrap_err();
        assert!(matches!(err, CliError::Wire(_)));
    }

    #[test]
    fn bad_hex_names_the_argument() {
        let err = public_key("identity", "zz").unwrap_err();
        assert!(err.to_string().starts_with("identity: invalid hex"));
    }
}
