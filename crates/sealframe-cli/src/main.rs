//! Sealframe operator tool.
//!
//! Keys, certificates and envelopes are passed and printed as hex.
//!
//! # Usage
//!
//! ```bash
//! # Trust root and server key
//! sealframe keygen
//! sealframe keygen
//!
//! # Certify the server key, then a sender
//! sealframe issue-server-cert --key-id 1 --trust-root-private <hex> --server-public <hex>
//! sealframe issue-sender-cert --server-cert <hex> --server-private <hex> \
//!     --uuid 9d0652a3-dcc3-4d11-975f-74d61598733f --identity <hex> --expires 1900000000000
//!
//! # Look inside
//! sealframe inspect-cert <hex> --trust-root <hex>
//! sealframe inspect-envelope <hex>
//!
//! # Two in-memory accounts exchanging direct, sealed and group messages
//! sealframe demo --seed 7
//! ```

use std::{
    io::{self, Write},
    time::{SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};
use commands::{CertificateKind, SenderCertificateRequest};
use error::{CliError, decode_hex};
use rand::{SeedableRng, rngs::OsRng};
use rand_chacha::ChaCha20Rng;
use sealframe_core::{ServerCertificate, Timestamp};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;

/// Sealframe operator tool
#[derive(Parser, Debug)]
#[command(name = "sealframe")]
#[command(about = "Sealframe key, certificate and envelope tool")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a Curve25519 key pair
    Keygen,

    /// Certify a server key with a trust root
    IssueServerCert {
        /// Key id recorded in the certificate
        #[arg(long)]
        key_id: u32,

        /// Trust root private key
        #[arg(long)]
        trust_root_private: String,

        /// Server public key to certify
        #[arg(long)]
        server_public: String,
    },

    /// Issue a sender certificate with a certified server key
    IssueSenderCert {
        /// Server certificate for the signing key
        #[arg(long)]
        server_cert: String,

        /// Server private key
        #[arg(long)]
        server_private: String,

        /// Sender account UUID
        #[arg(long)]
        uuid: String,

        /// Sender phone number
        #[arg(long)]
        e164: Option<String>,

        /// Sender device id
        #[arg(long, default_value = "1")]
        device: u32,

        /// Sender identity public key
        #[arg(long)]
        identity: String,

        /// Expiration, milliseconds since the Unix epoch
        #[arg(long)]
        expires: u64,
    },

    /// Decode a certificate and optionally validate it
    InspectCert {
        /// Certificate bytes
        cert: String,

        /// Certificate kind
        #[arg(long, value_enum, default_value = "sender")]
        kind: CertificateKind,

        /// Trust root to validate against
        #[arg(long)]
        trust_root: Option<String>,

        /// Validation time in milliseconds since the Unix epoch (default: now)
        #[arg(long)]
        at: Option<u64>,
    },

    /// Show the layout of a sealed sender envelope
    InspectEnvelope {
        /// Envelope bytes
        envelope: String,
    },

    /// Run an end-to-end exchange between two in-memory accounts
    Demo {
        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn now() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::from_epoch_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

async fn run<W: Write>(command: Command, out: &mut W) -> Result<(), CliError> {
    let mut rng = OsRng;

    match command {
        Command::Keygen => commands::keygen(out, &mut rng),
        Command::IssueServerCert { key_id, trust_root_private, server_public } => {
            commands::issue_server_certificate(
                out,
                key_id,
                &commands::private_key("trust-root-private", &trust_root_private)?,
                commands::public_key("server-public", &server_public)?,
                &mut rng,
            )
        },
        Command::IssueSenderCert {
            server_cert,
            server_private,
            uuid,
            e164,
            device,
            identity,
            expires,
        } => {
            let request = SenderCertificateRequest {
                uuid,
                e164,
                device_id: device,
                identity: commands::public_key("identity", &identity)?,
                expires,
            };
            commands::issue_sender_certificate(
                out,
                request,
                ServerCertificate::deserialize(&decode_hex("server-cert", &server_cert)?)?,
                &commands::private_key("server-private", &server_private)?,
                &mut rng,
            )
        },
        Command::InspectCert { cert, kind, trust_root, at } => {
            let trust_root = trust_root.map(|root| commands::public_key("trust-root", &root)).transpose()?;
            commands::inspect_certificate(
                out,
                kind,
                &decode_hex("cert", &cert)?,
                trust_root.as_ref(),
                at.map_or_else(now, Timestamp::from_epoch_millis),
            )
        },
        Command::InspectEnvelope { envelope } => {
            commands::inspect_envelope(out, &decode_hex("envelope", &envelope)?)
        },
        Command::Demo { seed: Some(seed) } => {
            commands::demo::run(out, now(), &mut ChaCha20Rng::seed_from_u64(seed)).await
        },
        Command::Demo { seed: None } => commands::demo::run(out, now(), &mut rng).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(args.command, &mut out).await?;
    out.flush()?;

    Ok(())
}
