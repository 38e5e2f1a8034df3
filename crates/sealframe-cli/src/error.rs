//! CLI error types.

use sealframe_core::ProtocolError;
use sealframe_crypto::CryptoError;
use sealframe_proto::WireError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument is not valid hex.
    #[error("{field}: invalid hex: {source}")]
    Hex {
        /// Argument name
        field: &'static str,
        /// Decoder error
        source: hex::FromHexError,
    },

    /// Decoded argument has the wrong length or form.
    #[error("{field}: {reason}")]
    InvalidArgument {
        /// Argument name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Key material did not parse.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Envelope or message bytes did not parse.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Protocol operation failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Writing output failed.
    #[error("output: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode the hex argument `field`.
pub fn decode_hex(field: &'static str, text: &str) -> Result<Vec<u8>, CliError> {
    hex::decode(text.trim()).map_err(|source| CliError::Hex { field, source })
}
