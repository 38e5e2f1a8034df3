//! Sender Keys for group message encryption
//!
//! Each group sender owns one symmetric chain per distribution. Members
//! receive the chain's current state once and then derive every later
//! message key locally.

mod encryption;
mod error;
mod ratchet;

pub use encryption::{decrypt_sender_message, encrypt_sender_message};
pub use error::SenderKeyError;
pub use ratchet::{SenderChainKey, SenderMessageKey};
