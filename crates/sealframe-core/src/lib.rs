//! Sealframe Protocol Core
//!
//! Pairwise sessions, sealed sender and sender-key group messaging on top of
//! the primitives in `sealframe-crypto` and the wire formats in
//! `sealframe-proto`.
//!
//! # Architecture
//!
//! Every operation is an async function over store traits. It loads the
//! state it needs, computes the new state in memory and writes it back at
//! the end, so a failed operation leaves stored state unchanged.
//!
//! ```text
//! PreKeyBundle ──process_prekey_bundle──► SessionRecord
//!                                              │
//!                         message_encrypt / message_decrypt
//!                                              │
//!                  sealed_sender_encrypt / sealed_sender_decrypt (optional)
//!                                              │
//!                                              ▼
//!                                          wire bytes
//!
//! create_sender_key_distribution_message ──(pairwise)──► process_sender_key_distribution_message
//!                     group_encrypt ─────────────────────► group_decrypt
//! ```
//!
//! # Invariants
//!
//! - Registration ids in bundles and multi-recipient envelopes are 14-bit.
//! - A session record holds one current state and at most
//!   [`consts::ARCHIVED_STATES_MAX`] archived ones.
//! - Message keys are retained in bounded windows; see [`consts`].
//! - Key material never appears in logs or `Debug` output of records.

#![forbid(unsafe_code)]

pub mod certificate;
pub mod consts;
pub mod error;
pub mod group_cipher;
mod ratchet;
pub mod sealed_sender;
pub mod session;
pub mod session_cipher;
pub mod state;
pub mod storage;
pub mod timestamp;

pub use certificate::{CertificateValidator, SenderCertificate, ServerCertificate};
pub use error::{ProtocolError, Result};
pub use group_cipher::{
    create_sender_key_distribution_message, group_decrypt, group_encrypt,
    process_sender_key_distribution_message,
};
pub use sealed_sender::{
    ContentHint, LocalAccount, SealedSenderDecryptionResult, UnidentifiedSenderMessageContent,
    sealed_sender_decrypt, sealed_sender_decrypt_to_usmc, sealed_sender_encrypt,
    sealed_sender_encrypt_from_usmc, sealed_sender_multi_recipient_encrypt,
    sealed_sender_multi_recipient_message_for_single_recipient,
};
pub use session::process_prekey_bundle;
pub use session_cipher::{
    message_decrypt, message_decrypt_prekey, message_decrypt_signal, message_encrypt,
};
pub use state::{
    KyberPreKeyRecord, PreKeyBundle, PreKeyRecord, SenderKeyRecord, SenderKeyState, SessionRecord,
    SessionState, SignedPreKeyRecord,
};
pub use storage::{
    AddressLocks, Direction, IdentityChange, IdentityKeyStore, InMemIdentityKeyStore,
    InMemKyberPreKeyStore, InMemPreKeyStore, InMemProtocolStore, InMemSenderKeyStore,
    InMemSessionStore, InMemSignedPreKeyStore, KyberPreKeyStore, PreKeyStore, SenderKeyStore,
    SessionStore, SignedPreKeyStore, StoreError,
};
pub use timestamp::Timestamp;
