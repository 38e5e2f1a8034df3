//! Store abstraction for protocol state
//!
//! Async traits for every kind of persistent state the protocol touches,
//! in-memory implementations for tests and simple hosts, and a per-address
//! lock table for hosts that share stores between tasks.
//!
//! Operations compute their new state in memory and write at the end, the
//! session record last among state changes. A failed or abandoned
//! operation therefore leaves the session as it was.

mod error;
mod locks;
mod memory;
mod traits;

pub use error::StoreError;
pub use locks::AddressLocks;
pub use memory::{
    InMemIdentityKeyStore, InMemKyberPreKeyStore, InMemPreKeyStore, InMemProtocolStore,
    InMemSenderKeyStore, InMemSessionStore, InMemSignedPreKeyStore,
};
pub use traits::{
    Direction, IdentityChange, IdentityKeyStore, KyberPreKeyStore, PreKeyStore, SenderKeyStore,
    SessionStore, SignedPreKeyStore,
};
