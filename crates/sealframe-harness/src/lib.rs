//! Test fixtures for Sealframe protocol testing.
//!
//! Deterministic participants and a fault-injecting store for driving the
//! protocol core end to end without a network or persistent storage.
//!
//! # Fixtures
//!
//! - [`TestClient`]: one device with in-memory stores that can publish
//!   pre-key bundles, establish sessions and exchange messages
//! - [`TestAuthority`]: trust root and server key issuing sender
//!   certificates
//! - [`ChaoticSessionStore`]: session store wrapper that fails operations
//!   at a configured rate
//!
//! Everything random takes an RNG argument; [`seeded_rng`] gives a
//! reproducible one.

#![forbid(unsafe_code)]

pub mod authority;
pub mod chaotic;
pub mod client;

pub use authority::TestAuthority;
pub use chaotic::ChaoticSessionStore;
pub use client::TestClient;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Reproducible RNG for tests.
pub fn seeded_rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}
