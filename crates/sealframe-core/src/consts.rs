//! Protocol limits
//!
//! Bounds on attacker-controlled growth of stored state. Both peers must
//! agree on none of these; they only cap what one side is willing to keep.

/// Largest gap between the expected and announced counter that a receiver
/// will derive keys across, for both ratchet chains and sender-key chains.
pub const MAX_FORWARD_JUMPS: u32 = 25_000;

/// Message keys retained per receiving chain (skipped or recently consumed).
pub const MAX_MESSAGE_KEYS: usize = 2_000;

/// Receiving chains retained per session state.
pub const MAX_RECEIVER_CHAINS: usize = 5;

/// Archived session states retained per address.
pub const ARCHIVED_STATES_MAX: usize = 40;

/// Sender-key states retained per (sender, distribution).
pub const MAX_SENDER_KEY_STATES: usize = 5;

/// Registration ids are 14-bit.
pub const MAX_REGISTRATION_ID: u32 = 0x3FFF;

/// Server certificate key ids that never validate.
pub const REVOKED_SERVER_CERTIFICATE_KEY_IDS: &[u32] = &[0xDEAD_C357];

/// Session state version written by this implementation.
pub const SESSION_STATE_VERSION: u8 = 4;
