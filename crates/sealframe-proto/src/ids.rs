//! Pre-key identifiers
//!
//! Distinct newtypes so a one-time pre-key id can never be passed where a
//! signed or Kyber pre-key id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! pre_key_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pre_key_id!(
    /// Identifier of a one-time pre-key
    PreKeyId
);
pre_key_id!(
    /// Identifier of a signed pre-key
    SignedPreKeyId
);
pre_key_id!(
    /// Identifier of a Kyber pre-key
    KyberPreKeyId
);
