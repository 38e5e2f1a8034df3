//! Service identifiers
//!
//! An account has a primary identity (ACI) and a secondary identity (PNI)
//! used where the primary one must stay hidden. Both are UUIDs; the kind is
//! part of the identifier, so the same UUID under two kinds names two
//! different principals.
//!
//! # Encodings
//!
//! | Form | ACI | PNI |
//! |---|---|---|
//! | text | `9d0652a3-dcc3-4d11-975f-74d61598733f` | `PNI:9d0652a3-...` |
//! | binary | 16 UUID bytes | `0x01` + 16 UUID bytes |
//! | fixed-width | `0x00` + 16 UUID bytes | `0x01` + 16 UUID bytes |

use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::errors::{Result, WireError};

/// Length of the fixed-width binary form.
pub const FIXED_WIDTH_LENGTH: usize = 17;

const PNI_PREFIX: &str = "PNI:";
const UUID_TEXT_LENGTH: usize = 36;

/// Kind of a [`ServiceId`]. ACI sorts before PNI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceIdKind {
    /// Primary account identity
    Aci,
    /// Secondary (phone number) identity
    Pni,
}

impl ServiceIdKind {
    /// Kind byte used in binary forms.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Aci => 0x00,
            Self::Pni => 0x01,
        }
    }

    /// Parse a kind byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Aci),
            0x01 => Ok(Self::Pni),
            other => Err(WireError::InvalidServiceId(format!("unknown kind byte {other:#04x}"))),
        }
    }
}

/// A 16-byte UUID tagged with its kind.
///
/// Field order matters: the derived ordering compares the kind first and
/// the UUID bytes second.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId {
    kind: ServiceIdKind,
    uuid: Uuid,
}

impl ServiceId {
    /// Primary identity for `uuid`.
    pub const fn aci(uuid: Uuid) -> Self {
        Self { kind: ServiceIdKind::Aci, uuid }
    }

    /// Secondary identity for `uuid`.
    pub const fn pni(uuid: Uuid) -> Self {
        Self { kind: ServiceIdKind::Pni, uuid }
    }

    /// Identifier of the given kind.
    pub const fn new(kind: ServiceIdKind, uuid: Uuid) -> Self {
        Self { kind, uuid }
    }

    /// Kind of this identifier.
    pub const fn kind(&self) -> ServiceIdKind {
        self.kind
    }

    /// UUID without its kind.
    pub const fn raw_uuid(&self) -> Uuid {
        self.uuid
    }

    /// Text form: bare UUID for ACI, `PNI:`-prefixed for PNI.
    pub fn service_id_string(&self) -> String {
        match self.kind {
            ServiceIdKind::Aci => self.uuid.hyphenated().to_string(),
            ServiceIdKind::Pni => format!("{PNI_PREFIX}{}", self.uuid.hyphenated()),
        }
    }

    /// Parse the text form.
    pub fn parse_from_service_id_string(text: &str) -> Result<Self> {
        let (kind, uuid_text) = match text.strip_prefix(PNI_PREFIX) {
            Some(rest) => (ServiceIdKind::Pni, rest),
            None => (ServiceIdKind::Aci, text),
        };

        if uuid_text.len() != UUID_TEXT_LENGTH {
            return Err(WireError::InvalidServiceId(format!("malformed uuid text: {text:?}")));
        }

        let uuid = Uuid::parse_str(uuid_text)
            .map_err(|e| WireError::InvalidServiceId(format!("{text:?}: {e}")))?;
        Ok(Self { kind, uuid })
    }

    /// Binary form: 16 bytes for ACI, 17 bytes for PNI.
    pub fn service_id_binary(&self) -> Vec<u8> {
        match self.kind {
            ServiceIdKind::Aci => self.uuid.as_bytes().to_vec(),
            ServiceIdKind::Pni => self.service_id_fixed_width_binary().to_vec(),
        }
    }

    /// Parse either binary form.
    ///
    /// 16 bytes are the legacy ACI form; 17 bytes are a kind byte followed
    /// by the UUID.
    pub fn parse_from_service_id_binary(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            16 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(bytes);
                Ok(Self::aci(Uuid::from_bytes(raw)))
            },
            FIXED_WIDTH_LENGTH => {
                let mut raw = [0u8; FIXED_WIDTH_LENGTH];
                raw.copy_from_slice(bytes);
                Self::parse_from_service_id_fixed_width_binary(&raw)
            },
            other => Err(WireError::InvalidServiceId(format!("binary length {other}"))),
        }
    }

    /// Fixed-width form: kind byte followed by the UUID, always 17 bytes.
    pub fn service_id_fixed_width_binary(&self) -> [u8; FIXED_WIDTH_LENGTH] {
        let mut out = [0u8; FIXED_WIDTH_LENGTH];
        out[0] = self.kind.to_byte();
        out[1..].copy_from_slice(self.uuid.as_bytes());
        out
    }

    /// Parse the fixed-width form.
    pub fn parse_from_service_id_fixed_width_binary(bytes: &[u8; FIXED_WIDTH_LENGTH]) -> Result<Self> {
        let kind = ServiceIdKind::from_byte(bytes[0])?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&bytes[1..]);
        Ok(Self { kind, uuid: Uuid::from_bytes(raw) })
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.service_id_string())
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ServiceIdKind::Aci => write!(f, "<ACI:{}>", self.uuid),
            ServiceIdKind::Pni => write!(f, "<PNI:{}>", self.uuid),
        }
    }
}

impl FromStr for ServiceId {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_from_service_id_string(s)
    }
}
