//! Stored protocol state
//!
//! Records are plain serializable values. Stores hold them typed; hosts that
//! persist them use `serialize`/`deserialize`, which produce CBOR.

mod bundle;
mod prekey;
mod sender_key;
mod session;

pub use bundle::PreKeyBundle;
pub use prekey::{KyberPreKeyRecord, PreKeyRecord, SignedPreKeyRecord};
pub use sender_key::{SenderKeyRecord, SenderKeyState};
pub(crate) use sender_key::StateUpdate;
pub use session::{SessionRecord, SessionState};
pub(crate) use session::PendingPreKey;

use sealframe_proto::WireError;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

pub(crate) fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WireError::CborEncode(e.to_string()))?;
    Ok(out)
}

pub(crate) fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(ciborium::de::from_reader(bytes).map_err(|e| WireError::CborDecode(e.to_string()))?)
}
