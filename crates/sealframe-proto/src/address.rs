//! Protocol addresses
//!
//! A [`ProtocolAddress`] names one device of one account and keys every
//! per-peer store.

use std::fmt;

use crate::{
    errors::{Result, WireError},
    service_id::ServiceId,
};

/// Device number within an account, always in `[0, 127]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Largest valid device id.
    pub const MAX: u8 = 127;

    /// Validate a raw device id.
    pub fn new(device_id: u32) -> Result<Self> {
        if device_id > u32::from(Self::MAX) {
            return Err(WireError::InvalidDeviceId { device_id });
        }
        Ok(Self(device_id as u8))
    }

    /// Numeric value.
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for DeviceId {
    type Error = WireError;

    fn try_from(device_id: u32) -> Result<Self> {
        Self::new(device_id)
    }
}

impl From<DeviceId> for u32 {
    fn from(device_id: DeviceId) -> Self {
        u32::from(device_id.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// (name, device) pair identifying a peer device.
///
/// The name is normally a [`ServiceId`] string but may be any string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolAddress {
    name: String,
    device_id: DeviceId,
}

impl ProtocolAddress {
    /// Build an address, rejecting device ids of 128 and above.
    pub fn new(name: impl Into<String>, device_id: u32) -> Result<Self> {
        Ok(Self { name: name.into(), device_id: DeviceId::new(device_id)? })
    }

    /// Build an address from an already validated device id.
    pub fn from_parts(name: impl Into<String>, device_id: DeviceId) -> Self {
        Self { name: name.into(), device_id }
    }

    /// Account name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device within the account.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// The name parsed as a service id, if it is one.
    pub fn service_id(&self) -> Option<ServiceId> {
        ServiceId::parse_from_service_id_string(&self.name).ok()
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_device_range() {
        for device_id in 0..=127 {
            let address = ProtocolAddress::new("+14151111111", device_id).unwrap();
            assert_eq!(u32::from(address.device_id()), device_id);
        }
    }

    #[test]
    fn rejects_device_id_128_and_above() {
        for device_id in [128, 255, 256, u32::MAX] {
            assert_eq!(
                ProtocolAddress::new("+14151111111", device_id),
                Err(WireError::InvalidDeviceId { device_id })
            );
        }
    }

    #[test]
    fn display_joins_name_and_device() {
        let address = ProtocolAddress::new("alice", 3).unwrap();
        assert_eq!(address.to_string(), "alice.3");
    }

    #[test]
    fn service_id_parses_when_name_is_one() {
        let address = ProtocolAddress::new("PNI:9d0652a3-dcc3-4d11-975f-74d61598733f", 1).unwrap();
        assert!(address.service_id().is_some());

        let address = ProtocolAddress::new("+14151111111", 1).unwrap();
        assert!(address.service_id().is_none());
    }
}
