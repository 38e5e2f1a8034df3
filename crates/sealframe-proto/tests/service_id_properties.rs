//! Property-based tests for service identifier encodings
//!
//! Every encoding must round-trip for every UUID and both kinds, and the
//! ordering must match the fixed-width binary ordering so sorted recipient
//! lists agree between peers.

use proptest::prelude::*;
use sealframe_proto::{DeviceId, ProtocolAddress, ServiceId, ServiceIdKind, WireError};
use uuid::Uuid;

fn arbitrary_service_id() -> impl Strategy<Value = ServiceId> {
    (prop_oneof![Just(ServiceIdKind::Aci), Just(ServiceIdKind::Pni)], any::<[u8; 16]>())
        .prop_map(|(kind, bytes)| ServiceId::new(kind, Uuid::from_bytes(bytes)))
}

proptest! {
    #[test]
    fn prop_string_round_trip(service_id in arbitrary_service_id()) {
        let text = service_id.service_id_string();
        prop_assert_eq!(ServiceId::parse_from_service_id_string(&text)?, service_id);
    }

    #[test]
    fn prop_binary_round_trip(service_id in arbitrary_service_id()) {
        let binary = service_id.service_id_binary();
        let expected_len = match service_id.kind() {
            ServiceIdKind::Aci => 16,
            ServiceIdKind::Pni => 17,
        };
        prop_assert_eq!(binary.len(), expected_len);
        prop_assert_eq!(ServiceId::parse_from_service_id_binary(&binary)?, service_id);
    }

    #[test]
    fn prop_fixed_width_round_trip(service_id in arbitrary_service_id()) {
        let fixed = service_id.service_id_fixed_width_binary();
        prop_assert_eq!(ServiceId::parse_from_service_id_fixed_width_binary(&fixed)?, service_id);
    }

    #[test]
    fn prop_ordering_matches_fixed_width_bytes(
        a in arbitrary_service_id(),
        b in arbitrary_service_id(),
    ) {
        let by_bytes = a.service_id_fixed_width_binary().cmp(&b.service_id_fixed_width_binary());
        prop_assert_eq!(a.cmp(&b), by_bytes);
    }

    #[test]
    fn prop_same_uuid_different_kind_differs(bytes in any::<[u8; 16]>()) {
        let uuid = Uuid::from_bytes(bytes);
        prop_assert_ne!(ServiceId::aci(uuid), ServiceId::pni(uuid));
        prop_assert!(ServiceId::aci(uuid) < ServiceId::pni(uuid));
    }

    #[test]
    fn prop_device_ids_above_127_rejected(device_id in 128u32..) {
        prop_assert_eq!(DeviceId::new(device_id), Err(WireError::InvalidDeviceId { device_id }));
        prop_assert!(ProtocolAddress::new("name", device_id).is_err());
    }

    #[test]
    fn prop_device_ids_up_to_127_accepted(device_id in 0u32..=127) {
        let address = ProtocolAddress::new("name", device_id)?;
        prop_assert_eq!(u32::from(address.device_id()), device_id);
    }
}

#[test]
fn aci_fixed_width_snapshot() {
    let aci: ServiceId = "9d0652a3-dcc3-4d11-975f-74d61598733f".parse().unwrap();
    insta::assert_snapshot!(
        hex::encode(aci.service_id_fixed_width_binary()),
        @"009d0652a3dcc34d11975f74d61598733f"
    );
}

#[test]
fn pni_binary_snapshot() {
    let pni: ServiceId = "PNI:9d0652a3-dcc3-4d11-975f-74d61598733f".parse().unwrap();
    insta::assert_snapshot!(
        hex::encode(pni.service_id_binary()),
        @"019d0652a3dcc34d11975f74d61598733f"
    );
}

#[test]
fn malformed_text_rejected() {
    for text in ["", "PNI:", "not-a-uuid", "9d0652a3dcc34d11975f74d61598733f", "ACI:9d0652a3-dcc3-4d11-975f-74d61598733f"] {
        assert!(
            matches!(ServiceId::parse_from_service_id_string(text), Err(WireError::InvalidServiceId(_))),
            "{text:?}"
        );
    }
}

#[test]
fn unknown_kind_byte_rejected() {
    let mut fixed = [0u8; 17];
    fixed[0] = 0x02;
    assert!(ServiceId::parse_from_service_id_fixed_width_binary(&fixed).is_err());
    assert!(ServiceId::parse_from_service_id_binary(&[0u8; 15]).is_err());
}
