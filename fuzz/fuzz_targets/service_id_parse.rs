//! Fuzz target for service id parsing
//!
//! # Invariants
//!
//! - Parsing any text or binary form never panics
//! - A parsed id re-parses to itself from every form it serializes to
//! - Fixed-width form is always 17 bytes led by the kind byte

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_proto::ServiceId;

#[derive(Debug, Arbitrary)]
enum Input<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
    FixedWidth([u8; 17]),
}

fuzz_target!(|input: Input<'_>| {
    let parsed = match input {
        Input::Text(text) => ServiceId::parse_from_service_id_string(text),
        Input::Binary(bytes) => ServiceId::parse_from_service_id_binary(bytes),
        Input::FixedWidth(bytes) => ServiceId::parse_from_service_id_fixed_width_binary(&bytes),
    };
    let Ok(id) = parsed else {
        return;
    };

    let text = id.service_id_string();
    assert_eq!(ServiceId::parse_from_service_id_string(&text).ok(), Some(id));

    let binary = id.service_id_binary();
    assert_eq!(ServiceId::parse_from_service_id_binary(&binary).ok(), Some(id));

    let fixed = id.service_id_fixed_width_binary();
    assert_eq!(ServiceId::parse_from_service_id_fixed_width_binary(&fixed).ok(), Some(id));
    assert_eq!(&fixed[1..], id.raw_uuid().as_bytes());
});
