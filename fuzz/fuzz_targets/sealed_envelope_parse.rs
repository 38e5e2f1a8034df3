//! Fuzz target for sealed sender envelope parsing
//!
//! # Invariants
//!
//! - Version sniffing and every envelope parser reject bad input with an
//!   error, never a panic
//! - Every recipient of a parsed multi-recipient envelope projects to a
//!   received form that parses
//! - A received-form envelope serializes back to its input

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_proto::{
    SealedSenderV1Message, SealedSenderV2ReceivedMessage, SealedSenderV2SentMessage,
    sealed_sender_version,
};

fuzz_target!(|data: &[u8]| {
    let _ = sealed_sender_version(data);
    let _ = SealedSenderV1Message::deserialize(data);

    if let Ok(received) = SealedSenderV2ReceivedMessage::deserialize(data) {
        assert_eq!(received.serialize(), data);
    }

    if let Ok(sent) = SealedSenderV2SentMessage::parse(data) {
        for recipient in &sent.recipients {
            assert!(!recipient.devices.is_empty());
            let projected = sent.received_message_for_recipient(recipient);
            let received = SealedSenderV2ReceivedMessage::deserialize(&projected);
            assert!(received.is_ok(), "projection for {} did not parse", recipient.service_id);
        }
    }
});
