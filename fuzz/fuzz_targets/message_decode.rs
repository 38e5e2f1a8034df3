//! Fuzz target for ciphertext message decoding
//!
//! Arbitrary bytes are decoded as every message kind a receiver accepts
//! from the network.
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_proto::{
    CiphertextMessage, PreKeySignalMessage, SenderKeyDistributionMessage, SenderKeyMessage,
    SignalMessage,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = CiphertextMessage::deserialize(data) {
        // Accepted bytes decode to the same message again
        let again = CiphertextMessage::deserialize(message.serialize());
        assert_eq!(again.ok(), Some(message));
    }

    let _ = SignalMessage::deserialize(data);
    let _ = PreKeySignalMessage::deserialize(data);
    let _ = SenderKeyMessage::deserialize(data);
    let _ = SenderKeyDistributionMessage::deserialize(data);
});
