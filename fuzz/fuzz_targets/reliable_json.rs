// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use dimp_message::ReliableMessage;
use libfuzzer_sys::fuzz_target;

// Decode arbitrary wire input. Accepted messages encode to a stable form.
fuzz_target!(|value: &str| {
    let Ok(message) = ReliableMessage::from_json(value) else {
        return;
    };

    let json = message.to_json().expect("message encoding");
    let message_again = ReliableMessage::from_json(&json).expect("message decoding");
    assert_eq!(json, message_again.to_json().expect("message encoding"));
});
