// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use dimp_core::ID;
use libfuzzer_sys::fuzz_target;

// Parse arbitrary strings as identifiers, whatever parses must survive its canonical form.
fuzz_target!(|value: &str| {
    if let Some(id) = ID::parse(value) {
        let id_again = ID::parse(id.as_str()).expect("canonical id parses");
        assert_eq!(id, id_again);
        assert_eq!(id.as_str(), id_again.as_str());
    }
});
