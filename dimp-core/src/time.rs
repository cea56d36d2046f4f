// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::{SystemTime, UNIX_EPOCH};

/// UNIX timestamp in seconds.
pub type Timestamp = u64;

/// Returns the current UNIX timestamp in seconds.
///
/// A system clock set before the UNIX epoch yields `0`.
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
