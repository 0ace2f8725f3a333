//! Time utilities for testing.

use std::time::{SystemTime, UNIX_EPOCH};

/// Canonical test timestamp: 2024-01-06 12:00:00 UTC.
pub const TEST_TIMESTAMP: i64 = 1704542400;

/// Current Unix timestamp in seconds.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs() as i64
}

/// A timestamp `offset_secs` seconds before now.
pub fn past_timestamp(offset_secs: i64) -> i64 {
    now() - offset_secs
}
