//! Usage: Wall-clock helpers (unix epoch seconds/millis).

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix_seconds() -> i64 {
    now_unix_millis() / 1000
}

/// Token expiry bookkeeping is done in epoch millis, matching the persisted format.
pub fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
