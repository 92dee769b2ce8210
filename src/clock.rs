//! Wall-clock helpers.
//!
//! Token expiry and error timestamps are absolute (they outlive the process
//! and travel over the wire), so they use `SystemTime`. Everything that only
//! measures elapsed time inside the process (cache age, task age, throttle
//! windows) uses `tokio::time::Instant` instead.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
