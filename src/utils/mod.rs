//! Utility functions and helpers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod logging;

pub use logging::init_logging;

/// Current Unix time in seconds, as carried in a block's timestamp field
///
/// Saturates at `i32::MAX` instead of wrapping.
pub fn current_timestamp() -> i32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i32::try_from(secs).unwrap_or(i32::MAX)
}

/// Hashes per second over an interval
pub fn compute_hash_rate(hashes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        hashes as f64 / secs
    } else {
        0.0
    }
}

/// Format hash rate as a human-readable string
pub fn format_hash_rate(hashes_per_sec: f64) -> String {
    const UNITS: &[&str] = &["H/s", "KH/s", "MH/s", "GH/s"];
    let mut rate = hashes_per_sec;
    let mut unit_index = 0;

    while rate >= 1000.0 && unit_index < UNITS.len() - 1 {
        rate /= 1000.0;
        unit_index += 1;
    }

    format!("{:.2} {}", rate, UNITS[unit_index])
}
