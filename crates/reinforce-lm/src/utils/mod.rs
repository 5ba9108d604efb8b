//! Utility functions.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seed libtorch's global generator (sampling, initialisation)
pub fn set_seed(seed: u64) {
    tch::manual_seed(seed as i64);
}

/// Seconds since the Unix epoch, as a string
pub fn unix_timestamp() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_secs().to_string()
}

/// Parameter counts for display: `650`, `1.5K`, `3.2M`
pub fn format_count(num: usize) -> String {
    match num {
        n if n < 1_000 => n.to_string(),
        n if n < 1_000_000 => format!("{:.1}K", n as f64 / 1e3),
        n => format!("{:.1}M", n as f64 / 1e6),
    }
}

/// Format duration in human-readable form
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 {
        return "0s".to_string();
    }

    let secs = seconds as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{:.1}s", seconds)
    }
}
