//! Progress formatting helpers
//!
//! Shared text rendering for counters, clocks, and byte sizes so every
//! presentation surface shows task progress the same way.

use std::time::Duration;

/// "processed / total" item counter text
pub fn progress_text(processed: u64, total: u64) -> String {
    format!("{} / {}", processed, total)
}

/// Format a duration as MM:SS, switching to HH:MM:SS at one hour
pub fn format_clock(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Format an optional ETA, using the "--:--" sentinel while undefined
pub fn eta_text(eta: Option<Duration>) -> String {
    match eta {
        Some(duration) => format_clock(duration),
        None => "--:--".to_string(),
    }
}

/// Convert bytes to a human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
