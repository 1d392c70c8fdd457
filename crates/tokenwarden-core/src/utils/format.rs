use std::time::Duration;

use chrono::{DateTime, Local, Utc};

/// Format a wait for display as a countdown, e.g. `42s`, `3m 05s`, `1h 02m`
pub fn format_countdown(wait: Duration) -> String {
    let total = wait.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format an expiry timestamp relative to `now`, e.g. `14:05:32 (in 13m 58s)`
pub fn format_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let local = expires_at.with_timezone(&Local).format("%H:%M:%S");
    match (expires_at - now).to_std() {
        Ok(remaining) if !remaining.is_zero() => {
            format!("{} (in {})", local, format_countdown(remaining))
        }
        // Negative or zero: chrono refuses to convert
        _ => format!("{} (expired)", local),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
