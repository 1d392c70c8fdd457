//! Utility functions for formatting durations, timestamps and strings.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_countdown, format_expiry, truncate_string};
