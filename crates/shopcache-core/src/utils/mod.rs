//! Utility functions for string matching and display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{age_display, cmp_ignore_case, contains_ignore_case, format_price, truncate_string};
