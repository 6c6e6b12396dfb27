//! Display helpers for the dashboard.

pub mod format;

pub use format::{format_last_access, initials, truncate_string};
