//! Shared CLI presentation utilities.
//!
//! Keep this module format-only: no controller calls, no settings logic.

pub mod events;
pub mod tables;

pub use events::EventPrinter;
pub use tables::{print_history, print_separator, print_settings_summary, truncate_string};

// ANSI color codes
pub const GREEN: &str = "\x1b[32m";
pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";
pub const DIM: &str = "\x1b[2m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";
