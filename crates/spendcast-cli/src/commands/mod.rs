//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, categories) and shared utilities (open_db)
//! - `expenses` - Expense commands (add, list, edit, delete, export)
//! - `reports` - Series, stats and forecast commands
//! - `serve` - Web server command

pub mod core;
pub mod expenses;
pub mod reports;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use expenses::*;
pub use reports::*;
pub use serve::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
