//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod auth;
pub mod categories;
pub mod charts;
pub mod expenses;
pub mod export;
pub mod forecast;
pub mod series;
pub mod stats;

// Re-export all handlers for use in router
pub use audit::*;
pub use auth::*;
pub use categories::*;
pub use charts::*;
pub use expenses::*;
pub use export::*;
pub use forecast::*;
pub use series::*;
pub use stats::*;

use chrono::{Datelike, NaiveDate};

use crate::AppError;

/// The server's local date
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub(crate) fn current_year() -> i32 {
    today().year()
}

/// Parse an optional YYYY-MM-DD query parameter
pub(crate) fn parse_date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"))
        .transpose()
        .map_err(|_| {
            AppError::bad_request(&format!("Invalid '{}' date format (use YYYY-MM-DD)", name))
        })
}
