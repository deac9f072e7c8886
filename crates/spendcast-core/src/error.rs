//! Error types for Spendcast

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Too few historical observations to fit a model
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// The optimizer did not converge, or produced a non-finite fit
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// The chart renderer was given no points
    #[error("Cannot render an empty series")]
    EmptySeries,

    #[error("Data quality issue: {0}")]
    DataQuality(String),

    #[error("Data is too outdated for reliable forecasting ({days} days since last period)")]
    StaleData { days: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;
