//! Spendcast Core Library
//!
//! Shared functionality for the Spendcast expense tracker:
//! - Encrypted SQLite storage, scoped by owner, behind the `ExpenseStore` trait
//! - Gap-filled time-series aggregation (daily, weekly, monthly)
//! - ARIMA spending forecasts with automatic order selection
//! - Plotly-compatible chart descriptions
//! - CSV export and forecast configuration

pub mod chart;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod forecast;
pub mod models;
pub mod series;
pub mod store;

pub use chart::{render, render_series, ChartDescription, ChartKind, NamedSeries, TraceStyle};
pub use config::{EngineConfig, ForecastConfig, PlannerConfig};
pub use db::{AuditEntry, Database, ExpenseFilter};
pub use error::{Error, Result};
pub use forecast::{
    forecast, ArimaOrder, ForecastPlanner, ForecastRequest, ForecastSummary, Forecaster,
};
pub use models::{Expense, ExpenseUpdate, Granularity, NewExpense};
pub use series::{aggregate, aggregate_between, SeriesPoint, TimeSeries};
pub use store::ExpenseStore;
