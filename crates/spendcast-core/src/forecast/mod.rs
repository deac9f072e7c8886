//! Spending forecasts
//!
//! - `engine` - ARIMA order selection and forecasting over plain `f64` series
//! - `arima` - Model estimation (conditional sum of squares) and prediction
//! - `optimizer` - Nelder-Mead simplex used by the estimator
//! - `planner` - Request validation, history checks and total bounding

mod arima;
mod engine;
mod optimizer;
mod planner;

pub use arima::{difference, integrate, ArimaOrder, FittedArima};
pub use engine::{
    forecast, ForecastOutput, ForecastPoint, Forecaster, OrderSelection, MIN_OBSERVATIONS,
};
pub use optimizer::{Minimum, NelderMead};
pub use planner::{ForecastPlanner, ForecastRequest, ForecastSummary, MonthlyForecast};
