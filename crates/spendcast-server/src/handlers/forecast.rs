//! Forecast handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::today;
use crate::{AppError, AppState, RequestContext};
use spendcast_core::forecast::{ForecastRequest, ForecastSummary};

/// Query parameters for forecasts
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    /// "months" or "year" (default: months)
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Number of months, or the calendar year
    #[serde(default = "default_value")]
    pub value: i64,
}

fn default_mode() -> String {
    "months".to_string()
}

fn default_value() -> i64 {
    3
}

/// Run the planner for the caller
pub(crate) fn build_forecast(
    state: &AppState,
    user: &str,
    params: &ForecastQuery,
) -> Result<ForecastSummary, AppError> {
    let request = ForecastRequest::from_parts(&params.mode, params.value)?;
    let summary = state.planner.plan(&state.db, user, request, today())?;
    Ok(summary)
}

/// GET /api/forecast - Forecast the caller's spending
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ForecastSummary>, AppError> {
    let result = build_forecast(&state, &ctx.user, &params);

    // Failed forecasts are audited as well
    let outcome = match &result {
        Ok(summary) => format!("order={}, total={:.2}", summary.order, summary.total),
        Err(e) => format!("status={}", e.status().as_u16()),
    };
    state.db.log_audit(
        &ctx.user,
        "forecast",
        Some("forecast"),
        None,
        Some(&format!(
            "mode={}, value={}, {}",
            params.mode, params.value, outcome
        )),
    )?;

    Ok(Json(result?))
}
