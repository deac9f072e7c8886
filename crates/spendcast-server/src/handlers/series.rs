//! Time-series handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::parse_date;
use crate::{AppError, AppState, RequestContext};
use spendcast_core::db::ExpenseFilter;
use spendcast_core::models::Granularity;
use spendcast_core::series::{self, TimeSeries};

/// Query parameters for series endpoints
#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// daily, weekly or monthly (default: monthly)
    pub granularity: Option<String>,
    /// Range start (YYYY-MM-DD); requires `to`
    pub from: Option<String>,
    /// Range end (YYYY-MM-DD); requires `from`
    pub to: Option<String>,
    /// Category names (comma-separated)
    pub categories: Option<String>,
}

/// Build the caller's gap-filled series for a query
pub(crate) fn build_series(
    state: &AppState,
    user: &str,
    params: &SeriesQuery,
) -> Result<TimeSeries, AppError> {
    let granularity: Granularity = params
        .granularity
        .as_deref()
        .unwrap_or("monthly")
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    let from = parse_date(params.from.as_deref(), "from")?;
    let to = parse_date(params.to.as_deref(), "to")?;

    let categories: Option<Vec<String>> = params.categories.as_ref().map(|s| {
        s.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    });

    let expenses = state.db.list_expenses_filtered(
        ExpenseFilter::new(user).categories(categories.as_deref()),
        None,
        0,
    )?;
    let entries = expenses.iter().map(|e| (e.date, e.amount));

    match (from, to) {
        (Some(from), Some(to)) => Ok(series::aggregate_between(entries, granularity, from, to)?),
        (None, None) => Ok(series::aggregate(entries, granularity)?),
        _ => Err(AppError::bad_request(
            "Provide both 'from' and 'to', or neither",
        )),
    }
}

/// GET /api/series - Per-period spending totals with empty periods filled in
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<TimeSeries>, AppError> {
    let series = build_series(&state, &ctx.user, &params)?;

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("series"),
        None,
        Some(&format!(
            "granularity={}, from={:?}, to={:?}, points={}",
            series.granularity,
            params.from,
            params.to,
            series.len()
        )),
    )?;

    Ok(Json(series))
}
