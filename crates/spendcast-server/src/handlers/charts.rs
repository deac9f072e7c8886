//! Chart handlers
//!
//! Every endpoint returns a Plotly figure (`data` + `layout`) ready for the
//! browser to draw.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::current_year;
use super::forecast::{build_forecast, ForecastQuery};
use super::series::{build_series, SeriesQuery};
use crate::{AppError, AppState, RequestContext};
use spendcast_core::chart::{self, ChartDescription, ChartKind};

/// Query parameters for the series chart
#[derive(Debug, Deserialize)]
pub struct SeriesChartQuery {
    /// line or bar (default: line)
    pub kind: Option<String>,
    #[serde(flatten)]
    pub series: SeriesQuery,
}

/// Query parameters for per-year charts
#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

/// GET /api/charts/series - Line or bar chart of per-period totals
pub async fn chart_series(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<SeriesChartQuery>,
) -> Result<Json<ChartDescription>, AppError> {
    let kind: ChartKind = params
        .kind
        .as_deref()
        .unwrap_or("line")
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    let series = build_series(&state, &ctx.user, &params.series)?;
    let figure = chart::render(&series.to_pairs(), kind)?
        .with_title(format!("Spending ({})", series.granularity))
        .with_axis_titles("Period", "Amount");

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("chart"),
        None,
        Some(&format!("chart=series, kind={}", kind.as_str())),
    )?;

    Ok(Json(figure))
}

/// GET /api/charts/forecast - History plus forecast line chart
pub async fn chart_forecast(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ChartDescription>, AppError> {
    let summary = build_forecast(&state, &ctx.user, &params)?;
    let figure = chart::forecast_chart(&summary)?;

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("chart"),
        None,
        Some(&format!(
            "chart=forecast, mode={}, value={}",
            params.mode, params.value
        )),
    )?;

    Ok(Json(figure))
}

/// GET /api/charts/categories - Pie of category totals for a year
pub async fn chart_categories(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<YearQuery>,
) -> Result<Json<ChartDescription>, AppError> {
    let year = params.year.unwrap_or_else(current_year);
    let breakdown = state.db.get_category_breakdown(&ctx.user, year)?;
    let figure = chart::category_pie(&breakdown, year)?;

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("chart"),
        None,
        Some(&format!("chart=categories, year={}", year)),
    )?;

    Ok(Json(figure))
}

/// GET /api/charts/monthly - Grouped bar chart, month by category
pub async fn chart_monthly(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<YearQuery>,
) -> Result<Json<ChartDescription>, AppError> {
    let year = params.year.unwrap_or_else(current_year);
    let totals = state.db.get_monthly_category_totals(&ctx.user, year)?;
    let figure = chart::monthly_category_bar(&totals, year)?;

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("chart"),
        None,
        Some(&format!("chart=monthly, year={}", year)),
    )?;

    Ok(Json(figure))
}
