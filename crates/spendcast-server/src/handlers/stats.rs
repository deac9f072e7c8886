//! Statistics handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use super::charts::YearQuery;
use super::{current_year, today};
use crate::{AppError, AppState, RequestContext};
use spendcast_core::models::{CategoryBreakdown, DashboardStats, TodayStats, YearlyStats};

/// GET /api/stats/dashboard - Totals, this month and average daily spend
pub async fn stats_dashboard(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = state.db.get_dashboard_stats(&ctx.user, today())?;

    state
        .db
        .log_audit(&ctx.user, "view", Some("stats"), None, Some("stats=dashboard"))?;

    Ok(Json(stats))
}

/// GET /api/stats/today - Today's expense count and amount
pub async fn stats_today(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<TodayStats>, AppError> {
    let stats = state.db.get_today_stats(&ctx.user, today())?;

    state
        .db
        .log_audit(&ctx.user, "view", Some("stats"), None, Some("stats=today"))?;

    Ok(Json(stats))
}

/// GET /api/stats/yearly - Yearly total, average and extreme months
pub async fn stats_yearly(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<YearQuery>,
) -> Result<Json<YearlyStats>, AppError> {
    let year = params.year.unwrap_or_else(current_year);
    let stats = state.db.get_yearly_stats(&ctx.user, year)?;

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("stats"),
        None,
        Some(&format!("stats=yearly, year={}", year)),
    )?;

    Ok(Json(stats))
}

/// GET /api/stats/categories - Per-category totals for a year
pub async fn stats_categories(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<YearQuery>,
) -> Result<Json<Vec<CategoryBreakdown>>, AppError> {
    let year = params.year.unwrap_or_else(current_year);
    let breakdown = state.db.get_category_breakdown(&ctx.user, year)?;

    state.db.log_audit(
        &ctx.user,
        "view",
        Some("stats"),
        None,
        Some(&format!("stats=categories, year={}", year)),
    )?;

    Ok(Json(breakdown))
}

/// GET /api/stats/years - Years with recorded expenses, newest first
pub async fn stats_years(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<Vec<i32>>, AppError> {
    let years = state.db.get_available_years(&ctx.user)?;

    state
        .db
        .log_audit(&ctx.user, "view", Some("stats"), None, Some("stats=years"))?;

    Ok(Json(years))
}
