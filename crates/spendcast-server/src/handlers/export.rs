//! Export handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Response, StatusCode},
};
use tracing::info;

use super::expenses::{ExpenseQuery, ParsedFilter};
use crate::{AppError, AppState, RequestContext};

/// GET /api/expenses/export - Download the caller's expenses as CSV
///
/// Takes the same filters as the listing, without pagination.
pub async fn export_expenses(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<ExpenseQuery>,
) -> Result<Response<Body>, AppError> {
    let parsed = ParsedFilter::from_query(&params)?;
    let csv = state.db.export_expenses_csv(parsed.filter(&ctx.user))?;
    let rows = csv.lines().count().saturating_sub(1);

    // Audit log
    state.db.log_audit(
        &ctx.user,
        "export",
        Some("expense"),
        None,
        Some(&format!(
            "from={:?}, to={:?}, categories={:?}, rows={}",
            params.from, params.to, params.categories, rows
        )),
    )?;

    info!(user = %ctx.user, "Exported {} expenses to CSV", rows);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"expenses.csv\"",
        )
        .body(Body::from(csv))
        .map_err(|e| AppError::internal(&e.to_string()))
}
