//! Category handlers

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{AppError, AppState, RequestContext};
use spendcast_core::models::Category;

/// GET /api/categories - List the category catalogue
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state.db.list_categories()?;

    state.db.log_audit(
        &ctx.user,
        "list",
        Some("category"),
        None,
        Some(&format!("returned={}", categories.len())),
    )?;

    Ok(Json(categories))
}
