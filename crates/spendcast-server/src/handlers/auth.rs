//! Authentication-related handlers

use axum::Json;
use serde::Serialize;

use crate::RequestContext;

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// The authenticated user's identifier
    pub user: String,
    /// How the user was authenticated
    pub auth_method: String,
}

/// Get the currently authenticated user
pub async fn get_me(ctx: RequestContext) -> Json<MeResponse> {
    Json(MeResponse {
        user: ctx.user,
        auth_method: ctx.auth_method.as_str().to_string(),
    })
}
