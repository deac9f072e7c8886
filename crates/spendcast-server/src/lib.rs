//! Spendcast Web Server
//!
//! Axum-based REST API for the Spendcast expense tracker.
//!
//! Security features:
//! - Reverse-proxy identity header or per-user API keys (secure by default, use --no-auth for local dev)
//! - Every expense query scoped to the authenticated user
//! - Restrictive CORS policy
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use spendcast_core::config::ForecastConfig;
use spendcast_core::db::Database;
use spendcast_core::forecast::ForecastPlanner;

pub mod auth;
mod handlers;

pub use auth::{
    parse_api_keys, ApiKey, AuthMethod, Authenticator, Credentials, ProxyAuthenticator,
    RequestContext, Session, UserId,
};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// Header carrying the user identity set by the reverse proxy
    pub user_header: String,
    /// Per-user API keys, sent as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<ApiKey>,
    /// Honour `user_header` even when API keys are configured
    pub trust_user_header: bool,
    /// Forecast engine and planner settings
    pub forecast: ForecastConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            user_header: auth::DEFAULT_USER_HEADER.to_string(),
            api_keys: vec![],
            trust_user_header: false,
            forecast: ForecastConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `SPENDCAST_USER_HEADER`, `SPENDCAST_API_KEYS` and
    /// `SPENDCAST_TRUST_USER_HEADER` on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(header) = std::env::var(auth::USER_HEADER_ENV)
            .ok()
            .filter(|h| !h.trim().is_empty())
        {
            config.user_header = header.trim().to_string();
        }
        if let Ok(keys) = std::env::var(auth::API_KEYS_ENV) {
            config.api_keys = parse_api_keys(&keys);
        }
        config.trust_user_header = std::env::var(auth::TRUST_USER_HEADER_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        config
    }
}

/// "1", "true", "yes" or "on", in any case
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub authenticator: Arc<dyn Authenticator>,
    pub planner: ForecastPlanner,
}

/// Authentication middleware - resolves the caller and attaches a `RequestContext`
///
/// With auth disabled, requests without credentials run as the local user.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = state.authenticator.authenticate(&Credentials {
        headers: request.headers(),
    });

    let context = match session {
        Some(session) => match state.authenticator.current_user(&session) {
            Some(user) => {
                info!(user = %user, method = session.method.as_str(), path = %request.uri().path(), "Authenticated");
                Some(RequestContext {
                    user,
                    auth_method: session.method,
                })
            }
            None => None,
        },
        None if !state.config.require_auth => Some(RequestContext::local()),
        None => None,
    };

    match context {
        Some(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
            AppError::unauthorized().into_response()
        }
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let authenticator = Arc::new(
        ProxyAuthenticator::new(config.user_header.clone(), config.api_keys.clone())
            .with_trusted_header(config.trust_user_header),
    );
    create_router_with_authenticator(db, static_dir, config, authenticator)
}

/// Create the application router with a custom authentication backend
pub fn create_router_with_authenticator(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    authenticator: Arc<dyn Authenticator>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        planner: ForecastPlanner::new(&config.forecast),
        config: config.clone(),
        authenticator,
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        // Categories
        .route("/categories", get(handlers::list_categories))
        // Expenses
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route("/expenses/bulk-delete", post(handlers::bulk_delete_expenses))
        .route("/expenses/export", get(handlers::export_expenses))
        .route(
            "/expenses/:id",
            get(handlers::get_expense)
                .patch(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        // Series and forecasts
        .route("/series", get(handlers::get_series))
        .route("/forecast", get(handlers::get_forecast))
        // Charts
        .route("/charts/series", get(handlers::chart_series))
        .route("/charts/forecast", get(handlers::chart_forecast))
        .route("/charts/categories", get(handlers::chart_categories))
        .route("/charts/monthly", get(handlers::chart_monthly))
        // Statistics
        .route("/stats/dashboard", get(handlers::stats_dashboard))
        .route("/stats/today", get(handlers::stats_today))
        .route("/stats/yearly", get(handlers::stats_yearly))
        .route("/stats/categories", get(handlers::stats_categories))
        .route("/stats/years", get(handlers::stats_years))
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: charts are drawn by a same-origin script bundle
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    }
    if config.require_auth && config.api_keys.is_empty() {
        info!(
            header = %config.user_header,
            "No API keys configured, relying on the reverse proxy identity header"
        );
    }
    if config.require_auth && !config.api_keys.is_empty() && config.trust_user_header {
        warn!(
            header = %config.user_header,
            "Identity header trusted alongside API keys; make sure the proxy strips it"
        );
    }

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Authentication required".to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a domain error to a client-facing status and message
    ///
    /// Returns `None` for infrastructure errors, which stay opaque.
    pub fn from_core(err: &spendcast_core::Error) -> Option<Self> {
        use spendcast_core::Error as E;

        let (status, message) = match err {
            E::InsufficientData { required, actual } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "Not enough history to forecast: need at least {} months, have {}",
                    required, actual
                ),
            ),
            E::ModelFit(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Could not fit a forecast model to this spending history".to_string(),
            ),
            E::EmptySeries => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "There is no data to chart for this selection".to_string(),
            ),
            E::DataQuality(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            E::StaleData { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            E::InvalidData(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            E::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            _ => return None,
        };

        Some(Self {
            status,
            message,
            internal: None,
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        if let Some(mapped) = err
            .downcast_ref::<spendcast_core::Error>()
            .and_then(AppError::from_core)
        {
            return mapped;
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
