//! HTTP surface: OpenAI-compatible endpoints plus the token admin API.

pub mod admin;
pub mod chat;


use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use k2gate_core::constants::{BEARER_PREFIX, MODEL_ID};
use k2gate_types::GatewayError;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Axum-facing wrapper turning [`GatewayError`] into an OpenAI-shaped
/// error response.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": {
                "message": self.0.to_string(),
                "type": self.0.error_type(),
                "code": status.as_u16(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Constant-time bearer-key check on the `Authorization` header.
pub fn verify_api_key(headers: &HeaderMap, expected: &str) -> Result<(), GatewayError> {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or(GatewayError::InvalidApiKey)?;

    if presented.len() == expected.len()
        && presented.as_bytes().ct_eq(expected.as_bytes()).into()
    {
        Ok(())
    } else {
        Err(GatewayError::InvalidApiKey)
    }
}

pub fn build_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(homepage))
        .route("/health", get(health))
        .route("/v1/models", get(chat::list_models))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/admin/tokens/stats", get(admin::token_stats))
        .route("/admin/tokens/consecutive-failures", get(admin::consecutive_failures))
        .route("/admin/tokens/reset-consecutive", post(admin::reset_consecutive))
        .route("/admin/tokens/reset/:index", post(admin::reset_token))
        .route("/admin/tokens/reset-all", post(admin::reset_all))
        .route("/admin/tokens/reload", post(admin::reload_tokens))
        .route("/admin/tokens/updater/status", get(admin::updater_status))
        .route("/admin/tokens/updater/force-update", post(admin::force_update))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn homepage() -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "message": "K2 Gateway is running",
        "service": "K2 Gateway",
        "model": MODEL_ID,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/v1/chat/completions",
            "models": "/v1/models",
            "health": "/health",
            "admin": {
                "token_stats": "/admin/tokens/stats",
                "reset_token": "/admin/tokens/reset/{index}",
                "reset_all": "/admin/tokens/reset-all",
                "reload_tokens": "/admin/tokens/reload",
                "consecutive_failures": "/admin/tokens/consecutive-failures",
                "reset_consecutive": "/admin/tokens/reset-consecutive",
                "updater_status": "/admin/tokens/updater/status",
                "force_update": "/admin/tokens/updater/force-update",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.pool.stats();
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "tokens": {
            "total": stats.total_tokens,
            "enabled": stats.enabled_tokens,
            "disabled": stats.disabled_tokens,
            "consecutive_failures": stats.consecutive_failures,
            "auto_update_enabled": state.config.auto_update_enabled,
        }
    }))
}
