//! Token pool administration endpoints.
//!
//! These are operational controls, served unauthenticated like the
//! health endpoint; keep them off the public interface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use k2gate_core::refresh::RefreshReason;
use serde_json::json;
use tracing::info;

use super::ApiError;
use crate::state::AppState;

pub async fn token_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "data": state.pool.stats(),
    }))
}

pub async fn consecutive_failures(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pool_size = state.pool.len();
    Json(json!({
        "status": "success",
        "data": {
            "consecutive_failures": state.pool.consecutive_failures(),
            "threshold": state.config.consecutive_failure_threshold,
            "token_pool_size": pool_size,
            "auto_refresh_enabled": state.config.auto_update_enabled && pool_size > 2,
        }
    }))
}

pub async fn reset_consecutive(State(state): State<AppState>) -> Json<serde_json::Value> {
    let old = state.pool.consecutive_failures();
    state.pool.reset_consecutive_failures();
    Json(json!({
        "status": "success",
        "message": format!("consecutive failure counter reset: {old} -> 0"),
    }))
}

pub async fn reset_token(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Response {
    if state.pool.reset(index) {
        Json(json!({
            "status": "success",
            "message": format!("token {index} reset"),
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": format!("invalid token index: {index}"),
            })),
        )
            .into_response()
    }
}

pub async fn reset_all(State(state): State<AppState>) -> Json<serde_json::Value> {
    let count = state.pool.reset_all();
    Json(json!({
        "status": "success",
        "message": format!("{count} tokens reset"),
    }))
}

pub async fn reload_tokens(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.pool.load_from_file(&state.config.token_file)?;
    info!("Token file reloaded via admin API: {count} tokens");
    Ok(Json(json!({
        "status": "success",
        "message": format!("token file reloaded, {count} tokens"),
        "data": state.pool.stats(),
    })))
}

pub async fn updater_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "data": state.updater.status(),
    }))
}

pub async fn force_update(State(state): State<AppState>) -> Json<serde_json::Value> {
    let queued = state.scheduler.request(RefreshReason::Forced);
    Json(json!({
        "status": "success",
        "queued": queued,
        "message": if queued {
            "token refresh queued"
        } else {
            "refresh already pending, request coalesced"
        },
    }))
}
