// SPDX-License-Identifier: MIT OR Apache-2.0
//! Read-only HTTP surface for the reaper: liveness, state, and config.

use crate::middleware;
use crate::state::ReaperState;
use acp_config::ReaperSettings;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State shared with the HTTP handlers.
pub struct HttpState {
    /// Reaper state written by the loop task.
    pub reaper_state: Arc<RwLock<ReaperState>>,
    /// Read-only settings snapshot (secrets are never serialized).
    pub settings: ReaperSettings,
    /// False when the session token is missing and the loop refused to run.
    pub healthy: bool,
}

/// Build the Axum router for the reaper surface. Nothing here mutates
/// state.
pub fn build_app(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/config", get(config))
        .layer(from_fn(middleware::request_logger))
        .layer(from_fn(middleware::request_id_middleware))
        .with_state(state)
}

async fn health(State(state): State<Arc<HttpState>>) -> Response {
    if state.healthy {
        (
            StatusCode::OK,
            Json(json!({"status": "healthy", "dry_run": state.settings.dry_run})),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "reason": "CODER_SESSION_TOKEN is not set",
            })),
        )
            .into_response()
    }
}

async fn status(State(state): State<Arc<HttpState>>) -> Json<ReaperState> {
    let snapshot = state.reaper_state.read().await.clone();
    Json(snapshot)
}

async fn config(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    let mut doc = match serde_json::to_value(&state.settings) {
        Ok(v) => v,
        Err(_) => json!({}),
    };
    if let Some(map) = doc.as_object_mut() {
        map.insert("healthy".into(), json!(state.healthy));
    }
    Json(doc)
}
