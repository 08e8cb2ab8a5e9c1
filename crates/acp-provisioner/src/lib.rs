// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-provisioner
//!
//! Isolates the upstream router's master credential from workspace
//! containers. Workspaces authenticate with the shared service secret (or
//! a workspace-host session token for self-service) and receive scoped
//! virtual keys with budget and rate-limit constraints bound at issuance.
//!
//! Issuance is idempotent by alias: at most one active key per alias, and
//! repeat requests return the existing token with `reused: true`.

#![deny(unsafe_code)]

pub mod middleware;

use acp_coder::{CoderClient, CoderError};
use acp_config::ProvisionerSettings;
use acp_core::{KeyMetadata, KeyScope, KeyType, ScopeQuota, quotas};
use acp_litellm::{GenerateKeyRequest, LitellmClient, LitellmError};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// State and errors
// ---------------------------------------------------------------------------

/// Shared service state.
pub struct AppState {
    /// Loaded settings (secrets included; never serialized).
    pub settings: ProvisionerSettings,
    /// Upstream router client.
    pub litellm: LitellmClient,
    /// Workspace host client (session-token validation only).
    pub coder: CoderClient,
}

impl AppState {
    /// Wire clients from settings.
    pub fn from_settings(settings: ProvisionerSettings) -> Self {
        let litellm = LitellmClient::new(
            settings.litellm.base_url.clone(),
            settings.litellm.master_key.clone(),
        );
        let coder = CoderClient::new(
            settings.coder.base_url.clone(),
            settings.coder.session_token.clone(),
        );
        Self {
            settings,
            litellm,
            coder,
        }
    }
}

/// JSON error rendered as `{"error": <message>}` with a status.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status for the response.
    pub status: StatusCode,
    /// Caller-facing message. Never contains request content or secrets.
    pub message: String,
}

impl ApiError {
    /// Build an error from a status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    /// Map an upstream-router failure, preserving the upstream status where
    /// it is a valid HTTP code and surfacing the upstream message verbatim.
    fn from_litellm(err: LitellmError, context: &str) -> Self {
        match err {
            LitellmError::Upstream { status, message } => Self::new(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                format!("{context}: {message}"),
            ),
            other => Self::bad_gateway(format!("{context}: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Auth guards
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Guard for admin/workspace endpoints: bearer must equal the shared
/// service secret.
fn require_service_secret(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = state.settings.secret.as_deref().unwrap_or("");
    match bearer_token(headers) {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Guard for key-bearer endpoints: any bearer is accepted here and
/// validated upstream by the router itself.
fn require_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    bearer_token(headers).ok_or_else(ApiError::unauthorized)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the Axum router with all provisioner routes.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/keys/workspace", post(create_workspace_key))
        .route("/api/v1/keys/self-service", post(create_self_service_key))
        .route("/api/v1/keys/info", get(get_key_info))
        .route("/api/v1/keys/reset-user", post(reset_user_spend))
        .route("/api/v1/keys/list", get(list_keys))
        .route("/health", get(health))
        .layer(from_fn(middleware::request_logger))
        .layer(from_fn(middleware::request_id_middleware))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Issuance
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct IssuedKey {
    key: String,
    reused: bool,
}

/// Idempotent issue-by-alias: reuse the existing key when the alias is
/// already active, otherwise generate with the scope's default quota.
async fn issue_key(
    state: &AppState,
    alias: String,
    user_id: String,
    quota: ScopeQuota,
    metadata: KeyMetadata,
) -> Result<(StatusCode, Json<IssuedKey>), ApiError> {
    if let Some(existing) = state.litellm.find_key(&alias).await {
        info!(alias, "reusing existing key");
        return Ok((
            StatusCode::OK,
            Json(IssuedKey {
                key: existing,
                reused: true,
            }),
        ));
    }

    let request = GenerateKeyRequest {
        alias: alias.clone(),
        user_id,
        max_budget: quota.budget_usd,
        rpm_limit: quota.rpm,
        tpm_limit: None,
        metadata,
        models: None,
    };
    let key = state
        .litellm
        .generate_key(&request)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Failed to generate key: {e}")))?;

    info!(alias, "generated new key");
    Ok((StatusCode::CREATED, Json(IssuedKey { key, reused: false })))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WorkspaceKeyRequest {
    #[serde(default)]
    workspace_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    workspace_name: Option<String>,
}

async fn create_workspace_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<WorkspaceKeyRequest>,
) -> Result<(StatusCode, Json<IssuedKey>), ApiError> {
    require_service_secret(&state, &headers)?;

    let workspace_id = body.workspace_id.trim().to_string();
    let username = body.username.trim().to_string();
    if workspace_id.is_empty() || username.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "workspace_id and username are required",
        ));
    }

    let scope = KeyScope::Workspace(workspace_id.clone());
    let metadata = KeyMetadata {
        scope: Some(scope.to_string()),
        key_type: Some(KeyType::Workspace),
        created_by: Some("key-provisioner".to_string()),
        created_at: Some(Utc::now()),
        workspace_id: Some(workspace_id.clone()),
        workspace_owner: Some(username.clone()),
        workspace_name: body.workspace_name,
        purpose: Some("auto-provisioned workspace key".to_string()),
        ..Default::default()
    };

    issue_key(&state, scope.alias(), username, quotas::WORKSPACE, metadata).await
}

#[derive(Debug, Default, Deserialize)]
struct SelfServiceKeyRequest {
    #[serde(default)]
    purpose: Option<String>,
}

async fn create_self_service_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<SelfServiceKeyRequest>>,
) -> Result<(StatusCode, Json<IssuedKey>), ApiError> {
    let session_token = require_bearer(&headers)?;

    let user = match state.coder.current_user(session_token).await {
        Ok(user) => user,
        Err(CoderError::InvalidSession) => {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid session token",
            ));
        }
        Err(e) => {
            warn!(error = %e, "session token validation failed");
            return Err(ApiError::bad_gateway("failed to validate session token"));
        }
    };

    let purpose = body
        .and_then(|Json(b)| b.purpose)
        .unwrap_or_else(|| "personal experimentation".to_string());
    let scope = KeyScope::User(user.username.clone());
    let metadata = KeyMetadata {
        scope: Some(scope.to_string()),
        key_type: Some(KeyType::User),
        created_by: Some("key-provisioner".to_string()),
        created_at: Some(Utc::now()),
        username: Some(user.username.clone()),
        purpose: Some(purpose),
        ..Default::default()
    };

    issue_key(&state, scope.alias(), user.username, quotas::USER, metadata).await
}

async fn get_key_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let virtual_key = require_bearer(&headers)?;
    let info = state
        .litellm
        .key_info(virtual_key)
        .await
        .map_err(|e| ApiError::from_litellm(e, "failed to get key info"))?;
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
struct ResetUserRequest {
    #[serde(default)]
    user_id: String,
}

async fn reset_user_spend(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ResetUserRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_service_secret(&state, &headers)?;

    let user_id = body.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "user_id required"));
    }

    state
        .litellm
        .reset_user_spend(&user_id)
        .await
        .map_err(|e| ApiError::from_litellm(e, "failed to reset spend"))?;

    info!(user_id, "reset user spend");
    Ok(Json(json!({
        "status": "ok",
        "user_id": user_id,
        "spend_reset": true,
    })))
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_service_secret(&state, &headers)?;
    let keys = state
        .litellm
        .list_keys()
        .await
        .map_err(|e| ApiError::from_litellm(e, "failed to list keys"))?;
    Ok(Json(keys))
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let litellm_ok = state.litellm.check_readiness().await;
    let (status, body) = if litellm_ok {
        (
            StatusCode::OK,
            json!({"status": "ok", "litellm": true}),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"status": "degraded", "litellm": false}),
        )
    };
    (status, Json(body)).into_response()
}
