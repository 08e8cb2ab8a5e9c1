// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-coder
//!
//! Client for the workspace host's v2 API. Three concerns only: validating
//! a user session token (self-service key issuance), paging through
//! workspaces (reaper classification), and issuing stop transition builds
//! (reaper action). The host stays the authority on workspace state.

#![deny(unsafe_code)]

use acp_core::WorkspaceSnapshot;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_INFO_TIMEOUT: Duration = Duration::from_secs(10);
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Workspaces fetched per page.
pub const PAGE_SIZE: usize = 50;

const SESSION_HEADER: &str = "Coder-Session-Token";

/// Errors surfaced by the workspace-host client.
#[derive(Debug, thiserror::Error)]
pub enum CoderError {
    /// The host could not be reached or timed out.
    #[error("workspace host unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The host rejected the presented session token.
    #[error("invalid session token")]
    InvalidSession,
    /// The host answered with a non-success status.
    #[error("workspace host error ({status}): {message}")]
    Upstream {
        /// HTTP status the host returned.
        status: u16,
        /// Response body, verbatim.
        message: String,
    },
    /// No session token is configured for privileged calls.
    #[error("no session token configured")]
    MissingToken,
}

/// Authenticated user identity returned by the host.
#[derive(Debug, Clone, Deserialize)]
pub struct CoderUser {
    /// Login name; becomes the key's `user_id` and alias suffix.
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct WorkspacePage {
    #[serde(default)]
    workspaces: Vec<WorkspaceSnapshot>,
    #[serde(default)]
    count: usize,
}

/// Client for the workspace host.
#[derive(Debug, Clone)]
pub struct CoderClient {
    http: reqwest::Client,
    base_url: String,
    session_token: Option<String>,
}

impl CoderClient {
    /// Create a client for `base_url`. The session token is only needed for
    /// listing and stop transitions; user-info validation uses the caller's
    /// own token.
    pub fn new(base_url: impl Into<String>, session_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn own_token(&self) -> Result<&str, CoderError> {
        self.session_token.as_deref().ok_or(CoderError::MissingToken)
    }

    /// Validate a session token and return the user behind it.
    ///
    /// A rejected token (any non-200) maps to [`CoderError::InvalidSession`];
    /// only transport failures surface as such, so callers can distinguish
    /// 401 from 502.
    pub async fn current_user(&self, session_token: &str) -> Result<CoderUser, CoderError> {
        let resp = self
            .http
            .get(self.url("/api/v2/users/me"))
            .header(SESSION_HEADER, session_token)
            .timeout(USER_INFO_TIMEOUT)
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(CoderError::InvalidSession);
        }
        let user: CoderUser = resp.json().await?;
        if user.username.is_empty() {
            return Err(CoderError::InvalidSession);
        }
        Ok(user)
    }

    /// Fetch every workspace, paging by offset/limit until the host's
    /// reported total is reached.
    pub async fn list_workspaces(&self) -> Result<Vec<WorkspaceSnapshot>, CoderError> {
        let token = self.own_token()?.to_string();
        let mut collected: Vec<WorkspaceSnapshot> = Vec::new();

        loop {
            let resp = self
                .http
                .get(self.url("/api/v2/workspaces"))
                .header(SESSION_HEADER, &token)
                .query(&[("limit", PAGE_SIZE.to_string()), ("offset", collected.len().to_string())])
                .timeout(LIST_TIMEOUT)
                .send()
                .await?;

            let status = resp.status();
            if status != StatusCode::OK {
                let message = resp.text().await.unwrap_or_default();
                return Err(CoderError::Upstream {
                    status: status.as_u16(),
                    message,
                });
            }

            let page: WorkspacePage = resp.json().await?;
            let fetched = page.workspaces.len();
            collected.extend(page.workspaces);
            debug!(fetched, total = page.count, "workspace page");

            if fetched == 0 || collected.len() >= page.count {
                break;
            }
        }
        Ok(collected)
    }

    /// Issue a stop transition build for a workspace.
    pub async fn stop_workspace(&self, workspace_id: &str) -> Result<(), CoderError> {
        let token = self.own_token()?.to_string();
        let resp = self
            .http
            .post(self.url(&format!("/api/v2/workspaces/{workspace_id}/builds")))
            .header(SESSION_HEADER, &token)
            .timeout(STOP_TIMEOUT)
            .json(&serde_json::json!({ "transition": "stop" }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = resp.text().await.unwrap_or_default();
        Err(CoderError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}
