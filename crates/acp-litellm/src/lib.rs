// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-litellm
//!
//! Thin typed client for the upstream model router's key-management API.
//! The provisioner is the writer (generate/reset), the gateway a reader
//! (introspection); both go through this client so the master credential
//! is attached in exactly one place.

#![deny(unsafe_code)]

use acp_core::{KeyMetadata, VirtualKey};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const INFO_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(15);
const LIST_TIMEOUT: Duration = Duration::from_secs(15);
const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by the router client.
///
/// Upstream failure bodies are kept verbatim (they aid debugging and never
/// contain the master credential); transport failures carry the reqwest
/// cause.
#[derive(Debug, thiserror::Error)]
pub enum LitellmError {
    /// The router could not be reached or timed out.
    #[error("upstream router unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The router answered with a non-success status.
    #[error("upstream router error ({status}): {message}")]
    Upstream {
        /// HTTP status the router returned.
        status: u16,
        /// Response body, verbatim.
        message: String,
    },
    /// The router answered 2xx but the body is missing a required field.
    #[error("upstream response missing field: {0}")]
    MalformedResponse(&'static str),
}

impl LitellmError {
    /// HTTP status for upstream-error variants, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Parameters for issuing a new virtual key.
#[derive(Debug, Clone)]
pub struct GenerateKeyRequest {
    /// Globally unique alias.
    pub alias: String,
    /// Principal the key bills to.
    pub user_id: String,
    /// Budget cap in USD.
    pub max_budget: f64,
    /// Requests per minute.
    pub rpm_limit: u32,
    /// Tokens per minute; `None` leaves the router default.
    pub tpm_limit: Option<u32>,
    /// Key metadata (scope, policy levels, attribution).
    pub metadata: KeyMetadata,
    /// Optional model allow-list.
    pub models: Option<Vec<String>>,
}

#[derive(Serialize)]
struct GeneratePayload<'a> {
    key_alias: &'a str,
    user_id: &'a str,
    max_budget: f64,
    tpm_limit: Option<u32>,
    rpm_limit: u32,
    metadata: &'a KeyMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    models: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    key: Option<String>,
}

// Upstream shapes vary by version: key info arrives under `info` or
// `key_info`.
#[derive(Deserialize)]
struct KeyInfoEnvelope {
    #[serde(default)]
    info: Option<VirtualKey>,
    #[serde(default)]
    key_info: Option<VirtualKey>,
}

/// Client for the upstream model router.
#[derive(Debug, Clone)]
pub struct LitellmClient {
    http: reqwest::Client,
    base_url: String,
    master_key: Option<String>,
}

impl LitellmClient {
    /// Create a client for `base_url` carrying `master_key` on privileged
    /// calls. A missing master key is tolerated (config already warned);
    /// privileged calls will then fail upstream with 401.
    pub fn new(base_url: impl Into<String>, master_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            master_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_master(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.master_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Look up a key token by alias.
    ///
    /// Advisory: any transport error, non-200 status, or missing/empty
    /// token degrades to `None` with a warn log — the caller falls through
    /// to generation and the alias-uniqueness invariant is enforced
    /// upstream.
    pub async fn find_key(&self, alias: &str) -> Option<String> {
        let result = self
            .with_master(self.http.post(self.url("/key/info")))
            .timeout(INFO_TIMEOUT)
            .json(&serde_json::json!({ "key_alias": alias }))
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                warn!(alias, error = %e, "key lookup failed");
                return None;
            }
        };
        if resp.status() != StatusCode::OK {
            return None;
        }

        let envelope: KeyInfoEnvelope = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(alias, error = %e, "key lookup returned unparseable body");
                return None;
            }
        };
        envelope
            .info
            .or(envelope.key_info)
            .and_then(|k| k.active_token().map(str::to_string))
    }

    /// Issue a new virtual key and return its token.
    pub async fn generate_key(&self, req: &GenerateKeyRequest) -> Result<String, LitellmError> {
        let payload = GeneratePayload {
            key_alias: &req.alias,
            user_id: &req.user_id,
            max_budget: req.max_budget,
            tpm_limit: req.tpm_limit,
            rpm_limit: req.rpm_limit,
            metadata: &req.metadata,
            models: req.models.as_deref(),
        };

        let resp = self
            .with_master(self.http.post(self.url("/key/generate")))
            .timeout(GENERATE_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !(status == StatusCode::OK || status == StatusCode::CREATED) {
            let message = resp.text().await.unwrap_or_default();
            return Err(LitellmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = resp.json().await?;
        body.key
            .filter(|k| !k.is_empty())
            .ok_or(LitellmError::MalformedResponse("key"))
    }

    /// Reset a user's accumulated spend to zero.
    pub async fn reset_user_spend(&self, user_id: &str) -> Result<(), LitellmError> {
        let resp = self
            .with_master(self.http.post(self.url("/user/update")))
            .timeout(INFO_TIMEOUT)
            .json(&serde_json::json!({ "user_id": user_id, "spend": 0 }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }
        let message = resp.text().await.unwrap_or_default();
        Err(LitellmError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    /// List all virtual keys (master-credential call); the document is
    /// passed through to admin callers unmodified.
    pub async fn list_keys(&self) -> Result<serde_json::Value, LitellmError> {
        let resp = self
            .with_master(self.http.get(self.url("/key/list")))
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let message = resp.text().await.unwrap_or_default();
            return Err(LitellmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    /// Fetch usage/budget info, authenticating as the virtual key itself
    /// (not the master credential).
    pub async fn key_info(&self, virtual_key: &str) -> Result<serde_json::Value, LitellmError> {
        let resp = self
            .http
            .get(self.url("/user/info"))
            .bearer_auth(virtual_key)
            .timeout(INFO_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let message = resp.text().await.unwrap_or_default();
            return Err(LitellmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    /// Probe the router's readiness endpoint. `false` on any failure.
    pub async fn check_readiness(&self) -> bool {
        match self
            .http
            .get(self.url("/health/readiness"))
            .timeout(READINESS_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(_) => false,
        }
    }
}
