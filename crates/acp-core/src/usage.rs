// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-call usage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One AI call, attributed for billing and reporting.
///
/// Append-only; the relational store owns these once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Short unique id correlating logs and rows.
    pub request_id: String,
    /// Workspace the call originated from, if attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// User the call is billed to, if attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Workspace template, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    /// Upstream provider (`anthropic`, `bedrock`, ...).
    pub provider: String,
    /// Model identifier as sent upstream.
    pub model: String,
    /// Prompt tokens reported by the upstream.
    pub tokens_in: i64,
    /// Completion tokens reported by the upstream.
    pub tokens_out: i64,
    /// Wall-clock latency of the upstream call.
    pub latency_ms: i64,
    /// HTTP status returned to the caller.
    pub status_code: i32,
    /// Endpoint path, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
}

/// Generate a short request id: the first 8 hex characters of a v4 UUID.
pub fn short_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
