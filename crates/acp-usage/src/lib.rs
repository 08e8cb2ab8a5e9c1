// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-usage
//!
//! Best-effort writer of per-call usage records. The gateway must never
//! fail (or even slow down) a model call because accounting is down, so
//! `record` swallows every storage failure after a warn log. Attribution
//! gaps are acceptable; user-facing errors are not.

#![deny(unsafe_code)]

use acp_core::UsageRecord;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, warn};

const INSERT_SQL: &str = "INSERT INTO ai_usage \
    (workspace_id, user_id, template_name, provider, model, tokens_in, tokens_out, \
     latency_ms, status_code, endpoint, request_id, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

/// Placeholder the gateway uses when a call carries no workspace identity;
/// stored as NULL so reporting queries can group on real ids.
const ANONYMOUS_WORKSPACE: &str = "anonymous";

fn normalize_workspace_id(workspace_id: Option<&str>) -> Option<&str> {
    workspace_id.filter(|id| *id != ANONYMOUS_WORKSPACE && !id.is_empty())
}

/// Handle to the `ai_usage` table.
#[derive(Debug, Clone)]
pub struct UsageStore {
    pool: PgPool,
}

impl UsageStore {
    /// Create a store over a lazily-connected pool (min 1, max 5).
    ///
    /// No connection is attempted here, so a down database never blocks
    /// service startup; the first `record` call pays for the connect.
    pub fn connect_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Store over an existing pool (tests).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one usage record. Never fails: connection or SQL errors are
    /// logged at warn and the record is dropped.
    pub async fn record(&self, record: &UsageRecord) {
        let result = sqlx::query(INSERT_SQL)
            .bind(normalize_workspace_id(record.workspace_id.as_deref()))
            .bind(record.user_id.as_deref())
            .bind(record.template_name.as_deref())
            .bind(&record.provider)
            .bind(&record.model)
            .bind(record.tokens_in)
            .bind(record.tokens_out)
            .bind(record.latency_ms)
            .bind(record.status_code)
            .bind(record.endpoint.as_deref())
            .bind(&record.request_id)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(request_id = %record.request_id, "usage record written");
            }
            Err(e) => {
                warn!(
                    request_id = %record.request_id,
                    error = %e,
                    "failed to write usage record, dropping"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> UsageRecord {
        UsageRecord {
            request_id: "deadbeef".into(),
            workspace_id: Some("anonymous".into()),
            user_id: Some("alice".into()),
            template_name: None,
            provider: "anthropic".into(),
            model: "claude-sonnet".into(),
            tokens_in: 10,
            tokens_out: 20,
            latency_ms: 300,
            status_code: 200,
            endpoint: Some("/v1/messages".into()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn anonymous_workspace_normalizes_to_null() {
        assert_eq!(normalize_workspace_id(Some("anonymous")), None);
        assert_eq!(normalize_workspace_id(Some("")), None);
        assert_eq!(normalize_workspace_id(Some("ws-42")), Some("ws-42"));
        assert_eq!(normalize_workspace_id(None), None);
    }

    #[tokio::test]
    async fn record_swallows_unreachable_database() {
        // Lazy pool pointed at a dead address: the insert fails inside
        // `record`, which must return normally anyway.
        let store =
            UsageStore::connect_lazy("postgres://gw:gw@127.0.0.1:1/devdb").expect("lazy pool");
        store.record(&sample()).await;
    }
}
