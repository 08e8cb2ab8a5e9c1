// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tick behavior against a mocked workspace host, plus the HTTP surface.

use acp_config::{CoderSettings, ReaperSettings};
use acp_reaper::http::{HttpState, build_app};
use acp_reaper::{Reaper, ReaperAction, ReaperState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, dry_run: bool) -> ReaperSettings {
    ReaperSettings {
        coder: CoderSettings {
            base_url: server.uri(),
            session_token: Some("admin-token".to_string()),
        },
        idle_timeout: Duration::from_secs(30 * 60),
        check_interval: Duration::from_secs(300),
        dry_run,
        grace_period: Duration::from_secs(15 * 60),
        excluded_owners: ["platform-admin".to_string()].into_iter().collect(),
    }
}

fn workspace_json(
    id: &str,
    owner: &str,
    status: &str,
    build_age_mins: i64,
    last_used_age_mins: Option<i64>,
) -> serde_json::Value {
    let now = Utc::now();
    serde_json::json!({
        "id": id,
        "name": format!("dev-{id}"),
        "owner_name": owner,
        "latest_build": {
            "status": status,
            "created_at": (now - TimeDelta::minutes(build_age_mins)).to_rfc3339(),
        },
        "last_used_at": last_used_age_mins
            .map(|m| (now - TimeDelta::minutes(m)).to_rfc3339()),
    })
}

async fn mount_workspaces(server: &MockServer, workspaces: Vec<serde_json::Value>) {
    let count = workspaces.len();
    Mock::given(method("GET"))
        .and(path("/api/v2/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "workspaces": workspaces, "count": count,
        })))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dry_run_logs_would_stop_and_never_calls_the_host() {
    let server = MockServer::start().await;
    // Idle 45 min, built 2 h ago: eligible.
    mount_workspaces(&server, vec![workspace_json("w1", "alice", "running", 120, Some(45))]).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/workspaces/w1/builds"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let reaper = Reaper::new(settings(&server, true));
    let state = reaper.state();
    reaper.tick().await;

    let snapshot = state.read().await.clone();
    assert_eq!(snapshot.total_checks, 1);
    assert_eq!(snapshot.total_stops, 0);
    assert_eq!(snapshot.recent_actions.len(), 1);
    let action = &snapshot.recent_actions[0];
    assert_eq!(action.action, ReaperAction::WouldStop);
    assert_eq!(action.workspace, "dev-w1");
    assert_eq!(action.idle_minutes, Some(45));
    assert_eq!(snapshot.idle_workspaces.len(), 1);
}

#[tokio::test]
async fn live_run_stops_idle_workspace() {
    let server = MockServer::start().await;
    mount_workspaces(&server, vec![workspace_json("w1", "alice", "running", 120, Some(45))]).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/workspaces/w1/builds"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "b1"})))
        .expect(1)
        .mount(&server)
        .await;

    let reaper = Reaper::new(settings(&server, false));
    let state = reaper.state();
    reaper.tick().await;

    let snapshot = state.read().await.clone();
    assert_eq!(snapshot.total_stops, 1);
    assert_eq!(snapshot.recent_actions[0].action, ReaperAction::Stopped);
}

#[tokio::test]
async fn failed_stop_is_recorded_without_counting() {
    let server = MockServer::start().await;
    mount_workspaces(&server, vec![workspace_json("w1", "alice", "running", 120, Some(45))]).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/workspaces/w1/builds"))
        .respond_with(ResponseTemplate::new(409).set_body_string("build in progress"))
        .expect(1)
        .mount(&server)
        .await;

    let reaper = Reaper::new(settings(&server, false));
    let state = reaper.state();
    reaper.tick().await;

    let snapshot = state.read().await.clone();
    assert_eq!(snapshot.total_stops, 0);
    let action = &snapshot.recent_actions[0];
    assert_eq!(action.action, ReaperAction::StopFailed);
    assert!(action.error.as_deref().unwrap().contains("build in progress"));
}

#[tokio::test]
async fn safety_rules_keep_excluded_grace_and_active_workspaces() {
    let server = MockServer::start().await;
    mount_workspaces(
        &server,
        vec![
            // Excluded owner, very idle.
            workspace_json("w1", "platform-admin", "running", 300, Some(300)),
            // Fresh build inside grace.
            workspace_json("w2", "alice", "running", 5, Some(300)),
            // Recently used.
            workspace_json("w3", "bob", "running", 120, Some(3)),
            // Not running at all.
            workspace_json("w4", "carol", "stopped", 300, Some(300)),
            // Genuinely idle.
            workspace_json("w5", "dave", "running", 120, Some(90)),
        ],
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/workspaces/w5/builds"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let reaper = Reaper::new(settings(&server, false));
    let state = reaper.state();
    reaper.tick().await;

    let snapshot = state.read().await.clone();
    assert_eq!(snapshot.idle_workspaces.len(), 1);
    assert_eq!(snapshot.idle_workspaces[0].id, "w5");
    assert_eq!(snapshot.total_stops, 1);
}

#[tokio::test]
async fn listing_failure_skips_the_tick() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/workspaces"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let reaper = Reaper::new(settings(&server, true));
    let state = reaper.state();
    reaper.tick().await;

    let snapshot = state.read().await.clone();
    assert_eq!(snapshot.total_checks, 0);
    assert!(snapshot.last_check.is_none());
}

// ---------------------------------------------------------------------------
// HTTP surface
// ---------------------------------------------------------------------------

async fn send(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn http_settings(healthy: bool) -> Arc<HttpState> {
    Arc::new(HttpState {
        reaper_state: Arc::new(RwLock::new(ReaperState::new())),
        settings: ReaperSettings {
            coder: CoderSettings {
                base_url: "http://coder-server:7080".into(),
                session_token: healthy.then(|| "admin-token".to_string()),
            },
            idle_timeout: Duration::from_secs(1800),
            check_interval: Duration::from_secs(300),
            dry_run: true,
            grace_period: Duration::from_secs(900),
            excluded_owners: Default::default(),
        },
        healthy,
    })
}

#[tokio::test]
async fn health_reports_dry_run_when_healthy() {
    let app = build_app(http_settings(true));
    let (status, body) = send(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "healthy", "dry_run": true}));
}

#[tokio::test]
async fn health_unhealthy_without_session_token() {
    let app = build_app(http_settings(false));
    let (status, body) = send(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert!(body["reason"].as_str().unwrap().contains("CODER_SESSION_TOKEN"));
}

#[tokio::test]
async fn status_exposes_reaper_state_shape() {
    let app = build_app(http_settings(true));
    let (status, body) = send(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_checks"], 0);
    assert_eq!(body["total_stops"], 0);
    assert!(body["recent_actions"].as_array().unwrap().is_empty());
    assert!(body.get("started_at").is_some());
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = build_app(http_settings(true));
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn config_is_read_only_and_secret_free() {
    let app = build_app(http_settings(true));
    let (status, body) = send(&app, "/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idle_timeout_seconds"], 1800);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["healthy"], true);
    assert!(!body.to_string().contains("admin-token"));
}
