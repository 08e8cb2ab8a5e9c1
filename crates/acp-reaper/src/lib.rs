// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-reaper
//!
//! Control loop that polls the workspace host, classifies running
//! workspaces by idle time, and issues stop transitions — or only logs
//! them in dry-run mode. Exactly one tick is in flight at a time, and the
//! classification pass for a tick fully completes before any stop is
//! issued.

#![deny(unsafe_code)]

pub mod http;
pub mod middleware;
pub mod state;

pub use state::{IdleWorkspace, ReaperAction, ReaperState, RecentAction, RECENT_ACTIONS_CAP};

use acp_coder::CoderClient;
use acp_config::ReaperSettings;
use acp_core::WorkspaceSnapshot;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Outcome of the per-workspace classification rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Owner is on the exclusion list; never touched.
    Excluded,
    /// The latest build is younger than the grace period.
    InGrace,
    /// Neither `last_used_at` nor a build timestamp exists; skipped.
    NoTimestamps,
    /// Seen activity within the idle timeout.
    Active,
    /// Idle beyond the timeout; eligible for stopping.
    Idle {
        /// How long the workspace has been idle, in minutes.
        idle_minutes: i64,
    },
}

fn delta(d: std::time::Duration) -> TimeDelta {
    TimeDelta::seconds(d.as_secs() as i64)
}

/// Apply the classification rules to one workspace at `now`.
pub fn classify(
    ws: &WorkspaceSnapshot,
    now: DateTime<Utc>,
    settings: &ReaperSettings,
) -> Classification {
    if settings.excluded_owners.contains(&ws.owner_name) {
        return Classification::Excluded;
    }

    if let Some(created) = ws.build_created_at() {
        if now - created < delta(settings.grace_period) {
            return Classification::InGrace;
        }
    }

    let Some(last_activity) = ws.last_activity() else {
        return Classification::NoTimestamps;
    };

    let idle = now - last_activity;
    if idle >= delta(settings.idle_timeout) {
        Classification::Idle {
            idle_minutes: idle.num_minutes(),
        }
    } else {
        Classification::Active
    }
}

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

/// The reaper task: owns the state, runs the tick loop.
pub struct Reaper {
    settings: ReaperSettings,
    coder: CoderClient,
    state: Arc<RwLock<ReaperState>>,
}

impl Reaper {
    /// Build a reaper from settings; the shared state handle is for the
    /// HTTP status surface.
    pub fn new(settings: ReaperSettings) -> Self {
        let coder = CoderClient::new(
            settings.coder.base_url.clone(),
            settings.coder.session_token.clone(),
        );
        Self {
            settings,
            coder,
            state: Arc::new(RwLock::new(ReaperState::new())),
        }
    }

    /// Shared state handle for HTTP readers.
    pub fn state(&self) -> Arc<RwLock<ReaperState>> {
        Arc::clone(&self.state)
    }

    /// Run ticks forever at the configured interval. Tick failures log and
    /// the next tick proceeds.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.settings.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.settings.check_interval.as_secs(),
            idle_timeout_secs = self.settings.idle_timeout.as_secs(),
            dry_run = self.settings.dry_run,
            "reaper loop starting"
        );
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One poll-classify-act cycle.
    pub async fn tick(&self) {
        let workspaces = match self.coder.list_workspaces().await {
            Ok(list) => list,
            Err(e) => {
                error!(error = %e, "failed to list workspaces, skipping tick");
                return;
            }
        };

        let now = Utc::now();

        // Full classification pass before any action.
        let mut idle: Vec<(WorkspaceSnapshot, i64)> = Vec::new();
        for ws in workspaces.into_iter().filter(WorkspaceSnapshot::is_running) {
            match classify(&ws, now, &self.settings) {
                Classification::Idle { idle_minutes } => idle.push((ws, idle_minutes)),
                Classification::Excluded
                | Classification::InGrace
                | Classification::NoTimestamps
                | Classification::Active => {}
            }
        }

        {
            let mut state = self.state.write().await;
            state.last_check = Some(now);
            state.total_checks += 1;
            state.idle_workspaces = idle
                .iter()
                .map(|(ws, idle_minutes)| IdleWorkspace {
                    id: ws.id.clone(),
                    name: ws.name.clone(),
                    owner: ws.owner_name.clone(),
                    idle_minutes: *idle_minutes,
                })
                .collect();
        }

        for (ws, idle_minutes) in idle {
            self.act(ws, idle_minutes).await;
        }
    }

    async fn act(&self, ws: WorkspaceSnapshot, idle_minutes: i64) {
        if self.settings.dry_run {
            info!(
                workspace = %ws.name,
                owner = %ws.owner_name,
                idle_minutes,
                action = "would_stop",
                "dry-run: workspace idle beyond timeout"
            );
            let mut state = self.state.write().await;
            state.push_action(RecentAction {
                time: Utc::now(),
                action: ReaperAction::WouldStop,
                workspace: ws.name,
                owner: ws.owner_name,
                idle_minutes: Some(idle_minutes),
                error: None,
            });
            return;
        }

        match self.coder.stop_workspace(&ws.id).await {
            Ok(()) => {
                info!(
                    workspace = %ws.name,
                    owner = %ws.owner_name,
                    idle_minutes,
                    action = "stopped",
                    "stopped idle workspace"
                );
                let mut state = self.state.write().await;
                state.total_stops += 1;
                state.push_action(RecentAction {
                    time: Utc::now(),
                    action: ReaperAction::Stopped,
                    workspace: ws.name,
                    owner: ws.owner_name,
                    idle_minutes: Some(idle_minutes),
                    error: None,
                });
            }
            Err(e) => {
                warn!(
                    workspace = %ws.name,
                    owner = %ws.owner_name,
                    action = "stop_failed",
                    error = %e,
                    "failed to stop idle workspace"
                );
                let mut state = self.state.write().await;
                state.push_action(RecentAction {
                    time: Utc::now(),
                    action: ReaperAction::StopFailed,
                    workspace: ws.name,
                    owner: ws.owner_name,
                    idle_minutes: Some(idle_minutes),
                    error: Some(e.to_string()),
                });
            }
        }
    }
}
