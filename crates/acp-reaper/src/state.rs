// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reaper runtime state.
//!
//! Owned by the single reaper task for writes; the HTTP status handlers
//! read snapshots through the shared lock. Nothing here persists — on
//! restart the counters begin again and the workspace host remains the
//! authority on workspace state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Bound on the recent-actions ring.
pub const RECENT_ACTIONS_CAP: usize = 50;

/// What the reaper did (or would do) to one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaperAction {
    /// Dry-run: the workspace qualified but no stop was issued.
    WouldStop,
    /// A stop transition was issued successfully.
    Stopped,
    /// The stop transition failed.
    StopFailed,
}

/// One entry in the recent-actions ring.
#[derive(Debug, Clone, Serialize)]
pub struct RecentAction {
    /// When the decision was made.
    pub time: DateTime<Utc>,
    /// The decision.
    pub action: ReaperAction,
    /// Workspace name.
    pub workspace: String,
    /// Owning username.
    pub owner: String,
    /// How long the workspace had been idle, in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_minutes: Option<i64>,
    /// Failure detail for [`ReaperAction::StopFailed`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A workspace currently classified as idle.
#[derive(Debug, Clone, Serialize)]
pub struct IdleWorkspace {
    /// Workspace id.
    pub id: String,
    /// Workspace name.
    pub name: String,
    /// Owning username.
    pub owner: String,
    /// Idle duration in minutes at classification time.
    pub idle_minutes: i64,
}

/// Process-lifetime reaper state, serialized as-is by `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct ReaperState {
    /// When the process started.
    pub started_at: DateTime<Utc>,
    /// When the last tick ran.
    pub last_check: Option<DateTime<Utc>>,
    /// Ticks completed since start.
    pub total_checks: u64,
    /// Successful stop transitions since start.
    pub total_stops: u64,
    /// Most recent decisions, newest last, bounded at
    /// [`RECENT_ACTIONS_CAP`].
    pub recent_actions: VecDeque<RecentAction>,
    /// Idle set observed by the latest tick.
    pub idle_workspaces: Vec<IdleWorkspace>,
}

impl ReaperState {
    /// Fresh state stamped with the current time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            last_check: None,
            total_checks: 0,
            total_stops: 0,
            recent_actions: VecDeque::new(),
            idle_workspaces: Vec::new(),
        }
    }

    /// Append to the ring, evicting the oldest entry past the cap.
    pub fn push_action(&mut self, action: RecentAction) {
        if self.recent_actions.len() == RECENT_ACTIONS_CAP {
            self.recent_actions.pop_front();
        }
        self.recent_actions.push_back(action);
    }
}

impl Default for ReaperState {
    fn default() -> Self {
        Self::new()
    }
}
