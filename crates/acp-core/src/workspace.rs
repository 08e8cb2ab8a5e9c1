// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workspace-host snapshots.
//!
//! Fetched each reaper tick and discarded; the workspace host stays the
//! authority on workspace state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest build of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSnapshot {
    /// Build status reported by the host (`running`, `stopped`, ...).
    #[serde(default)]
    pub status: String,
    /// When the build was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    /// Workspace id.
    pub id: String,
    /// Workspace name.
    #[serde(default)]
    pub name: String,
    /// Owning username.
    #[serde(default)]
    pub owner_name: String,
    /// Latest build, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_build: Option<BuildSnapshot>,
    /// Last recorded user activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl WorkspaceSnapshot {
    /// Whether the latest build reports the workspace as running.
    pub fn is_running(&self) -> bool {
        self.latest_build
            .as_ref()
            .is_some_and(|b| b.status == "running")
    }

    /// Most recent activity timestamp: `last_used_at`, falling back to the
    /// latest build's creation time. `None` when neither exists.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
            .or_else(|| self.latest_build.as_ref().and_then(|b| b.created_at))
    }

    /// Latest build creation time, if known.
    pub fn build_created_at(&self) -> Option<DateTime<Utc>> {
        self.latest_build.as_ref().and_then(|b| b.created_at)
    }
}
