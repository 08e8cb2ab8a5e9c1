// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-core
//!
//! The stable contract for the AI control plane: virtual-key shapes, policy
//! levels, scope quotas, chat payloads, usage records, and workspace
//! snapshots. Every other crate in the workspace depends on this one and
//! nothing here depends on anything but serde/chrono/uuid.
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Virtual keys, scopes, policy levels, and per-scope quota defaults.
pub mod key;
/// Chat-completion payload shapes seen by the pre-call hooks.
pub mod payload;
/// Per-call usage records written by the gateway.
pub mod usage;
/// Workspace-host snapshots consumed by the idle reaper.
pub mod workspace;

pub use key::{
    EnforcementLevel, GuardrailAction, GuardrailLevel, KeyMetadata, KeyScope, KeyType, ScopeQuota,
    VirtualKey, quotas, scope_defaults,
};
pub use payload::{CallType, ChatMessage, ChatPayload, ContentPart, MessageContent};
pub use usage::{UsageRecord, short_request_id};
pub use workspace::{BuildSnapshot, WorkspaceSnapshot};
