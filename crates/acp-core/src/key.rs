// SPDX-License-Identifier: MIT OR Apache-2.0
//! Virtual-key contract types.
//!
//! The upstream model router owns the key records; the provisioner writes
//! them and the gateway hooks read them. Everything here mirrors the
//! router's wire shapes, with typed views over the recognized metadata keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Policy levels
// ---------------------------------------------------------------------------

/// How aggressively the guardrails scanner treats findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailLevel {
    /// No scanning at all.
    Off,
    /// Block high-confidence findings, warn on the rest.
    Standard,
    /// Block every finding.
    Strict,
}

impl GuardrailLevel {
    /// Wire string for this level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Standard => "standard",
            Self::Strict => "strict",
        }
    }

    /// Parse a wire string; `None` for anything outside the valid set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(Self::Off),
            "standard" => Some(Self::Standard),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

impl fmt::Display for GuardrailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal action taken when a blockable finding fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailAction {
    /// Reject the request with a 400-class error.
    Block,
    /// Replace matches with `[REDACTED:<label>]` and let the request proceed.
    Mask,
}

impl GuardrailAction {
    /// Wire string for this action.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Mask => "mask",
        }
    }

    /// Parse a wire string; `None` for anything outside the valid set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "block" => Some(Self::Block),
            "mask" => Some(Self::Mask),
            _ => None,
        }
    }
}

impl fmt::Display for GuardrailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which policy system prompt the enforcement hook prepends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementLevel {
    /// No prompt injection; original tool behavior.
    Unrestricted,
    /// Baseline engineering guidance.
    Standard,
    /// Design-first workflow framing.
    DesignFirst,
}

impl EnforcementLevel {
    /// Wire string for this level (also the prompt file stem).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Standard => "standard",
            Self::DesignFirst => "design-first",
        }
    }

    /// Parse a wire string; `None` for anything outside the valid set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unrestricted" => Some(Self::Unrestricted),
            "standard" => Some(Self::Standard),
            "design-first" => Some(Self::DesignFirst),
            _ => None,
        }
    }
}

impl fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Scopes and aliases
// ---------------------------------------------------------------------------

/// Broad permission category of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Auto-provisioned per-workspace key.
    Workspace,
    /// Personal self-service key.
    User,
    /// CI pipeline key.
    Ci,
    /// Agent-role key (review, write, ...).
    Agent,
}

impl KeyType {
    /// Wire string for this key type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::User => "user",
            Self::Ci => "ci",
            Self::Agent => "agent",
        }
    }
}

/// The principal a key is scoped to.
///
/// Rendered into the metadata `scope` field as `workspace:<id>`,
/// `user:<name>`, `ci:<id>`, or `agent:<role>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// A single workspace.
    Workspace(String),
    /// A named user.
    User(String),
    /// A CI pipeline.
    Ci(String),
    /// An agent role.
    Agent(String),
}

impl KeyScope {
    /// The `key_type` this scope implies.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Workspace(_) => KeyType::Workspace,
            Self::User(_) => KeyType::User,
            Self::Ci(_) => KeyType::Ci,
            Self::Agent(_) => KeyType::Agent,
        }
    }

    /// Canonical alias for keys carrying this scope.
    ///
    /// The alias is the uniqueness key for idempotent issuance: at most one
    /// active key exists per alias. Agent aliases additionally carry an id
    /// suffix; see [`agent_alias`].
    pub fn alias(&self) -> String {
        match self {
            Self::Workspace(id) => format!("workspace-{id}"),
            Self::User(name) => format!("user-{name}"),
            Self::Ci(id) => format!("ci-{id}"),
            Self::Agent(role) => format!("agent:{role}"),
        }
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workspace(id) => write!(f, "workspace:{id}"),
            Self::User(name) => write!(f, "user:{name}"),
            Self::Ci(id) => write!(f, "ci:{id}"),
            Self::Agent(role) => write!(f, "agent:{role}"),
        }
    }
}

/// Canonical alias for an agent-role key: `agent:<role>-<id>`.
pub fn agent_alias(role: &str, id: &str) -> String {
    format!("agent:{role}-{id}")
}

// ---------------------------------------------------------------------------
// Scope quota defaults
// ---------------------------------------------------------------------------

/// Initial quota bound to a newly issued key.
///
/// Edits to the table apply only to keys issued afterwards; existing keys
/// keep the quotas they were born with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeQuota {
    /// Monetary cap in USD per budget duration.
    pub budget_usd: f64,
    /// Requests per minute.
    pub rpm: u32,
    /// Budget duration in days.
    pub duration_days: u32,
}

/// Default quotas per scope. Named constants so issuing code paths get a
/// total lookup; the string-keyed table below serves generic callers.
pub mod quotas {
    use super::ScopeQuota;

    /// Auto-provisioned workspace keys.
    pub const WORKSPACE: ScopeQuota = ScopeQuota {
        budget_usd: 10.0,
        rpm: 60,
        duration_days: 30,
    };
    /// Personal self-service keys.
    pub const USER: ScopeQuota = ScopeQuota {
        budget_usd: 20.0,
        rpm: 100,
        duration_days: 90,
    };
    /// CI pipeline keys.
    pub const CI: ScopeQuota = ScopeQuota {
        budget_usd: 5.0,
        rpm: 30,
        duration_days: 365,
    };
    /// Review-agent keys.
    pub const AGENT_REVIEW: ScopeQuota = ScopeQuota {
        budget_usd: 15.0,
        rpm: 40,
        duration_days: 365,
    };
    /// Write-agent keys.
    pub const AGENT_WRITE: ScopeQuota = ScopeQuota {
        budget_usd: 30.0,
        rpm: 60,
        duration_days: 365,
    };
}

/// Compile-time quota table keyed by scope name.
const SCOPE_DEFAULT_TABLE: &[(&str, ScopeQuota)] = &[
    ("workspace", quotas::WORKSPACE),
    ("user", quotas::USER),
    ("ci", quotas::CI),
    ("agent:review", quotas::AGENT_REVIEW),
    ("agent:write", quotas::AGENT_WRITE),
];

/// Look up the default quota for a scope name (e.g. `"workspace"`,
/// `"agent:review"`).
pub fn scope_defaults(scope: &str) -> Option<ScopeQuota> {
    SCOPE_DEFAULT_TABLE
        .iter()
        .find(|(name, _)| *name == scope)
        .map(|(_, quota)| *quota)
}

// ---------------------------------------------------------------------------
// Key metadata
// ---------------------------------------------------------------------------

/// Free-form key metadata with typed accessors for the recognized entries.
///
/// The policy level fields stay raw strings so the hooks can warn about (and
/// substitute defaults for) values outside the valid sets instead of failing
/// deserialization. Unrecognized entries round-trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Scope string, e.g. `workspace:ws-42`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Key type discriminator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,
    /// Raw enforcement level string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement_level: Option<String>,
    /// Raw guardrail level string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_level: Option<String>,
    /// Raw guardrail action string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_action: Option<String>,
    /// Workspace id for workspace keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Username of the workspace owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_owner: Option<String>,
    /// Human-readable workspace name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    /// Username for user keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Free-text purpose recorded at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Issuing component, e.g. `key-provisioner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Issuance timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Unrecognized metadata entries, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// VirtualKey
// ---------------------------------------------------------------------------

/// A scoped virtual credential as reported by the upstream router.
///
/// Every field is optional because upstream shapes vary by version; the
/// clients treat a null or empty `token` as "no key".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualKey {
    /// Opaque credential string. Secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Human label; globally unique among active keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<String>,
    /// The principal the key is billed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Monetary cap per budget duration (USD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    /// Requests per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm_limit: Option<u32>,
    /// Tokens per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm_limit: Option<u32>,
    /// Accumulated cost since the last reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
    /// Optional model allow-list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// Free-form metadata; see [`KeyMetadata`] for the recognized entries.
    #[serde(default)]
    pub metadata: KeyMetadata,
    /// Upstream fields we do not model, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl VirtualKey {
    /// Returns the token if it is present and non-empty.
    pub fn active_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guardrail_level_wire_strings() {
        assert_eq!(
            serde_json::to_string(&GuardrailLevel::Off).unwrap(),
            "\"off\""
        );
        assert_eq!(
            serde_json::to_string(&GuardrailLevel::Strict).unwrap(),
            "\"strict\""
        );
        assert_eq!(GuardrailLevel::parse("standard"), Some(GuardrailLevel::Standard));
        assert_eq!(GuardrailLevel::parse("paranoid"), None);
    }

    #[test]
    fn guardrail_level_ordering_tracks_strictness() {
        assert!(GuardrailLevel::Off < GuardrailLevel::Standard);
        assert!(GuardrailLevel::Standard < GuardrailLevel::Strict);
    }

    #[test]
    fn enforcement_level_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&EnforcementLevel::DesignFirst).unwrap(),
            "\"design-first\""
        );
        assert_eq!(
            EnforcementLevel::parse("design-first"),
            Some(EnforcementLevel::DesignFirst)
        );
        assert_eq!(EnforcementLevel::parse("design_first"), None);
    }

    #[test]
    fn scope_display_and_alias() {
        let ws = KeyScope::Workspace("ws-42".into());
        assert_eq!(ws.to_string(), "workspace:ws-42");
        assert_eq!(ws.alias(), "workspace-ws-42");
        assert_eq!(ws.key_type(), KeyType::Workspace);

        let user = KeyScope::User("alice".into());
        assert_eq!(user.to_string(), "user:alice");
        assert_eq!(user.alias(), "user-alice");

        assert_eq!(agent_alias("review", "7"), "agent:review-7");
    }

    #[test]
    fn scope_defaults_table() {
        let ws = scope_defaults("workspace").unwrap();
        assert_eq!(ws.budget_usd, 10.0);
        assert_eq!(ws.rpm, 60);
        assert_eq!(ws.duration_days, 30);

        let review = scope_defaults("agent:review").unwrap();
        assert_eq!(review.budget_usd, 15.0);

        assert!(scope_defaults("nonsense").is_none());
    }

    #[test]
    fn metadata_roundtrips_unknown_entries() {
        let json = serde_json::json!({
            "scope": "workspace:ws-1",
            "key_type": "workspace",
            "guardrail_level": "strict",
            "team": "payments",
        });
        let meta: KeyMetadata = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(meta.scope.as_deref(), Some("workspace:ws-1"));
        assert_eq!(meta.key_type, Some(KeyType::Workspace));
        assert_eq!(meta.guardrail_level.as_deref(), Some("strict"));
        assert_eq!(meta.extra["team"], "payments");

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn virtual_key_active_token() {
        let mut key = VirtualKey::default();
        assert!(key.active_token().is_none());

        key.token = Some(String::new());
        assert!(key.active_token().is_none());

        key.token = Some("sk-abc".into());
        assert_eq!(key.active_token(), Some("sk-abc"));
    }

    #[test]
    fn virtual_key_tolerates_unknown_upstream_fields() {
        let json = serde_json::json!({
            "token": "sk-xyz",
            "key_alias": "workspace-ws-9",
            "user_id": "bob",
            "max_budget": 10.0,
            "rpm_limit": 60,
            "key_name": "sk-...xyz",
            "blocked": false,
        });
        let key: VirtualKey = serde_json::from_value(json).unwrap();
        assert_eq!(key.active_token(), Some("sk-xyz"));
        assert_eq!(key.key_alias.as_deref(), Some("workspace-ws-9"));
        assert_eq!(key.extra["blocked"], false);
    }
}
