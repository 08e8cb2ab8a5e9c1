// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading for the AI control plane services.
//!
//! Everything is environment-driven (the services run in containers and are
//! configured the twelve-factor way). Loading never fails: missing
//! credentials and malformed values produce advisory [`ConfigWarning`]s and
//! defaults, so a misconfigured service still comes up far enough to report
//! degraded health.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use acp_core::{EnforcementLevel, GuardrailAction, GuardrailLevel};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level configuration issues that do not prevent startup but
/// deserve a log line and usually show up as degraded health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A credential the service needs for full operation is unset.
    MissingCredential {
        /// Environment variable name.
        var: String,
        /// What stops working without it.
        consequence: String,
    },
    /// A variable held a value outside its valid set; the default was used.
    InvalidValue {
        /// Environment variable name.
        var: String,
        /// The rejected value.
        value: String,
        /// The substituted default, rendered as a string.
        default: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingCredential { var, consequence } => {
                write!(f, "{var} is not set — {consequence}")
            }
            ConfigWarning::InvalidValue {
                var,
                value,
                default,
            } => {
                write!(f, "invalid {var}={value:?}, using default {default}")
            }
        }
    }
}

/// Environment lookup seam so tests can feed maps instead of process env.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get(env: EnvLookup<'_>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

fn get_or(env: EnvLookup<'_>, key: &str, default: &str) -> String {
    get(env, key).unwrap_or_else(|| default.to_string())
}

/// `"true"` (any case) is true, everything else false — matching the
/// container conventions the platform already uses.
fn parse_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

fn parse_u64(
    env: EnvLookup<'_>,
    key: &str,
    default: u64,
    warnings: &mut Vec<ConfigWarning>,
) -> u64 {
    match get(env, key) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                warnings.push(ConfigWarning::InvalidValue {
                    var: key.to_string(),
                    value: raw,
                    default: default.to_string(),
                });
                default
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Upstream router
// ---------------------------------------------------------------------------

/// Connection settings for the upstream model router.
#[derive(Debug, Clone, Serialize)]
pub struct LitellmSettings {
    /// Router base URL.
    pub base_url: String,
    /// Master credential; every privileged key operation carries it.
    #[serde(skip_serializing)]
    pub master_key: Option<String>,
}

impl LitellmSettings {
    /// Load from `LITELLM_URL` / `LITELLM_MASTER_KEY`.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(&process_env)
    }

    /// Load from an explicit lookup (tests).
    pub fn from_lookup(env: EnvLookup<'_>) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let master_key = get(env, "LITELLM_MASTER_KEY");
        if master_key.is_none() {
            warnings.push(ConfigWarning::MissingCredential {
                var: "LITELLM_MASTER_KEY".into(),
                consequence: "key generation will fail".into(),
            });
        }
        (
            Self {
                base_url: get_or(env, "LITELLM_URL", "http://litellm:4000"),
                master_key,
            },
            warnings,
        )
    }
}

// ---------------------------------------------------------------------------
// Workspace host
// ---------------------------------------------------------------------------

/// Connection settings for the workspace host.
#[derive(Debug, Clone, Serialize)]
pub struct CoderSettings {
    /// Workspace-host base URL.
    pub base_url: String,
    /// Admin session token for listing/stopping workspaces.
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
}

impl CoderSettings {
    /// Load from `CODER_URL` / `CODER_SESSION_TOKEN`.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(&process_env)
    }

    /// Load from an explicit lookup (tests).
    pub fn from_lookup(env: EnvLookup<'_>) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let session_token = get(env, "CODER_SESSION_TOKEN");
        if session_token.is_none() {
            warnings.push(ConfigWarning::MissingCredential {
                var: "CODER_SESSION_TOKEN".into(),
                consequence: "workspace listing and stop transitions will fail".into(),
            });
        }
        (
            Self {
                base_url: get_or(env, "CODER_URL", "http://coder-server:7080"),
                session_token,
            },
            warnings,
        )
    }
}

// ---------------------------------------------------------------------------
// Guardrails / enforcement hooks
// ---------------------------------------------------------------------------

/// Settings for the guardrails pre-call hook.
#[derive(Debug, Clone, Serialize)]
pub struct GuardrailSettings {
    /// Global kill switch.
    pub enabled: bool,
    /// Directory holding the optional `patterns.json` overlay.
    pub dir: PathBuf,
    /// Level substituted when key metadata has none (or an invalid one).
    pub default_level: GuardrailLevel,
    /// Action substituted when key metadata has none (or an invalid one).
    pub default_action: GuardrailAction,
}

impl GuardrailSettings {
    /// Load from `GUARDRAILS_ENABLED`, `GUARDRAILS_DIR`,
    /// `DEFAULT_GUARDRAIL_LEVEL`, `DEFAULT_GUARDRAIL_ACTION`.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(&process_env)
    }

    /// Load from an explicit lookup (tests).
    pub fn from_lookup(env: EnvLookup<'_>) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let default_level = match get(env, "DEFAULT_GUARDRAIL_LEVEL") {
            None => GuardrailLevel::Standard,
            Some(raw) => GuardrailLevel::parse(&raw).unwrap_or_else(|| {
                warnings.push(ConfigWarning::InvalidValue {
                    var: "DEFAULT_GUARDRAIL_LEVEL".into(),
                    value: raw,
                    default: GuardrailLevel::Standard.to_string(),
                });
                GuardrailLevel::Standard
            }),
        };
        let default_action = match get(env, "DEFAULT_GUARDRAIL_ACTION") {
            None => GuardrailAction::Block,
            Some(raw) => GuardrailAction::parse(&raw).unwrap_or_else(|| {
                warnings.push(ConfigWarning::InvalidValue {
                    var: "DEFAULT_GUARDRAIL_ACTION".into(),
                    value: raw,
                    default: GuardrailAction::Block.to_string(),
                });
                GuardrailAction::Block
            }),
        };

        (
            Self {
                enabled: get(env, "GUARDRAILS_ENABLED")
                    .map(|raw| parse_bool(&raw))
                    .unwrap_or(true),
                dir: PathBuf::from(get_or(env, "GUARDRAILS_DIR", "/app/guardrails")),
                default_level,
                default_action,
            },
            warnings,
        )
    }
}

/// Settings for the enforcement pre-call hook.
#[derive(Debug, Clone, Serialize)]
pub struct EnforcementSettings {
    /// Directory holding `<level>.md` prompt files.
    pub prompts_dir: PathBuf,
    /// Level substituted when key metadata has none (or an invalid one).
    pub default_level: EnforcementLevel,
}

impl EnforcementSettings {
    /// Load from `ENFORCEMENT_PROMPTS_DIR` / `DEFAULT_ENFORCEMENT_LEVEL`.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(&process_env)
    }

    /// Load from an explicit lookup (tests).
    pub fn from_lookup(env: EnvLookup<'_>) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let default_level = match get(env, "DEFAULT_ENFORCEMENT_LEVEL") {
            None => EnforcementLevel::Standard,
            Some(raw) => EnforcementLevel::parse(&raw).unwrap_or_else(|| {
                warnings.push(ConfigWarning::InvalidValue {
                    var: "DEFAULT_ENFORCEMENT_LEVEL".into(),
                    value: raw,
                    default: EnforcementLevel::Standard.to_string(),
                });
                EnforcementLevel::Standard
            }),
        };
        (
            Self {
                prompts_dir: PathBuf::from(get_or(env, "ENFORCEMENT_PROMPTS_DIR", "/app/prompts")),
                default_level,
            },
            warnings,
        )
    }
}

// ---------------------------------------------------------------------------
// Key provisioner
// ---------------------------------------------------------------------------

/// Settings for the key provisioner service.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionerSettings {
    /// Shared service secret workspaces authenticate with.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Upstream router connection.
    pub litellm: LitellmSettings,
    /// Workspace host connection (session-token validation).
    pub coder: CoderSettings,
}

impl ProvisionerSettings {
    /// Load from the process environment.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(&process_env)
    }

    /// Load from an explicit lookup (tests).
    pub fn from_lookup(env: EnvLookup<'_>) -> (Self, Vec<ConfigWarning>) {
        let (litellm, mut warnings) = LitellmSettings::from_lookup(env);
        // The provisioner only talks to the host's user-info endpoint with
        // caller-supplied tokens; its own session token is not required.
        let coder = CoderSettings {
            base_url: get_or(env, "CODER_URL", "http://coder-server:7080"),
            session_token: get(env, "CODER_SESSION_TOKEN"),
        };

        let secret = get(env, "PROVISIONER_SECRET");
        if secret.is_none() {
            warnings.push(ConfigWarning::MissingCredential {
                var: "PROVISIONER_SECRET".into(),
                consequence: "the workspace endpoint is unprotected".into(),
            });
        }

        (
            Self {
                secret,
                litellm,
                coder,
            },
            warnings,
        )
    }
}

// ---------------------------------------------------------------------------
// Idle reaper
// ---------------------------------------------------------------------------

/// Settings for the idle workspace reaper.
#[derive(Debug, Clone, Serialize)]
pub struct ReaperSettings {
    /// Workspace host connection.
    pub coder: CoderSettings,
    /// Idle threshold before a workspace is eligible for stopping.
    #[serde(serialize_with = "secs", rename = "idle_timeout_seconds")]
    pub idle_timeout: Duration,
    /// Interval between polling ticks.
    #[serde(serialize_with = "secs", rename = "check_interval_seconds")]
    pub check_interval: Duration,
    /// Log stop decisions without issuing them.
    pub dry_run: bool,
    /// Interval after a build during which idle checks do not apply.
    #[serde(serialize_with = "secs", rename = "grace_period_seconds")]
    pub grace_period: Duration,
    /// Owners whose workspaces are never stopped.
    pub excluded_owners: BTreeSet<String>,
}

fn secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

impl ReaperSettings {
    /// Load from `IDLE_TIMEOUT_MINUTES`, `CHECK_INTERVAL_SECONDS`,
    /// `DRY_RUN`, `GRACE_PERIOD_MINUTES`, `EXCLUDED_OWNERS`, plus the
    /// workspace-host connection variables.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(&process_env)
    }

    /// Load from an explicit lookup (tests).
    pub fn from_lookup(env: EnvLookup<'_>) -> (Self, Vec<ConfigWarning>) {
        let (coder, mut warnings) = CoderSettings::from_lookup(env);

        let idle_minutes = parse_u64(env, "IDLE_TIMEOUT_MINUTES", 30, &mut warnings);
        let interval_seconds = parse_u64(env, "CHECK_INTERVAL_SECONDS", 300, &mut warnings);
        let grace_minutes = parse_u64(env, "GRACE_PERIOD_MINUTES", 15, &mut warnings);

        let excluded_owners = get(env, "EXCLUDED_OWNERS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        (
            Self {
                coder,
                idle_timeout: Duration::from_secs(idle_minutes * 60),
                check_interval: Duration::from_secs(interval_seconds),
                dry_run: get(env, "DRY_RUN")
                    .map(|raw| parse_bool(&raw))
                    .unwrap_or(true),
                grace_period: Duration::from_secs(grace_minutes * 60),
                excluded_owners,
            },
            warnings,
        )
    }
}
