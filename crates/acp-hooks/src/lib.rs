// SPDX-License-Identifier: MIT OR Apache-2.0
//! acp-hooks
//!
//! The gateway pre-call pipeline: every chat completion passes through the
//! guardrails scanner and then the enforcement prompt injector before it
//! reaches the upstream model. The order is load-bearing — enforcement
//! prompt text is trusted and must never be scanned, and a masked payload
//! must still receive its policy framing — so [`Pipeline`] owns it rather
//! than leaving composition to callers.
//!
//! A hook never raises: the block signal is the [`PipelineOutcome::Blocked`]
//! variant, which the hosting proxy renders as an HTTP 400.

#![deny(unsafe_code)]

mod enforcement;
mod guardrails;

pub use enforcement::EnforcementHook;
pub use guardrails::GuardrailsHook;

use acp_core::{CallType, ChatPayload, GuardrailLevel, KeyMetadata};
use async_trait::async_trait;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a request was refused, without any of its content.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailBlock {
    /// Labels of the rules that fired, sorted and de-duplicated.
    pub labels: Vec<String>,
    /// Categories of the rules that fired, sorted and de-duplicated.
    pub categories: Vec<String>,
    /// The guardrail level that was active.
    pub level: GuardrailLevel,
}

impl GuardrailBlock {
    /// Caller-facing message: names what fired but never echoes the matched
    /// content.
    pub fn detail(&self) -> String {
        format!(
            "Request blocked by content guardrails. Detected sensitive data: {}. \
             Categories: {}. Remove sensitive information before sending to AI. \
             Guardrail level: {}",
            self.labels.join(", "),
            self.categories.join(", "),
            self.level,
        )
    }
}

/// Result of running a hook (or the whole pipeline) over a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The (possibly rewritten) payload continues to the upstream call.
    Passed(ChatPayload),
    /// The request is refused; render as HTTP 400.
    Blocked(GuardrailBlock),
}

impl PipelineOutcome {
    /// Unwrap the passed payload; panics on `Blocked`. Test helper.
    pub fn expect_passed(self) -> ChatPayload {
        match self {
            Self::Passed(p) => p,
            Self::Blocked(b) => panic!("pipeline blocked: {}", b.detail()),
        }
    }
}

// ---------------------------------------------------------------------------
// Hook trait and pipeline
// ---------------------------------------------------------------------------

/// One pre-call transformation applied to chat completions.
#[async_trait]
pub trait PreCallHook: Send + Sync {
    /// Inspect and possibly rewrite `payload` for the key described by
    /// `meta`. Non-chat call types must pass through unchanged.
    async fn pre_call(
        &self,
        meta: &KeyMetadata,
        call_type: CallType,
        payload: ChatPayload,
    ) -> PipelineOutcome;
}

/// Ordered composition of pre-call hooks.
pub struct Pipeline {
    hooks: Vec<Arc<dyn PreCallHook>>,
}

impl Pipeline {
    /// The standard gateway pipeline: guardrails strictly before
    /// enforcement.
    pub fn standard(guardrails: GuardrailsHook, enforcement: EnforcementHook) -> Self {
        Self {
            hooks: vec![Arc::new(guardrails), Arc::new(enforcement)],
        }
    }

    /// Run every hook in order, short-circuiting on the first block.
    pub async fn pre_call(
        &self,
        meta: &KeyMetadata,
        call_type: CallType,
        payload: ChatPayload,
    ) -> PipelineOutcome {
        let mut current = payload;
        for hook in &self.hooks {
            match hook.pre_call(meta, call_type, current).await {
                PipelineOutcome::Passed(next) => current = next,
                blocked @ PipelineOutcome::Blocked(_) => return blocked,
            }
        }
        PipelineOutcome::Passed(current)
    }
}
