// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content guardrails hook.
//!
//! Scans all user-visible text in a chat completion against the pattern
//! library and, per the key's `guardrail_action`, either refuses the
//! request or masks the offending spans in place. Warn-level findings only
//! ever produce log lines.

use crate::{GuardrailBlock, PipelineOutcome, PreCallHook};
use acp_config::GuardrailSettings;
use acp_core::{
    CallType, ChatPayload, GuardrailAction, GuardrailLevel, KeyMetadata, MessageContent,
};
use acp_patterns::{CompiledRule, Finding, FindingAction, PatternLibrary, mask_text};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// The guardrails pre-call hook.
pub struct GuardrailsHook {
    settings: GuardrailSettings,
    library: Arc<PatternLibrary>,
}

impl GuardrailsHook {
    /// Hook reading overlay rules from the configured guardrails directory.
    pub fn new(settings: GuardrailSettings) -> Self {
        let library = Arc::new(PatternLibrary::with_overlay_dir(&settings.dir));
        Self { settings, library }
    }

    /// Hook with an explicit library (tests, embedded rulesets).
    pub fn with_library(settings: GuardrailSettings, library: Arc<PatternLibrary>) -> Self {
        Self { settings, library }
    }

    fn effective_level(&self, meta: &KeyMetadata) -> GuardrailLevel {
        match meta.guardrail_level.as_deref() {
            None => self.settings.default_level,
            Some(raw) => GuardrailLevel::parse(raw).unwrap_or_else(|| {
                warn!(
                    value = raw,
                    default = %self.settings.default_level,
                    "invalid guardrail_level in key metadata, using default"
                );
                self.settings.default_level
            }),
        }
    }

    fn effective_action(&self, meta: &KeyMetadata) -> GuardrailAction {
        match meta.guardrail_action.as_deref() {
            None => self.settings.default_action,
            Some(raw) => GuardrailAction::parse(raw).unwrap_or_else(|| {
                warn!(
                    value = raw,
                    default = %self.settings.default_action,
                    "invalid guardrail_action in key metadata, using default"
                );
                self.settings.default_action
            }),
        }
    }

    fn mask_payload(&self, payload: &mut ChatPayload, blocks: &[&Finding]) {
        // Unique blocked rules, in ruleset order so overlapping rules
        // resolve the same way scanning did.
        let blocked_names: BTreeSet<&str> =
            blocks.iter().map(|f| f.pattern_name.as_str()).collect();
        let rules = self.library.rules();
        let to_mask: Vec<&CompiledRule> = rules
            .iter()
            .filter(|c| blocked_names.contains(c.rule.name.as_str()))
            .collect();

        for msg in &mut payload.messages {
            match &mut msg.content {
                Some(MessageContent::Text(text)) => {
                    *text = mask_text(&to_mask, text);
                }
                Some(MessageContent::Parts(parts)) => {
                    for part in parts {
                        if part.is_text() {
                            if let Some(text) = &part.text {
                                part.text = Some(mask_text(&to_mask, text));
                            }
                        }
                    }
                }
                None => {}
            }
        }
    }
}

fn sorted_unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let set: BTreeSet<String> = values.collect();
    set.into_iter().collect()
}

#[async_trait]
impl PreCallHook for GuardrailsHook {
    async fn pre_call(
        &self,
        meta: &KeyMetadata,
        call_type: CallType,
        mut payload: ChatPayload,
    ) -> PipelineOutcome {
        if !call_type.is_chat_completion() || !self.settings.enabled {
            return PipelineOutcome::Passed(payload);
        }

        let level = self.effective_level(meta);
        let action = self.effective_action(meta);
        if level == GuardrailLevel::Off {
            return PipelineOutcome::Passed(payload);
        }

        let text = payload.visible_text();
        if text.trim().is_empty() {
            return PipelineOutcome::Passed(payload);
        }

        let findings = self.library.scan(&text, level);
        if findings.is_empty() {
            return PipelineOutcome::Passed(payload);
        }

        let (blocks, warnings): (Vec<&Finding>, Vec<&Finding>) = findings
            .iter()
            .partition(|f| f.action == FindingAction::Block);

        for w in &warnings {
            warn!(
                label = %w.label,
                category = w.category.as_str(),
                severity = ?w.severity,
                sample = %w.sample,
                "guardrail warning"
            );
        }

        if blocks.is_empty() {
            return PipelineOutcome::Passed(payload);
        }

        let labels = sorted_unique(blocks.iter().map(|f| f.label.clone()));
        let categories =
            sorted_unique(blocks.iter().map(|f| f.category.as_str().to_string()));

        match action {
            GuardrailAction::Mask => {
                self.mask_payload(&mut payload, &blocks);
                warn!(
                    labels = %labels.join(", "),
                    level = %level,
                    "guardrails masked request content"
                );
                PipelineOutcome::Passed(payload)
            }
            GuardrailAction::Block => {
                warn!(
                    findings = blocks.len(),
                    labels = %labels.join(", "),
                    level = %level,
                    "guardrails blocked request"
                );
                PipelineOutcome::Blocked(GuardrailBlock {
                    labels,
                    categories,
                    level,
                })
            }
        }
    }
}
