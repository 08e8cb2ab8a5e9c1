// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end behavior of the guardrails and enforcement hooks and their
//! composition.

use acp_config::{EnforcementSettings, GuardrailSettings};
use acp_core::{
    CallType, ChatMessage, ChatPayload, EnforcementLevel, GuardrailAction, GuardrailLevel,
    KeyMetadata, MessageContent,
};
use acp_hooks::{EnforcementHook, GuardrailsHook, Pipeline, PipelineOutcome, PreCallHook};
use std::path::PathBuf;

fn guardrail_settings() -> GuardrailSettings {
    GuardrailSettings {
        enabled: true,
        // No overlay file here; the built-in table applies.
        dir: PathBuf::from("/nonexistent"),
        default_level: GuardrailLevel::Standard,
        default_action: GuardrailAction::Block,
    }
}

fn guardrails() -> GuardrailsHook {
    GuardrailsHook::new(guardrail_settings())
}

fn meta(level: &str, action: &str) -> KeyMetadata {
    KeyMetadata {
        guardrail_level: Some(level.to_string()),
        guardrail_action: Some(action.to_string()),
        ..Default::default()
    }
}

fn user_payload(text: &str) -> ChatPayload {
    ChatPayload {
        model: Some("claude-sonnet".to_string()),
        messages: vec![ChatMessage::user(text)],
        ..Default::default()
    }
}

fn text_of(payload: &ChatPayload, idx: usize) -> &str {
    match payload.messages[idx].content.as_ref().unwrap() {
        MessageContent::Text(s) => s,
        MessageContent::Parts(_) => panic!("expected string content"),
    }
}

fn enforcement_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("standard.md"), "Follow the team norms.\n").unwrap();
    std::fs::write(dir.path().join("design-first.md"), "Think first.\n").unwrap();
    dir
}

fn enforcement(dir: &tempfile::TempDir) -> EnforcementHook {
    EnforcementHook::new(EnforcementSettings {
        prompts_dir: dir.path().to_path_buf(),
        default_level: EnforcementLevel::Standard,
    })
}

// ---------------------------------------------------------------------------
// Guardrails: blocking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocks_credit_card_at_standard() {
    let outcome = guardrails()
        .pre_call(
            &meta("standard", "block"),
            CallType::Completion,
            user_payload("my card is 4111-1111-1111-1111"),
        )
        .await;

    match outcome {
        PipelineOutcome::Blocked(block) => {
            assert!(block.labels.contains(&"Visa credit card number".to_string()));
            assert!(block.categories.contains(&"financial".to_string()));
            assert_eq!(block.level, GuardrailLevel::Standard);
            let detail = block.detail();
            assert!(detail.contains("Visa credit card number"));
            assert!(detail.contains("financial"));
            assert!(detail.contains("standard"));
            assert!(!detail.contains("4111"));
        }
        PipelineOutcome::Passed(_) => panic!("card number must block"),
    }
}

#[tokio::test]
async fn block_detail_lists_each_label_once() {
    let outcome = guardrails()
        .pre_call(
            &meta("standard", "block"),
            CallType::Completion,
            user_payload("ssn 123-45-6789 and again 987-65-4321"),
        )
        .await;

    let PipelineOutcome::Blocked(block) = outcome else {
        panic!("two SSNs must block");
    };
    assert_eq!(block.labels, vec!["US Social Security Number".to_string()]);
}

// ---------------------------------------------------------------------------
// Guardrails: masking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn masks_ssn_at_strict() {
    let outcome = guardrails()
        .pre_call(
            &meta("strict", "mask"),
            CallType::Completion,
            user_payload("ssn 123-45-6789 ok"),
        )
        .await;

    let payload = outcome.expect_passed();
    assert_eq!(
        text_of(&payload, 0),
        "ssn [REDACTED:US Social Security Number] ok"
    );
}

#[tokio::test]
async fn masking_covers_every_message_and_occurrence() {
    let payload = ChatPayload {
        messages: vec![
            ChatMessage::user("first 123-45-6789"),
            ChatMessage::user("second 987-65-4321 and 111-22-3333"),
        ],
        ..Default::default()
    };
    let outcome = guardrails()
        .pre_call(&meta("standard", "mask"), CallType::Acompletion, payload)
        .await;

    let masked = outcome.expect_passed();
    assert_eq!(
        text_of(&masked, 0),
        "first [REDACTED:US Social Security Number]"
    );
    assert_eq!(
        text_of(&masked, 1),
        "second [REDACTED:US Social Security Number] and [REDACTED:US Social Security Number]"
    );
}

#[tokio::test]
async fn masking_multimodal_touches_text_parts_only() {
    let json = serde_json::json!({
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "card 4111-1111-1111-1111"},
                {"type": "image_url", "image_url": {"url": "https://img/4111.png"}},
            ],
        }],
    });
    let payload: ChatPayload = serde_json::from_value(json).unwrap();

    let outcome = guardrails()
        .pre_call(&meta("standard", "mask"), CallType::Completion, payload)
        .await;
    let masked = outcome.expect_passed();

    let MessageContent::Parts(parts) = masked.messages[0].content.as_ref().unwrap() else {
        panic!("expected parts");
    };
    assert_eq!(
        parts[0].text.as_deref(),
        Some("card [REDACTED:Visa credit card number]")
    );
    // Non-text parts are untouched, even when their payload looks sensitive.
    assert_eq!(parts[1].extra["image_url"]["url"], "https://img/4111.png");
}

#[tokio::test]
async fn masking_twice_is_stable() {
    let hook = guardrails();
    let meta = meta("strict", "mask");
    let once = hook
        .pre_call(&meta, CallType::Completion, user_payload("ssn 123-45-6789"))
        .await
        .expect_passed();
    let twice = hook
        .pre_call(&meta, CallType::Completion, once.clone())
        .await
        .expect_passed();
    assert_eq!(once, twice);
}

// ---------------------------------------------------------------------------
// Guardrails: context gating and warn findings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn routing_number_without_financial_context_passes() {
    let payload = user_payload("my pin is 123456789");
    let outcome = guardrails()
        .pre_call(&meta("standard", "block"), CallType::Completion, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn routing_number_with_financial_context_blocks_at_strict() {
    let outcome = guardrails()
        .pre_call(
            &meta("strict", "block"),
            CallType::Completion,
            user_payload("wire routing 123456789"),
        )
        .await;
    let PipelineOutcome::Blocked(block) = outcome else {
        panic!("routing number with context must block at strict");
    };
    assert!(
        block
            .labels
            .contains(&"Bank routing number (ABA)".to_string())
    );
}

#[tokio::test]
async fn routing_number_with_context_only_warns_at_standard() {
    // flag/medium maps to warn at standard: logged, request proceeds.
    let payload = user_payload("wire routing 123456789");
    let outcome = guardrails()
        .pre_call(&meta("standard", "block"), CallType::Completion, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn warn_findings_never_modify_the_payload() {
    // Email is flag/medium: a warning at standard, not a block.
    let payload = user_payload("contact dev@example.com for access");
    let outcome = guardrails()
        .pre_call(&meta("standard", "block"), CallType::Completion, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

// ---------------------------------------------------------------------------
// Guardrails: pass-through conditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn off_level_passes_sensitive_content_unchanged() {
    let payload = user_payload("ssn 123-45-6789 card 4111-1111-1111-1111");
    let outcome = guardrails()
        .pre_call(&meta("off", "block"), CallType::Completion, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn disabled_switch_bypasses_scanning() {
    let mut settings = guardrail_settings();
    settings.enabled = false;
    let hook = GuardrailsHook::new(settings);

    let payload = user_payload("ssn 123-45-6789");
    let outcome = hook
        .pre_call(&meta("strict", "block"), CallType::Completion, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn non_chat_call_types_pass_through() {
    let payload = user_payload("ssn 123-45-6789");
    let outcome = guardrails()
        .pre_call(&meta("strict", "block"), CallType::Embedding, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn whitespace_only_text_passes_through() {
    let payload = user_payload("   \n\t ");
    let outcome = guardrails()
        .pre_call(&meta("strict", "block"), CallType::Completion, payload.clone())
        .await;
    assert_eq!(outcome, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn invalid_metadata_values_fall_back_to_defaults() {
    // Defaults are standard/block, so the SSN still blocks.
    let outcome = guardrails()
        .pre_call(
            &meta("paranoid", "quarantine"),
            CallType::Completion,
            user_payload("ssn 123-45-6789"),
        )
        .await;
    assert!(matches!(outcome, PipelineOutcome::Blocked(_)));
}

#[tokio::test]
async fn clean_payload_is_returned_byte_for_byte() {
    let json = serde_json::json!({
        "model": "claude-sonnet",
        "messages": [{"role": "user", "content": "write me a haiku", "name": "alice"}],
        "temperature": 0.7,
        "max_tokens": 256,
    });
    let payload: ChatPayload = serde_json::from_value(json.clone()).unwrap();
    let outcome = guardrails()
        .pre_call(&meta("strict", "block"), CallType::Completion, payload)
        .await;
    let out = serde_json::to_value(outcome.expect_passed()).unwrap();
    assert_eq!(out, json);
}

// ---------------------------------------------------------------------------
// Enforcement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enforcement_prepends_design_first_prompt() {
    let dir = enforcement_dir();
    let hook = enforcement(&dir);
    let meta = KeyMetadata {
        enforcement_level: Some("design-first".to_string()),
        ..Default::default()
    };

    let outcome = hook
        .pre_call(&meta, CallType::Completion, user_payload("hi"))
        .await;
    let payload = outcome.expect_passed();

    assert_eq!(payload.messages.len(), 2);
    assert_eq!(payload.messages[0].role, "system");
    assert_eq!(text_of(&payload, 0), "Think first.");
    assert_eq!(text_of(&payload, 1), "hi");
}

#[tokio::test]
async fn enforcement_keeps_existing_system_messages() {
    let dir = enforcement_dir();
    let hook = enforcement(&dir);
    let payload = ChatPayload {
        messages: vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user("hi"),
        ],
        ..Default::default()
    };

    let out = hook
        .pre_call(&KeyMetadata::default(), CallType::Completion, payload)
        .await
        .expect_passed();

    assert_eq!(out.messages.len(), 3);
    assert_eq!(text_of(&out, 0), "Follow the team norms.");
    assert_eq!(text_of(&out, 1), "You are a helpful assistant.");
}

#[tokio::test]
async fn unrestricted_level_injects_nothing() {
    let dir = enforcement_dir();
    let hook = enforcement(&dir);
    let meta = KeyMetadata {
        enforcement_level: Some("unrestricted".to_string()),
        ..Default::default()
    };

    let payload = user_payload("hi");
    let out = hook
        .pre_call(&meta, CallType::Completion, payload.clone())
        .await;
    assert_eq!(out, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn missing_prompt_file_passes_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let hook = enforcement(&dir);

    let payload = user_payload("hi");
    let out = hook
        .pre_call(&KeyMetadata::default(), CallType::Completion, payload.clone())
        .await;
    assert_eq!(out, PipelineOutcome::Passed(payload));
}

#[tokio::test]
async fn invalid_enforcement_level_uses_default() {
    let dir = enforcement_dir();
    let hook = enforcement(&dir);
    let meta = KeyMetadata {
        enforcement_level: Some("yolo".to_string()),
        ..Default::default()
    };

    let out = hook
        .pre_call(&meta, CallType::Completion, user_payload("hi"))
        .await
        .expect_passed();
    assert_eq!(text_of(&out, 0), "Follow the team norms.");
}

#[tokio::test]
async fn enforcement_ignores_non_chat_calls() {
    let dir = enforcement_dir();
    let hook = enforcement(&dir);
    let payload = user_payload("hi");
    let out = hook
        .pre_call(&KeyMetadata::default(), CallType::Moderation, payload.clone())
        .await;
    assert_eq!(out, PipelineOutcome::Passed(payload));
}

// ---------------------------------------------------------------------------
// Pipeline composition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pipeline_masks_then_frames() {
    let dir = enforcement_dir();
    let pipeline = Pipeline::standard(guardrails(), enforcement(&dir));
    let meta = KeyMetadata {
        guardrail_level: Some("strict".to_string()),
        guardrail_action: Some("mask".to_string()),
        enforcement_level: Some("design-first".to_string()),
        ..Default::default()
    };

    let out = pipeline
        .pre_call(&meta, CallType::Completion, user_payload("ssn 123-45-6789 ok"))
        .await
        .expect_passed();

    // Enforcement runs after guardrails: prompt first, masked text after.
    assert_eq!(out.messages[0].role, "system");
    assert_eq!(text_of(&out, 0), "Think first.");
    assert_eq!(
        text_of(&out, 1),
        "ssn [REDACTED:US Social Security Number] ok"
    );
}

#[tokio::test]
async fn pipeline_block_short_circuits_enforcement() {
    let dir = enforcement_dir();
    let pipeline = Pipeline::standard(guardrails(), enforcement(&dir));
    let meta = KeyMetadata {
        guardrail_level: Some("standard".to_string()),
        guardrail_action: Some("block".to_string()),
        enforcement_level: Some("design-first".to_string()),
        ..Default::default()
    };

    let out = pipeline
        .pre_call(&meta, CallType::Completion, user_payload("card 4111-1111-1111-1111"))
        .await;
    assert!(matches!(out, PipelineOutcome::Blocked(_)));
}

#[tokio::test]
async fn pipeline_neutral_for_clean_text_except_prompt_prepend() {
    let dir = enforcement_dir();
    let pipeline = Pipeline::standard(guardrails(), enforcement(&dir));
    let meta = KeyMetadata::default();

    let json = serde_json::json!({
        "model": "claude-sonnet",
        "messages": [{"role": "user", "content": "hello there"}],
        "stream": true,
    });
    let payload: ChatPayload = serde_json::from_value(json.clone()).unwrap();
    let out = pipeline
        .pre_call(&meta, CallType::Completion, payload)
        .await
        .expect_passed();

    let mut expected: ChatPayload = serde_json::from_value(json).unwrap();
    expected
        .messages
        .insert(0, ChatMessage::system("Follow the team norms."));
    assert_eq!(out, expected);
}
