// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in pattern table.
//!
//! Always available and never disabled; the overlay file can shadow
//! individual entries by name but the table itself cannot be emptied.
//! Order matters: scanning and masking iterate rules in the order declared
//! here, overlay additions after.

use crate::{PatternRule, RuleAction, RuleCategory, RuleSeverity};

/// Raw built-in rule definitions in canonical order.
pub(crate) fn builtin_rules() -> Vec<PatternRule> {
    let rule = |name: &str,
                pattern: &str,
                label: &str,
                category: RuleCategory,
                severity: RuleSeverity,
                action: RuleAction,
                context_required: bool| PatternRule {
        name: name.into(),
        pattern: pattern.into(),
        label: label.into(),
        category,
        severity,
        action,
        context_required,
    };

    vec![
        // --- PII ---
        rule(
            "us_ssn",
            r"\b\d{3}-\d{2}-\d{4}\b",
            "US Social Security Number",
            RuleCategory::Pii,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "email_address",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b",
            "Email address",
            RuleCategory::Pii,
            RuleSeverity::Medium,
            RuleAction::Flag,
            false,
        ),
        rule(
            "phone_us",
            r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            "US phone number",
            RuleCategory::Pii,
            RuleSeverity::Medium,
            RuleAction::Flag,
            false,
        ),
        rule(
            "passport_us",
            r"\b[A-Z]\d{8}\b",
            "US passport number",
            RuleCategory::Pii,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        // --- Financial ---
        rule(
            "credit_card_visa",
            r"\b4\d{3}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
            "Visa credit card number",
            RuleCategory::Financial,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "credit_card_mastercard",
            r"\b5[1-5]\d{2}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
            "Mastercard credit card number",
            RuleCategory::Financial,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "credit_card_amex",
            r"\b3[47]\d{2}[-\s]?\d{6}[-\s]?\d{5}\b",
            "Amex credit card number",
            RuleCategory::Financial,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "iban",
            r"\b[A-Z]{2}\d{2}[A-Z0-9]{4}\d{7}([A-Z0-9]?){0,16}\b",
            "IBAN",
            RuleCategory::Financial,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "bank_routing_aba",
            r"\b[0-9]{9}\b",
            "Bank routing number (ABA)",
            RuleCategory::Financial,
            RuleSeverity::Medium,
            RuleAction::Flag,
            true,
        ),
        rule(
            "swift_bic",
            r"\b[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?\b",
            "SWIFT/BIC code",
            RuleCategory::Financial,
            RuleSeverity::Medium,
            RuleAction::Flag,
            true,
        ),
        // --- Secrets & credentials ---
        rule(
            "aws_access_key",
            r"\bAKIA[0-9A-Z]{16}\b",
            "AWS access key",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "aws_secret_key",
            r"\b[A-Za-z0-9/+=]{40}\b",
            "AWS secret key (candidate)",
            RuleCategory::Secret,
            RuleSeverity::Medium,
            RuleAction::Flag,
            true,
        ),
        rule(
            "github_token",
            r"\b(ghp|gho|ghu|ghs|ghr)_[A-Za-z0-9_]{36,}\b",
            "GitHub token",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "generic_api_key",
            r"\b(sk|pk|api|token|secret|key)[-_][A-Za-z0-9]{20,}\b",
            "Generic API key/token",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "private_key_pem",
            r"-----BEGIN\s+(RSA\s+|EC\s+|DSA\s+|OPENSSH\s+)?PRIVATE\s+KEY-----",
            "Private key (PEM)",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "jwt_token",
            r"\beyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\b",
            "JWT token",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "slack_token",
            r"\bxox[bporas]-[A-Za-z0-9-]{10,}\b",
            "Slack token",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
        rule(
            "connection_string",
            r"\b(postgres|mysql|mongodb|redis)://\S+:\S+@\S+",
            "Database connection string with credentials",
            RuleCategory::Secret,
            RuleSeverity::High,
            RuleAction::Block,
            false,
        ),
    ]
}

/// Keywords that gate `context_required` rules: those rules only fire when
/// the scanned text mentions at least one of these (case-insensitive).
pub const FINANCIAL_CONTEXT_KEYWORDS: &[&str] = &[
    "routing",
    "aba",
    "swift",
    "bic",
    "wire",
    "transfer",
    "bank",
    "account",
    "iban",
    "sort code",
    "payment",
];
