// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chat-completion payload shapes.
//!
//! The hooks must pass through every field they do not understand, so all
//! of these types flatten unknown keys into `extra` maps and the content
//! enum is untagged. Serializing an unmodified payload reproduces the
//! input value-for-value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// CallType
// ---------------------------------------------------------------------------

/// The router call type a pre-call hook is invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Synchronous chat completion.
    Completion,
    /// Async chat completion.
    Acompletion,
    /// Embedding generation.
    Embedding,
    /// Image generation.
    ImageGeneration,
    /// Moderation check.
    Moderation,
    /// Audio transcription.
    AudioTranscription,
}

impl CallType {
    /// Chat completions are the only call types the hooks act on.
    pub fn is_chat_completion(&self) -> bool {
        matches!(self, Self::Completion | Self::Acompletion)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A chat-completion request body as the hooks see it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Target model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Conversation messages in request order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Every other request field, preserved untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (`system`, `user`, `assistant`, ...).
    pub role: String,
    /// Message content; absent for some tool-call messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// Unmodeled message fields, preserved untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// A plain system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: Some(MessageContent::Text(content.into())),
            extra: Map::new(),
        }
    }

    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: Some(MessageContent::Text(content.into())),
            extra: Map::new(),
        }
    }
}

/// String content or a multi-modal part list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain string content.
    Text(String),
    /// Multi-modal content array.
    Parts(Vec<ContentPart>),
}

/// One element of a multi-modal content array.
///
/// Only `type == "text"` parts are visible to the scanner; everything else
/// (image URLs, audio, ...) passes through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part discriminator (`text`, `image_url`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text body for `text` parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Unmodeled part fields, preserved untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentPart {
    /// Returns `true` if this is a scannable text part.
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

impl ChatPayload {
    /// Concatenate all user-visible text: string contents as-is plus every
    /// `text` part of multi-modal arrays, joined with newlines.
    pub fn visible_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for msg in &self.messages {
            match &msg.content {
                Some(MessageContent::Text(s)) => parts.push(s),
                Some(MessageContent::Parts(items)) => {
                    for item in items {
                        if item.is_text() {
                            if let Some(text) = item.text.as_deref() {
                                parts.push(text);
                            }
                        }
                    }
                }
                None => {}
            }
        }
        parts.join("\n")
    }
}
