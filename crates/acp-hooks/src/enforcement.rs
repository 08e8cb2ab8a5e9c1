// SPDX-License-Identifier: MIT OR Apache-2.0
//! Enforcement prompt injection hook.
//!
//! Reads `enforcement_level` from the key metadata and prepends the
//! matching policy system prompt. Strictly non-blocking: any prompt-load
//! failure leaves the payload unchanged.

use crate::{PipelineOutcome, PreCallHook};
use acp_config::EnforcementSettings;
use acp_core::{CallType, ChatMessage, ChatPayload, EnforcementLevel, KeyMetadata};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// PromptStore
// ---------------------------------------------------------------------------

/// Mtime-cached loader for `<dir>/<level>.md` prompt files.
///
/// Prompts are edited in place on running deployments; the cache re-reads a
/// file whenever its mtime changes and serves the trimmed content
/// otherwise. A missing file warns once per path and then stays quiet.
pub(crate) struct PromptStore {
    dir: PathBuf,
    cache: Mutex<HashMap<PathBuf, (SystemTime, Arc<str>)>>,
    missing_warned: Mutex<HashSet<PathBuf>>,
}

impl PromptStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
            missing_warned: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) async fn load(&self, level: EnforcementLevel) -> Option<Arc<str>> {
        let path = self.dir.join(format!("{level}.md"));

        let mtime = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => {
                self.warn_missing_once(&path);
                return None;
            }
        };

        if let Some(cached) = self.cached(&path, mtime) {
            return Some(cached);
        }

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read prompt file");
                return None;
            }
        };
        let trimmed: Arc<str> = Arc::from(text.trim());
        debug!(path = %path.display(), len = trimmed.len(), "loaded enforcement prompt");

        let mut cache = lock(&self.cache);
        cache.insert(path, (mtime, Arc::clone(&trimmed)));
        Some(trimmed)
    }

    fn cached(&self, path: &Path, mtime: SystemTime) -> Option<Arc<str>> {
        let cache = lock(&self.cache);
        cache
            .get(path)
            .filter(|(cached_mtime, _)| *cached_mtime == mtime)
            .map(|(_, text)| Arc::clone(text))
    }

    fn warn_missing_once(&self, path: &Path) {
        let mut warned = lock(&self.missing_warned);
        if warned.insert(path.to_path_buf()) {
            warn!(path = %path.display(), "prompt file not found; enforcement disabled for this level");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// EnforcementHook
// ---------------------------------------------------------------------------

/// The enforcement pre-call hook.
pub struct EnforcementHook {
    settings: EnforcementSettings,
    prompts: PromptStore,
}

impl EnforcementHook {
    /// Hook reading prompts from the configured prompts directory.
    pub fn new(settings: EnforcementSettings) -> Self {
        let prompts = PromptStore::new(&settings.prompts_dir);
        Self { settings, prompts }
    }

    fn effective_level(&self, meta: &KeyMetadata) -> EnforcementLevel {
        match meta.enforcement_level.as_deref() {
            None => self.settings.default_level,
            Some(raw) => EnforcementLevel::parse(raw).unwrap_or_else(|| {
                warn!(
                    value = raw,
                    default = %self.settings.default_level,
                    "invalid enforcement_level in key metadata, using default"
                );
                self.settings.default_level
            }),
        }
    }
}

#[async_trait]
impl PreCallHook for EnforcementHook {
    async fn pre_call(
        &self,
        meta: &KeyMetadata,
        call_type: CallType,
        mut payload: ChatPayload,
    ) -> PipelineOutcome {
        if !call_type.is_chat_completion() {
            return PipelineOutcome::Passed(payload);
        }

        let level = self.effective_level(meta);
        if level == EnforcementLevel::Unrestricted {
            return PipelineOutcome::Passed(payload);
        }

        let Some(prompt) = self.prompts.load(level).await else {
            return PipelineOutcome::Passed(payload);
        };
        if prompt.is_empty() {
            return PipelineOutcome::Passed(payload);
        }

        // Prepend; existing system messages stay where they are.
        payload
            .messages
            .insert(0, ChatMessage::system(prompt.as_ref()));
        debug!(level = %level, "injected enforcement prompt");
        PipelineOutcome::Passed(payload)
    }
}
