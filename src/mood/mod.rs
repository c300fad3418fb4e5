//! Mood extraction: prompt → `{mood, tone}`.
//!
//! `HybridMoodExtractor` tries the configured LLM client under a timeout and
//! falls back to the rule table on any failure, so extraction never errors.

pub mod ai_adapter;
pub mod rules;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::text;
use ai_adapter::DynMoodClient;
use rules::HotReloadMoodRules;

pub const NEUTRAL: &str = "neutral";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodSignal {
    pub mood: String,
    pub tone: String,
}

impl MoodSignal {
    pub fn new(mood: &str, tone: &str) -> Self {
        Self {
            mood: mood.to_string(),
            tone: tone.to_string(),
        }
        .normalized()
    }

    pub fn neutral() -> Self {
        Self {
            mood: NEUTRAL.into(),
            tone: NEUTRAL.into(),
        }
    }

    /// Lowercase + trim; empty fields become `neutral`.
    pub fn normalized(self) -> Self {
        let fix = |s: String| {
            let s = text::normalize_label(&s);
            if s.is_empty() {
                NEUTRAL.to_string()
            } else {
                s
            }
        };
        Self {
            mood: fix(self.mood),
            tone: fix(self.tone),
        }
    }
}

impl Default for MoodSignal {
    fn default() -> Self {
        Self::neutral()
    }
}

#[async_trait]
pub trait MoodExtractor: Send + Sync {
    /// Never fails; degraded paths return a rule-based or neutral signal.
    async fn extract(&self, prompt: &str) -> MoodSignal;
    /// `azure_openai` | `openai` | `rule_based` | `mock`
    fn mode(&self) -> &'static str;
}

pub type DynMoodExtractor = Arc<dyn MoodExtractor>;

/// Rule table only.
pub struct RuleMoodExtractor {
    rules: Arc<HotReloadMoodRules>,
}

impl RuleMoodExtractor {
    pub fn new(rules: Arc<HotReloadMoodRules>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Self {
        Self::new(Arc::new(HotReloadMoodRules::builtin()))
    }
}

#[async_trait]
impl MoodExtractor for RuleMoodExtractor {
    async fn extract(&self, prompt: &str) -> MoodSignal {
        rules::classify(prompt, &self.rules.current())
    }

    fn mode(&self) -> &'static str {
        "rule_based"
    }
}

/// LLM first, rules on timeout / refusal / parse failure.
pub struct HybridMoodExtractor {
    client: DynMoodClient,
    rules: Arc<HotReloadMoodRules>,
    timeout: Duration,
}

impl HybridMoodExtractor {
    pub fn new(client: DynMoodClient, rules: Arc<HotReloadMoodRules>, timeout: Duration) -> Self {
        Self {
            client,
            rules,
            timeout,
        }
    }
}

#[async_trait]
impl MoodExtractor for HybridMoodExtractor {
    async fn extract(&self, prompt: &str) -> MoodSignal {
        let id = text::anon_hash(prompt);
        match tokio::time::timeout(self.timeout, self.client.extract(prompt)).await {
            Ok(Some(signal)) => {
                tracing::debug!(target: "mood", %id, provider = self.client.provider_name(), mood = %signal.mood, "llm mood");
                return signal.normalized();
            }
            Ok(None) => {
                tracing::debug!(target: "mood", %id, provider = self.client.provider_name(), "llm returned nothing, using rules");
            }
            Err(_) => {
                tracing::warn!(target: "mood", %id, timeout_ms = self.timeout.as_millis() as u64, "llm mood timed out, using rules");
            }
        }
        rules::classify(prompt, &self.rules.current())
    }

    fn mode(&self) -> &'static str {
        match self.client.provider_name() {
            "openai" => "openai",
            "azure_openai" => "azure_openai",
            "mock" => "mock",
            _ => "rule_based",
        }
    }
}
