// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const AZURE_API_VERSION: &str = "2024-02-15-preview";

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_ms() -> u64 {
    4_000
}
fn default_daily_limit() -> u32 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" | "azure" (case-insensitive)
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY / AZURE_OPENAI_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    /// Model name (OpenAI) or deployment name (Azure).
    #[serde(default = "default_model")]
    pub model: String,
    /// Azure resource endpoint; "ENV" reads AZURE_OPENAI_ENDPOINT. Ignored for OpenAI.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".into(),
            api_key: String::new(),
            model: default_model(),
            endpoint: None,
            timeout_ms: default_timeout_ms(),
            daily_limit: default_daily_limit(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        cfg.provider = cfg.provider.trim().to_lowercase();

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                "azure" => env::var("AZURE_OPENAI_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing AZURE_OPENAI_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if cfg
            .endpoint
            .as_deref()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case("env"))
        {
            cfg.endpoint = Some(
                env::var("AZURE_OPENAI_ENDPOINT")
                    .map_err(|_| anyhow::anyhow!("Missing AZURE_OPENAI_ENDPOINT env var"))?,
            );
        }

        if cfg.provider == "azure" && cfg.endpoint.as_deref().unwrap_or("").trim().is_empty() {
            anyhow::bail!("provider `azure` requires an endpoint");
        }

        if cfg.timeout_ms == 0 {
            cfg.timeout_ms = default_timeout_ms();
        }

        Ok(cfg)
    }

    /// Missing or invalid file ⇒ disabled config (rule-based moods only).
    pub fn load_or_disabled<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(target: "mood", error = %e, path = %path.display(), "ai config unusable, llm mood disabled");
                }
                Self::default()
            }
        }
    }
}
