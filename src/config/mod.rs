// src/config/mod.rs
//! Recommender configuration loaded from `config/recommender.toml`.
//!
//! Resolution order: built-in defaults < TOML file < env overrides. A missing
//! file is not an error (defaults apply); a malformed one is.

pub mod ai;
pub mod weights;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scorer::{ScoringOptions, TextMode, Weights};
use crate::signals::classifier::ClassifierSettings;
use crate::signals::history::HistoryBoosts;

// --- env defaults & names ---
pub const DEFAULT_RECOMMENDER_CONFIG_PATH: &str = "config/recommender.toml";
pub const DEFAULT_TOP_N: usize = 5;
pub const MAX_TOP_N: usize = 50;

pub const ENV_RECOMMENDER_CONFIG_PATH: &str = "RECOMMENDER_CONFIG_PATH";
pub const ENV_RECOMMENDER_TOP_N: &str = "RECOMMENDER_TOP_N";
pub const ENV_RECOMMENDER_CACHE_ENABLED: &str = "RECOMMENDER_CACHE_ENABLED";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub data: DataConfig,
    pub scoring: ScoringConfig,
    pub history: HistoryBoosts,
    pub classifier: ClassifierConfig,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
    pub mood: MoodConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub catalog_path: PathBuf,
    pub users_path: PathBuf,
    pub watch_history_path: PathBuf,
    pub conversations_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            catalog_path: "data/catalog.json".into(),
            users_path: "data/users.json".into(),
            watch_history_path: "data/watch_history.json".into(),
            conversations_path: "data/conversations.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub top_n: usize,
    pub text_mode: TextMode,
    pub enable_history: bool,
    pub enable_classifier: bool,
    pub weights_path: PathBuf,
    pub weights: Weights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            text_mode: TextMode::Tfidf,
            enable_history: true,
            enable_classifier: true,
            weights_path: weights::DEFAULT_WEIGHTS_PATH.into(),
            weights: Weights::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub path: PathBuf,
    #[serde(flatten)]
    pub settings: ClassifierSettings,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            path: "data/model/classifier.json".into(),
            settings: ClassifierSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "data/precomputed".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub placeholder_score: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            placeholder_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    pub rules_path: PathBuf,
    pub ai_config_path: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            rules_path: crate::mood::rules::DEFAULT_MOOD_RULES_PATH.into(),
            ai_config_path: ai::DEFAULT_AI_CONFIG_PATH.into(),
            cache_dir: crate::mood::ai_adapter::DEFAULT_MOOD_CACHE_DIR.into(),
        }
    }
}

impl RecommenderConfig {
    /// Load from `RECOMMENDER_CONFIG_PATH` (or the default path), then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_RECOMMENDER_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RECOMMENDER_CONFIG_PATH));
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(target: "recommender", path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read recommender config at {}: {}",
                path.display(),
                e
            )
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid recommender config at {}: {}", path.display(), e))
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: RecommenderConfig = toml::from_str(toml_str)?;
        cfg.harden();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(n) = parse_top_n_env(std::env::var(ENV_RECOMMENDER_TOP_N).ok()) {
            self.scoring.top_n = n;
        }
        if let Some(b) = parse_bool_env(std::env::var(ENV_RECOMMENDER_CACHE_ENABLED).ok()) {
            self.cache.enabled = b;
        }
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            text_mode: self.scoring.text_mode,
            enable_history: self.scoring.enable_history,
            enable_classifier: self.scoring.enable_classifier,
            history: self.history,
            classifier: self.classifier.settings.clone(),
        }
    }

    fn harden(&mut self) {
        self.scoring.top_n = self.scoring.top_n.clamp(1, MAX_TOP_N);
        self.scoring.weights = self.scoring.weights.sanitized();
        if !self.fallback.placeholder_score.is_finite() {
            self.fallback.placeholder_score = FallbackConfig::default().placeholder_score;
        }
    }
}

// parse optional positive integer env and clamp to 1..=MAX_TOP_N
fn parse_top_n_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .map(|v| v.clamp(1, MAX_TOP_N))
}

fn parse_bool_env(raw: Option<String>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
