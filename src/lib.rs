// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod index;
pub mod metrics;
pub mod mood;
pub mod precomputed;
pub mod response;
pub mod scorer;
pub mod signals;
pub mod store;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::engine::{Recommendation, Recommender, RecommenderState, ServePath};
pub use crate::mood::{MoodExtractor, MoodSignal};
pub use crate::scorer::Weights;

use crate::api::AppState;
use crate::config::ai::AiConfig;
use crate::config::RecommenderConfig;
use crate::mood::ai_adapter::build_client_from_config;
use crate::mood::rules::HotReloadMoodRules;
use crate::mood::{DynMoodExtractor, HybridMoodExtractor};
use crate::store::{ConversationLog, HistorySource, JsonHistoryStore};

pub const DEFAULT_LOG_FILTER: &str = "recommender=info,mood=info,precomputed=info,catalog=info,warn";

/// Compact fmt subscriber driven by `RUST_LOG`. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Rules + optional LLM, as configured by `[mood]` and `config/ai.json`.
pub fn build_mood_extractor(config: &RecommenderConfig) -> DynMoodExtractor {
    let ai = AiConfig::load_or_disabled(&config.mood.ai_config_path);
    let client = build_client_from_config(&ai, &config.mood.cache_dir);
    let rules = Arc::new(HotReloadMoodRules::new(&config.mood.rules_path));
    let extractor = HybridMoodExtractor::new(client, rules, Duration::from_millis(ai.timeout_ms));
    tracing::info!(target: "mood", mode = extractor.mode(), "mood extractor ready");
    Arc::new(extractor)
}

/// Eagerly load every resource and wire the HTTP state.
pub fn build_app_state(config: &RecommenderConfig) -> anyhow::Result<AppState> {
    let state = Arc::new(RecommenderState::load(config)?);
    let watch_history = Arc::new(JsonHistoryStore::open(&config.data.watch_history_path));
    let conversations = Arc::new(ConversationLog::open(&config.data.conversations_path));
    let history: Arc<dyn HistorySource> = watch_history.clone();
    let recommender = Recommender::new(state, build_mood_extractor(config), history);
    Ok(AppState {
        recommender,
        watch_history,
        conversations,
    })
}

/// Full in-process app: config from env/TOML, eager state, metrics route.
pub async fn app() -> anyhow::Result<Router> {
    let config = RecommenderConfig::load()?;
    let state = build_app_state(&config)?;
    let metrics = metrics::Metrics::init()?;
    Ok(api::router(state, Some(&metrics)))
}
