//! Request-level orchestration: cache lookup → mood → signals → top-N, with a
//! top-rated fallback when the live pipeline cannot run.
//!
//! All heavy resources live in [`RecommenderState`], loaded once at startup and
//! shared read-only behind an `Arc`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use metrics::{counter, histogram};

use crate::catalog::Catalog;
use crate::config::weights::HotReloadWeights;
use crate::config::RecommenderConfig;
use crate::index::CatalogIndex;
use crate::mood::{DynMoodExtractor, MoodSignal};
use crate::precomputed::PrecomputedCache;
use crate::response::RecommendationResponse;
use crate::scorer::{top_rated_fallback, HybridScorer, RankError, RankInput, Weights};
use crate::signals::classifier::Classifier;
use crate::store::{HistorySource, UserProfiles};
use crate::text::anon_hash;

pub struct RecommenderState {
    pub catalog: Catalog,
    pub index: CatalogIndex,
    pub classifier: Option<Classifier>,
    pub profiles: UserProfiles,
    pub cache: PrecomputedCache,
    pub scorer: HybridScorer,
    pub weights: HotReloadWeights,
    pub default_top_n: usize,
    pub cache_enabled: bool,
    pub fallback_score: f32,
}

impl RecommenderState {
    /// Eager load of everything a request needs. Only the catalog is fatal.
    pub fn load(config: &RecommenderConfig) -> anyhow::Result<Self> {
        let catalog = Catalog::load(&config.data.catalog_path).context("catalog is required")?;
        let classifier = load_classifier(&config.classifier.path);
        let profiles = UserProfiles::load(&config.data.users_path);
        let cache = if config.cache.enabled {
            PrecomputedCache::load(&config.cache.dir)
        } else {
            PrecomputedCache::empty()
        };
        Ok(Self::from_parts(catalog, classifier, profiles, cache, config))
    }

    pub fn from_parts(
        catalog: Catalog,
        classifier: Option<Classifier>,
        profiles: UserProfiles,
        cache: PrecomputedCache,
        config: &RecommenderConfig,
    ) -> Self {
        let index = CatalogIndex::build(&catalog);
        tracing::info!(
            target: "recommender",
            items = catalog.len(),
            vocabulary = index.vocabulary_size(),
            classifier = classifier.is_some(),
            profiles = profiles.len(),
            precomputed = cache.len(),
            "recommender state ready"
        );
        Self {
            index,
            catalog,
            classifier,
            profiles,
            cache,
            scorer: HybridScorer::new(config.scoring_options()),
            weights: HotReloadWeights::new(&config.scoring.weights_path, config.scoring.weights),
            default_top_n: config.scoring.top_n,
            cache_enabled: config.cache.enabled,
            fallback_score: config.fallback.placeholder_score,
        }
    }
}

fn load_classifier(path: &Path) -> Option<Classifier> {
    match Classifier::load(path) {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!(target: "recommender", error = %e, path = %path.display(), "classifier unavailable, ml signal disabled");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServePath {
    Precomputed(String),
    Live,
    Fallback,
}

impl ServePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServePath::Precomputed(_) => "precomputed",
            ServePath::Live => "live",
            ServePath::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub response: RecommendationResponse,
    pub path: ServePath,
}

#[derive(Clone)]
pub struct Recommender {
    state: Arc<RecommenderState>,
    mood: DynMoodExtractor,
    history: Arc<dyn HistorySource>,
}

impl Recommender {
    pub fn new(state: Arc<RecommenderState>, mood: DynMoodExtractor, history: Arc<dyn HistorySource>) -> Self {
        Self {
            state,
            mood,
            history,
        }
    }

    pub fn state(&self) -> &RecommenderState {
        &self.state
    }

    pub fn mood_mode(&self) -> &'static str {
        self.mood.mode()
    }

    /// Never fails: a cache hit, a live ranking, or the top-rated fallback.
    /// Returns at most `top_n` items; request-size limits belong to the caller.
    /// Per-request `weights` win over `weights.json`, which wins over the TOML defaults.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        prompt: &str,
        top_n: usize,
        weights: Option<Weights>,
    ) -> Recommendation {
        let started = Instant::now();
        let id = anon_hash(prompt);
        counter!("recommend_requests_total").increment(1);

        if self.state.cache_enabled {
            if let Some(hit) = self.state.cache.lookup(prompt) {
                counter!("recommend_cache_hits_total").increment(1);
                tracing::info!(target: "recommender", %id, key = hit.key(), matched = ?hit.matched, "precomputed hit");
                let rec = Recommendation {
                    response: hit.for_user(user_id, top_n),
                    path: ServePath::Precomputed(hit.key().to_string()),
                };
                record_duration(started);
                return rec;
            }
            counter!("recommend_cache_misses_total").increment(1);
        }

        let rec = match self.compute_live(user_id, prompt, top_n, weights).await {
            Ok(response) => Recommendation {
                response,
                path: ServePath::Live,
            },
            Err(e) => {
                counter!("recommend_fallback_total").increment(1);
                tracing::warn!(target: "recommender", %id, error = %e, "live ranking failed, serving top rated");
                Recommendation {
                    response: self.fallback(user_id, top_n),
                    path: ServePath::Fallback,
                }
            }
        };
        tracing::info!(
            target: "recommender",
            %id,
            path = rec.path.as_str(),
            mood = %rec.response.extracted_mood.mood,
            items = rec.response.recommendations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recommendations served"
        );
        record_duration(started);
        rec
    }

    /// Live pipeline, bypassing the precomputed cache.
    pub async fn compute_live(
        &self,
        user_id: &str,
        prompt: &str,
        top_n: usize,
        weights: Option<Weights>,
    ) -> Result<RecommendationResponse, RankError> {
        let st = &self.state;
        // fail fast before spending an LLM call
        if st.index.is_empty() {
            return Err(RankError::EmptyIndex);
        }

        let mood = self.mood.extract(prompt).await;
        let watched = self.history.watched(user_id);
        let weights = weights.unwrap_or_else(|| st.weights.current());

        let input = RankInput {
            catalog: &st.catalog,
            index: &st.index,
            prompt,
            watched: &watched,
            mood: &mood.mood,
            weights,
            top_n,
            classifier: st.classifier.as_ref(),
        };
        let (ranked, report) = st.scorer.rank_with_report(&input)?;
        for d in &report.degraded {
            counter!("recommend_signal_degraded_total", "signal" => d.signal).increment(1);
            tracing::debug!(target: "recommender", signal = d.signal, reason = %d.reason, "signal degraded");
        }

        Ok(RecommendationResponse::from_ranked(
            user_id,
            mood,
            &ranked,
            &st.catalog,
            st.profiles.get(user_id).cloned(),
        ))
    }

    pub fn fallback(&self, user_id: &str, top_n: usize) -> RecommendationResponse {
        let st = &self.state;
        let ranked = top_rated_fallback(&st.catalog, top_n, st.fallback_score);
        RecommendationResponse::from_ranked(
            user_id,
            MoodSignal::neutral(),
            &ranked,
            &st.catalog,
            st.profiles.get(user_id).cloned(),
        )
    }
}

fn record_duration(started: Instant) {
    histogram!("recommend_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::RuleMoodExtractor;
    use std::collections::HashMap;

    const CATALOG: &str = r#"[
        {"id":"1","title":"Fury Road","genre":"Action","tags":"chase explosions","rating":8.1},
        {"id":"2","title":"Paddington","genre":"Comedy","tags":"family bear","rating":7.8},
        {"id":"3","title":"John Wick","genre":"Action","tags":"revenge","rating":7.4},
        {"id":"4","title":"Notebook","genre":"Romance","tags":"love letters","rating":8.4}
    ]"#;

    fn recommender(catalog: Catalog) -> Recommender {
        let mut cfg = RecommenderConfig::default();
        cfg.scoring.weights_path = "/no/such/weights.json".into();
        let state = RecommenderState::from_parts(
            catalog,
            None,
            UserProfiles::default(),
            PrecomputedCache::empty(),
            &cfg,
        );
        let history: HashMap<String, Vec<String>> =
            HashMap::from([("u1".to_string(), vec!["Notebook".to_string()])]);
        Recommender::new(
            Arc::new(state),
            Arc::new(RuleMoodExtractor::builtin()),
            Arc::new(history),
        )
    }

    #[tokio::test]
    async fn live_path_ranks_overlap_first() {
        let r = recommender(Catalog::from_json_str(CATALOG).unwrap());
        let rec = r.get_recommendations("u2", "explosions and a chase", 2, None).await;
        assert_eq!(rec.path, ServePath::Live);
        assert_eq!(rec.response.user_id, "u2");
        assert_eq!(rec.response.recommendations.len(), 2);
        assert_eq!(rec.response.recommendations[0].id, "1");
    }

    #[tokio::test]
    async fn empty_catalog_falls_back() {
        let r = recommender(Catalog::default());
        let rec = r.get_recommendations("u1", "anything", 5, None).await;
        assert_eq!(rec.path, ServePath::Fallback);
        assert!(rec.response.recommendations.is_empty());
        assert_eq!(rec.response.extracted_mood, MoodSignal::neutral());
    }

    #[tokio::test]
    async fn request_weights_override_defaults() {
        let r = recommender(Catalog::from_json_str(CATALOG).unwrap());
        let history_only = Weights {
            mood_weight: 0.0,
            history_weight: 1.0,
            ml_weight: 0.0,
        };
        let rec = r
            .get_recommendations("u1", "explosions", 1, Some(history_only))
            .await;
        assert_eq!(rec.response.recommendations[0].title, "Notebook");
    }

    #[test]
    fn fallback_is_top_rated() {
        let r = recommender(Catalog::from_json_str(CATALOG).unwrap());
        let resp = r.fallback("u9", 2);
        let ids: Vec<_> = resp.recommendations.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1"]);
        assert!(resp.recommendations.iter().all(|i| i.hybrid_score == 0.5));
    }

    #[tokio::test]
    async fn large_top_n_is_not_capped_by_the_engine() {
        use crate::catalog::CatalogRow;
        let rows = (0..80)
            .map(|i| CatalogRow {
                id: format!("x{i}"),
                title: Some(format!("Film {i}")),
                genre: Some("Drama".into()),
                tags: Some("quiet".into()),
                rating: Some(5.0),
                release_year: None,
            })
            .collect();
        let r = recommender(Catalog::from_rows(rows));

        let rec = r.get_recommendations("u2", "quiet drama", 70, None).await;
        assert_eq!(rec.path, ServePath::Live);
        assert_eq!(rec.response.recommendations.len(), 70);

        let rec = r.get_recommendations("u2", "quiet drama", 500, None).await;
        assert_eq!(rec.response.recommendations.len(), 80);
        assert_eq!(r.fallback("u2", 70).recommendations.len(), 70);
    }
}
