//! Wire shape of a recommendation result, shared by the HTTP layer, the
//! precomputed cache files and the precompute tool.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::mood::MoodSignal;
use crate::scorer::RankedItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub id: String,
    pub title: String,
    pub genre: String,
    pub release_year: Option<i32>,
    pub rating: f32,
    pub tags: String,
    pub hybrid_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub extracted_mood: MoodSignal,
    pub recommendations: Vec<RecommendedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<serde_json::Value>,
    /// Set only on documents written by the precompute tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_key: Option<String>,
}

impl RecommendationResponse {
    pub fn from_ranked(
        user_id: &str,
        mood: MoodSignal,
        ranked: &[RankedItem],
        catalog: &Catalog,
        user_profile: Option<serde_json::Value>,
    ) -> Self {
        let recommendations = ranked
            .iter()
            .filter_map(|r| {
                catalog.get(r.index).map(|it| RecommendedItem {
                    id: it.id.clone(),
                    title: it.title.clone(),
                    genre: it.genre.clone(),
                    release_year: it.release_year,
                    rating: it.rating,
                    tags: it.tags.clone(),
                    hybrid_score: round4(r.score),
                })
            })
            .collect();
        Self {
            user_id: user_id.to_string(),
            extracted_mood: mood,
            recommendations,
            user_profile,
            query: None,
            query_key: None,
        }
    }

    pub fn titles(&self, n: usize) -> Vec<String> {
        self.recommendations
            .iter()
            .take(n)
            .map(|r| r.title.clone())
            .collect()
    }

    pub fn genres(&self, n: usize) -> Vec<String> {
        self.recommendations
            .iter()
            .take(n)
            .map(|r| r.genre.clone())
            .collect()
    }
}

fn round4(x: f32) -> f32 {
    if !x.is_finite() {
        return 0.0;
    }
    (x * 10_000.0).round() / 10_000.0
}
