//! Hybrid scorer: blends text similarity, watch history and the classifier into
//! one score per catalog item, then returns the stable top-N.
//!
//! Every signal is max-normalized into [0, 1] before weighting, so the weights
//! express relative importance independent of each signal's raw scale.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::index::CatalogIndex;
use crate::signals::classifier::{classifier_scores, Classifier, ClassifierSettings};
use crate::signals::history::{history_scores, HistoryBoosts};
use crate::signals::{ScoreVector, SignalError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub mood_weight: f32,
    pub history_weight: f32,
    pub ml_weight: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            mood_weight: 0.4,
            history_weight: 0.3,
            ml_weight: 0.3,
        }
    }
}

impl Weights {
    /// Non-finite weights count as 0.
    pub fn sanitized(self) -> Self {
        let fix = |w: f32| if w.is_finite() { w } else { 0.0 };
        Self {
            mood_weight: fix(self.mood_weight),
            history_weight: fix(self.history_weight),
            ml_weight: fix(self.ml_weight),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Tfidf,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    pub text_mode: TextMode,
    pub enable_history: bool,
    pub enable_classifier: bool,
    pub history: HistoryBoosts,
    pub classifier: ClassifierSettings,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            text_mode: TextMode::Tfidf,
            enable_history: true,
            enable_classifier: true,
            history: HistoryBoosts::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

/// Everything one ranking call needs. Borrowed; nothing is cloned per request.
pub struct RankInput<'a> {
    pub catalog: &'a Catalog,
    pub index: &'a CatalogIndex,
    pub prompt: &'a str,
    pub watched: &'a [String],
    pub mood: &'a str,
    pub weights: Weights,
    pub top_n: usize,
    pub classifier: Option<&'a Classifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub index: usize,
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct DegradedSignal {
    pub signal: &'static str,
    pub reason: String,
}

/// Signals that contributed zeros because they could not be computed.
#[derive(Debug, Clone, Default)]
pub struct SignalReport {
    pub degraded: Vec<DegradedSignal>,
}

impl SignalReport {
    fn record(&mut self, signal: &'static str, err: &SignalError) {
        self.degraded.push(DegradedSignal {
            signal,
            reason: err.to_string(),
        });
    }

    pub fn is_degraded(&self, signal: &str) -> bool {
        self.degraded.iter().any(|d| d.signal == signal)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RankError {
    #[error("catalog index is empty")]
    EmptyIndex,
    #[error("index covers {index} items but catalog has {catalog}")]
    IndexMismatch { catalog: usize, index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct HybridScorer {
    options: ScoringOptions,
}

impl HybridScorer {
    pub fn new(options: ScoringOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScoringOptions {
        &self.options
    }

    pub fn rank(&self, input: &RankInput<'_>) -> Result<Vec<RankedItem>, RankError> {
        self.rank_with_report(input).map(|(items, _)| items)
    }

    pub fn rank_with_report(
        &self,
        input: &RankInput<'_>,
    ) -> Result<(Vec<RankedItem>, SignalReport), RankError> {
        let n = input.catalog.len();
        if input.index.is_empty() {
            return Err(RankError::EmptyIndex);
        }
        if input.index.len() != n {
            return Err(RankError::IndexMismatch {
                catalog: n,
                index: input.index.len(),
            });
        }

        let mut report = SignalReport::default();

        let text = match self.options.text_mode {
            TextMode::Tfidf => input.index.cosine_scores(input.prompt),
            TextMode::Keyword => input.index.keyword_scores(input.prompt),
        };

        let history = if self.options.enable_history {
            history_scores(input.catalog, input.watched, self.options.history)
        } else {
            ScoreVector::zeros(n)
        };

        let ml = if self.options.enable_classifier {
            match classifier_scores(
                input.catalog,
                input.classifier,
                input.mood,
                &self.options.classifier,
            ) {
                Ok(v) => v,
                Err(e) => {
                    report.record("classifier", &e);
                    ScoreVector::zeros(n)
                }
            }
        } else {
            ScoreVector::zeros(n)
        };

        let w = input.weights.sanitized();
        let (text, history, ml) = (
            checked(text, n, "text", &mut report).max_normalized(),
            checked(history, n, "history", &mut report).max_normalized(),
            checked(ml, n, "classifier", &mut report).max_normalized(),
        );

        let mut ranked: Vec<RankedItem> = input
            .catalog
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let s = w.mood_weight * text.get(i)
                    + w.history_weight * history.get(i)
                    + w.ml_weight * ml.get(i);
                RankedItem {
                    index: i,
                    id: item.id.clone(),
                    score: if s.is_finite() { s } else { 0.0 },
                }
            })
            .collect();

        // stable: equal scores keep catalog order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(input.top_n.min(n));
        Ok((ranked, report))
    }
}

fn checked(v: ScoreVector, n: usize, signal: &'static str, report: &mut SignalReport) -> ScoreVector {
    if v.len() == n {
        return v;
    }
    report.record(signal, &SignalError::LengthMismatch { expected: n, got: v.len() });
    ScoreVector::zeros(n)
}

/// Top-rated items (rating descending, catalog order on ties) with a fixed score.
pub fn top_rated_fallback(catalog: &Catalog, top_n: usize, placeholder: f32) -> Vec<RankedItem> {
    catalog
        .by_rating_desc()
        .into_iter()
        .take(top_n)
        .filter_map(|i| {
            catalog.get(i).map(|item| RankedItem {
                index: i,
                id: item.id.clone(),
                score: placeholder,
            })
        })
        .collect()
}
