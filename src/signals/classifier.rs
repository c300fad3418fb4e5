//! Classifier signal backed by an offline-trained decision forest.
//!
//! Artifact layout (JSON, `version = 1`):
//! ```json
//! {
//!   "version": 1,
//!   "encoders": { "mood": [...], "context": [...], "time": [...], "item": [...] },
//!   "forest": { "trees": [ { "nodes": [
//!       { "feature": 0, "threshold": 1.5, "left": 1, "right": 2 },
//!       { "value": [0.0, 1.0] },
//!       { "value": [1.0, 0.0] }
//!   ] } ] }
//! }
//! ```
//! Features are the encoded `(mood, context, time)` indices. A split sends the
//! sample left when `x[feature] <= threshold`. Each leaf holds one weight per
//! item class; the forest averages the normalized leaf distributions.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::{ScoreVector, SignalError};
use crate::catalog::Catalog;
use crate::text;

pub const ARTIFACT_VERSION: u32 = 1;
const N_FEATURES: usize = 3;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("reading artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported artifact version {0}")]
    Version(u32),
    #[error("encoder `{0}` is empty")]
    EmptyEncoder(&'static str),
    #[error("forest has no trees")]
    EmptyForest,
    #[error("tree {tree}: {reason}")]
    BadTree { tree: usize, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Encoders {
    pub mood: Vec<String>,
    pub context: Vec<String>,
    pub time: Vec<String>,
    pub item: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Forest {
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Deserialize)]
struct Artifact {
    version: u32,
    encoders: Encoders,
    forest: Forest,
}

/// Boost amounts and the fixed categorical inputs used at request time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub context: String,
    pub time: String,
    pub neutral_label: String,
    pub item_boost: f32,
    pub genre_boost: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            context: "alone".into(),
            time: "evening".into(),
            neutral_label: "neutral".into(),
            item_boost: 0.5,
            genre_boost: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    encoders: Encoders,
    forest: Forest,
}

impl Classifier {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ArtifactError> {
        let artifact: Artifact = serde_json::from_str(raw)?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(ArtifactError::Version(artifact.version));
        }
        let enc = &artifact.encoders;
        for (name, classes) in [
            ("mood", &enc.mood),
            ("context", &enc.context),
            ("time", &enc.time),
            ("item", &enc.item),
        ] {
            if classes.is_empty() {
                return Err(ArtifactError::EmptyEncoder(name));
            }
        }
        if artifact.forest.trees.is_empty() {
            return Err(ArtifactError::EmptyForest);
        }
        let n_classes = enc.item.len();
        for (t, tree) in artifact.forest.trees.iter().enumerate() {
            validate_tree(tree, n_classes).map_err(|reason| ArtifactError::BadTree { tree: t, reason })?;
        }
        Ok(Self {
            encoders: artifact.encoders,
            forest: artifact.forest,
        })
    }

    pub fn item_classes(&self) -> &[String] {
        &self.encoders.item
    }

    /// Predict an item id. An unseen mood falls back to `neutral_label`.
    pub fn predict(
        &self,
        mood: &str,
        context: &str,
        time: &str,
        neutral_label: &str,
    ) -> Result<String, SignalError> {
        let mood_idx = encode(&self.encoders.mood, mood)
            .or_else(|| encode(&self.encoders.mood, neutral_label))
            .ok_or_else(|| SignalError::UnknownLabel {
                encoder: "mood",
                label: mood.to_string(),
            })?;
        let ctx_idx = encode(&self.encoders.context, context).ok_or_else(|| {
            SignalError::UnknownLabel {
                encoder: "context",
                label: context.to_string(),
            }
        })?;
        let time_idx =
            encode(&self.encoders.time, time).ok_or_else(|| SignalError::UnknownLabel {
                encoder: "time",
                label: time.to_string(),
            })?;

        let x = [mood_idx as f32, ctx_idx as f32, time_idx as f32];
        let probs = self.predict_proba(&x);
        let best = argmax(&probs);
        Ok(self.encoders.item[best].clone())
    }

    /// Mean of the per-tree normalized leaf distributions.
    pub fn predict_proba(&self, x: &[f32; N_FEATURES]) -> Vec<f32> {
        let n = self.encoders.item.len();
        let mut acc = vec![0.0f32; n];
        for tree in &self.forest.trees {
            let leaf = walk(tree, x);
            let total: f32 = leaf.iter().sum();
            if total > 0.0 && total.is_finite() {
                for (a, v) in acc.iter_mut().zip(leaf) {
                    *a += v / total;
                }
            }
        }
        let trees = self.forest.trees.len() as f32;
        for a in acc.iter_mut() {
            *a /= trees;
        }
        acc
    }
}

/// Boost the predicted item by `item_boost` and every item sharing its genre
/// (itself included) by `genre_boost`.
pub fn classifier_scores(
    catalog: &Catalog,
    classifier: Option<&Classifier>,
    mood: &str,
    settings: &ClassifierSettings,
) -> Result<ScoreVector, SignalError> {
    let clf = classifier.ok_or(SignalError::ClassifierMissing)?;
    let predicted = clf.predict(mood, &settings.context, &settings.time, &settings.neutral_label)?;
    let pos = catalog
        .position_of_id(&predicted)
        .ok_or_else(|| SignalError::UnknownItem(predicted.clone()))?;

    let mut scores = ScoreVector::zeros(catalog.len());
    scores.add(pos, settings.item_boost);
    if let Some(item) = catalog.get(pos) {
        for j in catalog.genre_siblings(&item.genre) {
            scores.add(j, settings.genre_boost);
        }
    }
    tracing::debug!(target: "recommender", %predicted, "classifier prediction");
    Ok(scores)
}

fn encode(classes: &[String], label: &str) -> Option<usize> {
    let key = text::normalize_label(label);
    classes.iter().position(|c| text::normalize_label(c) == key)
}

fn argmax(v: &[f32]) -> usize {
    let mut best = 0;
    for (i, x) in v.iter().enumerate() {
        if *x > v[best] {
            best = i;
        }
    }
    best
}

fn walk<'a>(tree: &'a Tree, x: &[f32; N_FEATURES]) -> &'a [f32] {
    let mut idx = 0;
    loop {
        match &tree.nodes[idx] {
            Node::Leaf { value } => return value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                idx = if x[*feature] <= *threshold { *left } else { *right };
            }
        }
    }
}

// Children strictly after their parent guarantees `walk` terminates.
fn validate_tree(tree: &Tree, n_classes: usize) -> Result<(), String> {
    let len = tree.nodes.len();
    if len == 0 {
        return Err("no nodes".into());
    }
    for (i, node) in tree.nodes.iter().enumerate() {
        match node {
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= N_FEATURES {
                    return Err(format!("node {i}: feature {feature} out of range"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {i}: non-finite threshold"));
                }
                for child in [left, right] {
                    if *child <= i || *child >= len {
                        return Err(format!("node {i}: bad child index {child}"));
                    }
                }
            }
            Node::Leaf { value } => {
                if value.len() != n_classes {
                    return Err(format!(
                        "node {i}: leaf width {} != {n_classes} classes",
                        value.len()
                    ));
                }
                if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(format!("node {i}: invalid leaf weight"));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"{
        "version": 1,
        "encoders": {
            "mood": ["energetic", "neutral", "sad"],
            "context": ["alone", "friends"],
            "time": ["evening", "morning"],
            "item": ["a", "b", "c"]
        },
        "forest": { "trees": [
            { "nodes": [
                { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                { "value": [5.0, 0.0, 0.0] },
                { "value": [0.0, 1.0, 1.0] }
            ] },
            { "nodes": [ { "value": [1.0, 1.0, 1.0] } ] }
        ] }
    }"#;

    fn clf() -> Classifier {
        Classifier::from_json_str(ARTIFACT).unwrap()
    }

    #[test]
    fn predicts_by_mood() {
        let c = clf();
        assert_eq!(c.predict("energetic", "alone", "evening", "neutral").unwrap(), "a");
        // tie between b and c resolves to the lowest index
        assert_eq!(c.predict("sad", "alone", "evening", "neutral").unwrap(), "b");
    }

    #[test]
    fn unseen_mood_uses_neutral() {
        let c = clf();
        assert_eq!(
            c.predict("melancholic", "alone", "evening", "neutral").unwrap(),
            c.predict("neutral", "alone", "evening", "neutral").unwrap()
        );
        assert!(c.predict("melancholic", "alone", "evening", "nope").is_err());
    }

    #[test]
    fn unknown_context_is_a_signal_error() {
        assert!(matches!(
            clf().predict("sad", "office", "evening", "neutral"),
            Err(SignalError::UnknownLabel { encoder: "context", .. })
        ));
    }

    #[test]
    fn proba_is_a_distribution() {
        let p = clf().predict_proba(&[0.0, 0.0, 0.0]);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_malformed_trees() {
        let backward = ARTIFACT.replace(r#""left": 1, "right": 2"#, r#""left": 0, "right": 2"#);
        assert!(matches!(
            Classifier::from_json_str(&backward),
            Err(ArtifactError::BadTree { .. })
        ));
        let wide = ARTIFACT.replace("[5.0, 0.0, 0.0]", "[5.0, 0.0]");
        assert!(Classifier::from_json_str(&wide).is_err());
        let feature = ARTIFACT.replace(r#""feature": 0"#, r#""feature": 7"#);
        assert!(Classifier::from_json_str(&feature).is_err());
        let version = ARTIFACT.replace(r#""version": 1"#, r#""version": 2"#);
        assert!(matches!(
            Classifier::from_json_str(&version),
            Err(ArtifactError::Version(2))
        ));
    }

    #[test]
    fn scores_boost_item_and_genre() {
        let catalog = Catalog::from_json_str(
            r#"[
            {"id":"a","title":"A","genre":"Action"},
            {"id":"x","title":"X","genre":"action"},
            {"id":"b","title":"B","genre":"Drama"}
        ]"#,
        )
        .unwrap();
        let c = clf();
        let s = classifier_scores(&catalog, Some(&c), "energetic", &ClassifierSettings::default())
            .unwrap();
        assert!((s.get(0) - 0.7).abs() < 1e-6);
        assert!((s.get(1) - 0.2).abs() < 1e-6);
        assert_eq!(s.get(2), 0.0);
    }

    #[test]
    fn missing_classifier_is_reported() {
        let catalog = Catalog::from_json_str(r#"[{"id":"a"}]"#).unwrap();
        assert!(matches!(
            classifier_scores(&catalog, None, "sad", &ClassifierSettings::default()),
            Err(SignalError::ClassifierMissing)
        ));
    }
}
