//! # Precomputed result cache
//! Serves stored results for common prompts before any live scoring happens.
//!
//! On disk: `<dir>/_index.json` lists `{key, message, bucket?, mood?, recommendations?}`
//! and each `<dir>/<key>.json` holds a full [`RecommendationResponse`].
//!
//! Lookup policy:
//! 1. exact match of the trimmed, lowercased prompt against stored messages;
//! 2. keyword buckets in fixed order; the first bucket whose trigger words
//!    intersect the prompt tokens and that has a stored entry wins.
//!
//! A hit returns the stored document with `user_id` replaced and the list cut
//! to the requested size. Mood and items are whatever was computed when the
//! cache was built.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::response::RecommendationResponse;
use crate::text;

pub const INDEX_FILE: &str = "_index.json";

/// Ordered bucket table: (bucket name, trigger words).
pub const BUCKETS: &[(&str, &[&str])] = &[
    ("action", &["action", "exciting", "energetic", "thrilling"]),
    ("comedy", &["funny", "comedy", "laugh", "light", "entertaining"]),
    ("drama", &["drama", "emotional"]),
    ("thriller", &["thriller", "suspense"]),
    ("romance", &["romance", "romantic", "love", "date"]),
    ("horror", &["horror", "scary", "frightening"]),
    ("happy_comedy", &["happy", "funny"]),
    ("sad_uplifting", &["sad", "uplifting"]),
    ("calm_relaxing", &["calm", "relaxing"]),
    ("energetic_action", &["energetic", "action"]),
];

/// Prompts the precompute tool runs, as (key, message).
pub const COMMON_QUERIES: &[(&str, &str)] = &[
    ("happy_comedy", "I want something funny and light"),
    ("happy_general", "I'm feeling happy and want something entertaining"),
    ("sad_uplifting", "I'm sad and need something uplifting"),
    ("sad_drama", "I'm feeling sad and want a good drama"),
    ("energetic_action", "I want exciting action movies"),
    ("energetic_thriller", "I'm feeling energetic and want something thrilling"),
    ("calm_relaxing", "I want something calm and relaxing"),
    ("calm_romance", "I'm feeling calm and want a nice romance"),
    ("action", "I want action movies"),
    ("comedy", "I want comedy movies"),
    ("drama", "I want drama movies"),
    ("thriller", "I want thriller movies"),
    ("romance", "I want romance movies"),
    ("horror", "I want horror movies"),
    ("friends_night", "Something good for a movie night with friends"),
    ("date_night", "Something for a date night"),
    ("alone", "Something I can watch alone"),
    ("weekend", "Something for the weekend"),
    ("tonight", "Something for tonight"),
    ("late_night", "Late night movie"),
];

/// One row of `_index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRow {
    pub key: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PrecomputedEntry {
    pub key: String,
    pub message: String,
    pub bucket: Option<String>,
    pub cached_result: RecommendationResponse,
}

impl PrecomputedEntry {
    /// Explicit `bucket` wins; otherwise the key must contain the bucket name.
    fn serves_bucket(&self, bucket: &str) -> bool {
        match &self.bucket {
            Some(b) => b == bucket,
            None => self.key.contains(bucket),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Bucket(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct CacheHit<'a> {
    pub entry: &'a PrecomputedEntry,
    pub matched: MatchKind,
}

impl CacheHit<'_> {
    pub fn key(&self) -> &str {
        &self.entry.key
    }

    /// Stored response re-stamped with the caller's id and cut to `top_n`.
    /// Stored order and scores are kept as they are.
    pub fn for_user(&self, user_id: &str, top_n: usize) -> RecommendationResponse {
        let mut resp = self.entry.cached_result.clone();
        resp.user_id = user_id.to_string();
        resp.recommendations.truncate(top_n);
        resp
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrecomputedCache {
    entries: Vec<PrecomputedEntry>,
    by_message: HashMap<String, usize>,
}

impl PrecomputedCache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Eagerly load every entry. Never fails: a missing directory or index
    /// yields an empty cache, a bad entry is skipped with a warning.
    pub fn load(dir: &Path) -> Self {
        let index_path = dir.join(INDEX_FILE);
        let raw = match fs::read_to_string(&index_path) {
            Ok(raw) => raw,
            Err(_) => {
                tracing::info!(target: "precomputed", dir = %dir.display(), "no precomputed index, cache empty");
                return Self::empty();
            }
        };
        let rows: Vec<IndexRow> = match serde_json::from_str(&raw) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(target: "precomputed", error = %e, path = %index_path.display(), "unreadable precomputed index, cache empty");
                return Self::empty();
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let path = dir.join(format!("{}.json", row.key));
            let doc = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| {
                    serde_json::from_str::<RecommendationResponse>(&s).map_err(|e| e.to_string())
                });
            match doc {
                Ok(cached_result) => entries.push(PrecomputedEntry {
                    key: row.key,
                    message: row.message,
                    bucket: row.bucket,
                    cached_result,
                }),
                Err(e) => {
                    tracing::warn!(target: "precomputed", key = %row.key, error = %e, "skipping precomputed entry");
                }
            }
        }
        let cache = Self::from_entries(entries);
        tracing::info!(target: "precomputed", entries = cache.len(), "precomputed cache loaded");
        cache
    }

    pub fn from_entries(entries: Vec<PrecomputedEntry>) -> Self {
        let mut by_message = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            // first entry wins on duplicate messages
            by_message.entry(normalize_message(&e.message)).or_insert(i);
        }
        Self {
            entries,
            by_message,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PrecomputedEntry] {
        &self.entries
    }

    pub fn lookup(&self, prompt: &str) -> Option<CacheHit<'_>> {
        if self.entries.is_empty() {
            return None;
        }
        if let Some(&i) = self.by_message.get(&normalize_message(prompt)) {
            return Some(CacheHit {
                entry: &self.entries[i],
                matched: MatchKind::Exact,
            });
        }

        let tokens: HashSet<String> = text::words(prompt).into_iter().collect();
        for (bucket, triggers) in BUCKETS {
            if !triggers.iter().any(|t| tokens.contains(*t)) {
                continue;
            }
            if let Some(entry) = self.entries.iter().find(|e| e.serves_bucket(bucket)) {
                return Some(CacheHit {
                    entry,
                    matched: MatchKind::Bucket(*bucket),
                });
            }
        }
        None
    }
}

fn normalize_message(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Write one result document and return its index row.
pub fn write_entry(
    dir: &Path,
    key: &str,
    message: &str,
    result: &RecommendationResponse,
) -> anyhow::Result<IndexRow> {
    use anyhow::Context;
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut doc = result.clone();
    doc.query = Some(message.to_string());
    doc.query_key = Some(key.to_string());
    let json = serde_json::to_vec_pretty(&doc)?;
    let path = dir.join(format!("{key}.json"));
    crate::store::write_atomic(&path, &json)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(IndexRow {
        key: key.to_string(),
        message: message.to_string(),
        bucket: None,
        mood: Some(result.extracted_mood.mood.clone()),
        recommendations: Some(result.recommendations.len()),
    })
}

pub fn write_index(dir: &Path, rows: &[IndexRow]) -> anyhow::Result<()> {
    use anyhow::Context;
    let json = serde_json::to_vec_pretty(rows)?;
    let path = dir.join(INDEX_FILE);
    crate::store::write_atomic(&path, &json)
        .with_context(|| format!("writing {}", path.display()))
}
