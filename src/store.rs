//! JSON-file stores: watch history, conversation log, user profiles.
//!
//! Each store keeps its data in memory behind a `Mutex` and rewrites the whole
//! file atomically (temp file + rename) after every change; a failed write
//! rolls the in-memory change back. Unreadable files load as empty. Stores
//! built with `in_memory()` never touch disk.
//!
//! Writes are blocking. Async callers run them on the blocking pool.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::mood::MoodSignal;
use crate::response::RecommendationResponse;
use crate::text;

pub const CONVERSATION_CAP: usize = 50;

/// Read-only view of watch history used by the scorer.
pub trait HistorySource: Send + Sync {
    /// Watched titles in insertion order; empty for unknown users.
    fn watched(&self, user_id: &str) -> Vec<String>;
}

impl HistorySource for HashMap<String, Vec<String>> {
    fn watched(&self, user_id: &str) -> Vec<String> {
        self.get(user_id).cloned().unwrap_or_default()
    }
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn load_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path, what: &str) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return T::default(),
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(target: "recommender", error = %e, path = %path.display(), store = what, "unreadable store file, starting empty");
        T::default()
    })
}

fn persist<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json).with_context(|| format!("writing {}", path.display()))
}

// ------------------------------------------------------------
// Watch history
// ------------------------------------------------------------

#[derive(Debug, Default)]
pub struct JsonHistoryStore {
    path: Option<PathBuf>,
    inner: Mutex<HashMap<String, Vec<String>>>,
}

impl JsonHistoryStore {
    pub fn open(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            inner: Mutex::new(load_json_or_default(path, "watch_history")),
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Append a title unless already present (case-insensitive). Returns whether it was added.
    pub fn add_watched(&self, user_id: &str, title: &str) -> anyhow::Result<bool> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(false);
        }
        let mut g = lock(&self.inner);
        let list = g.entry(user_id.to_string()).or_default();
        let key = text::normalize_label(title);
        if list.iter().any(|t| text::normalize_label(t) == key) {
            return Ok(false);
        }
        list.push(title.to_string());
        if let Err(e) = persist(self.path.as_deref(), &*g) {
            // keep memory in step with disk
            if let Some(list) = g.get_mut(user_id) {
                list.pop();
                if list.is_empty() {
                    g.remove(user_id);
                }
            }
            return Err(e);
        }
        Ok(true)
    }

    pub fn count(&self, user_id: &str) -> usize {
        lock(&self.inner).get(user_id).map(Vec::len).unwrap_or(0)
    }
}

impl HistorySource for JsonHistoryStore {
    fn watched(&self, user_id: &str) -> Vec<String> {
        lock(&self.inner).get(user_id).cloned().unwrap_or_default()
    }
}

// ------------------------------------------------------------
// Conversation log
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub mood: MoodSignal,
    /// Top-3 recommended titles.
    pub recommendations: Vec<String>,
    /// Distinct genres of those titles.
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInsights {
    pub user_id: String,
    pub watch_history_count: usize,
    pub conversation_count: usize,
    pub top_mood: String,
    pub mood_distribution: BTreeMap<String, usize>,
    pub top_genres: Vec<String>,
    pub genre_distribution: BTreeMap<String, usize>,
    pub recent_conversations: Vec<ConversationEntry>,
}

#[derive(Debug)]
pub struct ConversationLog {
    path: Option<PathBuf>,
    cap: usize,
    inner: Mutex<HashMap<String, Vec<ConversationEntry>>>,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self {
            path: None,
            cap: CONVERSATION_CAP,
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl ConversationLog {
    pub fn open(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            cap: CONVERSATION_CAP,
            inner: Mutex::new(load_json_or_default(path, "conversations")),
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn record(&self, user_id: &str, message: &str, resp: &RecommendationResponse) -> anyhow::Result<()> {
        let mut genres: Vec<String> = Vec::new();
        for g in resp.genres(3) {
            if !g.is_empty() && !genres.contains(&g) {
                genres.push(g);
            }
        }
        let entry = ConversationEntry {
            timestamp: Utc::now(),
            message: message.to_string(),
            mood: resp.extracted_mood.clone(),
            recommendations: resp.titles(3),
            genres,
        };

        let mut g = lock(&self.inner);
        let previous = g.get(user_id).cloned();
        let list = g.entry(user_id.to_string()).or_default();
        list.push(entry);
        if list.len() > self.cap {
            let excess = list.len() - self.cap;
            list.drain(..excess);
        }
        if let Err(e) = persist(self.path.as_deref(), &*g) {
            match previous {
                Some(prev) => {
                    g.insert(user_id.to_string(), prev);
                }
                None => {
                    g.remove(user_id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn count(&self, user_id: &str) -> usize {
        lock(&self.inner).get(user_id).map(Vec::len).unwrap_or(0)
    }

    /// Last `limit` entries, oldest first.
    pub fn recent(&self, user_id: &str, limit: usize) -> Vec<ConversationEntry> {
        let g = lock(&self.inner);
        let list = g.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
        list[list.len().saturating_sub(limit)..].to_vec()
    }

    pub fn mood_distribution(&self, user_id: &str) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        if let Some(list) = lock(&self.inner).get(user_id) {
            for e in list {
                *out.entry(e.mood.mood.clone()).or_insert(0) += 1;
            }
        }
        out
    }

    pub fn genre_preferences(&self, user_id: &str) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        if let Some(list) = lock(&self.inner).get(user_id) {
            for e in list {
                for g in &e.genres {
                    *out.entry(g.clone()).or_insert(0) += 1;
                }
            }
        }
        out
    }

    pub fn insights(&self, user_id: &str, watch_history_count: usize) -> UserInsights {
        let mood_distribution = self.mood_distribution(user_id);
        let genre_distribution = self.genre_preferences(user_id);
        UserInsights {
            user_id: user_id.to_string(),
            watch_history_count,
            conversation_count: self.count(user_id),
            top_mood: top_keys(&mood_distribution, 1)
                .pop()
                .unwrap_or_else(|| crate::mood::NEUTRAL.to_string()),
            top_genres: top_keys(&genre_distribution, 3),
            mood_distribution,
            genre_distribution,
            recent_conversations: self.recent(user_id, 5),
        }
    }
}

// Highest counts first; ties alphabetical.
fn top_keys(counts: &BTreeMap<String, usize>, n: usize) -> Vec<String> {
    let mut v: Vec<(&String, &usize)> = counts.iter().collect();
    v.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    v.into_iter().take(n).map(|(k, _)| k.clone()).collect()
}

// ------------------------------------------------------------
// User profiles
// ------------------------------------------------------------

/// Read-only profile documents keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct UserProfiles {
    profiles: HashMap<String, serde_json::Value>,
}

impl UserProfiles {
    /// Accepts either `{ "<user_id>": {...} }` or `[ {"user_id": "..", ...} ]`.
    pub fn load(path: &Path) -> Self {
        let raw: serde_json::Value = load_json_or_default(path, "users");
        Self::from_value(raw)
    }

    pub fn from_value(raw: serde_json::Value) -> Self {
        let mut profiles = HashMap::new();
        match raw {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    profiles.insert(k, v);
                }
            }
            serde_json::Value::Array(rows) => {
                for row in rows {
                    let id = match row.get("user_id") {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(serde_json::Value::Number(n)) => n.to_string(),
                        _ => continue,
                    };
                    profiles.insert(id, row);
                }
            }
            _ => {}
        }
        Self { profiles }
    }

    pub fn get(&self, user_id: &str) -> Option<&serde_json::Value> {
        self.profiles.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
