//! Rule-based mood table, optionally hot-reloaded from `config/mood_rules.json`.
//!
//! JSON shape (first matching rule wins):
//! ```json
//! { "rules": [
//!   { "name": "low", "any_contains": ["sad", "lonely"], "mood": "happy", "tone": "light-hearted" }
//! ] }
//! ```
//! Matching is a case-insensitive substring test over the whitespace-condensed
//! prompt, so `"bad"` also fires inside longer words.

use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

use super::MoodSignal;

pub const DEFAULT_MOOD_RULES_PATH: &str = "config/mood_rules.json";

#[derive(Debug, Clone, Deserialize)]
pub struct MoodRuleSet {
    pub rules: Vec<MoodRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoodRule {
    pub name: Option<String>,
    pub any_contains: Vec<String>,
    pub mood: String,
    pub tone: String,
}

impl MoodRule {
    fn builtin(name: &str, words: &[&str], mood: &str, tone: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            any_contains: words.iter().map(|w| w.to_string()).collect(),
            mood: mood.to_string(),
            tone: tone.to_string(),
        }
    }
}

impl Default for MoodRuleSet {
    fn default() -> Self {
        Self {
            rules: vec![
                MoodRule::builtin("low", &["sad", "bad", "lonely"], "happy", "light-hearted"),
                MoodRule::builtin(
                    "drained",
                    &["tired", "lazy", "bored", "lethargic"],
                    "relaxed",
                    "light-hearted",
                ),
                MoodRule::builtin("hyped", &["excited", "energetic", "thrill"], "energetic", "intense"),
                MoodRule::builtin("romantic", &["romantic", "love"], "romantic", "light-hearted"),
            ],
        }
    }
}

/// Hot-reload wrapper: reloads when the rules file mtime changes. Without a
/// readable file the built-in table is used.
#[derive(Debug)]
pub struct HotReloadMoodRules {
    path: Option<PathBuf>,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    rules: MoodRuleSet,
    last_modified: Option<SystemTime>,
}

impl HotReloadMoodRules {
    pub fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            inner: RwLock::new(State {
                rules: MoodRuleSet::default(),
                last_modified: None,
            }),
        }
    }

    /// Built-in table, never touches the filesystem.
    pub fn builtin() -> Self {
        Self {
            path: None,
            inner: RwLock::new(State {
                rules: MoodRuleSet::default(),
                last_modified: None,
            }),
        }
    }

    pub fn current(&self) -> MoodRuleSet {
        let Some(path) = &self.path else {
            return self.read_rules();
        };
        let mtime = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return self.read_rules(),
        };
        let needs_reload = match self.inner.read() {
            Ok(g) => g.last_modified != Some(mtime),
            Err(_) => false,
        };
        if !needs_reload {
            return self.read_rules();
        }

        if let Ok(mut guard) = self.inner.write() {
            // re-check under the write lock
            if guard.last_modified != Some(mtime) {
                match load_mood_rules_file(path) {
                    Ok(rules) => {
                        tracing::info!(target: "mood", rules = rules.rules.len(), path = %path.display(), "mood rules reloaded");
                        guard.rules = rules;
                    }
                    Err(e) => {
                        tracing::warn!(target: "mood", error = %e, path = %path.display(), "mood rules reload failed, keeping previous table");
                    }
                }
                guard.last_modified = Some(mtime);
            }
            return guard.rules.clone();
        }
        MoodRuleSet::default()
    }

    fn read_rules(&self) -> MoodRuleSet {
        self.inner
            .read()
            .map(|g| g.rules.clone())
            .unwrap_or_default()
    }
}

pub fn load_mood_rules_file(path: &Path) -> io::Result<MoodRuleSet> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// First rule with any matching phrase wins; no match ⇒ neutral/neutral.
pub fn classify(prompt: &str, rules: &MoodRuleSet) -> MoodSignal {
    let text = normalize(prompt);
    rules
        .rules
        .iter()
        .find(|r| r.any_contains.iter().any(|p| contains(&text, p)))
        .map(|r| MoodSignal::new(&r.mood, &r.tone))
        .unwrap_or_else(MoodSignal::neutral)
}

fn contains(text: &str, pat: &str) -> bool {
    let p = normalize(pat);
    !p.is_empty() && text.contains(p.as_str())
}

fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rule(prompt: &str) -> MoodSignal {
        classify(prompt, &MoodRuleSet::default())
    }

    #[test]
    fn builtin_table() {
        assert_eq!(rule("Feeling LONELY tonight"), MoodSignal::new("happy", "light-hearted"));
        assert_eq!(rule("so bored"), MoodSignal::new("relaxed", "light-hearted"));
        assert_eq!(rule("I'm excited!"), MoodSignal::new("energetic", "intense"));
        assert_eq!(rule("date night, love"), MoodSignal::new("romantic", "light-hearted"));
        assert_eq!(rule("I want exciting action movies"), MoodSignal::neutral());
    }

    #[test]
    fn first_match_wins() {
        // "sad" and "excited" both present; the earlier rule wins
        assert_eq!(rule("sad but excited"), MoodSignal::new("happy", "light-hearted"));
    }

    #[test]
    fn thrill_matches_as_substring() {
        assert_eq!(rule("something thrilling"), MoodSignal::new("energetic", "intense"));
    }

    #[test]
    fn loads_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mood_rules.json");
        let mut f = fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"rules":[{{"any_contains":["rainy"],"mood":"calm","tone":"cozy"}}]}}"#
        )
        .unwrap();
        f.sync_all().unwrap();

        let hot = HotReloadMoodRules::new(&path);
        let rules = hot.current();
        assert_eq!(classify("a rainy day", &rules), MoodSignal::new("calm", "cozy"));
        // the file replaces the table entirely
        assert_eq!(classify("so sad", &rules), MoodSignal::neutral());
    }

    #[test]
    fn missing_file_keeps_builtin() {
        let hot = HotReloadMoodRules::new(Path::new("/no/such/mood_rules.json"));
        assert_eq!(
            classify("lonely", &hot.current()),
            MoodSignal::new("happy", "light-hearted")
        );
    }
}
