//! Text normalization shared by the catalog index, the precomputed cache and the
//! rule-based mood extractor.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

// \w covers [A-Za-z0-9_]; (?u) enables Unicode
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "a", "an", "the", "and", "or", "for", "with", "this", "that", "from", "have", "has",
        "are", "was", "were", "you", "your", "our", "their", "into", "about", "what", "when",
        "i", "im", "m", "me", "my", "to", "of", "in", "on", "is", "it", "be", "am", "some",
        "something", "want", "need", "watch", "please", "can", "could", "would", "should",
    ])
});

/// Lowercased word tokens in input order (duplicates kept).
pub fn words(input: &str) -> Vec<String> {
    WORD_RE
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Lowercased word tokens with stop-words removed (duplicates kept, for TF counts).
pub fn terms(input: &str) -> Vec<String> {
    words(input)
        .into_iter()
        .filter(|w| !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Distinct, ordered keyword set.
pub fn keyword_set(input: &str) -> BTreeSet<String> {
    terms(input).into_iter().collect()
}

/// Trim + lowercase, used for title and genre equality.
pub fn normalize_label(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Short, stable fingerprint for logs. Never log raw prompt text.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_lowercased_and_split_on_punctuation() {
        assert_eq!(
            words("Action, Sci-Fi & THRILLER!"),
            vec!["action", "sci", "fi", "thriller"]
        );
    }

    #[test]
    fn terms_drop_stopwords() {
        assert_eq!(
            terms("I want exciting action movies"),
            vec!["exciting", "action", "movies"]
        );
    }

    #[test]
    fn keyword_set_dedups() {
        let k = keyword_set("funny funny comedy");
        assert_eq!(k.len(), 2);
        assert!(k.contains("comedy"));
    }

    #[test]
    fn anon_hash_is_stable_and_short() {
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_eq!(anon_hash("abc").len(), 12);
        assert_ne!(anon_hash("abc"), anon_hash("abd"));
    }
}
