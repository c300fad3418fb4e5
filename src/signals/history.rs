//! Watch-history signal: boost titles the user already watched and their genre siblings.

use serde::Deserialize;
use std::collections::HashSet;

use super::ScoreVector;
use crate::catalog::Catalog;
use crate::text;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryBoosts {
    pub exact_boost: f32,
    pub genre_boost: f32,
}

impl Default for HistoryBoosts {
    fn default() -> Self {
        Self {
            exact_boost: 0.2,
            genre_boost: 0.1,
        }
    }
}

/// Items whose normalized title is in `watched` get `exact_boost`; every other
/// item sharing that item's non-empty genre gets `genre_boost`. Boosts stack.
pub fn history_scores(catalog: &Catalog, watched: &[String], boosts: HistoryBoosts) -> ScoreVector {
    let mut scores = ScoreVector::zeros(catalog.len());
    if watched.is_empty() {
        return scores;
    }
    let wanted: HashSet<String> = watched
        .iter()
        .map(|t| text::normalize_label(t))
        .filter(|t| !t.is_empty())
        .collect();

    for (i, item) in catalog.items().iter().enumerate() {
        if !wanted.contains(&text::normalize_label(&item.title)) {
            continue;
        }
        scores.add(i, boosts.exact_boost);
        for j in catalog.genre_siblings(&item.genre) {
            if j != i {
                scores.add(j, boosts.genre_boost);
            }
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_json_str(
            r#"[
            {"id":"1","title":"Fury Road","genre":"Action"},
            {"id":"2","title":"John Wick","genre":"action"},
            {"id":"3","title":"Paddington","genre":"Comedy"},
            {"id":"4","title":"Mystery","genre":""},
            {"id":"5","title":"Unknown","genre":""}
        ]"#,
        )
        .unwrap()
    }

    #[test]
    fn empty_history_is_zero() {
        assert!(history_scores(&catalog(), &[], HistoryBoosts::default()).is_all_zero());
    }

    #[test]
    fn exact_and_genre_boosts() {
        let s = history_scores(&catalog(), &["  fury ROAD ".to_string()], HistoryBoosts::default());
        let v = s.as_slice();
        assert!((v[0] - 0.2).abs() < 1e-6);
        assert!((v[1] - 0.1).abs() < 1e-6);
        assert_eq!(v[2], 0.0);
    }

    #[test]
    fn boosts_accumulate_across_watched_titles() {
        let watched = vec!["Fury Road".to_string(), "John Wick".to_string()];
        let s = history_scores(&catalog(), &watched, HistoryBoosts::default());
        assert!((s.get(0) - 0.3).abs() < 1e-6);
        assert!((s.get(1) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn empty_genre_has_no_siblings() {
        let s = history_scores(&catalog(), &["Mystery".to_string()], HistoryBoosts::default());
        assert!((s.get(3) - 0.2).abs() < 1e-6);
        assert_eq!(s.get(4), 0.0);
    }

    #[test]
    fn unmatched_titles_do_nothing() {
        let s = history_scores(&catalog(), &["Not In Catalog".to_string()], HistoryBoosts::default());
        assert!(s.is_all_zero());
    }
}
