//! Catalog index: an inverted keyword → items map and L2-normalized TF-IDF
//! vectors, built once from a catalog snapshot. Per-item keyword sets live on
//! [`CatalogItem::keywords`](crate::catalog::CatalogItem).

use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::signals::ScoreVector;
use crate::text;

/// Sparse TF-IDF vector: (term id, weight) pairs sorted by term id.
type SparseVec = Vec<(usize, f32)>;

#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    inverted: HashMap<String, Vec<usize>>,
    vocab: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<SparseVec>,
}

impl CatalogIndex {
    pub fn build(catalog: &Catalog) -> Self {
        let n = catalog.len();
        let docs: Vec<Vec<String>> = catalog
            .items()
            .iter()
            .map(|it| text::terms(&it.text()))
            .collect();

        let mut inverted: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, item) in catalog.items().iter().enumerate() {
            for kw in &item.keywords {
                // items are visited in order, so each posting list stays ascending
                inverted.entry(kw.clone()).or_default().push(i);
            }
        }

        let mut terms: Vec<&String> = inverted.keys().collect();
        terms.sort();
        let vocab: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(id, t)| ((*t).clone(), id))
            .collect();

        let n_f = n as f32;
        let mut idf = vec![0.0f32; vocab.len()];
        for (term, id) in &vocab {
            let df = inverted.get(term).map(Vec::len).unwrap_or(0) as f32;
            idf[*id] = ((1.0 + n_f) / (1.0 + df)).ln() + 1.0;
        }

        let vectors = docs
            .iter()
            .map(|doc| tfidf_vector(doc, &vocab, &idf))
            .collect();

        tracing::debug!(target: "catalog", items = n, vocabulary = vocab.len(), "index built");

        Self {
            inverted,
            vocab,
            idf,
            vectors,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }

    /// Ascending item indices containing `keyword` (already lowercased).
    pub fn items_with(&self, keyword: &str) -> &[usize] {
        self.inverted
            .get(keyword)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Each distinct prompt keyword adds 1.0 to every item containing it.
    pub fn keyword_scores(&self, prompt: &str) -> ScoreVector {
        let mut scores = ScoreVector::zeros(self.len());
        for kw in text::keyword_set(prompt) {
            for &i in self.items_with(&kw) {
                scores.add(i, 1.0);
            }
        }
        scores
    }

    /// Cosine similarity between the prompt's TF-IDF vector and every item.
    /// Unknown prompt terms are ignored; a zero-norm side scores 0.0.
    pub fn cosine_scores(&self, prompt: &str) -> ScoreVector {
        let mut scores = ScoreVector::zeros(self.len());
        let query = tfidf_vector(&text::terms(prompt), &self.vocab, &self.idf);
        if query.is_empty() {
            return scores;
        }
        for (i, doc) in self.vectors.iter().enumerate() {
            scores.set(i, sparse_dot(&query, doc));
        }
        scores
    }
}

fn tfidf_vector(terms: &[String], vocab: &HashMap<String, usize>, idf: &[f32]) -> SparseVec {
    let mut tf: HashMap<usize, f32> = HashMap::new();
    for t in terms {
        if let Some(&id) = vocab.get(t) {
            *tf.entry(id).or_insert(0.0) += 1.0;
        }
    }
    let mut v: SparseVec = tf
        .into_iter()
        .map(|(id, count)| (id, count * idf[id]))
        .collect();
    v.sort_by_key(|(id, _)| *id);

    let norm = v.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= 0.0 {
        return Vec::new();
    }
    for (_, w) in v.iter_mut() {
        *w /= norm;
    }
    v
}

// Both inputs are sorted by term id.
fn sparse_dot(a: &SparseVec, b: &SparseVec) -> f32 {
    let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                acc += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    acc
}
