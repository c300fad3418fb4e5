//! # Catalog
//! Item snapshot loaded once per process. Rows come from a JSON array of objects
//! with at least `id`, `title`, `genre`, `tags`, `rating`, `release_year`.
//!
//! Loading is lenient about text fields (missing or `null` → empty string) and
//! ratings (missing or non-finite → 0.0) but strict about the file itself: an
//! unreadable or malformed catalog is a startup error.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::text;

/// Raw catalog row as found on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRow {
    #[serde(alias = "movie_id", deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub release_year: Option<i32>,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub genre: String,
    pub tags: String,
    pub rating: f32,
    pub release_year: Option<i32>,
    #[serde(skip)]
    pub keywords: BTreeSet<String>,
}

impl CatalogItem {
    /// Concatenated searchable text: title + genre + tags.
    pub fn text(&self) -> String {
        format!("{} {} {}", self.title, self.genre, self.tags)
    }

    pub fn genre_key(&self) -> String {
        text::normalize_label(&self.genre)
    }
}

impl From<CatalogRow> for CatalogItem {
    fn from(row: CatalogRow) -> Self {
        let rating = row
            .rating
            .filter(|r| r.is_finite())
            .map(|r| r as f32)
            .filter(|r| r.is_finite())
            .unwrap_or(0.0);
        let mut item = CatalogItem {
            id: row.id,
            title: row.title.unwrap_or_default(),
            genre: row.genre.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            rating,
            release_year: row.release_year,
            keywords: BTreeSet::new(),
        };
        item.keywords = text::keyword_set(&item.text());
        item
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn from_rows(rows: Vec<CatalogRow>) -> Self {
        Self {
            items: rows.into_iter().map(CatalogItem::from).collect(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let rows: Vec<CatalogRow> = serde_json::from_str(s).context("parsing catalog rows")?;
        Ok(Self::from_rows(rows))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading catalog from {}", path.display()))?;
        let catalog = Self::from_json_str(&content)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        tracing::info!(target: "catalog", items = catalog.len(), path = %path.display(), "catalog loaded");
        Ok(catalog)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, idx: usize) -> Option<&CatalogItem> {
        self.items.get(idx)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of the item with the given id (first match).
    pub fn position_of_id(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|it| it.id == id)
    }

    /// Indices of items sharing the given genre (case-insensitive). Empty genre matches nothing.
    pub fn genre_siblings(&self, genre: &str) -> Vec<usize> {
        let key = text::normalize_label(genre);
        if key.is_empty() {
            return Vec::new();
        }
        self.items
            .iter()
            .enumerate()
            .filter(|(_, it)| it.genre_key() == key)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices sorted by rating descending; ties keep catalog order.
    pub fn by_rating_desc(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.items.len()).collect();
        idx.sort_by(|&a, &b| self.items[b].rating.total_cmp(&self.items[a].rating));
        idx
    }
}

fn id_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match RawId::deserialize(d)? {
        RawId::Text(s) => s.trim().to_string(),
        RawId::Int(i) => i.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}
