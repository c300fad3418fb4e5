//! Runs the live pipeline for the common queries and writes the precomputed cache.
//!
//! Output goes to the `[cache] dir` from `recommender.toml` (default `data/precomputed`).

use std::sync::Arc;

use anyhow::Context;
use mood_recommender::config::RecommenderConfig;
use mood_recommender::precomputed::{write_entry, write_index, COMMON_QUERIES};
use mood_recommender::store::{HistorySource, JsonHistoryStore};
use mood_recommender::{build_mood_extractor, init_tracing, Recommender, RecommenderState};

const PRECOMPUTE_USER: &str = "precompute";
const PRECOMPUTE_TOP_N: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = RecommenderConfig::load()?;
    let out_dir = config.cache.dir.clone();

    let state = Arc::new(RecommenderState::load(&config)?);
    let history: Arc<dyn HistorySource> = Arc::new(JsonHistoryStore::in_memory());
    let recommender = Recommender::new(state, build_mood_extractor(&config), history);

    println!(
        "precomputing {} queries into {} (mood: {})",
        COMMON_QUERIES.len(),
        out_dir.display(),
        recommender.mood_mode()
    );

    let mut rows = Vec::with_capacity(COMMON_QUERIES.len());
    for (i, (key, message)) in COMMON_QUERIES.iter().enumerate() {
        let response = match recommender
            .compute_live(PRECOMPUTE_USER, message, PRECOMPUTE_TOP_N, None)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[{}/{}] {key}: skipped ({e})", i + 1, COMMON_QUERIES.len());
                continue;
            }
        };
        let row = write_entry(&out_dir, key, message, &response)
            .with_context(|| format!("writing precomputed entry `{key}`"))?;
        println!(
            "[{}/{}] {key}: mood={} items={}",
            i + 1,
            COMMON_QUERIES.len(),
            response.extracted_mood.mood,
            response.recommendations.len()
        );
        rows.push(row);
    }

    write_index(&out_dir, &rows)?;
    println!("precomputed {} queries", rows.len());
    Ok(())
}
