// tests/config.rs
//
// Config file discovery and env overrides. Env mutation is process-global,
// so every test here runs serially.

use std::fs;

use serial_test::serial;

use mood_recommender::config::{
    RecommenderConfig, ENV_RECOMMENDER_CACHE_ENABLED, ENV_RECOMMENDER_CONFIG_PATH,
    ENV_RECOMMENDER_TOP_N, MAX_TOP_N,
};
use mood_recommender::config::weights::HotReloadWeights;
use mood_recommender::Weights;

fn clear_env() {
    for k in [
        ENV_RECOMMENDER_CONFIG_PATH,
        ENV_RECOMMENDER_TOP_N,
        ENV_RECOMMENDER_CACHE_ENABLED,
    ] {
        std::env::remove_var(k);
    }
}

#[test]
#[serial]
fn shipped_config_parses() {
    let cfg = RecommenderConfig::load_from(
        &std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/recommender.toml"),
    )
    .expect("shipped config");
    assert_eq!(cfg.scoring.top_n, 5);
    assert_eq!(cfg.scoring.weights, Weights::default());
    assert!(cfg.cache.enabled);
    assert_eq!(cfg.classifier.settings.time, "evening");
}

#[test]
#[serial]
fn config_path_comes_from_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.toml");
    fs::write(&path, "[scoring]\ntop_n = 9\n\n[cache]\nenabled = false\n").unwrap();
    std::env::set_var(ENV_RECOMMENDER_CONFIG_PATH, &path);

    let cfg = RecommenderConfig::load().unwrap();
    assert_eq!(cfg.scoring.top_n, 9);
    assert!(!cfg.cache.enabled);
    clear_env();
}

#[test]
#[serial]
fn env_overrides_win_over_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.toml");
    fs::write(&path, "[scoring]\ntop_n = 9\n").unwrap();
    std::env::set_var(ENV_RECOMMENDER_CONFIG_PATH, &path);
    std::env::set_var(ENV_RECOMMENDER_TOP_N, "1000");
    std::env::set_var(ENV_RECOMMENDER_CACHE_ENABLED, "off");

    let cfg = RecommenderConfig::load().unwrap();
    assert_eq!(cfg.scoring.top_n, MAX_TOP_N);
    assert!(!cfg.cache.enabled);
    clear_env();
}

#[test]
#[serial]
fn missing_file_means_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(ENV_RECOMMENDER_CONFIG_PATH, dir.path().join("absent.toml"));
    let cfg = RecommenderConfig::load().unwrap();
    assert_eq!(cfg.scoring.top_n, 5);
    clear_env();
}

#[test]
#[serial]
fn malformed_file_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.toml");
    fs::write(&path, "[scoring\n").unwrap();
    std::env::set_var(ENV_RECOMMENDER_CONFIG_PATH, &path);
    assert!(RecommenderConfig::load().is_err());
    clear_env();
}

#[test]
fn weights_file_hot_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.json");
    let hot = HotReloadWeights::new(&path, Weights::default());
    assert_eq!(hot.current(), Weights::default());

    fs::write(&path, r#"{"mood_weight": 1.0, "history_weight": 0.0}"#).unwrap();
    let w = hot.current();
    assert_eq!(w.mood_weight, 1.0);
    assert_eq!(w.history_weight, 0.0);
    assert_eq!(w.ml_weight, 0.3);
}
