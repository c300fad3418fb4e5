//! Default blend weights with hot-reload from `config/weights.json`.
//!
//! JSON shape:
//! {
//!   "mood_weight": 0.4,
//!   "history_weight": 0.3,
//!   "ml_weight": 0.3
//! }
//!
//! On each `current()` call we check the file's modified time and reload if changed.
//! Missing fields fall back to the base weights from `recommender.toml`.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

use crate::scorer::Weights;

pub const DEFAULT_WEIGHTS_PATH: &str = "config/weights.json";

#[derive(Debug)]
pub struct HotReloadWeights {
    path: PathBuf,
    base: Weights,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    weights: Weights,
    last_modified: Option<SystemTime>,
}

impl HotReloadWeights {
    pub fn new(path: &Path, base: Weights) -> Self {
        Self {
            path: path.to_path_buf(),
            base,
            inner: RwLock::new(State {
                weights: base,
                last_modified: None,
            }),
        }
    }

    /// Latest weights, reloading if the file changed. A missing file keeps
    /// whatever was loaded last (initially the base weights).
    pub fn current(&self) -> Weights {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return self.cached(),
        };
        let needs_reload = self
            .inner
            .read()
            .map(|g| g.last_modified != Some(mtime))
            .unwrap_or(false);
        if !needs_reload {
            return self.cached();
        }

        let Ok(mut guard) = self.inner.write() else {
            return self.base;
        };
        // double-check in case of races
        if guard.last_modified != Some(mtime) {
            match load_weights_file(&self.path, self.base) {
                Ok(w) => {
                    tracing::info!(target: "recommender", mood = w.mood_weight, history = w.history_weight, ml = w.ml_weight, "weights reloaded");
                    guard.weights = w;
                }
                Err(e) => {
                    tracing::warn!(target: "recommender", error = %e, path = %self.path.display(), "weights reload failed, keeping previous");
                }
            }
            guard.last_modified = Some(mtime);
        }
        guard.weights
    }

    fn cached(&self) -> Weights {
        self.inner.read().map(|g| g.weights).unwrap_or(self.base)
    }
}

/// Load weights directly (no caching). Missing keys take `base` values.
pub fn load_weights_file(path: &Path, base: Weights) -> io::Result<Weights> {
    #[derive(serde::Deserialize)]
    struct Partial {
        mood_weight: Option<f32>,
        history_weight: Option<f32>,
        ml_weight: Option<f32>,
    }
    let bytes = fs::read(path)?;
    let p: Partial = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Weights {
        mood_weight: p.mood_weight.unwrap_or(base.mood_weight),
        history_weight: p.history_weight.unwrap_or(base.history_weight),
        ml_weight: p.ml_weight.unwrap_or(base.ml_weight),
    }
    .sanitized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, thread, time::Duration};

    #[test]
    fn loads_and_hot_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");

        {
            let mut f = fs::File::create(&path).unwrap();
            write!(f, r#"{{"mood_weight":0.6,"history_weight":0.2}}"#).unwrap();
            f.sync_all().unwrap();
        }

        let hot = HotReloadWeights::new(&path, Weights::default());
        let w1 = hot.current();
        assert!((w1.mood_weight - 0.6).abs() < f32::EPSILON);
        assert!((w1.history_weight - 0.2).abs() < f32::EPSILON);
        assert!((w1.ml_weight - 0.3).abs() < f32::EPSILON);

        // Ensure different mtime (coarse filesystem granularity).
        thread::sleep(Duration::from_millis(1100));

        {
            let mut f = fs::File::create(&path).unwrap();
            write!(f, r#"{{"mood_weight":1.0,"history_weight":0.0,"ml_weight":0.0}}"#).unwrap();
            f.sync_all().unwrap();
        }

        let w2 = hot.current();
        assert!((w2.mood_weight - 1.0).abs() < f32::EPSILON);
        assert_eq!(w2.history_weight, 0.0);
        assert_eq!(w2.ml_weight, 0.0);
    }

    #[test]
    fn missing_file_uses_base() {
        let base = Weights {
            mood_weight: 0.5,
            history_weight: 0.25,
            ml_weight: 0.25,
        };
        let hot = HotReloadWeights::new(Path::new("/no/such/weights.json"), base);
        assert_eq!(hot.current(), base);
    }
}
