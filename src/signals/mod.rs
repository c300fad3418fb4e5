//! Per-item score vectors produced by the individual ranking signals.

pub mod classifier;
pub mod history;

use thiserror::Error;

/// One finite score per catalog item, in catalog order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn from_vec(v: Vec<f32>) -> Self {
        let mut s = Self(v);
        s.sanitize();
        s
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> f32 {
        self.0.get(idx).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, idx: usize, value: f32) {
        if let Some(slot) = self.0.get_mut(idx) {
            *slot = if value.is_finite() { value } else { 0.0 };
        }
    }

    pub fn add(&mut self, idx: usize, delta: f32) {
        if let Some(slot) = self.0.get_mut(idx) {
            let next = *slot + delta;
            *slot = if next.is_finite() { next } else { 0.0 };
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|x| *x == 0.0)
    }

    /// Replace non-finite entries with 0.0.
    pub fn sanitize(&mut self) {
        for x in self.0.iter_mut() {
            if !x.is_finite() {
                *x = 0.0;
            }
        }
    }

    /// Scale into [0, 1] by the maximum; a non-positive max yields zeros.
    pub fn max_normalized(&self) -> Self {
        let max = self
            .0
            .iter()
            .copied()
            .filter(|x| x.is_finite())
            .fold(0.0f32, f32::max);
        if max <= 0.0 {
            return Self::zeros(self.len());
        }
        Self(
            self.0
                .iter()
                .map(|x| if x.is_finite() { (x / max).max(0.0) } else { 0.0 })
                .collect(),
        )
    }
}

/// A signal that could not be computed for this request.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("classifier artifact not loaded")]
    ClassifierMissing,
    #[error("label `{label}` unknown to the {encoder} encoder")]
    UnknownLabel { encoder: &'static str, label: String },
    #[error("predicted item `{0}` is not in the catalog")]
    UnknownItem(String),
    #[error("signal length {got} does not match catalog length {expected}")]
    LengthMismatch { expected: usize, got: usize },
}
