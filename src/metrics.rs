use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

// The global recorder can be installed once per process; tests build many apps.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (first call only) and pre-register the
    /// recommender series so they render before the first request.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("recommend_requests_total", "Recommendation requests received");
    describe_counter!("recommend_cache_hits_total", "Requests served from the precomputed cache");
    describe_counter!("recommend_cache_misses_total", "Requests that missed the precomputed cache");
    describe_counter!("recommend_fallback_total", "Requests served by the top-rated fallback");
    describe_counter!(
        "recommend_signal_degraded_total",
        "Signals replaced by zeros because they could not be computed"
    );
    describe_histogram!(
        "recommend_duration_ms",
        Unit::Milliseconds,
        "End-to-end recommendation latency"
    );
    for name in [
        "recommend_requests_total",
        "recommend_cache_hits_total",
        "recommend_cache_misses_total",
        "recommend_fallback_total",
    ] {
        counter!(name).increment(0);
    }
}
