use anyhow::{anyhow, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init(cache_timeout_minutes: i64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow!("prometheus: install recorder: {e}"))?;

        ensure_metrics_described();
        gauge!("trends_cache_timeout_seconds").set((cache_timeout_minutes * 60) as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
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

pub fn ensure_metrics_described() {
    DESCRIBED.get_or_init(|| {
        describe_counter!("trends_cache_hits_total", "Snapshot served from cache");
        describe_counter!("trends_cache_misses_total", "No valid cached snapshot for the geo");
        describe_counter!("trends_fetch_total", "Trends fetch attempts by credential slot");
        describe_counter!("trends_rotation_total", "Switches to the other credential");
        describe_counter!("trends_fetch_errors_total", "Failed trends fetches by error kind");
        describe_counter!("selector_fallback_total", "Selections that widened to the full snapshot");
        describe_counter!(
            "selector_similar_rejected_total",
            "Candidates dropped for resembling a recent article"
        );
        describe_counter!("batch_agents_total", "Agent runs by outcome");
        describe_gauge!("batch_last_run_ts", "Unix time of the last finished batch");
        describe_gauge!("trends_cache_timeout_seconds", "Configured snapshot lifetime");
    });
}
