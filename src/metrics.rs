use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics with help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline invocations by kind (hybrid, ad_hoc).");
        describe_histogram!("pipeline_run_ms", "End-to-end pipeline duration in milliseconds.");
        describe_counter!(
            "source_fetch_errors_total",
            "Layer 1 fetches that failed or timed out."
        );
        describe_counter!(
            "source_fetch_articles_total",
            "Raw articles returned by Layer 1 fetches."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!(
            "generator_calls_total",
            "Content-generation attempts, including retries."
        );
        describe_counter!(
            "generator_errors_total",
            "Content-generation attempts that failed or timed out."
        );
        describe_counter!(
            "layer2_failures_total",
            "Contextual searches that degraded to an empty result."
        );
        describe_counter!(
            "semantic_dedup_failures_total",
            "Semantic dedup calls that degraded to pass-through."
        );
        describe_counter!(
            "pipeline_dedup_dropped_total",
            "Articles removed as duplicates, by stage."
        );
        describe_counter!(
            "pipeline_recency_dropped_total",
            "Articles removed by the recency window."
        );
        describe_counter!(
            "enrichment_repaired_total",
            "Enrichment replies recovered by structural repair."
        );
        describe_counter!(
            "enrichment_fallback_total",
            "Enrichment runs that fell back to raw articles."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Safe to call more than once;
    /// later calls reuse the first handle.
    pub fn init() -> Result<Self> {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();
        ensure_metrics_described();
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
