//! Hybrid News Aggregator binary entrypoint
//! Boots the Axum HTTP server: loads configs, builds the pipeline, and wires routes.

use std::sync::Arc;

use anyhow::Context;
use hybrid_news_aggregator::{
    ai_adapter::build_client_from_config,
    api::{create_router, AppState},
    config::{AiConfig, PipelineConfig},
    ingest::providers::HttpSourceFetcher,
    metrics::Metrics,
    pipeline::HybridPipeline,
    source_tiers::SourceTiers,
};
use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SOURCE_TIERS_PATH: &str = "config/source_tiers.json";

/// `RUST_LOG` wins; otherwise info for this crate and warn elsewhere.
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hybrid_news_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Shuttle may already have installed a subscriber; keep theirs in that case.
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let pipeline_cfg = PipelineConfig::load_default().context("loading pipeline config")?;
    let ai_cfg = AiConfig::load_default().context("loading ai config")?;
    let tiers = SourceTiers::load_from_file(SOURCE_TIERS_PATH);

    let generator = build_client_from_config(&ai_cfg);
    let fetcher = HttpSourceFetcher::new(&pipeline_cfg).context("building feed fetcher")?;
    info!(
        provider = generator.provider_name(),
        recency_days = pipeline_cfg.recency_days,
        curated_feeds = pipeline_cfg.curated_feeds.len(),
        "pipeline configured"
    );

    let pipeline = HybridPipeline::new(Arc::new(fetcher), generator, pipeline_cfg).with_tiers(tiers);
    let metrics = Metrics::init()?;

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
