// tests/metrics.rs
//
// The /metrics route exposes pipeline series after a degraded run.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{article, request, test_config, ScriptedFetcher, ScriptedGenerator};
use hybrid_news_aggregator::metrics::Metrics;
use hybrid_news_aggregator::pipeline::{HybridPipeline, NoopProgress};

#[tokio::test]
async fn metrics_endpoint_contains_pipeline_series() {
    let metrics = Metrics::init().expect("install recorder");
    // Second init reuses the installed recorder.
    let again = Metrics::init().expect("reuse recorder");

    let mut by_entity = HashMap::new();
    by_entity.insert(
        "Acme Corp".to_string(),
        vec![article("Acme Corp launches widget", "https://techcrunch.com/w", "TechCrunch", 1)],
    );
    let fetcher = ScriptedFetcher {
        by_entity,
        failing_entities: vec!["Beta Inc".to_string()],
        ..Default::default()
    };
    let pipeline = HybridPipeline::new(Arc::new(fetcher), ScriptedGenerator::failing(), test_config());
    pipeline
        .run_hybrid_fetch(&[request("alice", &["Acme Corp", "Beta Inc"], &[])], &NoopProgress)
        .await;

    let resp = again
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "pipeline_runs_total",
        "pipeline_run_ms",
        "source_fetch_errors_total",
        "layer2_failures_total",
        "enrichment_fallback_total",
    ] {
        assert!(text.contains(needle), "missing series {needle} in:\n{text}");
    }
    assert!(!metrics.handle.render().is_empty());
}
