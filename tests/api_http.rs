// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use common::{article, test_config, ScriptedFetcher, ScriptedGenerator};
use hybrid_news_aggregator::api::{create_router, AppState};
use hybrid_news_aggregator::pipeline::HybridPipeline;

const BODY_LIMIT: usize = 1024 * 1024;

/// Feeds return one Acme story; the content service is down.
fn test_router() -> Router {
    let mut by_entity = HashMap::new();
    by_entity.insert(
        "Acme Corp".to_string(),
        vec![article("Acme Corp launches widget", "https://techcrunch.com/w", "TechCrunch", 1)],
    );
    let fetcher = ScriptedFetcher {
        by_entity,
        ..Default::default()
    };
    let pipeline = HybridPipeline::new(Arc::new(fetcher), ScriptedGenerator::failing(), test_config());
    create_router(AppState {
        pipeline: Arc::new(pipeline),
    })
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn health_returns_ok() {
    let resp = test_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn fetch_returns_camel_case_result() {
    let payload = json!({
        "requests": [{"owner": "alice", "companies": [{"name": "Acme Corp"}], "people": [{"name": "Jane Roe"}]}]
    });
    let req = Request::builder()
        .method("POST")
        .uri("/fetch")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let resp = test_router().oneshot(req).await.expect("oneshot /fetch");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    let articles = v["articles"].as_array().expect("articles array");
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["primarySourceName"], "TechCrunch");
    assert_eq!(articles[0]["fetchLayer"], "layer1_rss");
    assert_eq!(articles[0]["priorityLevel"], "medium");
    assert_eq!(v["coverageGaps"][0]["entity"], "Jane Roe");
    assert_eq!(v["stats"]["enrichmentMode"], "fallback");
}

#[tokio::test]
async fn search_without_subject_is_rejected() {
    let req = Request::builder()
        .method("POST")
        .uri("/search")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"company": "  "}"#))
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_degrades_to_empty_result() {
    let req = Request::builder()
        .method("POST")
        .uri("/search")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"company": "Acme Corp"}"#))
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["articles"].as_array().map(Vec::len), Some(0));
    assert_eq!(v["coverageGaps"][0]["entity"], "Acme Corp");
}
