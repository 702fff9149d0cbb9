use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::entities::TrackingRequest;
use crate::model::FetchResult;
use crate::pipeline::{AdHocQuery, HybridPipeline, TracingProgress};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<HybridPipeline>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/fetch", post(fetch))
        .route("/search", post(search))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct FetchReq {
    #[serde(default)]
    requests: Vec<TrackingRequest>,
}

async fn fetch(State(state): State<AppState>, Json(body): Json<FetchReq>) -> Json<FetchResult> {
    let result = state
        .pipeline
        .run_hybrid_fetch(&body.requests, &TracingProgress)
        .await;
    Json(result)
}

async fn search(State(state): State<AppState>, Json(q): Json<AdHocQuery>) -> Response {
    let blank = |s: &Option<String>| s.as_deref().map(str::trim).unwrap_or_default().is_empty();
    if blank(&q.company) && blank(&q.person) {
        return (StatusCode::BAD_REQUEST, "company or person is required").into_response();
    }
    let result = state.pipeline.run_ad_hoc_search(&q, &TracingProgress).await;
    Json(result).into_response()
}
