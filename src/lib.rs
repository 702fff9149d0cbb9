// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod config;
pub mod entities;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod source_tiers;

// Layer 1 feeds and the shared record types
pub mod ingest;

// Service-backed stages (contextual search, enrichment) and JSON tolerance
pub mod analyze;

// Heuristic + semantic dedup
pub mod dedup;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::api::{create_router, AppState};
pub use crate::entities::{CompanyRef, PersonRef, TrackingRequest};
pub use crate::model::{CoverageGap, FetchResult, FetchStats, ProcessedArticle};
pub use crate::pipeline::{AdHocQuery, HybridPipeline, NoopProgress, ProgressSink, StepStatus, StepUpdate};
