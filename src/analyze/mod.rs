// src/analyze/mod.rs
//! Service-backed stages: the content-generation client, contextual search
//! (Layer 2), enrichment, and the tolerant JSON handling they share.

pub mod ai_adapter;
pub mod contextual;
pub mod enricher;
pub mod json_extract;
pub mod prompts;
pub mod repair;

pub use crate::analyze::ai_adapter::{
    build_client_from_config, ContentGenerator, DynGenerator, GenerateRequest,
};
pub use crate::analyze::contextual::contextual_search;
pub use crate::analyze::enricher::{enrich, EnrichmentOutcome};
pub use crate::analyze::json_extract::ParseFailure;
