// src/dedup/mod.rs
//! Two-stage dedup: deterministic clustering and recency, then an optional
//! service-assisted pass that merges same-story articles.

pub mod heuristic;
pub mod semantic;

pub use heuristic::{dedup_heuristic, HeuristicOutcome, HeuristicParams};
pub use semantic::{dedup_semantic, SemanticOutcome};
