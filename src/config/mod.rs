// src/config/mod.rs
pub mod ai;
pub mod pipeline;

pub use ai::AiConfig;
pub use pipeline::{CuratedFeed, PipelineConfig};
