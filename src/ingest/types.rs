// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which retrieval layer produced a raw record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FetchLayer {
    #[serde(rename = "layer1_rss")]
    Layer1Rss,
    #[serde(rename = "layer1_api")]
    Layer1Api,
    #[serde(rename = "layer2_llm")]
    Layer2Llm,
}

impl FetchLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchLayer::Layer1Rss => "layer1_rss",
            FetchLayer::Layer1Api => "layer1_api",
            FetchLayer::Layer2Llm => "layer2_llm",
        }
    }
}

/// One candidate article as returned by a source, before any dedup or enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub headline: String,
    pub description: String,
    pub source_url: String,
    pub source_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetch_layer: FetchLayer,
    /// Tracked entity whose query produced this record, if known.
    #[serde(default)]
    pub query_entity: Option<String>,
}

/// A single Layer 1 fetch, addressed to one feed kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    /// Feed search by free text (company name, or quoted person name).
    NewsSearch { query: String, entity: String },
    /// Regulatory filings search by identifier (SEC CIK).
    Filings { identifier: String, entity: String },
    /// One of the curated domain feeds, fetched once per run.
    Curated { name: String, url: String },
}

impl FeedQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedQuery::NewsSearch { .. } => "news_search",
            FeedQuery::Filings { .. } => "filings",
            FeedQuery::Curated { .. } => "curated",
        }
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> &str {
        match self {
            FeedQuery::NewsSearch { query, .. } => query,
            FeedQuery::Filings { identifier, .. } => identifier,
            FeedQuery::Curated { name, .. } => name,
        }
    }
}

/// Deterministic per-call fetcher. Each call may fail on its own; callers neutralize failures.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawArticle>>;
    fn name(&self) -> &'static str;
}
