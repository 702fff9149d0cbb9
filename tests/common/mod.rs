// tests/common/mod.rs
//
// Shared doubles for integration tests: a scripted content generator (routes by
// which stage built the prompt) and a scripted feed fetcher.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use hybrid_news_aggregator::ai_adapter::{ContentGenerator, GenerateRequest};
use hybrid_news_aggregator::config::PipelineConfig;
use hybrid_news_aggregator::ingest::types::{FeedQuery, FetchLayer, RawArticle, SourceFetcher};
use hybrid_news_aggregator::{CompanyRef, PersonRef, TrackingRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Contextual,
    Semantic,
    Enrich,
    AdHoc,
}

pub fn stage_of(instruction: &str) -> Stage {
    if instruction.contains("Focus narrowly") {
        Stage::AdHoc
    } else if instruction.contains("{\"groups\"") {
        Stage::Semantic
    } else if instruction.contains("{\"results\"") {
        Stage::Contextual
    } else {
        Stage::Enrich
    }
}

type Script = dyn Fn(Stage, &GenerateRequest) -> Result<String> + Send + Sync;

pub struct ScriptedGenerator {
    script: Box<Script>,
    pub calls: Mutex<Vec<Stage>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl Fn(Stage, &GenerateRequest) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails, as if the service were unreachable.
    pub fn failing() -> Arc<Self> {
        Self::new(|_, _| Err(anyhow!("service unavailable")))
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls.lock().clone()
    }
}

impl ContentGenerator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let stage = stage_of(&request.instruction);
        self.calls.lock().push(stage);
        let out = (self.script)(stage, request);
        Box::pin(async move { out })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Returns canned items per news-search entity; everything else is empty or fails.
#[derive(Default)]
pub struct ScriptedFetcher {
    pub by_entity: HashMap<String, Vec<RawArticle>>,
    pub failing_entities: Vec<String>,
    pub curated: Vec<RawArticle>,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawArticle>> {
        self.calls.lock().push(format!("{}:{}", query.kind(), query.label()));
        match query {
            FeedQuery::NewsSearch { entity, .. } | FeedQuery::Filings { entity, .. } => {
                if self.failing_entities.contains(entity) {
                    return Err(anyhow!("503 for {entity}"));
                }
                if matches!(query, FeedQuery::Filings { .. }) {
                    return Ok(Vec::new());
                }
                Ok(self.by_entity.get(entity).cloned().unwrap_or_default())
            }
            FeedQuery::Curated { .. } => Ok(self.curated.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn article(headline: &str, url: &str, source: &str, hours_ago: i64) -> RawArticle {
    RawArticle {
        headline: headline.to_string(),
        description: format!("{headline}. Details follow."),
        source_url: url.to_string(),
        source_name: source.to_string(),
        published_at: Some(Utc::now() - Duration::hours(hours_ago)),
        fetch_layer: FetchLayer::Layer1Rss,
        query_entity: None,
    }
}

pub fn request(owner: &str, companies: &[&str], people: &[&str]) -> TrackingRequest {
    TrackingRequest {
        owner: owner.to_string(),
        companies: companies
            .iter()
            .map(|n| CompanyRef {
                name: n.to_string(),
                ..Default::default()
            })
            .collect(),
        people: people
            .iter()
            .map(|n| PersonRef {
                name: n.to_string(),
                title: None,
            })
            .collect(),
    }
}

/// Defaults without curated feeds, so fetch plans depend only on entities.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        curated_feeds: Vec::new(),
        ..Default::default()
    }
}
