// src/pipeline.rs
//! Pipeline coordinator.
//!
//! Fixed order: (Layer 1 ∥ Layer 2) → heuristic dedup → semantic dedup → enrichment.
//! Entry points never fail; every degraded stage is visible in `FetchStats`.

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::analyze::ai_adapter::{DynGenerator, GenerateRequest};
use crate::analyze::contextual::contextual_search;
use crate::analyze::enricher::{self, enrich, parse_enrichment_response};
use crate::analyze::prompts;
use crate::config::PipelineConfig;
use crate::dedup::{dedup_heuristic, dedup_semantic, HeuristicParams};
use crate::entities::{collect_entities, CompanyRef, PersonRef, TrackingRequest};
use crate::ingest::layer1::fetch_layer1;
use crate::ingest::types::SourceFetcher;
use crate::model::{EnrichmentMode, FetchResult, FetchStats};
use crate::source_tiers::SourceTiers;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepUpdate {
    pub index: usize,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepUpdate {
    fn new(index: usize, status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            index,
            status,
            detail: Some(detail.into()),
        }
    }
}

/// Caller-supplied progress observer. Errors are logged and otherwise ignored.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(
        &self,
        percent: u8,
        message: &str,
        step: Option<StepUpdate>,
    ) -> anyhow::Result<()>;
}

pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn on_progress(&self, _: u8, _: &str, _: Option<StepUpdate>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs each checkpoint at info level.
pub struct TracingProgress;

#[async_trait]
impl ProgressSink for TracingProgress {
    async fn on_progress(
        &self,
        percent: u8,
        message: &str,
        step: Option<StepUpdate>,
    ) -> anyhow::Result<()> {
        info!(percent, step = step.as_ref().map(|s| s.index), message, "pipeline progress");
        Ok(())
    }
}

async fn notify(progress: &dyn ProgressSink, percent: u8, message: &str, step: StepUpdate) {
    if let Err(e) = progress.on_progress(percent, message, Some(step)).await {
        warn!(percent, error = %e, "progress sink failed; continuing");
    }
}

/// Single-entity search input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdHocQuery {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub person: Option<String>,
}

impl AdHocQuery {
    fn company(&self) -> Option<&str> {
        self.company.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn person(&self) -> Option<&str> {
        self.person.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

pub struct HybridPipeline {
    fetcher: Arc<dyn SourceFetcher>,
    generator: DynGenerator,
    config: PipelineConfig,
    tiers: SourceTiers,
}

impl HybridPipeline {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, generator: DynGenerator, config: PipelineConfig) -> Self {
        crate::metrics::ensure_metrics_described();
        Self {
            fetcher,
            generator,
            config,
            tiers: SourceTiers::default_seed(),
        }
    }

    pub fn with_tiers(mut self, tiers: SourceTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Full two-layer fetch for every entity across `requests`.
    pub async fn run_hybrid_fetch(
        &self,
        requests: &[TrackingRequest],
        progress: &dyn ProgressSink,
    ) -> FetchResult {
        let t0 = Instant::now();
        let entities = collect_entities(requests);
        if entities.is_empty() {
            info!("no tracked entities; nothing to fetch");
            return FetchResult::default();
        }
        counter!("pipeline_runs_total", "kind" => "hybrid").increment(1);
        let now = Utc::now();
        let mut stats = FetchStats {
            entities: entities.len(),
            ..Default::default()
        };

        notify(
            progress,
            0,
            &format!("Searching news for {} entities", entities.len()),
            StepUpdate::new(0, StepStatus::InProgress, "layer 1 feeds and contextual search"),
        )
        .await;

        let (layer1, layer2) = tokio::join!(
            fetch_layer1(
                self.fetcher.as_ref(),
                &entities,
                &self.config.curated_feeds,
                self.config.fetch_timeout(),
            ),
            contextual_search(self.generator.as_ref(), &entities, &self.config, now),
        );
        stats.layer1_raw = layer1.len();
        stats.layer2_raw = layer2.len();
        let mut raw = layer1;
        raw.extend(layer2);
        stats.raw_total = raw.len();

        notify(
            progress,
            40,
            &format!("Found {} raw articles", stats.raw_total),
            StepUpdate::new(
                0,
                StepStatus::Completed,
                format!("{} from feeds, {} from search", stats.layer1_raw, stats.layer2_raw),
            ),
        )
        .await;

        let params = HeuristicParams {
            similarity_threshold: self.config.title_similarity_threshold,
            recency_window: self.config.recency_window(),
        };
        let heuristic = dedup_heuristic(raw, params, &self.tiers, now);
        counter!("pipeline_dedup_dropped_total", "stage" => "heuristic")
            .increment(heuristic.duplicates_dropped as u64);
        counter!("pipeline_recency_dropped_total").increment(heuristic.stale_dropped as u64);
        stats.after_heuristic = heuristic.kept.len();

        notify(
            progress,
            55,
            &format!("{} articles after dedup", stats.after_heuristic),
            StepUpdate::new(
                1,
                StepStatus::Completed,
                format!(
                    "{} duplicates, {} outside the {}-day window",
                    heuristic.duplicates_dropped, heuristic.stale_dropped, self.config.recency_days
                ),
            ),
        )
        .await;

        let semantic = dedup_semantic(self.generator.as_ref(), heuristic.kept, &self.config, &self.tiers).await;
        stats.after_semantic = semantic.kept.len();
        stats.semantic_applied = semantic.applied;
        let semantic_step = match &semantic.error {
            Some(e) => StepUpdate::new(2, StepStatus::Error, format!("skipped: {e}")),
            None => StepUpdate::new(2, StepStatus::Completed, format!("{} same-story groups", semantic.groups.len())),
        };

        notify(
            progress,
            70,
            &format!("Enriching {} articles", stats.after_semantic),
            semantic_step,
        )
        .await;

        let outcome = enrich(self.generator.as_ref(), semantic.kept, &entities, &self.config, &self.tiers).await;
        stats.enrichment_input = outcome.input_count;
        stats.enriched = outcome.articles.len();
        stats.coverage_gaps = outcome.coverage_gaps.len();
        stats.enrichment_mode = outcome.mode;
        stats.duration_ms = t0.elapsed().as_millis() as u64;

        let status = if outcome.mode == EnrichmentMode::Fallback {
            StepStatus::Error
        } else {
            StepStatus::Completed
        };
        notify(
            progress,
            100,
            &format!("Done: {} articles, {} coverage gaps", stats.enriched, stats.coverage_gaps),
            StepUpdate::new(3, status, format!("{:?}", outcome.mode).to_lowercase()),
        )
        .await;

        histogram!("pipeline_run_ms").record(stats.duration_ms as f64);
        info!(
            entities = stats.entities,
            raw = stats.raw_total,
            after_heuristic = stats.after_heuristic,
            after_semantic = stats.after_semantic,
            enriched = stats.enriched,
            gaps = stats.coverage_gaps,
            ms = stats.duration_ms,
            "hybrid fetch complete"
        );

        FetchResult {
            articles: outcome.articles,
            coverage_gaps: outcome.coverage_gaps,
            stats,
        }
    }

    /// One narrow web-search call for a single company and/or person; no feeds, no dedup.
    pub async fn run_ad_hoc_search(&self, query: &AdHocQuery, progress: &dyn ProgressSink) -> FetchResult {
        let t0 = Instant::now();
        let (company, person) = (query.company(), query.person());
        if company.is_none() && person.is_none() {
            return FetchResult::default();
        }
        counter!("pipeline_runs_total", "kind" => "ad_hoc").increment(1);

        let request = TrackingRequest {
            owner: String::new(),
            companies: company
                .map(|c| CompanyRef {
                    name: c.to_string(),
                    ..Default::default()
                })
                .into_iter()
                .collect(),
            people: person
                .map(|p| PersonRef {
                    name: p.to_string(),
                    title: None,
                })
                .into_iter()
                .collect(),
        };
        let entities = collect_entities(std::slice::from_ref(&request));
        let max = self.config.ad_hoc_max_results;

        notify(
            progress,
            0,
            "Searching",
            StepUpdate::new(0, StepStatus::InProgress, "ad-hoc search"),
        )
        .await;

        let instruction = prompts::ad_hoc_search(company, person, max, self.config.recency_days);
        let req = GenerateRequest::new(instruction).with_web_search();
        let parsed = match self.generator.generate(&req).await {
            Ok(reply) => parse_enrichment_response(&reply).map_err(|e| e.to_string()),
            Err(e) => Err(format!("{e:#}")),
        };

        let (raw_count, mut articles, mode) = match parsed {
            Ok((records, mode)) => (
                records.len(),
                enricher::build_all(&records, &[], &entities, &self.tiers, max),
                mode,
            ),
            Err(reason) => {
                warn!(error = %reason, "ad-hoc search failed; returning empty result");
                (0, Vec::new(), EnrichmentMode::Fallback)
            }
        };
        enricher::rank(&mut articles);
        let note = format!("No coverage found in the last {} days", self.config.recency_days);
        let coverage_gaps = enricher::coverage_gaps(&entities, &articles, &note);

        // No feeds and no dedup stages: every parsed record goes straight to enrichment.
        let stats = FetchStats {
            entities: entities.len(),
            layer1_raw: 0,
            layer2_raw: raw_count,
            raw_total: raw_count,
            after_heuristic: raw_count,
            after_semantic: raw_count,
            enrichment_input: raw_count,
            enriched: articles.len(),
            coverage_gaps: coverage_gaps.len(),
            semantic_applied: false,
            enrichment_mode: mode,
            duration_ms: t0.elapsed().as_millis() as u64,
        };

        notify(
            progress,
            100,
            &format!("Done: {} articles", stats.enriched),
            StepUpdate::new(
                0,
                if mode == EnrichmentMode::Fallback {
                    StepStatus::Error
                } else {
                    StepStatus::Completed
                },
                format!("{} results", stats.enriched),
            ),
        )
        .await;

        histogram!("pipeline_run_ms").record(stats.duration_ms as f64);
        info!(results = stats.enriched, ms = stats.duration_ms, "ad-hoc search complete");

        FetchResult {
            articles,
            coverage_gaps,
            stats,
        }
    }
}
