// src/config/pipeline.rs
//! Pipeline tunables loaded from `config/pipeline.toml`.
//!
//! Every field has a default, so an empty or missing file is a valid config.
//! `PIPELINE_CONFIG_PATH` overrides the default location.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedFeed {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Trailing recency window, in days.
    pub recency_days: u32,
    /// Normalized Levenshtein similarity above which two headlines cluster.
    pub title_similarity_threshold: f64,
    /// Semantic dedup is skipped when the input has at most this many articles.
    pub semantic_min_articles: usize,
    pub semantic_description_chars: usize,
    pub enrich_max_articles: usize,
    pub enrich_description_chars: usize,
    pub fallback_max_articles: usize,
    pub layer2_max_people: usize,
    pub layer2_max_results: usize,
    pub ad_hoc_max_results: usize,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub curated_feeds: Vec<CuratedFeed>,
}

fn default_curated_feeds() -> Vec<CuratedFeed> {
    [
        ("TechCrunch", "https://techcrunch.com/feed/"),
        ("PR Newswire", "https://www.prnewswire.com/rss/news-releases-list.rss"),
        ("Crunchbase News", "https://news.crunchbase.com/feed/"),
        ("Fierce Biotech", "https://www.fiercebiotech.com/rss/xml"),
    ]
    .into_iter()
    .map(|(name, url)| CuratedFeed {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recency_days: 3,
            title_similarity_threshold: 0.85,
            semantic_min_articles: 5,
            semantic_description_chars: 200,
            enrich_max_articles: 50,
            enrich_description_chars: 300,
            fallback_max_articles: 30,
            layer2_max_people: 20,
            layer2_max_results: 40,
            ad_hoc_max_results: 10,
            fetch_timeout_secs: 20,
            user_agent: "hybrid-news-aggregator/0.1 (news monitoring; contact@example.com)".to_string(),
            curated_feeds: default_curated_feeds(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let cfg: PipelineConfig = toml::from_str(&data)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// $PIPELINE_CONFIG_PATH, then `config/pipeline.toml`, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        Ok(Self::default())
    }

    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.recency_days))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn sanitized(mut self) -> Self {
        let d = Self::default();
        if self.recency_days == 0 {
            self.recency_days = d.recency_days;
        }
        if !(0.0..=1.0).contains(&self.title_similarity_threshold) {
            self.title_similarity_threshold = d.title_similarity_threshold;
        }
        if self.enrich_max_articles == 0 {
            self.enrich_max_articles = d.enrich_max_articles;
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = d.fetch_timeout_secs;
        }
        self
    }
}
