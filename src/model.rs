// src/model.rs
//! Output types of a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntityKind;
use crate::ingest::types::FetchLayer;

/// Fixed classification taxonomy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "Funding")]
    Funding,
    #[serde(rename = "M&A")]
    MergersAcquisitions,
    #[serde(rename = "Partnership")]
    Partnership,
    #[serde(rename = "Product Launch")]
    ProductLaunch,
    #[serde(rename = "Leadership Change")]
    Leadership,
    #[serde(rename = "Earnings")]
    Earnings,
    #[serde(rename = "Regulatory")]
    Regulatory,
    #[serde(rename = "Legal")]
    Legal,
    #[serde(rename = "Layoffs")]
    Layoffs,
    #[serde(rename = "Expansion")]
    Expansion,
    #[serde(rename = "SEC Filing")]
    Filing,
    #[serde(rename = "Recognition")]
    Recognition,
    #[serde(rename = "News")]
    News,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Funding,
        Category::MergersAcquisitions,
        Category::Partnership,
        Category::ProductLaunch,
        Category::Leadership,
        Category::Earnings,
        Category::Regulatory,
        Category::Legal,
        Category::Layoffs,
        Category::Expansion,
        Category::Filing,
        Category::Recognition,
        Category::News,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Funding => "Funding",
            Category::MergersAcquisitions => "M&A",
            Category::Partnership => "Partnership",
            Category::ProductLaunch => "Product Launch",
            Category::Leadership => "Leadership Change",
            Category::Earnings => "Earnings",
            Category::Regulatory => "Regulatory",
            Category::Legal => "Legal",
            Category::Layoffs => "Layoffs",
            Category::Expansion => "Expansion",
            Category::Filing => "SEC Filing",
            Category::Recognition => "Recognition",
            Category::News => "News",
        }
    }

    /// Lenient parse of a service-supplied label. Unknown labels map to `News`.
    pub fn from_label(s: &str) -> Category {
        let k = s.trim().to_lowercase();
        if let Some(c) = Category::ALL.iter().find(|c| c.label().to_lowercase() == k) {
            return *c;
        }
        match k.as_str() {
            "fundraising" | "investment" | "financing" => Category::Funding,
            "acquisition" | "merger" | "mergers & acquisitions" | "m&a activity" => {
                Category::MergersAcquisitions
            }
            "product" | "launch" | "product announcement" => Category::ProductLaunch,
            "leadership" | "executive change" | "hiring" | "people" => Category::Leadership,
            "financial results" | "financials" => Category::Earnings,
            "regulation" | "policy" => Category::Regulatory,
            "lawsuit" | "litigation" => Category::Legal,
            "layoff" | "restructuring" => Category::Layoffs,
            "filing" | "filings" => Category::Filing,
            "award" | "awards" => Category::Recognition,
            _ => Category::News,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
}

impl PriorityLevel {
    pub fn from_label(s: &str) -> Option<PriorityLevel> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(PriorityLevel::High),
            "medium" | "med" => Some(PriorityLevel::Medium),
            "low" => Some(PriorityLevel::Low),
            _ => None,
        }
    }

    /// 8-10 high, 5-7 medium, 1-4 low.
    pub fn from_score(score: u8) -> PriorityLevel {
        match score {
            8..=u8::MAX => PriorityLevel::High,
            5..=7 => PriorityLevel::Medium,
            _ => PriorityLevel::Low,
        }
    }
}

pub const MIN_PRIORITY_SCORE: u8 = 1;
pub const MAX_PRIORITY_SCORE: u8 = 10;
pub const DEFAULT_PRIORITY_SCORE: u8 = 5;

pub fn clamp_score(score: i64) -> u8 {
    score.clamp(i64::from(MIN_PRIORITY_SCORE), i64::from(MAX_PRIORITY_SCORE)) as u8
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Contextual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSourceInfo {
    pub source_url: String,
    pub source_name: String,
    pub fetch_layer: FetchLayer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedArticle {
    pub headline: String,
    pub short_summary: String,
    pub long_summary: String,
    pub why_it_matters: String,
    pub primary_source_url: String,
    pub primary_source_name: String,
    /// Never empty.
    pub sources: Vec<ArticleSourceInfo>,
    pub published_at: Option<DateTime<Utc>>,
    pub matched_company: Option<String>,
    pub matched_person: Option<String>,
    pub category: Category,
    pub priority_level: PriorityLevel,
    /// Always within 1..=10.
    pub priority_score: u8,
    pub match_type: MatchType,
    pub fetch_layer: FetchLayer,
    pub tracking_owners: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoverageGap {
    pub entity: String,
    pub kind: EntityKind,
    /// Owners tracking the entity, comma-joined; `None` for ad-hoc searches.
    pub tracking_owner: Option<String>,
    pub note: String,
}

/// How the enrichment stage produced its output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    /// Service output parsed directly.
    Parsed,
    /// Service output was truncated and structurally repaired.
    Repaired,
    /// Service failed or output was unrecoverable; raw pass-through.
    Fallback,
    /// Nothing to enrich.
    #[default]
    Skipped,
}

/// Counts after each stage, for observability of degraded runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchStats {
    pub entities: usize,
    pub layer1_raw: usize,
    pub layer2_raw: usize,
    pub raw_total: usize,
    pub after_heuristic: usize,
    pub after_semantic: usize,
    pub enrichment_input: usize,
    pub enriched: usize,
    pub coverage_gaps: usize,
    pub semantic_applied: bool,
    pub enrichment_mode: EnrichmentMode,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub articles: Vec<ProcessedArticle>,
    pub coverage_gaps: Vec<CoverageGap>,
    pub stats: FetchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip_leniently() {
        assert_eq!(Category::from_label("m&a"), Category::MergersAcquisitions);
        assert_eq!(Category::from_label(" Product Launch "), Category::ProductLaunch);
        assert_eq!(Category::from_label("acquisition"), Category::MergersAcquisitions);
        assert_eq!(Category::from_label("weather"), Category::News);
    }

    #[test]
    fn score_bands_map_to_levels() {
        assert_eq!(PriorityLevel::from_score(10), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(8), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(5), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_score(4), PriorityLevel::Low);
        assert_eq!(clamp_score(42), 10);
        assert_eq!(clamp_score(-3), 1);
    }

    #[test]
    fn serialized_names_are_stable() {
        let v = serde_json::to_value(Category::MergersAcquisitions).unwrap();
        assert_eq!(v, "M&A");
        let v = serde_json::to_value(FetchLayer::Layer2Llm).unwrap();
        assert_eq!(v, "layer2_llm");
        let v = serde_json::to_value(EnrichmentMode::Repaired).unwrap();
        assert_eq!(v, "repaired");
    }
}
