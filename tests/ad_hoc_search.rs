// tests/ad_hoc_search.rs
//
// Single-entity search: one web-search call, no feeds, no dedup stages.

mod common;

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;

use common::{test_config, ScriptedFetcher, ScriptedGenerator, Stage};
use hybrid_news_aggregator::model::{Category, EnrichmentMode, MatchType};
use hybrid_news_aggregator::ingest::types::FetchLayer;
use hybrid_news_aggregator::pipeline::{AdHocQuery, HybridPipeline, NoopProgress};

fn results(n: usize) -> String {
    let items: Vec<_> = (0..n)
        .map(|i| {
            json!({
                "headline": format!("Acme Corp story {i}"),
                "url": format!("https://www.reuters.com/acme/{i}"),
                "sourceName": "Reuters",
                "publishedAt": "2026-10-16",
                "shortSummary": format!("Acme Corp did thing {i}."),
                "category": if i == 0 { "Funding" } else { "News" },
                "priorityScore": 10 - (i as i64 % 10),
                "matchedCompany": "Acme Corp",
                "matchType": "exact"
            })
        })
        .collect();
    json!({ "articles": items }).to_string()
}

#[tokio::test]
async fn returns_at_most_ten_results_from_one_call() {
    let generator = ScriptedGenerator::new(|stage, req| {
        assert!(req.web_search, "ad-hoc search must use web search");
        match stage {
            Stage::AdHoc => Ok(results(14)),
            _ => Err(anyhow!("unexpected stage {stage:?}")),
        }
    });
    let fetcher = Arc::new(ScriptedFetcher::default());
    let pipeline = HybridPipeline::new(fetcher.clone(), generator.clone(), test_config());

    let query = AdHocQuery {
        company: Some("Acme Corp".into()),
        person: None,
    };
    let out = pipeline.run_ad_hoc_search(&query, &NoopProgress).await;

    assert_eq!(generator.stages(), vec![Stage::AdHoc]);
    assert!(fetcher.calls.lock().is_empty());
    assert_eq!(out.articles.len(), 10);
    assert_eq!(out.articles[0].category, Category::Funding);
    assert_eq!(out.articles[0].priority_score, 10);
    assert!(out.articles.iter().all(|a| a.fetch_layer == FetchLayer::Layer2Llm
        && a.matched_company.as_deref() == Some("Acme Corp")
        && a.match_type == MatchType::Exact
        && a.tracking_owners.is_empty()));
    assert!(out.coverage_gaps.is_empty());
    assert_eq!(out.stats.enrichment_mode, EnrichmentMode::Parsed);
    // Counts before the cap are the parsed records; only `enriched` reflects the cap.
    assert_eq!(out.stats.layer1_raw, 0);
    assert_eq!(out.stats.layer2_raw, 14);
    assert_eq!(out.stats.raw_total, 14);
    assert_eq!(out.stats.enrichment_input, 14);
    assert_eq!(out.stats.enriched, 10);
    assert_eq!(out.stats.coverage_gaps, 0);
}

#[tokio::test]
async fn service_failure_yields_empty_result_with_gap() {
    let generator = ScriptedGenerator::failing();
    let pipeline = HybridPipeline::new(Arc::new(ScriptedFetcher::default()), generator, test_config());

    let query = AdHocQuery {
        company: None,
        person: Some("Jane Roe".into()),
    };
    let out = pipeline.run_ad_hoc_search(&query, &NoopProgress).await;

    assert!(out.articles.is_empty());
    assert_eq!(out.coverage_gaps.len(), 1);
    assert_eq!(out.coverage_gaps[0].entity, "Jane Roe");
    assert_eq!(out.coverage_gaps[0].tracking_owner, None);
    assert_eq!(out.stats.raw_total, 0);
    assert_eq!(out.stats.enrichment_mode, EnrichmentMode::Fallback);
}

#[tokio::test]
async fn empty_query_makes_no_calls() {
    let generator = ScriptedGenerator::failing();
    let pipeline = HybridPipeline::new(Arc::new(ScriptedFetcher::default()), generator.clone(), test_config());

    let out = pipeline
        .run_ad_hoc_search(&AdHocQuery::default(), &NoopProgress)
        .await;

    assert!(out.articles.is_empty());
    assert!(generator.stages().is_empty());
}
