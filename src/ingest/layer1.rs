// src/ingest/layer1.rs
//! Layer 1: deterministic feed retrieval, one request per (entity, feed) pair plus
//! each curated feed once, all issued concurrently.
//!
//! A failing or slow request contributes nothing; the rest still count.

use futures::future::join_all;
use metrics::counter;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CuratedFeed;
use crate::entities::TrackedEntities;
use crate::ingest::types::{FeedQuery, RawArticle, SourceFetcher};

/// Expand tracked entities into feed queries.
///
/// Companies are searched by name, people by quoted name (exact phrase), companies
/// with a filing identifier also get a filings query, and every curated feed is
/// fetched once regardless of entity count.
pub fn plan_queries(entities: &TrackedEntities, curated: &[CuratedFeed]) -> Vec<FeedQuery> {
    let mut out = Vec::new();
    for c in &entities.companies {
        out.push(FeedQuery::NewsSearch {
            query: c.name.clone(),
            entity: c.name.clone(),
        });
        if let Some(id) = c.filing_id.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push(FeedQuery::Filings {
                identifier: id.trim().to_string(),
                entity: c.name.clone(),
            });
        }
    }
    for p in &entities.people {
        out.push(FeedQuery::NewsSearch {
            query: format!("\"{}\"", p.name),
            entity: p.name.clone(),
        });
    }
    if !entities.is_empty() {
        out.extend(curated.iter().map(|f| FeedQuery::Curated {
            name: f.name.clone(),
            url: f.url.clone(),
        }));
    }
    out
}

/// Curated feeds are not entity-specific: keep only items that mention a tracked
/// entity, tagged with the first one found.
fn filter_curated(items: Vec<RawArticle>, entities: &TrackedEntities) -> Vec<RawArticle> {
    items
        .into_iter()
        .filter_map(|mut a| {
            let text = format!("{} {}", a.headline, a.description);
            let hit = entities.iter().find(|e| entities.mentions(e.kind, &e.name, &text))?;
            a.query_entity = Some(hit.name.clone());
            Some(a)
        })
        .collect()
}

async fn fetch_one(
    fetcher: &dyn SourceFetcher,
    query: &FeedQuery,
    timeout: Duration,
) -> Vec<RawArticle> {
    match tokio::time::timeout(timeout, fetcher.fetch(query)).await {
        Ok(Ok(items)) => {
            debug!(kind = query.kind(), query = query.label(), items = items.len(), "layer1 fetch ok");
            items
        }
        Ok(Err(e)) => {
            warn!(kind = query.kind(), query = query.label(), fetcher = fetcher.name(), error = %e, "layer1 fetch failed");
            counter!("source_fetch_errors_total", "kind" => query.kind()).increment(1);
            Vec::new()
        }
        Err(_) => {
            warn!(kind = query.kind(), query = query.label(), timeout_ms = timeout.as_millis() as u64, "layer1 fetch timed out");
            counter!("source_fetch_errors_total", "kind" => query.kind()).increment(1);
            Vec::new()
        }
    }
}

/// Run every planned query concurrently and concatenate the results in plan order.
pub async fn fetch_layer1(
    fetcher: &dyn SourceFetcher,
    entities: &TrackedEntities,
    curated: &[CuratedFeed],
    timeout: Duration,
) -> Vec<RawArticle> {
    let queries = plan_queries(entities, curated);
    if queries.is_empty() {
        return Vec::new();
    }

    let results = join_all(queries.iter().map(|q| fetch_one(fetcher, q, timeout))).await;

    let mut out = Vec::new();
    for (q, items) in queries.iter().zip(results) {
        match q {
            FeedQuery::Curated { .. } => out.extend(filter_curated(items, entities)),
            _ => out.extend(items),
        }
    }
    info!(queries = queries.len(), articles = out.len(), "layer1 complete");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{collect_entities, CompanyRef, PersonRef, TrackingRequest};
    use crate::ingest::types::FetchLayer;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    fn entities() -> TrackedEntities {
        collect_entities(&[TrackingRequest {
            owner: "alice".into(),
            companies: vec![CompanyRef {
                name: "Acme Corp".into(),
                ticker: Some("ACME".into()),
                filing_id: Some("320193".into()),
            }],
            people: vec![PersonRef {
                name: "Jane Roe".into(),
                title: None,
            }],
        }])
    }

    fn curated() -> Vec<CuratedFeed> {
        vec![CuratedFeed {
            name: "Trade Wire".into(),
            url: "https://trade.example/feed".into(),
        }]
    }

    fn item(headline: &str, url: &str) -> RawArticle {
        RawArticle {
            headline: headline.into(),
            description: String::new(),
            source_url: url.into(),
            source_name: "Feed".into(),
            published_at: None,
            fetch_layer: FetchLayer::Layer1Rss,
            query_entity: None,
        }
    }

    struct Fixture;

    #[async_trait]
    impl SourceFetcher for Fixture {
        async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawArticle>> {
            match query {
                FeedQuery::NewsSearch { entity, .. } if entity == "Acme Corp" => {
                    Ok(vec![item("Acme Corp ships", "https://a.com/1")])
                }
                FeedQuery::NewsSearch { .. } => Err(anyhow!("503")),
                FeedQuery::Filings { .. } => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(vec![item("late", "https://sec.gov/x")])
                }
                FeedQuery::Curated { .. } => Ok(vec![
                    item("Jane Roe joins board", "https://t.com/1"),
                    item("Unrelated startup news", "https://t.com/2"),
                ]),
            }
        }

        fn name(&self) -> &'static str {
            "fixture"
        }
    }

    #[test]
    fn plan_covers_every_entity_and_curated_once() {
        let plan = plan_queries(&entities(), &curated());
        let kinds: Vec<&str> = plan.iter().map(|q| q.kind()).collect();
        assert_eq!(kinds, vec!["news_search", "filings", "news_search", "curated"]);
        assert_eq!(plan[2].label(), "\"Jane Roe\"");
        assert!(plan_queries(&TrackedEntities::default(), &curated()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_and_timeouts_contribute_nothing() {
        let out = fetch_layer1(&Fixture, &entities(), &curated(), Duration::from_secs(5)).await;
        let headlines: Vec<&str> = out.iter().map(|a| a.headline.as_str()).collect();
        assert_eq!(headlines, vec!["Acme Corp ships", "Jane Roe joins board"]);
        assert_eq!(out[1].query_entity.as_deref(), Some("Jane Roe"));
    }
}
