// src/analyze/contextual.rs
//! Layer 2: one batched natural-language search across every tracked entity.
//!
//! This layer never fails: a service error or unparseable reply yields an
//! empty list and a warning.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analyze::ai_adapter::{ContentGenerator, GenerateRequest};
use crate::analyze::json_extract::{parse_array_field, str_field, ParseFailure};
use crate::analyze::prompts;
use crate::config::PipelineConfig;
use crate::entities::TrackedEntities;
use crate::ingest::types::{FetchLayer, RawArticle};
use crate::ingest::{normalize_text, parse_published_at};
use crate::source_tiers::host_of;

/// Build one raw record from a `results` element. Requires a headline and an http(s) URL.
fn result_to_raw(v: &Value) -> Option<RawArticle> {
    let headline = str_field(v, &["headline", "title"]).map(|s| normalize_text(&s))?;
    let url = str_field(v, &["url", "link", "sourceUrl"])?;
    if headline.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
        return None;
    }
    let source_name = str_field(v, &["source", "sourceName", "outlet"]).unwrap_or_else(|| {
        let host = host_of(&url);
        if host.is_empty() {
            "Web".to_string()
        } else {
            host
        }
    });
    Some(RawArticle {
        headline,
        description: str_field(v, &["description", "summary", "snippet"])
            .map(|s| normalize_text(&s))
            .unwrap_or_default(),
        source_url: url,
        source_name,
        published_at: str_field(v, &["publishedAt", "published_at", "date"])
            .and_then(|s| parse_published_at(&s)),
        fetch_layer: FetchLayer::Layer2Llm,
        query_entity: str_field(v, &["entity", "matchedEntity"]),
    })
}

/// Parse a Layer 2 reply. Malformed elements are skipped, not fatal.
pub fn parse_contextual_response(text: &str) -> Result<Vec<RawArticle>, ParseFailure> {
    let items = parse_array_field(text, "results")?;
    Ok(items.iter().filter_map(result_to_raw).collect())
}

pub async fn contextual_search(
    generator: &dyn ContentGenerator,
    entities: &TrackedEntities,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Vec<RawArticle> {
    if entities.is_empty() {
        return Vec::new();
    }
    let instruction = prompts::contextual_search(
        entities,
        config.layer2_max_people,
        config.layer2_max_results,
        config.recency_days,
        now,
    );
    debug!(chars = instruction.len(), "layer2 prompt built");

    let request = GenerateRequest::new(instruction).with_web_search();
    let reply = match generator.generate(&request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, provider = generator.provider_name(), "layer2 search failed; continuing without it");
            counter!("layer2_failures_total").increment(1);
            return Vec::new();
        }
    };

    match parse_contextual_response(&reply) {
        Ok(mut out) => {
            out.truncate(config.layer2_max_results);
            info!(results = out.len(), "layer2 search complete");
            out
        }
        Err(e) => {
            warn!(error = %e, "layer2 reply unparseable; continuing without it");
            counter!("layer2_failures_total").increment(1);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_and_skips_bad_elements() {
        let text = r#"Sure! Here is what I found:
```json
{"results": [
  {"headline": "Acme raises $50M", "description": "Series C.", "url": "https://techcrunch.com/acme", "source": "TechCrunch", "publishedAt": "2026-10-16", "entity": "Acme Corp"},
  {"headline": "No link here"},
  {"title": "Beta &amp; Co hires CFO", "link": "https://www.reuters.com/beta"},
  {"headline": "Bad scheme", "url": "ftp://example.com"}
]}
```"#;
        let out = parse_contextual_response(text).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].query_entity.as_deref(), Some("Acme Corp"));
        assert!(out[0].published_at.is_some());
        assert_eq!(out[1].headline, "Beta & Co hires CFO");
        assert_eq!(out[1].source_name, "reuters.com");
        assert!(out.iter().all(|a| a.fetch_layer == FetchLayer::Layer2Llm));
    }

    #[test]
    fn prose_reply_is_a_parse_failure() {
        assert!(parse_contextual_response("I could not find anything.").is_err());
    }
}
