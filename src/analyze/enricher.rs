// src/analyze/enricher.rs
//! Enrichment: classify, score, summarize and merge deduplicated articles in one
//! service call, then compute coverage gaps.
//!
//! Degradation chain:
//! 1) direct parse of the `articles` object,
//! 2) structural repair of truncated output (see `repair`),
//! 3) raw pass-through of up to `fallback_max_articles` inputs with default
//!    classification.
//!
//! Every emitted `ProcessedArticle` has a non-empty `sources` list and a score in 1..=10,
//! whatever the service returned.

use metrics::counter;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::analyze::ai_adapter::{ContentGenerator, GenerateRequest};
use crate::analyze::json_extract::{
    array_field, index_list, int_field, locate_object, str_field, strip_code_fences, ParseFailure,
};
use crate::analyze::prompts;
use crate::analyze::repair::recover_array;
use crate::config::PipelineConfig;
use crate::dedup::heuristic::canonical_url;
use crate::entities::{EntityKind, TrackedEntities};
use crate::ingest::types::{FetchLayer, RawArticle};
use crate::ingest::{normalize_text, parse_published_at, truncate_chars};
use crate::model::{
    clamp_score, ArticleSourceInfo, Category, CoverageGap, EnrichmentMode, MatchType,
    PriorityLevel, ProcessedArticle, DEFAULT_PRIORITY_SCORE,
};
use crate::source_tiers::{host_of, SourceTiers};

const SHORT_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub articles: Vec<ProcessedArticle>,
    pub coverage_gaps: Vec<CoverageGap>,
    pub mode: EnrichmentMode,
    /// Articles actually sent to the service (after the size cap).
    pub input_count: usize,
}

/// Parse an enrichment reply: direct parse first, structural repair second.
pub fn parse_enrichment_response(text: &str) -> Result<(Vec<Value>, EnrichmentMode), ParseFailure> {
    let cleaned = strip_code_fences(text);
    let obj = locate_object(&cleaned, "articles")
        .ok_or_else(|| ParseFailure::NoObject("articles".into()))?;
    match serde_json::from_str::<Value>(obj) {
        Ok(v) => array_field(&v, "articles").map(|a| (a, EnrichmentMode::Parsed)),
        Err(e) => {
            debug!(error = %e, "enrichment reply malformed; attempting structural repair");
            let items = recover_array(obj, "articles")?;
            counter!("enrichment_repaired_total").increment(1);
            Ok((items, EnrichmentMode::Repaired))
        }
    }
}

/// Evidence available locally for entity matching.
struct Evidence<'a> {
    texts: Vec<String>,
    hints: Vec<&'a str>,
}

impl Evidence<'_> {
    fn mentions(&self, entities: &TrackedEntities, kind: EntityKind, name: &str) -> bool {
        self.texts.iter().any(|t| entities.mentions(kind, name, t))
    }
}

/// Service claim if it names a tracked entity; else a query hint; else a verbatim mention.
fn resolve_entity(
    entities: &TrackedEntities,
    kind: EntityKind,
    claimed: Option<String>,
    evidence: &Evidence<'_>,
) -> Option<String> {
    if let Some(e) = claimed.as_deref().and_then(|c| entities.find(kind, c)) {
        return Some(e.name.clone());
    }
    if let Some(e) = evidence.hints.iter().find_map(|h| entities.find(kind, h)) {
        return Some(e.name.clone());
    }
    let list = match kind {
        EntityKind::Company => &entities.companies,
        EntityKind::Person => &entities.people,
    };
    list.iter()
        .find(|e| evidence.mentions(entities, kind, &e.name))
        .map(|e| e.name.clone())
}

fn owners_for(
    entities: &TrackedEntities,
    company: Option<&str>,
    person: Option<&str>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let matched = company
        .map(|c| entities.owners_of(EntityKind::Company, c))
        .into_iter()
        .chain(person.map(|p| entities.owners_of(EntityKind::Person, p)));
    for owners in matched {
        for o in owners {
            if !out.contains(o) {
                out.push(o.clone());
            }
        }
    }
    if out.is_empty() {
        out = entities.all_owners().to_vec();
    }
    out
}

fn source_info(raw: &RawArticle) -> ArticleSourceInfo {
    ArticleSourceInfo {
        source_url: raw.source_url.clone(),
        source_name: raw.source_name.clone(),
        fetch_layer: raw.fetch_layer,
    }
}

/// Build one `ProcessedArticle` from a service record, filling gaps from the raw
/// articles it references by index. Records with no usable source are dropped.
pub fn build_from_record(
    record: &Value,
    raws: &[RawArticle],
    entities: &TrackedEntities,
    tiers: &SourceTiers,
) -> Option<ProcessedArticle> {
    // Contributing raws, in the order the service listed them.
    let mut seen = HashSet::new();
    let contributing: Vec<&RawArticle> = index_list(
        record,
        &["sourceIndices", "indices", "sourceIndex", "index"],
    )
    .into_iter()
    .filter(|&i| i < raws.len() && seen.insert(i))
    .map(|i| &raws[i])
    .collect();

    // Sources: one per distinct canonical URL.
    let mut urls = HashSet::new();
    let mut sources: Vec<ArticleSourceInfo> = contributing
        .iter()
        .filter(|r| urls.insert(canonical_url(&r.source_url)))
        .map(|r| source_info(r))
        .collect();
    if sources.is_empty() {
        let url = str_field(record, &["url", "sourceUrl", "primarySourceUrl", "link"])
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))?;
        let name = str_field(record, &["sourceName", "source", "primarySourceName"])
            .unwrap_or_else(|| host_of(&url));
        sources.push(ArticleSourceInfo {
            source_url: url,
            source_name: name,
            fetch_layer: FetchLayer::Layer2Llm,
        });
    }

    // Primary: the service's named primary if it is a contributor, else best tier.
    let named_primary = str_field(record, &["primarySourceUrl"]).map(|u| canonical_url(&u));
    let primary_pos = named_primary
        .and_then(|p| sources.iter().position(|s| canonical_url(&s.source_url) == p))
        .unwrap_or_else(|| {
            sources
                .iter()
                .enumerate()
                .min_by_key(|(i, s)| (tiers.tier_for_article(&s.source_name, &s.source_url), *i))
                .map(|(i, _)| i)
                .unwrap_or(0)
        });
    let primary = sources.remove(primary_pos);
    sources.insert(0, primary.clone());
    let primary_raw = contributing
        .iter()
        .find(|r| r.source_url == primary.source_url)
        .copied();

    let headline = str_field(record, &["headline", "title"])
        .map(|h| normalize_text(&h))
        .filter(|h| !h.is_empty())
        .or_else(|| primary_raw.map(|r| r.headline.clone()))
        .filter(|h| !h.is_empty())?;
    let raw_description = primary_raw.map(|r| r.description.clone()).unwrap_or_default();
    let short_summary = str_field(record, &["shortSummary", "summary"]).unwrap_or_else(|| {
        if raw_description.is_empty() {
            headline.clone()
        } else {
            truncate_chars(&raw_description, SHORT_SUMMARY_CHARS)
        }
    });
    let long_summary = str_field(record, &["longSummary"]).unwrap_or_else(|| {
        if raw_description.is_empty() {
            short_summary.clone()
        } else {
            raw_description.clone()
        }
    });
    let why_it_matters = str_field(record, &["whyItMatters", "why_it_matters"]).unwrap_or_default();

    let published_at = primary_raw
        .and_then(|r| r.published_at)
        .or_else(|| contributing.iter().find_map(|r| r.published_at))
        .or_else(|| str_field(record, &["publishedAt", "date"]).and_then(|s| parse_published_at(&s)));

    let evidence = if contributing.is_empty() {
        Evidence {
            texts: vec![format!("{headline} {short_summary} {long_summary}")],
            hints: Vec::new(),
        }
    } else {
        Evidence {
            texts: contributing
                .iter()
                .map(|r| format!("{} {}", r.headline, r.description))
                .collect(),
            hints: contributing
                .iter()
                .filter_map(|r| r.query_entity.as_deref())
                .collect(),
        }
    };
    let matched_company = resolve_entity(
        entities,
        EntityKind::Company,
        str_field(record, &["matchedCompany", "company"]),
        &evidence,
    );
    let matched_person = resolve_entity(
        entities,
        EntityKind::Person,
        str_field(record, &["matchedPerson", "person"]),
        &evidence,
    );

    // `exact` only survives when a matched name really occurs in the source text.
    let claims_exact = str_field(record, &["matchType"])
        .map(|m| m.eq_ignore_ascii_case("exact"))
        .unwrap_or(false);
    let verified = [
        (EntityKind::Company, matched_company.as_deref()),
        (EntityKind::Person, matched_person.as_deref()),
    ]
    .into_iter()
    .any(|(kind, name)| name.is_some_and(|n| evidence.mentions(entities, kind, n)));
    let match_type = if claims_exact && verified {
        MatchType::Exact
    } else {
        MatchType::Contextual
    };

    let claimed_level = str_field(record, &["priorityLevel", "priority"])
        .and_then(|l| PriorityLevel::from_label(&l));
    let priority_score = int_field(record, &["priorityScore", "score"])
        .map(clamp_score)
        .unwrap_or(match claimed_level {
            Some(PriorityLevel::High) => 8,
            Some(PriorityLevel::Low) => 3,
            _ => DEFAULT_PRIORITY_SCORE,
        });
    let priority_level = claimed_level.unwrap_or_else(|| PriorityLevel::from_score(priority_score));

    let tracking_owners = owners_for(entities, matched_company.as_deref(), matched_person.as_deref());

    Some(ProcessedArticle {
        headline,
        short_summary,
        long_summary,
        why_it_matters,
        primary_source_url: primary.source_url.clone(),
        primary_source_name: primary.source_name.clone(),
        fetch_layer: primary.fetch_layer,
        sources,
        published_at,
        matched_company,
        matched_person,
        category: str_field(record, &["category"])
            .map(|c| Category::from_label(&c))
            .unwrap_or(Category::News),
        priority_level,
        priority_score,
        match_type,
        tracking_owners,
    })
}

/// Build every record, skipping unusable ones and records whose primary source
/// was already emitted. Never returns more than `limit` articles.
pub fn build_all(
    records: &[Value],
    raws: &[RawArticle],
    entities: &TrackedEntities,
    tiers: &SourceTiers,
    limit: usize,
) -> Vec<ProcessedArticle> {
    let mut primaries = HashSet::new();
    let mut out = Vec::new();
    for rec in records {
        let Some(article) = build_from_record(rec, raws, entities, tiers) else {
            continue;
        };
        if !primaries.insert(canonical_url(&article.primary_source_url)) {
            continue;
        }
        out.push(article);
        if out.len() >= limit {
            break;
        }
    }
    out
}

/// Raw pass-through with default classification, attributed to every owner.
pub fn fallback_articles(
    raws: &[RawArticle],
    entities: &TrackedEntities,
    max: usize,
) -> Vec<ProcessedArticle> {
    raws.iter()
        .take(max)
        .map(|r| {
            let evidence = Evidence {
                texts: vec![format!("{} {}", r.headline, r.description)],
                hints: r.query_entity.as_deref().into_iter().collect(),
            };
            let body = if r.description.is_empty() {
                r.headline.clone()
            } else {
                r.description.clone()
            };
            ProcessedArticle {
                headline: r.headline.clone(),
                short_summary: truncate_chars(&body, SHORT_SUMMARY_CHARS),
                long_summary: body,
                why_it_matters: String::new(),
                primary_source_url: r.source_url.clone(),
                primary_source_name: r.source_name.clone(),
                sources: vec![source_info(r)],
                published_at: r.published_at,
                matched_company: resolve_entity(entities, EntityKind::Company, None, &evidence),
                matched_person: resolve_entity(entities, EntityKind::Person, None, &evidence),
                category: Category::News,
                priority_level: PriorityLevel::Medium,
                priority_score: DEFAULT_PRIORITY_SCORE,
                match_type: MatchType::Contextual,
                fetch_layer: r.fetch_layer,
                tracking_owners: entities.all_owners().to_vec(),
            }
        })
        .collect()
}

/// Every tracked entity that no article is matched to.
pub fn coverage_gaps(
    entities: &TrackedEntities,
    articles: &[ProcessedArticle],
    note: &str,
) -> Vec<CoverageGap> {
    entities
        .iter()
        .filter(|e| {
            let key = e.key();
            !articles.iter().any(|a| {
                let matched = match e.kind {
                    EntityKind::Company => a.matched_company.as_deref(),
                    EntityKind::Person => a.matched_person.as_deref(),
                };
                matched.map(crate::entities::entity_key).as_deref() == Some(key.as_str())
            })
        })
        .map(|e| {
            let owners = entities.owners_of(e.kind, &e.name);
            CoverageGap {
                entity: e.name.clone(),
                kind: e.kind,
                tracking_owner: (!owners.is_empty()).then(|| owners.join(", ")),
                note: note.to_string(),
            }
        })
        .collect()
}

/// Highest score first, then newest.
pub fn rank(articles: &mut [ProcessedArticle]) {
    articles.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
}

pub async fn enrich(
    generator: &dyn ContentGenerator,
    articles: Vec<RawArticle>,
    entities: &TrackedEntities,
    config: &PipelineConfig,
    tiers: &SourceTiers,
) -> EnrichmentOutcome {
    let gap_note = format!("No coverage found in the last {} days", config.recency_days);
    if articles.is_empty() {
        return EnrichmentOutcome {
            coverage_gaps: coverage_gaps(entities, &[], &gap_note),
            ..Default::default()
        };
    }

    // Newest first, then cap; anything beyond the cap is left out of this run.
    let mut candidates = articles;
    candidates.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    if candidates.len() > config.enrich_max_articles {
        info!(
            dropped = candidates.len() - config.enrich_max_articles,
            cap = config.enrich_max_articles,
            "enrichment input capped"
        );
        candidates.truncate(config.enrich_max_articles);
    }

    let instruction = prompts::enrichment(&candidates, entities, config.enrich_description_chars);
    debug!(chars = instruction.len(), articles = candidates.len(), "enrichment prompt built");
    let request = GenerateRequest::new(instruction).max_tokens(16000);

    let parsed = match generator.generate(&request).await {
        Ok(reply) => parse_enrichment_response(&reply).map_err(|e| e.to_string()),
        Err(e) => Err(format!("{e:#}")),
    };

    let (mut out, mode) = match parsed {
        Ok((records, mode)) => {
            let built = build_all(&records, &candidates, entities, tiers, candidates.len());
            if built.is_empty() && !records.is_empty() {
                warn!(records = records.len(), "enrichment records unusable; falling back to raw articles");
                (fallback_articles(&candidates, entities, config.fallback_max_articles), EnrichmentMode::Fallback)
            } else {
                (built, mode)
            }
        }
        Err(reason) => {
            warn!(error = %reason, "enrichment failed; falling back to raw articles");
            (fallback_articles(&candidates, entities, config.fallback_max_articles), EnrichmentMode::Fallback)
        }
    };
    if mode == EnrichmentMode::Fallback {
        counter!("enrichment_fallback_total").increment(1);
    }

    rank(&mut out);
    let coverage_gaps = coverage_gaps(entities, &out, &gap_note);
    info!(
        input = candidates.len(),
        output = out.len(),
        gaps = coverage_gaps.len(),
        mode = ?mode,
        "enrichment complete"
    );

    EnrichmentOutcome {
        articles: out,
        coverage_gaps,
        mode,
        input_count: candidates.len(),
    }
}
