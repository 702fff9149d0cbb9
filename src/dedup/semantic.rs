// src/dedup/semantic.rs
//! Semantic dedup: ask the content-generation service which candidates tell the
//! same story and keep one representative per group.
//!
//! Best-effort refinement only. Small inputs skip the call; any service error or
//! unparseable reply returns the input unchanged.

use metrics::counter;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::analyze::ai_adapter::{ContentGenerator, GenerateRequest};
use crate::analyze::json_extract::{index_list, int_field, parse_array_field, str_field, ParseFailure};
use crate::analyze::prompts;
use crate::config::PipelineConfig;
use crate::ingest::types::RawArticle;
use crate::source_tiers::SourceTiers;

/// One group of same-story candidates. Transient; lives only inside this stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupGroup {
    pub keep_index: usize,
    pub member_indices: BTreeSet<usize>,
    pub rationale: String,
}

/// Validated grouping: every index in `0..n` is in exactly one group or in `standalone`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupPlan {
    pub groups: Vec<DedupGroup>,
    pub standalone: BTreeSet<usize>,
}

impl DedupPlan {
    /// Group representatives plus standalone indices.
    pub fn kept_indices(&self) -> BTreeSet<usize> {
        let mut out = self.standalone.clone();
        out.extend(self.groups.iter().map(|g| g.keep_index));
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct SemanticOutcome {
    pub kept: Vec<RawArticle>,
    /// `false` when skipped or degraded to pass-through.
    pub applied: bool,
    pub groups: Vec<DedupGroup>,
    pub error: Option<String>,
}

fn best_by_tier(members: &BTreeSet<usize>, articles: &[RawArticle], tiers: &SourceTiers) -> Option<usize> {
    members
        .iter()
        .copied()
        .min_by_key(|&i| (tiers.tier_for_article(&articles[i].source_name, &articles[i].source_url), i))
}

/// Parse and validate a grouping reply against `articles`.
///
/// Out-of-range indices are ignored. An index already claimed by an earlier group
/// is not claimed again. A `keep` outside its group's members is replaced by the
/// best-tier member. Indices the reply never mentions are treated as standalone.
pub fn parse_semantic_response(
    text: &str,
    articles: &[RawArticle],
    tiers: &SourceTiers,
) -> Result<DedupPlan, ParseFailure> {
    let n = articles.len();
    let raw_groups = parse_array_field(text, "groups")?;
    let mut claimed: BTreeSet<usize> = BTreeSet::new();
    let mut plan = DedupPlan::default();

    for g in &raw_groups {
        let keep = int_field(g, &["keep", "keepIndex", "keep_index"])
            .and_then(|i| usize::try_from(i).ok());
        let mut members: BTreeSet<usize> = index_list(g, &["members", "memberIndices", "indices"])
            .into_iter()
            .filter(|&i| i < n && !claimed.contains(&i))
            .collect();
        if let Some(k) = keep.filter(|&k| k < n && !claimed.contains(&k)) {
            members.insert(k);
        }
        if members.is_empty() {
            continue;
        }
        let keep_index = match keep {
            Some(k) if members.contains(&k) => k,
            _ => match best_by_tier(&members, articles, tiers) {
                Some(k) => k,
                None => continue,
            },
        };
        claimed.extend(members.iter().copied());
        plan.groups.push(DedupGroup {
            keep_index,
            member_indices: members,
            rationale: str_field(g, &["reason", "rationale"]).unwrap_or_default(),
        });
    }

    plan.standalone = (0..n).filter(|i| !claimed.contains(i)).collect();
    Ok(plan)
}

pub async fn dedup_semantic(
    generator: &dyn ContentGenerator,
    articles: Vec<RawArticle>,
    config: &PipelineConfig,
    tiers: &SourceTiers,
) -> SemanticOutcome {
    if articles.len() <= config.semantic_min_articles {
        debug!(count = articles.len(), "semantic dedup skipped: below threshold");
        return SemanticOutcome {
            kept: articles,
            ..Default::default()
        };
    }

    let instruction = prompts::semantic_dedup(&articles, config.semantic_description_chars);
    let request = GenerateRequest::new(instruction).max_tokens(4000);

    let plan = match generator.generate(&request).await {
        Ok(reply) => parse_semantic_response(&reply, &articles, tiers).map_err(|e| e.to_string()),
        Err(e) => Err(format!("{e:#}")),
    };

    match plan {
        Ok(plan) => {
            let keep = plan.kept_indices();
            let before = articles.len();
            let kept: Vec<RawArticle> = articles
                .into_iter()
                .enumerate()
                .filter_map(|(i, a)| keep.contains(&i).then_some(a))
                .collect();
            counter!("pipeline_dedup_dropped_total", "stage" => "semantic")
                .increment((before - kept.len()) as u64);
            info!(
                before,
                after = kept.len(),
                groups = plan.groups.len(),
                "semantic dedup complete"
            );
            SemanticOutcome {
                kept,
                applied: true,
                groups: plan.groups,
                error: None,
            }
        }
        Err(reason) => {
            warn!(error = %reason, "semantic dedup degraded to pass-through");
            counter!("semantic_dedup_failures_total").increment(1);
            SemanticOutcome {
                kept: articles,
                applied: false,
                groups: Vec::new(),
                error: Some(reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::FetchLayer;

    fn art(i: usize, source: &str) -> RawArticle {
        RawArticle {
            headline: format!("Headline {i}"),
            description: String::new(),
            source_url: format!("https://example.com/{i}"),
            source_name: source.to_string(),
            published_at: None,
            fetch_layer: FetchLayer::Layer1Rss,
            query_entity: None,
        }
    }

    fn arts(n: usize) -> Vec<RawArticle> {
        (0..n).map(|i| art(i, "Blog")).collect()
    }

    #[test]
    fn every_index_ends_up_in_exactly_one_place() {
        let articles = arts(6);
        let text = r#"{"groups": [
            {"keep": 0, "members": [0, 2], "reason": "same raise"},
            {"keep": 2, "members": [2, 3, 99], "reason": "overlaps"}
        ], "standalone": [1]}"#;
        let plan = parse_semantic_response(text, &articles, &SourceTiers::default_seed()).unwrap();
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.groups[0].member_indices, BTreeSet::from([0, 2]));
        // 2 was already claimed; the second group keeps only 3.
        assert_eq!(plan.groups[1].member_indices, BTreeSet::from([3]));
        assert_eq!(plan.groups[1].keep_index, 3);
        // 4 and 5 were never mentioned.
        assert_eq!(plan.standalone, BTreeSet::from([1, 4, 5]));

        let mut seen = BTreeSet::new();
        for g in &plan.groups {
            for i in &g.member_indices {
                assert!(seen.insert(*i));
            }
        }
        for i in &plan.standalone {
            assert!(seen.insert(*i));
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn invalid_keep_falls_back_to_best_tier_member() {
        let mut articles = arts(3);
        articles[1].source_name = "Reuters".into();
        let text = r#"{"groups": [{"keep": 7, "members": [0, 1]}], "standalone": [2]}"#;
        let plan = parse_semantic_response(text, &articles, &SourceTiers::default_seed()).unwrap();
        assert_eq!(plan.groups[0].keep_index, 1);
        assert_eq!(plan.kept_indices(), BTreeSet::from([1, 2]));
    }

    #[test]
    fn unparseable_reply_is_an_error() {
        assert!(parse_semantic_response("no idea", &arts(6), &SourceTiers::default_seed()).is_err());
    }
}
