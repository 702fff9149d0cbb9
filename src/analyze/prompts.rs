//! Instruction builders for every content-generation call site.
//!
//! Each builder fixes the JSON shape it expects back; the matching parsers live
//! next to the stage that issues the call.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::entities::{TrackedEntities, TrackedEntity};
use crate::ingest::truncate_chars;
use crate::ingest::types::RawArticle;
use crate::model::Category;

pub const SOURCE_PREFERENCE: &str = "Reuters, AP, Bloomberg > WSJ, Financial Times, CNBC, TechCrunch > trade publications > aggregators and blogs";

pub const TIER_RANKING: &str = "\
Tier 1 (wires): Reuters, Associated Press, Bloomberg, AFP, Dow Jones Newswires
Tier 2 (industry/financial outlets): WSJ, Financial Times, CNBC, Forbes, Fortune, Business Insider, TechCrunch, Axios
Tier 3 (trade press): Fierce Biotech, Endpoints, VentureBeat, press-release wires
Tier 4 (aggregators/blogs): Yahoo Finance, MSN, Google News, Seeking Alpha, Medium, Substack";

pub const PRIORITY_RUBRIC: &str = "\
9-10 transformational (acquisition of/by the entity, IPO, CEO change, major lawsuit outcome)
7-8 major (large funding round, major product launch, significant partnership, earnings surprise)
5-6 notable (executive hire, expansion, regulatory filing with business impact)
3-4 routine (minor product update, conference appearance, routine filing)
1-2 marginal (passing mention, listicle inclusion)";

fn entity_line(e: &TrackedEntity) -> String {
    let mut line = e.name.clone();
    if let Some(t) = &e.ticker {
        let _ = write!(line, " (ticker {t})");
    }
    if let Some(t) = &e.title {
        let _ = write!(line, " ({t})");
    }
    line
}

fn category_list() -> String {
    Category::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn date_label(d: Option<DateTime<Utc>>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Layer 2: one broad search over all companies and the first `max_people` people.
pub fn contextual_search(
    entities: &TrackedEntities,
    max_people: usize,
    max_results: usize,
    recency_days: u32,
    now: DateTime<Utc>,
) -> String {
    let mut p = String::new();
    let hours = recency_days * 24;
    let _ = writeln!(
        p,
        "Search the web for news published in the last {hours} hours (since {}) about the following organizations and people.",
        (now - chrono::Duration::hours(i64::from(hours))).format("%Y-%m-%d %H:%M UTC")
    );
    if !entities.companies.is_empty() {
        p.push_str("\nCompanies:\n");
        for c in &entities.companies {
            let _ = writeln!(p, "- {}", entity_line(c));
        }
    }
    if !entities.people.is_empty() {
        p.push_str("\nPeople:\n");
        for person in entities.people.iter().take(max_people) {
            let _ = writeln!(p, "- {}", entity_line(person));
        }
    }
    let _ = writeln!(
        p,
        "\nReturn at most {max_results} results. Prefer sources in this order: {SOURCE_PREFERENCE}."
    );
    p.push_str("Only include articles that genuinely concern one of the listed names. Skip anything older than the window.\n");
    p.push_str(
        "Respond with JSON only, in exactly this shape:\n\
{\"results\": [{\"headline\": \"...\", \"description\": \"one or two sentences\", \"url\": \"https://...\", \"source\": \"outlet name\", \"publishedAt\": \"YYYY-MM-DD\", \"entity\": \"matching name from the lists\"}]}\n\
If nothing qualifies, respond with {\"results\": []}.",
    );
    p
}

/// Semantic dedup: group same-story candidates and pick one representative per group.
pub fn semantic_dedup(articles: &[RawArticle], description_chars: usize) -> String {
    let mut p = String::from(
        "The numbered news articles below were collected from several sources. Some describe the same real-world story.\n\
Group the articles that cover the same story. For each group choose the single best article to keep, using this source authority ranking (lower tier wins; break ties by the more informative description):\n",
    );
    p.push_str(TIER_RANKING);
    p.push_str("\n\nArticles:\n");
    for (i, a) in articles.iter().enumerate() {
        let _ = writeln!(
            p,
            "[{i}] {} | {} | {} | {}",
            a.headline,
            truncate_chars(&a.description, description_chars),
            a.source_name,
            date_label(a.published_at)
        );
    }
    p.push_str(
        "\nRespond with JSON only, in exactly this shape:\n\
{\"groups\": [{\"keep\": 0, \"members\": [0, 3], \"reason\": \"short rationale\"}], \"standalone\": [1, 2]}\n\
Every index must appear exactly once: either in one group's members or in standalone.",
    );
    p
}

/// Enrichment: classify, score, summarize, and merge multi-source coverage.
pub fn enrichment(articles: &[RawArticle], entities: &TrackedEntities, description_chars: usize) -> String {
    let mut p = String::from(
        "You are preparing a news briefing about tracked organizations and people.\n\nTracked companies:\n",
    );
    for c in &entities.companies {
        let _ = writeln!(p, "- {}", entity_line(c));
    }
    p.push_str("\nTracked people:\n");
    for person in &entities.people {
        let _ = writeln!(p, "- {}", entity_line(person));
    }
    p.push_str("\nCandidate articles:\n");
    for (i, a) in articles.iter().enumerate() {
        let _ = writeln!(
            p,
            "[{i}] {}\n    {}\n    source: {} | date: {} | url: {}",
            a.headline,
            truncate_chars(&a.description, description_chars),
            a.source_name,
            date_label(a.published_at),
            a.source_url
        );
    }
    let _ = write!(
        p,
        "\nFor every candidate that concerns a tracked company or person:\n\
- classify it into exactly one category: {}\n\
- score its importance from 1 to 10 using this rubric:\n{PRIORITY_RUBRIC}\n\
- set priorityLevel to high (8-10), medium (5-7) or low (1-4)\n\
- write shortSummary (one sentence), longSummary (2-4 sentences) and whyItMatters (one sentence)\n\
- set matchedCompany / matchedPerson to the tracked name exactly as listed, or null\n\
- set matchType to \"exact\" if the tracked name appears verbatim in the article text, otherwise \"contextual\"\n\
When several candidates cover the same story, merge them into ONE entry and list all their indices in sourceIndices; put the most authoritative one first.\n\
Drop candidates unrelated to any tracked name.\n\n",
        category_list()
    );
    p.push_str(
        "Respond with JSON only, in exactly this shape:\n\
{\"articles\": [{\"sourceIndices\": [0, 4], \"headline\": \"...\", \"shortSummary\": \"...\", \"longSummary\": \"...\", \"whyItMatters\": \"...\", \"category\": \"Funding\", \"priorityLevel\": \"high\", \"priorityScore\": 8, \"matchedCompany\": \"...\", \"matchedPerson\": null, \"matchType\": \"exact\"}], \"coverageGaps\": []}",
    );
    p
}

/// Ad-hoc search for one company and/or person, classified in the same call.
pub fn ad_hoc_search(
    company: Option<&str>,
    person: Option<&str>,
    max_results: usize,
    recency_days: u32,
) -> String {
    let mut subject = Vec::new();
    if let Some(c) = company {
        subject.push(format!("the company \"{c}\""));
    }
    if let Some(pn) = person {
        subject.push(format!("the person \"{pn}\""));
    }
    let mut p = String::new();
    let _ = writeln!(
        p,
        "Search the web for news from the last {} days about {}. Focus narrowly on coverage where they are the main subject.",
        recency_days,
        subject.join(" and ")
    );
    let _ = writeln!(
        p,
        "Return at most {max_results} articles. Prefer sources in this order: {SOURCE_PREFERENCE}."
    );
    let _ = write!(
        p,
        "Classify each article into one category: {}\nScore importance 1-10 using this rubric:\n{PRIORITY_RUBRIC}\n",
        category_list()
    );
    p.push_str(
        "Respond with JSON only, in exactly this shape:\n\
{\"articles\": [{\"headline\": \"...\", \"url\": \"https://...\", \"sourceName\": \"outlet\", \"publishedAt\": \"YYYY-MM-DD\", \"shortSummary\": \"...\", \"longSummary\": \"...\", \"whyItMatters\": \"...\", \"category\": \"News\", \"priorityLevel\": \"medium\", \"priorityScore\": 5, \"matchedCompany\": null, \"matchedPerson\": null, \"matchType\": \"exact\"}]}",
    );
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{collect_entities, PersonRef, TrackingRequest};

    #[test]
    fn contextual_prompt_caps_people() {
        let req = TrackingRequest {
            owner: "o".into(),
            companies: vec![],
            people: (0..5)
                .map(|i| PersonRef {
                    name: format!("Person {i}"),
                    title: None,
                })
                .collect(),
        };
        let ents = collect_entities(&[req]);
        let p = contextual_search(&ents, 2, 10, 3, Utc::now());
        assert!(p.contains("Person 1"));
        assert!(!p.contains("Person 2"));
        assert!(p.contains("last 72 hours"));
        assert!(p.contains("\"results\""));
    }
}
