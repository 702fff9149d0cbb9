// src/dedup/heuristic.rs
//! Heuristic dedup: fast, deterministic, no external calls.
//!
//! 1. Near-duplicate clustering. Two records are linked when any of these hold:
//!    - same canonical URL,
//!    - same content fingerprint (SHA-256 of folded headline + publication day),
//!    - folded headlines with normalized Levenshtein similarity >= threshold.
//!
//!    Filing records (`Layer1Api`) carry templated headlines, so they link by URL only.
//!
//!    Clusters are the connected components of those links (union-find), so the
//!    result does not depend on input order and a second pass finds nothing to merge.
//!    One representative per cluster: in-window members first, then best source tier,
//!    then longest description, then earliest position in the input.
//! 2. Recency filter: drop records published before `now - window`. Records
//!    without a date are kept.
//!
//! Output keeps input order.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use strsim::normalized_levenshtein;

use crate::ingest::fold_for_match;
use crate::ingest::types::{FetchLayer, RawArticle};
use crate::source_tiers::SourceTiers;

const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ocid", "cmpid", "mc_cid", "mc_eid"];

#[derive(Debug, Clone, Copy)]
pub struct HeuristicParams {
    pub similarity_threshold: f64,
    pub recency_window: Duration,
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            recency_window: Duration::days(3),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicOutcome {
    pub kept: Vec<RawArticle>,
    pub duplicates_dropped: usize,
    pub stale_dropped: usize,
}

/// Canonical URL for equality: lowercase host without `www.`, no fragment,
/// no tracking parameters, no trailing slash. Unparseable input is trimmed and lowercased.
pub fn canonical_url(url: &str) -> String {
    let Ok(mut u) = reqwest::Url::parse(url.trim()) else {
        return url.trim().to_lowercase();
    };
    u.set_fragment(None);
    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        u.set_query(None);
    } else {
        u.query_pairs_mut().clear().extend_pairs(kept);
    }
    let host = u
        .host_str()
        .map(|h| h.to_ascii_lowercase().trim_start_matches("www.").to_string())
        .unwrap_or_default();
    let path = u.path().trim_end_matches('/');
    match u.query() {
        Some(q) => format!("{host}{path}?{q}"),
        None => format!("{host}{path}"),
    }
}

/// SHA-256 over folded headline + publication day. `None` for empty headlines.
pub fn fingerprint(article: &RawArticle) -> Option<String> {
    let folded = fold_for_match(&article.headline);
    if folded.is_empty() {
        return None;
    }
    let day = article
        .published_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    let mut hasher = Sha256::new();
    hasher.update(folded.as_bytes());
    hasher.update(b"|");
    hasher.update(day.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Some(out)
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Smaller root wins, so roots are always the earliest member.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

fn links_by_url_only(article: &RawArticle) -> bool {
    article.fetch_layer == FetchLayer::Layer1Api
}

/// Cluster near-duplicates; returns the kept representatives in input order.
pub fn cluster_near_duplicates(
    articles: Vec<RawArticle>,
    params: HeuristicParams,
    tiers: &SourceTiers,
    now: DateTime<Utc>,
) -> Vec<RawArticle> {
    let n = articles.len();
    let mut sets = DisjointSet::new(n);

    let mut by_url: HashMap<String, usize> = HashMap::new();
    let mut by_fp: HashMap<String, usize> = HashMap::new();
    for (i, a) in articles.iter().enumerate() {
        let url = canonical_url(&a.source_url);
        if !url.is_empty() {
            match by_url.get(&url) {
                Some(&j) => sets.union(i, j),
                None => {
                    by_url.insert(url, i);
                }
            }
        }
        if links_by_url_only(a) {
            continue;
        }
        if let Some(fp) = fingerprint(a) {
            match by_fp.get(&fp) {
                Some(&j) => sets.union(i, j),
                None => {
                    by_fp.insert(fp, i);
                }
            }
        }
    }

    let folded: Vec<String> = articles
        .iter()
        .map(|a| {
            if links_by_url_only(a) {
                String::new()
            } else {
                fold_for_match(&a.headline)
            }
        })
        .collect();
    for i in 0..n {
        if folded[i].is_empty() {
            continue;
        }
        for j in (i + 1)..n {
            if folded[j].is_empty() || sets.find(i) == sets.find(j) {
                continue;
            }
            if normalized_levenshtein(&folded[i], &folded[j]) >= params.similarity_threshold {
                sets.union(i, j);
            }
        }
    }

    // Representative per cluster root.
    let mut best: HashMap<usize, usize> = HashMap::new();
    for i in 0..n {
        let root = sets.find(i);
        let rank = |k: usize| {
            let a = &articles[k];
            (
                !is_recent(a, now, params.recency_window),
                tiers.tier_for_article(&a.source_name, &a.source_url),
                std::cmp::Reverse(a.description.chars().count()),
                k,
            )
        };
        match best.get(&root) {
            Some(&cur) if rank(cur) <= rank(i) => {}
            _ => {
                best.insert(root, i);
            }
        }
    }

    let mut keep = vec![false; n];
    for &i in best.values() {
        keep[i] = true;
    }
    articles
        .into_iter()
        .zip(keep)
        .filter_map(|(a, k)| k.then_some(a))
        .collect()
}

/// `true` when the record is inside the window (or undated, or future-dated).
pub fn is_recent(article: &RawArticle, now: DateTime<Utc>, window: Duration) -> bool {
    match article.published_at {
        Some(ts) => ts >= now - window,
        None => true,
    }
}

pub fn dedup_heuristic(
    articles: Vec<RawArticle>,
    params: HeuristicParams,
    tiers: &SourceTiers,
    now: DateTime<Utc>,
) -> HeuristicOutcome {
    let input = articles.len();
    let clustered = cluster_near_duplicates(articles, params, tiers, now);
    let duplicates_dropped = input - clustered.len();

    let before_recency = clustered.len();
    let kept: Vec<RawArticle> = clustered
        .into_iter()
        .filter(|a| is_recent(a, now, params.recency_window))
        .collect();
    let stale_dropped = before_recency - kept.len();

    HeuristicOutcome {
        kept,
        duplicates_dropped,
        stale_dropped,
    }
}
