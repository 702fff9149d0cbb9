//! # Source Authority Tiers
//!
//! Maps outlet names (e.g. "Reuters", "TechCrunch", "Yahoo Finance") to a fixed
//! authority tier used to pick the best representative among duplicate articles.
//!
//! - Tier 1: wire services.
//! - Tier 2: industry and financial outlets.
//! - Tier 3: trade press.
//! - Tier 4: aggregators and blogs.
//!
//! Lookup is case-insensitive with punctuation/dash normalization.
//! Fallback order: aliases → exact match → substring match → default tier.

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

pub const BEST_TIER: u8 = 1;
pub const WORST_TIER: u8 = 4;

/// Tier table, loaded from JSON or the built-in seed.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceTiers {
    /// Tier used when no match is found.
    #[serde(default = "default_tier")]
    pub default_tier: u8,
    /// Explicit tiers for canonical outlet names.
    #[serde(default)]
    pub tiers: HashMap<String, u8>,
    /// Aliases mapping non-canonical names (and domains) → canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_tier() -> u8 {
    3
}

impl Default for SourceTiers {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceTiers {
    /// Load from a JSON file. Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<SourceTiers>(&s)
                .map(|mut t| {
                    t.tiers = t.tiers.into_iter().map(|(k, v)| (normalize(&k), v)).collect();
                    t.aliases = t
                        .aliases
                        .into_iter()
                        .map(|(k, v)| (normalize(&k), normalize(&v)))
                        .collect();
                    t
                })
                .unwrap_or_else(|_| Self::default_seed()),
            Err(_) => Self::default_seed(),
        }
    }

    /// Tier for an outlet name, always within `BEST_TIER..=WORST_TIER`.
    pub fn tier_for(&self, source: &str) -> u8 {
        let s = normalize(source);
        if s.is_empty() {
            return clamp_tier(self.default_tier);
        }

        // 1) Alias resolution.
        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&t) = self.tiers.get(canon) {
                return clamp_tier(t);
            }
        }

        // 2) Exact match.
        if let Some(&t) = self.tiers.get(&s) {
            return clamp_tier(t);
        }

        // 3) Substring fallback, best tier wins (deterministic across HashMap order).
        let mut best: Option<u8> = None;
        for (k, &t) in &self.tiers {
            if k.len() >= 3 && contains_words(&s, k) {
                best = Some(best.map_or(t, |b| b.min(t)));
            }
        }
        if let Some(t) = best {
            return clamp_tier(t);
        }

        // 4) Default.
        clamp_tier(self.default_tier)
    }

    /// Tier for an article: outlet name first, then the URL host.
    pub fn tier_for_article(&self, source_name: &str, source_url: &str) -> u8 {
        let by_name = self.tier_for(source_name);
        let host = host_of(source_url);
        if host.is_empty() {
            return by_name;
        }
        by_name.min(self.tier_for(&host))
    }

    /// Built-in seed used when no config is found.
    pub fn default_seed() -> Self {
        let mut tiers = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            // Tier 1: wires
            ("reuters", 1),
            ("associated press", 1),
            ("bloomberg", 1),
            ("agence france presse", 1),
            ("dow jones newswires", 1),
            // Tier 2: industry / financial outlets
            ("wall street journal", 2),
            ("financial times", 2),
            ("cnbc", 2),
            ("new york times", 2),
            ("forbes", 2),
            ("fortune", 2),
            ("business insider", 2),
            ("barrons", 2),
            ("the information", 2),
            ("techcrunch", 2),
            ("axios", 2),
            ("sec", 2),
            // Tier 3: trade press
            ("fierce biotech", 3),
            ("fierce pharma", 3),
            ("endpoints news", 3),
            ("crunchbase news", 3),
            ("venturebeat", 3),
            ("the verge", 3),
            ("pr newswire", 3),
            ("business wire", 3),
            ("globenewswire", 3),
            // Tier 4: aggregators / blogs
            ("yahoo finance", 4),
            ("msn", 4),
            ("google news", 4),
            ("seeking alpha", 4),
            ("medium", 4),
            ("substack", 4),
            ("benzinga", 4),
        ] {
            tiers.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("ap", "associated press"),
            ("ap news", "associated press"),
            ("apnews com", "associated press"),
            ("reuters com", "reuters"),
            ("bloomberg com", "bloomberg"),
            ("afp", "agence france presse"),
            ("wsj", "wall street journal"),
            ("wsj com", "wall street journal"),
            ("the wall street journal", "wall street journal"),
            ("ft", "financial times"),
            ("ft com", "financial times"),
            ("cnbc com", "cnbc"),
            ("nyt", "new york times"),
            ("nytimes com", "new york times"),
            ("techcrunch com", "techcrunch"),
            ("sec gov", "sec"),
            ("sec edgar", "sec"),
            ("finance yahoo com", "yahoo finance"),
            ("msn com", "msn"),
            ("news google com", "google news"),
            ("seekingalpha com", "seeking alpha"),
            ("prnewswire com", "pr newswire"),
            ("businesswire com", "business wire"),
            ("globenewswire com", "globenewswire"),
            ("fiercebiotech com", "fierce biotech"),
            ("endpts com", "endpoints news"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_tier: 3,
            tiers,
            aliases,
        }
    }
}

/// Lowercase host without `www.`, or empty when `url` does not parse.
pub fn host_of(url: &str) -> String {
    reqwest::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

/// Normalize input string: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    // Replace common separators with spaces.
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }

    // Replace disruptive punctuation/whitespace with spaces; drop apostrophes.
    out = out.replace(['\n', '\r', '\t', '.', ',', '‚', ':', '|'], " ");
    out = out.replace(['’', '\''], "");

    // Collapse multiple spaces.
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `needle` appears in `hay` on word boundaries.
fn contains_words(hay: &str, needle: &str) -> bool {
    format!(" {hay} ").contains(&format!(" {needle} "))
}

fn clamp_tier(t: u8) -> u8 {
    t.clamp(BEST_TIER, WORST_TIER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SourceTiers {
        SourceTiers::default_seed()
    }

    #[test]
    fn exact_and_alias_match() {
        let c = cfg();
        assert_eq!(c.tier_for("Reuters"), 1);
        assert_eq!(c.tier_for("AP"), 1);
        assert_eq!(c.tier_for("WSJ"), 2);
        assert_eq!(c.tier_for("Yahoo Finance"), 4);
    }

    #[test]
    fn substring_and_typography_normalization() {
        let c = cfg();
        assert_eq!(c.tier_for("The Wall—Street—Journal"), 2);
        assert_eq!(c.tier_for("Reuters UK"), 1);
        assert_eq!(c.tier_for("Barron's"), 2);
    }

    #[test]
    fn unknown_source_gets_default_tier() {
        let c = cfg();
        assert_eq!(c.tier_for("Totally Unknown Gazette"), c.default_tier);
        assert_eq!(c.tier_for(""), 3);
    }

    #[test]
    fn url_host_can_improve_tier() {
        let c = cfg();
        assert_eq!(
            c.tier_for_article("Unknown Syndicator", "https://www.reuters.com/markets/x"),
            1
        );
        assert_eq!(host_of("https://WWW.Example.com/a?b=1"), "example.com");
        assert_eq!(host_of("not a url"), "");
    }

    #[test]
    fn file_tiers_are_clamped_and_normalized() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("tiers.json");
        fs::write(&p, r#"{"tiers":{"My-Wire":0,"Blog Spot":9},"aliases":{"MW":"my wire"}}"#).unwrap();
        let c = SourceTiers::load_from_file(&p);
        assert_eq!(c.tier_for("my wire"), 1);
        assert_eq!(c.tier_for("mw"), 1);
        assert_eq!(c.tier_for("blog spot"), 4);
    }
}
