// src/ingest/mod.rs
pub mod layer1;
pub mod providers;
pub mod types;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// RFC 2822 (RSS `pubDate`) to UTC.
/// Named zones (`GMT`, `UT`) are rewritten to `+0000` first.
pub fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let numeric = match ts.rsplit_once(' ') {
        Some((head, "GMT" | "UT" | "UTC" | "Z")) => format!("{head} +0000"),
        _ => ts.to_string(),
    };
    OffsetDateTime::parse(&numeric, &Rfc2822)
        .ok()
        .and_then(|dt| Utc.timestamp_opt(dt.unix_timestamp(), 0).single())
}

/// Lenient date parsing for service output: RFC 3339, `YYYY-MM-DD`, then RFC 2822.
pub fn parse_published_at(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let day = s.get(..10).unwrap_or(s);
    if let Ok(d) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    parse_rfc2822(s)
}

/// Normalize feed text: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Lowercased alphanumeric form used for matching and fingerprints.
pub fn fold_for_match(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Case-insensitive exact-phrase matcher for one name (word boundaries on both sides).
/// Compile once and reuse across texts.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    re: Option<Regex>,
    needle: String,
}

impl NameMatcher {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        let re = if name.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)(^|[^\w]){}($|[^\w])", regex::escape(name))).ok()
        };
        Self {
            re,
            needle: name.to_lowercase(),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        if self.needle.is_empty() {
            return false;
        }
        match &self.re {
            Some(re) => re.is_match(text),
            None => text.to_lowercase().contains(&self.needle),
        }
    }
}

/// One-off form of [`NameMatcher`]; compiles a pattern per call.
pub fn mentions_name(text: &str, name: &str) -> bool {
    NameMatcher::new(name).is_match(text)
}

/// Truncate to at most `max` chars, appending an ellipsis when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
