// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{FetchLayer, RawArticle};
use crate::ingest::{normalize_text, parse_rfc2822};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

/// Google News carries the outlet as `<source url="...">Outlet</source>`.
#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

/// Named HTML entities are not valid XML; quick-xml rejects them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// News search titles end with " - Outlet"; drop it when it names the source.
fn strip_outlet_suffix(title: &str, outlet: &str) -> String {
    if outlet.is_empty() {
        return title.to_string();
    }
    match title.rsplit_once(" - ") {
        Some((head, tail)) if tail.trim().eq_ignore_ascii_case(outlet.trim()) => head.trim().to_string(),
        _ => title.to_string(),
    }
}

/// Parse an RSS 2.0 document into raw records.
///
/// Items without a title or link are skipped. `default_source` is used when an item
/// does not name its own outlet.
pub fn parse_feed(
    xml: &str,
    default_source: &str,
    layer: FetchLayer,
    query_entity: Option<&str>,
) -> Result<Vec<RawArticle>> {
    let t0 = std::time::Instant::now();

    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let (Some(title), Some(link)) = (it.title, it.link) else {
            continue;
        };
        let link = link.trim().to_string();
        if link.is_empty() {
            continue;
        }
        let source_name = it
            .source
            .and_then(|s| s.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_source.to_string());
        let headline = normalize_text(&strip_outlet_suffix(&title, &source_name));
        if headline.is_empty() {
            continue;
        }
        out.push(RawArticle {
            headline,
            description: it
                .description
                .as_deref()
                .map(normalize_text)
                .unwrap_or_default(),
            source_url: link,
            source_name,
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
            fetch_layer: layer,
            query_entity: query_entity.map(str::to_string),
        });
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE_NEWS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>"Acme Corp" - Google News</title>
<item>
  <title>Acme Corp raises $50M in Series C - Reuters</title>
  <link>https://news.google.com/rss/articles/abc</link>
  <pubDate>Thu, 15 Oct 2026 08:30:00 GMT</pubDate>
  <description>&lt;a href="x"&gt;Acme Corp raises $50M&lt;/a&gt;&nbsp;Reuters</description>
  <source url="https://www.reuters.com">Reuters</source>
</item>
<item>
  <title>No link item</title>
</item>
</channel></rss>"#;

    #[test]
    fn parses_google_news_items() {
        let out = parse_feed(GOOGLE_NEWS, "Google News", FetchLayer::Layer1Rss, Some("Acme Corp")).unwrap();
        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert_eq!(a.headline, "Acme Corp raises $50M in Series C");
        assert_eq!(a.source_name, "Reuters");
        assert_eq!(a.description, "Acme Corp raises $50M Reuters");
        assert!(a.published_at.is_some());
        assert_eq!(a.query_entity.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#;
        assert!(parse_feed(xml, "X", FetchLayer::Layer1Rss, None).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("<html><body>503</body>", "X", FetchLayer::Layer1Rss, None).is_err());
    }

    #[test]
    fn suffix_kept_when_it_is_not_the_outlet() {
        assert_eq!(strip_outlet_suffix("Q3 - the results", "Reuters"), "Q3 - the results");
    }
}
