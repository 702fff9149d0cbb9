// src/ingest/providers/mod.rs
pub mod edgar;
pub mod rss;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::ingest::types::{FeedQuery, FetchLayer, RawArticle, SourceFetcher};

/// Google News RSS search for `query`, restricted to the last `days` days.
pub fn news_search_url(query: &str, days: u32) -> Result<reqwest::Url> {
    reqwest::Url::parse_with_params(
        "https://news.google.com/rss/search",
        &[
            ("q", format!("{query} when:{days}d")),
            ("hl", "en-US".to_string()),
            ("gl", "US".to_string()),
            ("ceid", "US:en".to_string()),
        ],
    )
    .context("building news search url")
}

/// Production Layer 1 fetcher over plain HTTP.
pub struct HttpSourceFetcher {
    client: reqwest::Client,
    recency_days: u32,
}

impl HttpSourceFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            recency_days: config.recency_days,
        })
    }

    async fn get_text(&self, url: reqwest::Url) -> Result<String> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url.host_str().unwrap_or_default()))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("{} returned {}", url.host_str().unwrap_or_default(), status);
        }
        resp.text().await.context("reading response body")
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawArticle>> {
        let out = match query {
            FeedQuery::NewsSearch { query, entity } => {
                let url = news_search_url(query, self.recency_days)?;
                let xml = self.get_text(url).await?;
                rss::parse_feed(&xml, "Google News", FetchLayer::Layer1Rss, Some(entity))?
            }
            FeedQuery::Filings { identifier, entity } => {
                let Some(cik) = edgar::pad_cik(identifier) else {
                    bail!("filing identifier {identifier:?} is not a CIK");
                };
                let url = reqwest::Url::parse(&edgar::submissions_url(&cik))?;
                let json = self.get_text(url).await?;
                edgar::parse_submissions(&json, &cik, entity)?
            }
            FeedQuery::Curated { name, url } => {
                let url = reqwest::Url::parse(url).with_context(|| format!("curated feed url for {name}"))?;
                let xml = self.get_text(url).await?;
                rss::parse_feed(&xml, name, FetchLayer::Layer1Rss, None)?
            }
        };
        counter!("source_fetch_articles_total", "kind" => query.kind()).increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_search_url_encodes_quotes_and_window() {
        let url = news_search_url("\"Jane Roe\"", 3).unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://news.google.com/rss/search?q="));
        assert!(s.contains("%22Jane+Roe%22+when%3A3d"));
        assert!(s.contains("ceid=US%3Aen"));
    }
}
