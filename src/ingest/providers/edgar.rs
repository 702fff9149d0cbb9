// src/ingest/providers/edgar.rs
//! SEC EDGAR submissions feed (`data.sec.gov/submissions/CIK##########.json`).

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::ingest::types::{FetchLayer, RawArticle};

pub const MAX_FILINGS: usize = 10;

#[derive(Debug, Deserialize)]
struct Submissions {
    #[serde(default)]
    name: Option<String>,
    filings: Filings,
}

#[derive(Debug, Deserialize)]
struct Filings {
    recent: Recent,
}

/// Column-oriented: the i-th element of every vector describes the i-th filing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Recent {
    accession_number: Vec<String>,
    filing_date: Vec<String>,
    form: Vec<String>,
    primary_document: Vec<String>,
    primary_doc_description: Vec<String>,
}

/// Zero-pad a CIK to the 10 digits EDGAR URLs expect. `None` when not numeric.
pub fn pad_cik(identifier: &str) -> Option<String> {
    let digits = identifier.trim().trim_start_matches("CIK").trim_start_matches('0');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || digits.len() > 10 {
        return None;
    }
    Some(format!("{digits:0>10}"))
}

pub fn submissions_url(cik10: &str) -> String {
    format!("https://data.sec.gov/submissions/CIK{cik10}.json")
}

/// Parse a submissions document into the most recent filings.
pub fn parse_submissions(json: &str, cik10: &str, entity: &str) -> Result<Vec<RawArticle>> {
    let doc: Submissions = serde_json::from_str(json).context("parsing edgar submissions json")?;
    let company = doc.name.unwrap_or_else(|| entity.to_string());
    let cik_short = cik10.trim_start_matches('0');
    let r = &doc.filings.recent;

    let mut out = Vec::new();
    for (i, accession) in r.accession_number.iter().enumerate().take(MAX_FILINGS) {
        let form = r.form.get(i).map(String::as_str).unwrap_or("Filing");
        let doc_name = r.primary_document.get(i).map(String::as_str).unwrap_or_default();
        let acc_nodash = accession.replace('-', "");
        let source_url = if doc_name.is_empty() {
            format!("https://www.sec.gov/Archives/edgar/data/{cik_short}/{acc_nodash}/")
        } else {
            format!("https://www.sec.gov/Archives/edgar/data/{cik_short}/{acc_nodash}/{doc_name}")
        };
        let description = r
            .primary_doc_description
            .get(i)
            .filter(|d| !d.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{form} filed with the SEC"));
        let published_at = r
            .filing_date
            .get(i)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|n| Utc.from_utc_datetime(&n));

        out.push(RawArticle {
            headline: format!("{company} files {form}"),
            description,
            source_url,
            source_name: "SEC EDGAR".to_string(),
            published_at,
            fetch_layer: FetchLayer::Layer1Api,
            query_entity: Some(entity.to_string()),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cik_is_zero_padded() {
        assert_eq!(pad_cik("320193").as_deref(), Some("0000320193"));
        assert_eq!(pad_cik("CIK0000320193").as_deref(), Some("0000320193"));
        assert_eq!(pad_cik("AAPL"), None);
        assert_eq!(pad_cik(""), None);
    }

    #[test]
    fn parses_recent_filings() {
        let json = r#"{"name": "ACME CORP", "filings": {"recent": {
            "accessionNumber": ["0000320193-26-000101", "0000320193-26-000100"],
            "filingDate": ["2026-10-15", "2026-10-01"],
            "form": ["8-K", "10-Q"],
            "primaryDocument": ["acme-8k.htm", ""],
            "primaryDocDescription": ["Current report", ""]
        }}}"#;
        let out = parse_submissions(json, "0000320193", "Acme Corp").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].headline, "ACME CORP files 8-K");
        assert_eq!(
            out[0].source_url,
            "https://www.sec.gov/Archives/edgar/data/320193/000032019326000101/acme-8k.htm"
        );
        assert_eq!(out[1].description, "10-Q filed with the SEC");
        assert!(out.iter().all(|a| a.fetch_layer == FetchLayer::Layer1Api));
        assert_eq!(out[0].query_entity.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn three_filings_survive_heuristic_dedup() {
        use crate::dedup::{dedup_heuristic, HeuristicParams};
        use crate::source_tiers::SourceTiers;

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let json = format!(
            r#"{{"name": "ACME CORP", "filings": {{"recent": {{
            "accessionNumber": ["0000320193-26-000102", "0000320193-26-000101", "0000320193-26-000100"],
            "filingDate": ["{today}", "{today}", "{today}"],
            "form": ["8-K", "10-Q", "10-K"],
            "primaryDocument": ["acme-8k.htm", "acme-10q.htm", "acme-10k.htm"],
            "primaryDocDescription": ["", "", ""]
        }}}}}}"#
        );
        let filings = parse_submissions(&json, "0000320193", "Acme Corp").unwrap();
        assert_eq!(filings.len(), 3);
        let out = dedup_heuristic(filings, HeuristicParams::default(), &SourceTiers::default_seed(), Utc::now());
        assert_eq!(out.kept.len(), 3);
        assert_eq!(out.duplicates_dropped, 0);
    }
}
