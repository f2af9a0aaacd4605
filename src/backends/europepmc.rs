//! Europe PMC bibliographic backend.
//!
//! Single REST call per search. Unlike PubMed's esummary, the `core`
//! result type carries abstracts and `citedByCount`, so this source feeds
//! both the citation ranking signal and the hybrid accession extraction.

use crate::backend::{BackendKind, BackendResults, SearchBackend};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::types::{Publication, PublicationIds, QueryFilters};
use async_trait::async_trait;
use serde::Deserialize;

const SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// Europe PMC search backend.
pub struct EuropePmcBackend {
    client: reqwest::Client,
}

impl EuropePmcBackend {
    /// Build a backend from the pipeline configuration.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.backend_timeout_secs)?,
        })
    }
}

#[async_trait]
impl SearchBackend for EuropePmcBackend {
    fn name(&self) -> &str {
        "europepmc"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Publication
    }

    async fn search(
        &self,
        query: &str,
        _filters: &QueryFilters,
        max_results: usize,
    ) -> Result<BackendResults> {
        tracing::trace!(query, "europepmc search");
        let page_size = max_results.to_string();
        let body = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("query", query.trim()),
                ("format", "json"),
                ("resultType", "core"),
                ("pageSize", &page_size),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Backend(format!("europepmc request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Backend(format!("europepmc HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| SearchError::Backend(format!("europepmc read failed: {e}")))?;

        let publications = parse_search_response(&body)?;
        tracing::debug!(count = publications.len(), "europepmc returned results");
        Ok(BackendResults::Publications(publications))
    }
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "resultList", default)]
    result_list: ResultList,
}

#[derive(Deserialize, Default)]
struct ResultList {
    #[serde(default)]
    result: Vec<RawResult>,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    pmid: Option<String>,
    #[serde(default)]
    pmcid: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(rename = "abstractText", default)]
    abstract_text: Option<String>,
    #[serde(rename = "authorString", default)]
    author_string: Option<String>,
    #[serde(rename = "pubYear", default)]
    pub_year: Option<String>,
    #[serde(rename = "citedByCount", default)]
    cited_by_count: Option<i64>,
}

/// Parse a Europe PMC search response into publications, preserving the
/// service's relevance order.
fn parse_search_response(body: &str) -> Result<Vec<Publication>> {
    let envelope: SearchEnvelope = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("europepmc response: {e}")))?;

    Ok(envelope
        .result_list
        .result
        .into_iter()
        .filter_map(raw_to_publication)
        .collect())
}

fn raw_to_publication(raw: RawResult) -> Option<Publication> {
    let title = raw.title.trim().trim_end_matches('.').to_string();
    let ids = PublicationIds {
        doi: normalize_id(raw.doi),
        pmid: normalize_id(raw.pmid),
        pmcid: normalize_id(raw.pmcid),
    };
    // A record we can neither identify nor title is unusable.
    if title.is_empty() || ids.is_empty() {
        return None;
    }

    Some(Publication {
        ids,
        title,
        abstract_text: raw
            .abstract_text
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
        authors: raw
            .author_string
            .as_deref()
            .map(split_author_string)
            .unwrap_or_default(),
        year: raw.pub_year.as_deref().and_then(|y| y.parse().ok()),
        citation_count: raw.cited_by_count.map_or(0, |c| c.max(0) as u32),
        source: "europepmc".into(),
        referenced_dataset_ids: Vec::new(),
    })
}

fn normalize_id(id: Option<String>) -> Option<String> {
    id.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Split Europe PMC's `"Smith J, Jones A."` author string into names.
fn split_author_string(authors: &str) -> Vec<String> {
    authors
        .trim_end_matches('.')
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "version": "6.9",
        "hitCount": 2,
        "resultList": {
            "result": [
                {
                    "id": "34735123",
                    "source": "MED",
                    "pmid": "34735123",
                    "pmcid": "PMC8609201",
                    "doi": "10.1038/s41467-021-0001",
                    "title": "DNA methylation landscapes in breast cancer.",
                    "authorString": "Smith J, Jones A.",
                    "pubYear": "2021",
                    "abstractText": "We profiled GSE99999 and found broad hypomethylation.",
                    "citedByCount": 42
                },
                {
                    "id": "PPR000001",
                    "source": "PPR",
                    "doi": "10.1101/2023.01.01.522000",
                    "title": "A preprint without citations",
                    "authorString": "Zhang W.",
                    "pubYear": "2023"
                }
            ]
        }
    }"#;

    #[test]
    fn parse_full_record() {
        let publications = parse_search_response(SEARCH_BODY).expect("parse ok");
        assert_eq!(publications.len(), 2);

        let first = &publications[0];
        assert_eq!(first.title, "DNA methylation landscapes in breast cancer");
        assert_eq!(first.ids.pmid.as_deref(), Some("34735123"));
        assert_eq!(first.ids.pmcid.as_deref(), Some("PMC8609201"));
        assert_eq!(first.ids.doi.as_deref(), Some("10.1038/s41467-021-0001"));
        assert_eq!(first.authors, vec!["Smith J", "Jones A"]);
        assert_eq!(first.year, Some(2021));
        assert_eq!(first.citation_count, 42);
        assert_eq!(first.source, "europepmc");
        assert!(first
            .abstract_text
            .as_deref()
            .expect("abstract present")
            .contains("GSE99999"));
    }

    #[test]
    fn missing_citation_count_defaults_to_zero() {
        let publications = parse_search_response(SEARCH_BODY).expect("parse ok");
        let preprint = &publications[1];
        assert_eq!(preprint.citation_count, 0);
        assert!(preprint.ids.pmid.is_none());
        assert_eq!(
            preprint.ids.doi.as_deref(),
            Some("10.1101/2023.01.01.522000")
        );
    }

    #[test]
    fn empty_result_list_is_ok() {
        let publications =
            parse_search_response(r#"{"hitCount": 0, "resultList": {"result": []}}"#)
                .expect("parse ok");
        assert!(publications.is_empty());
    }

    #[test]
    fn missing_result_list_is_ok() {
        let publications = parse_search_response(r#"{"hitCount": 0}"#).expect("parse ok");
        assert!(publications.is_empty());
    }

    #[test]
    fn record_without_title_or_ids_is_skipped() {
        let body = r#"{"resultList": {"result": [
            {"title": "", "pmid": "1"},
            {"title": "No identifiers at all"}
        ]}}"#;
        let publications = parse_search_response(body).expect("parse ok");
        assert!(publications.is_empty());
    }

    #[test]
    fn negative_citation_count_clamped() {
        let body = r#"{"resultList": {"result": [
            {"title": "Odd record", "pmid": "7", "citedByCount": -3}
        ]}}"#;
        let publications = parse_search_response(body).expect("parse ok");
        assert_eq!(publications[0].citation_count, 0);
    }

    #[test]
    fn author_string_splitting() {
        assert_eq!(
            split_author_string("Smith J, Jones A."),
            vec!["Smith J", "Jones A"]
        );
        assert!(split_author_string("").is_empty());
        assert_eq!(split_author_string("Solo A."), vec!["Solo A"]);
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        assert!(parse_search_response("<html>").is_err());
    }
}
