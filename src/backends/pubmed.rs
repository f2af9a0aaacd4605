//! PubMed bibliographic backend.
//!
//! E-utilities `esearch`/`esummary` against the `pubmed` database. The
//! esummary endpoint carries no abstracts and no citation counts, so
//! records from this source rank on title overlap and recency alone;
//! Europe PMC fills those fields for the articles it also indexes, and
//! dedup keeps the more complete record.

use crate::backend::{BackendKind, BackendResults, SearchBackend};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::types::{Publication, PublicationIds, QueryFilters};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed search backend.
pub struct PubMedBackend {
    client: reqwest::Client,
    jitter_ms: (u64, u64),
}

impl PubMedBackend {
    /// Build a backend from the pipeline configuration.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.backend_timeout_secs)?,
            jitter_ms: config.request_jitter_ms,
        })
    }

    async fn esearch(&self, term: &str, retmax: usize) -> Result<Vec<String>> {
        let url = format!("{EUTILS_BASE}/esearch.fcgi");
        let retmax = retmax.to_string();
        let body = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("term", term),
                ("retmode", "json"),
                ("retmax", &retmax),
                ("sort", "relevance"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Backend(format!("pubmed esearch request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Backend(format!("pubmed esearch HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| SearchError::Backend(format!("pubmed esearch read failed: {e}")))?;

        parse_esearch_ids(&body)
    }

    async fn esummary(&self, ids: &[String]) -> Result<Vec<Publication>> {
        let url = format!("{EUTILS_BASE}/esummary.fcgi");
        let id_list = ids.join(",");
        let body = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("id", id_list.as_str()),
                ("retmode", "json"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Backend(format!("pubmed esummary request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Backend(format!("pubmed esummary HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| SearchError::Backend(format!("pubmed esummary read failed: {e}")))?;

        parse_pubmed_summaries(&body, ids)
    }
}

#[async_trait]
impl SearchBackend for PubMedBackend {
    fn name(&self) -> &str {
        "pubmed"
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
        tracing::trace!(query, "pubmed search");
        let ids = self.esearch(query.trim(), max_results).await?;
        tracing::debug!(count = ids.len(), "pubmed esearch returned ids");
        if ids.is_empty() {
            return Ok(BackendResults::Publications(Vec::new()));
        }
        tokio::time::sleep(http::request_jitter(self.jitter_ms)).await;
        let publications = self.esummary(&ids).await?;
        Ok(BackendResults::Publications(publications))
    }
}

#[derive(Deserialize)]
struct EsearchEnvelope {
    esearchresult: EsearchResult,
}

#[derive(Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

fn parse_esearch_ids(body: &str) -> Result<Vec<String>> {
    let envelope: EsearchEnvelope = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("pubmed esearch response: {e}")))?;
    Ok(envelope.esearchresult.idlist)
}

/// Parse an esummary (db=pubmed) response, preserving `requested_ids`
/// relevance order.
fn parse_pubmed_summaries(body: &str, requested_ids: &[String]) -> Result<Vec<Publication>> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("pubmed esummary response: {e}")))?;
    let result = root
        .get("result")
        .ok_or_else(|| SearchError::Parse("pubmed esummary response missing result".into()))?;

    let publications = requested_ids
        .iter()
        .filter_map(|uid| result.get(uid.as_str()).map(|doc| (uid, doc)))
        .filter_map(|(uid, doc)| summary_to_publication(uid, doc))
        .collect();
    Ok(publications)
}

/// Map one pubmed summary document to a [`Publication`].
fn summary_to_publication(uid: &str, doc: &Value) -> Option<Publication> {
    let title = doc.get("title")?.as_str()?.trim().trim_end_matches('.');
    if title.is_empty() {
        return None;
    }

    let authors = doc
        .get("authors")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let year = doc
        .get("pubdate")
        .and_then(Value::as_str)
        .and_then(parse_year);

    let mut ids = PublicationIds {
        pmid: Some(uid.to_string()),
        ..Default::default()
    };
    if let Some(article_ids) = doc.get("articleids").and_then(Value::as_array) {
        for entry in article_ids {
            let idtype = entry.get("idtype").and_then(Value::as_str);
            let value = entry
                .get("value")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty());
            match (idtype, value) {
                (Some("doi"), Some(v)) => ids.doi = Some(v.to_string()),
                (Some("pmc"), Some(v)) => ids.pmcid = Some(v.to_string()),
                _ => {}
            }
        }
    }

    Some(Publication {
        ids,
        title: title.to_string(),
        abstract_text: None,
        authors,
        year,
        citation_count: 0,
        source: "pubmed".into(),
        referenced_dataset_ids: Vec::new(),
    })
}

/// Extract the leading year from a pubdate like `"2021 Mar 15"`.
fn parse_year(pubdate: &str) -> Option<i32> {
    pubdate
        .split_whitespace()
        .next()
        .and_then(|y| y.parse().ok())
}
