//! NCBI GEO dataset registry backend.
//!
//! Talks to the E-utilities `esearch`/`esummary` endpoints against the
//! `gds` database. Two HTTP calls per search (id lookup, then summaries),
//! separated by the configured jitter to stay under NCBI's per-second
//! rate limit.

use crate::backend::{BackendKind, BackendResults, SearchBackend};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::types::{DatasetRecord, QueryFilters};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// GEO registry search backend.
pub struct GeoBackend {
    client: reqwest::Client,
    jitter_ms: (u64, u64),
}

impl GeoBackend {
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
                ("db", "gds"),
                ("term", term),
                ("retmode", "json"),
                ("retmax", &retmax),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Backend(format!("geo esearch request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Backend(format!("geo esearch HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| SearchError::Backend(format!("geo esearch read failed: {e}")))?;

        parse_esearch_ids(&body)
    }

    async fn esummary(&self, ids: &[String]) -> Result<Vec<DatasetRecord>> {
        let url = format!("{EUTILS_BASE}/esummary.fcgi");
        let id_list = ids.join(",");
        let body = self
            .client
            .get(&url)
            .query(&[("db", "gds"), ("id", id_list.as_str()), ("retmode", "json")])
            .send()
            .await
            .map_err(|e| SearchError::Backend(format!("geo esummary request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Backend(format!("geo esummary HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| SearchError::Backend(format!("geo esummary read failed: {e}")))?;

        parse_gds_summaries(&body, ids)
    }

    async fn lookup(&self, term: &str, retmax: usize) -> Result<Vec<DatasetRecord>> {
        let ids = self.esearch(term, retmax).await?;
        tracing::debug!(term, count = ids.len(), "geo esearch returned ids");
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        tokio::time::sleep(http::request_jitter(self.jitter_ms)).await;
        self.esummary(&ids).await
    }
}

#[async_trait]
impl SearchBackend for GeoBackend {
    fn name(&self) -> &str {
        "geo"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Dataset
    }

    async fn search(
        &self,
        query: &str,
        filters: &QueryFilters,
        max_results: usize,
    ) -> Result<BackendResults> {
        tracing::trace!(query, "geo search");
        let term = build_term(query, filters);
        let mut records = self.lookup(&term, max_results).await?;

        if let Some(min) = filters.min_sample_count {
            // The registry cannot filter on sample count server-side.
            records.retain(|r| r.sample_count.is_some_and(|n| n >= min));
        }

        records.truncate(max_results);
        Ok(BackendResults::Datasets(records))
    }

    async fn fetch_dataset(&self, accession: &str) -> Result<Option<DatasetRecord>> {
        let accession = accession.to_uppercase();
        tracing::trace!(%accession, "geo accession fetch");
        let term = format!("{accession}[ACCN]");
        let records = self.lookup(&term, 5).await?;
        Ok(records
            .into_iter()
            .find(|r| r.accession.eq_ignore_ascii_case(&accession)))
    }
}

/// Build an E-utilities query term from free text plus filter qualifiers.
fn build_term(query: &str, filters: &QueryFilters) -> String {
    let mut term = query.trim().to_string();
    if let Some(organism) = filters.organism.as_deref() {
        term.push_str(&format!(" AND {organism}[Organism]"));
    }
    if let Some(record_type) = filters.record_type.as_deref() {
        term.push_str(&format!(" AND {record_type}[DataSet Type]"));
    }
    term
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

/// Parse an esearch JSON response into the uid list.
fn parse_esearch_ids(body: &str) -> Result<Vec<String>> {
    let envelope: EsearchEnvelope = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("geo esearch response: {e}")))?;
    Ok(envelope.esearchresult.idlist)
}

/// Parse an esummary (db=gds) JSON response into dataset records.
///
/// Output follows `requested_ids` order, the registry's relevance order.
fn parse_gds_summaries(body: &str, requested_ids: &[String]) -> Result<Vec<DatasetRecord>> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("geo esummary response: {e}")))?;
    let result = root
        .get("result")
        .ok_or_else(|| SearchError::Parse("geo esummary response missing result".into()))?;

    let records = requested_ids
        .iter()
        .filter_map(|uid| result.get(uid.as_str()))
        .filter_map(summary_to_record)
        .collect();
    Ok(records)
}

/// Map one gds summary document to a [`DatasetRecord`].
///
/// Documents without an accession or title are skipped rather than failing
/// the whole batch.
fn summary_to_record(doc: &Value) -> Option<DatasetRecord> {
    let accession = doc.get("accession")?.as_str()?.trim().to_uppercase();
    if accession.is_empty() {
        return None;
    }
    let title = doc.get("title")?.as_str()?.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let summary = doc
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let organism = non_empty_str(doc.get("taxon"));
    let platform = non_empty_str(doc.get("gpl")).map(|gpl| {
        if gpl.starts_with("GPL") {
            gpl
        } else {
            format!("GPL{gpl}")
        }
    });
    let sample_count = doc
        .get("n_samples")
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    let published_at = doc
        .get("pdat")
        .and_then(Value::as_str)
        .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y/%m/%d").ok());

    Some(DatasetRecord {
        accession,
        title,
        summary,
        organism,
        platform,
        sample_count,
        published_at,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESEARCH_BODY: &str = r#"{
        "header": {"type": "esearch", "version": "0.3"},
        "esearchresult": {
            "count": "2",
            "retmax": "2",
            "retstart": "0",
            "idlist": ["200012345", "200067890"]
        }
    }"#;

    const ESUMMARY_BODY: &str = r#"{
        "header": {"type": "esummary", "version": "0.3"},
        "result": {
            "uids": ["200012345", "200067890"],
            "200012345": {
                "uid": "200012345",
                "accession": "GSE12345",
                "title": "Methylation profiling of breast tumors",
                "summary": "Genome-wide methylation in 40 tumor samples.",
                "taxon": "Homo sapiens",
                "gpl": "13534",
                "n_samples": 40,
                "pdat": "2020/01/15"
            },
            "200067890": {
                "uid": "200067890",
                "accession": "GSE67890",
                "title": "Expression atlas",
                "summary": "",
                "taxon": "",
                "gpl": "",
                "n_samples": 8,
                "pdat": "bad-date"
            }
        }
    }"#;

    #[test]
    fn parse_esearch_extracts_ids_in_order() {
        let ids = parse_esearch_ids(ESEARCH_BODY).expect("parse ok");
        assert_eq!(ids, vec!["200012345".to_string(), "200067890".to_string()]);
    }

    #[test]
    fn parse_esearch_rejects_garbage() {
        assert!(parse_esearch_ids("not json").is_err());
    }

    #[test]
    fn parse_esearch_tolerates_missing_idlist() {
        let ids = parse_esearch_ids(r#"{"esearchresult": {"count": "0"}}"#).expect("parse ok");
        assert!(ids.is_empty());
    }

    #[test]
    fn parse_summaries_maps_all_fields() {
        let ids = vec!["200012345".to_string(), "200067890".to_string()];
        let records = parse_gds_summaries(ESUMMARY_BODY, &ids).expect("parse ok");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.accession, "GSE12345");
        assert_eq!(first.title, "Methylation profiling of breast tumors");
        assert_eq!(first.organism.as_deref(), Some("Homo sapiens"));
        assert_eq!(first.platform.as_deref(), Some("GPL13534"));
        assert_eq!(first.sample_count, Some(40));
        assert_eq!(
            first.published_at,
            chrono::NaiveDate::from_ymd_opt(2020, 1, 15)
        );
    }

    #[test]
    fn parse_summaries_handles_empty_optionals() {
        let ids = vec!["200067890".to_string()];
        let records = parse_gds_summaries(ESUMMARY_BODY, &ids).expect("parse ok");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.organism.is_none());
        assert!(record.platform.is_none());
        assert!(record.published_at.is_none());
        assert_eq!(record.sample_count, Some(8));
    }

    #[test]
    fn parse_summaries_follows_requested_order() {
        let ids = vec!["200067890".to_string(), "200012345".to_string()];
        let records = parse_gds_summaries(ESUMMARY_BODY, &ids).expect("parse ok");
        assert_eq!(records[0].accession, "GSE67890");
        assert_eq!(records[1].accession, "GSE12345");
    }

    #[test]
    fn parse_summaries_skips_unknown_uids() {
        let ids = vec!["999".to_string(), "200012345".to_string()];
        let records = parse_gds_summaries(ESUMMARY_BODY, &ids).expect("parse ok");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accession, "GSE12345");
    }

    #[test]
    fn build_term_plain_query() {
        assert_eq!(
            build_term(" rna-seq liver ", &QueryFilters::default()),
            "rna-seq liver"
        );
    }

    #[test]
    fn build_term_appends_qualifiers() {
        let filters = QueryFilters {
            organism: Some("Homo sapiens".into()),
            record_type: Some("expression profiling by array".into()),
            min_sample_count: Some(10),
        };
        let term = build_term("diabetes", &filters);
        assert_eq!(
            term,
            "diabetes AND Homo sapiens[Organism] AND expression profiling by array[DataSet Type]"
        );
    }

    #[test]
    fn gpl_prefix_not_duplicated() {
        let doc = serde_json::json!({
            "accession": "GSE1",
            "title": "t",
            "gpl": "GPL570"
        });
        let record = summary_to_record(&doc).expect("record");
        assert_eq!(record.platform.as_deref(), Some("GPL570"));
    }

    #[test]
    fn summary_without_accession_is_skipped() {
        let doc = serde_json::json!({"title": "no accession"});
        assert!(summary_to_record(&doc).is_none());
    }
}
