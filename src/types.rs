//! Core types for federated biomedical search.
//!
//! Two result kinds flow through the pipeline: [`DatasetRecord`] (an
//! accession-keyed registry entry) and [`Publication`] (a bibliographic
//! record with citation data). Both are immutable once a backend has
//! produced them; dedup and ranking only select and reorder.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How a query should be routed across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// The query is a registry accession — direct dataset lookup.
    Identifier,
    /// Free-text search against the dataset registry.
    DatasetText,
    /// Free-text search against bibliographic sources.
    Publication,
    /// Both dataset and publication backends, cross-linked afterwards.
    Hybrid,
}

impl SearchType {
    /// Stable lowercase name, used in cache keys and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::DatasetText => "dataset_text",
            Self::Publication => "publication",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the caller asked for. `Auto` defers to the query analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedType {
    /// Let the analyzer classify the query.
    #[default]
    Auto,
    /// Force accession lookup.
    Identifier,
    /// Force dataset free-text search.
    DatasetText,
    /// Force bibliographic search.
    Publication,
    /// Force the combined mode.
    Hybrid,
}

/// Optional constraints narrowing a dataset search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Organism name, e.g. `"Homo sapiens"`.
    pub organism: Option<String>,
    /// Registry record type, e.g. `"expression profiling by array"`.
    pub record_type: Option<String>,
    /// Minimum number of samples a dataset must contain.
    pub min_sample_count: Option<u32>,
}

impl QueryFilters {
    /// True when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.organism.is_none() && self.record_type.is_none() && self.min_sample_count.is_none()
    }
}

/// A search request. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The raw query text as the user typed it.
    pub raw_text: String,
    /// Optional dataset filters.
    pub filters: QueryFilters,
    /// Maximum results to return per result kind.
    pub max_results: usize,
    /// Requested routing, `Auto` by default.
    pub requested_type: RequestedType,
}

impl SearchQuery {
    /// Build a query with default filters, limit, and `Auto` routing.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            filters: QueryFilters::default(),
            max_results: 20,
            requested_type: RequestedType::Auto,
        }
    }
}

/// Output of the query analyzer: a routing decision with a confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// The effective search type.
    pub search_type: SearchType,
    /// Confidence in `[0, 1]`. Exact accession matches get 1.0.
    pub confidence: f64,
}

/// Kinds of entities a query optimizer may recognise in the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Gene,
    Disease,
    Organism,
    Technique,
    Chemical,
}

/// Output contract of the external query optimizer.
///
/// `variations` is order-significant: the first entry is the canonical
/// phrasing the pipeline dispatches to backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedQuery {
    /// Expanded/rewritten query text.
    pub expanded_text: String,
    /// Entities recognised in the query, grouped by kind.
    pub entities: HashMap<EntityKind, Vec<String>>,
    /// Alternate phrasings; the first is canonical.
    pub variations: Vec<String>,
}

impl OptimizedQuery {
    /// Fallback when the optimizer fails or times out: the unmodified query.
    pub fn passthrough(raw: &str) -> Self {
        Self {
            expanded_text: raw.to_string(),
            entities: HashMap::new(),
            variations: vec![raw.to_string()],
        }
    }
}

/// A dataset registry record. The accession is globally unique and is the
/// dedup key: two records with the same accession are the same entity no
/// matter which search path produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Registry accession, e.g. `"GSE12345"`.
    pub accession: String,
    /// Record title.
    pub title: String,
    /// Free-text summary.
    pub summary: String,
    /// Organism, when the registry reports one.
    pub organism: Option<String>,
    /// Platform accession or name.
    pub platform: Option<String>,
    /// Number of samples in the dataset.
    pub sample_count: Option<u32>,
    /// Publication date in the registry, `YYYY-MM-DD`.
    pub published_at: Option<chrono::NaiveDate>,
}

/// External identifiers of a publication. At least one is populated on any
/// record a backend returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationIds {
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
}

impl PublicationIds {
    /// True if `self` and `other` share any non-empty identifier.
    pub fn matches(&self, other: &Self) -> bool {
        fn eq(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(x), Some(y)) => !x.is_empty() && x == y,
                _ => false,
            }
        }
        eq(&self.doi, &other.doi) || eq(&self.pmid, &other.pmid) || eq(&self.pmcid, &other.pmcid)
    }

    /// True when no identifier is set.
    pub fn is_empty(&self) -> bool {
        self.doi.is_none() && self.pmid.is_none() && self.pmcid.is_none()
    }

    /// A stable identifier string for deterministic ordering: the first of
    /// doi/pmid/pmcid that is populated.
    pub fn best(&self) -> &str {
        self.doi
            .as_deref()
            .or(self.pmid.as_deref())
            .or(self.pmcid.as_deref())
            .unwrap_or("")
    }
}

/// A bibliographic record from one of the publication backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    /// External identifiers; at least one populated.
    pub ids: PublicationIds,
    /// Article title.
    pub title: String,
    /// Abstract text, when the source provides it.
    pub abstract_text: Option<String>,
    /// Author names as reported by the source.
    pub authors: Vec<String>,
    /// Publication year.
    pub year: Option<i32>,
    /// Citation count; 0 when the source does not track citations.
    pub citation_count: u32,
    /// Name of the backend that produced this record.
    pub source: String,
    /// Dataset accessions mentioned in the title/abstract, filled by the
    /// hybrid merger.
    pub referenced_dataset_ids: Vec<String>,
}

/// A result paired with its ranking score. Scores are only meaningful for
/// ordering within one list, never across result kinds.
#[derive(Debug, Clone)]
pub struct RankedResult<T> {
    pub item: T,
    pub score: f64,
}

/// The answer to one `search` call. Serialisable because it is also the
/// cache payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The effective routing used.
    pub search_type: SearchType,
    /// The optimizer output, when an optimizer ran.
    pub optimized_query: Option<OptimizedQuery>,
    /// Deduplicated dataset records, backend relevance order.
    pub datasets: Vec<DatasetRecord>,
    /// Deduplicated publications, ranked by score.
    pub publications: Vec<Publication>,
    /// `datasets.len() + publications.len()`.
    pub total_results: usize,
    /// Whether this response was served from cache.
    pub cache_hit: bool,
    /// Wall-clock time of the search.
    pub search_time_ms: u64,
    /// Non-fatal backend failures. Never raised as errors to the caller.
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_publication(doi: Option<&str>, pmid: Option<&str>) -> Publication {
        Publication {
            ids: PublicationIds {
                doi: doi.map(String::from),
                pmid: pmid.map(String::from),
                pmcid: None,
            },
            title: "Test".into(),
            abstract_text: None,
            authors: vec![],
            year: Some(2021),
            citation_count: 0,
            source: "pubmed".into(),
            referenced_dataset_ids: vec![],
        }
    }

    #[test]
    fn search_type_names_are_stable() {
        assert_eq!(SearchType::Identifier.name(), "identifier");
        assert_eq!(SearchType::DatasetText.name(), "dataset_text");
        assert_eq!(SearchType::Publication.name(), "publication");
        assert_eq!(SearchType::Hybrid.name(), "hybrid");
    }

    #[test]
    fn requested_type_defaults_to_auto() {
        assert_eq!(RequestedType::default(), RequestedType::Auto);
    }

    #[test]
    fn empty_filters_report_empty() {
        assert!(QueryFilters::default().is_empty());
        let filters = QueryFilters {
            organism: Some("Homo sapiens".into()),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }

    #[test]
    fn ids_match_on_shared_pmid() {
        let a = make_publication(Some("10.1/a"), Some("111"));
        let b = make_publication(Some("10.1/b"), Some("111"));
        assert!(a.ids.matches(&b.ids));
    }

    #[test]
    fn ids_do_not_match_when_disjoint() {
        let a = make_publication(Some("10.1/a"), None);
        let b = make_publication(Some("10.1/b"), Some("111"));
        assert!(!a.ids.matches(&b.ids));
    }

    #[test]
    fn empty_id_strings_never_match() {
        let a = PublicationIds {
            doi: Some(String::new()),
            ..Default::default()
        };
        let b = PublicationIds {
            doi: Some(String::new()),
            ..Default::default()
        };
        assert!(!a.matches(&b));
    }

    #[test]
    fn best_id_prefers_doi() {
        let ids = PublicationIds {
            doi: Some("10.1/x".into()),
            pmid: Some("222".into()),
            pmcid: None,
        };
        assert_eq!(ids.best(), "10.1/x");
        let ids = PublicationIds {
            doi: None,
            pmid: Some("222".into()),
            pmcid: Some("PMC9".into()),
        };
        assert_eq!(ids.best(), "222");
    }

    #[test]
    fn passthrough_keeps_raw_text() {
        let opt = OptimizedQuery::passthrough("breast cancer");
        assert_eq!(opt.expanded_text, "breast cancer");
        assert_eq!(opt.variations, vec!["breast cancer".to_string()]);
        assert!(opt.entities.is_empty());
    }

    #[test]
    fn search_response_serde_round_trip() {
        let response = SearchResponse {
            search_type: SearchType::Hybrid,
            optimized_query: Some(OptimizedQuery::passthrough("q")),
            datasets: vec![DatasetRecord {
                accession: "GSE12345".into(),
                title: "A dataset".into(),
                summary: "Summary".into(),
                organism: Some("Homo sapiens".into()),
                platform: Some("GPL570".into()),
                sample_count: Some(12),
                published_at: chrono::NaiveDate::from_ymd_opt(2020, 1, 15),
            }],
            publications: vec![make_publication(Some("10.1/a"), Some("111"))],
            total_results: 2,
            cache_hit: false,
            search_time_ms: 42,
            errors: vec!["europepmc: timeout".into()],
        };
        let json = serde_json::to_string(&response).expect("serialize");
        let decoded: SearchResponse = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.total_results, 2);
        assert_eq!(decoded.datasets[0].accession, "GSE12345");
        assert_eq!(decoded.search_type, SearchType::Hybrid);
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn search_query_new_defaults() {
        let query = SearchQuery::new("GSE12345");
        assert_eq!(query.raw_text, "GSE12345");
        assert_eq!(query.max_results, 20);
        assert_eq!(query.requested_type, RequestedType::Auto);
        assert!(query.filters.is_empty());
    }
}
