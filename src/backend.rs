//! Trait definition for pluggable search backends.
//!
//! One implementation exists per external source (the GEO dataset registry,
//! PubMed, Europe PMC). The orchestrator depends only on this trait, so
//! tests substitute mock backends freely.

use crate::error::Result;
use crate::types::{DatasetRecord, Publication, QueryFilters};
use async_trait::async_trait;

/// Which result kind a backend produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Returns [`DatasetRecord`]s from an accession-keyed registry.
    Dataset,
    /// Returns [`Publication`]s from a bibliographic index.
    Publication,
}

/// Results from one backend call; the variant always matches the backend's
/// [`BackendKind`].
#[derive(Debug, Clone)]
pub enum BackendResults {
    Datasets(Vec<DatasetRecord>),
    Publications(Vec<Publication>),
}

impl BackendResults {
    /// Number of records in either variant.
    pub fn len(&self) -> usize {
        match self {
            Self::Datasets(records) => records.len(),
            Self::Publications(records) => records.len(),
        }
    }

    /// True when the call returned nothing. Zero results is not an error.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A pluggable search backend over one external source.
///
/// Each implementation owns its HTTP client and rate-limit behaviour and
/// is independently fallible: the orchestrator treats a backend error as a
/// partial failure of the search, never as a pipeline failure.
///
/// All implementations must be `Send + Sync` for concurrent dispatch.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short stable name used in logs, error messages, and the circuit
    /// breaker, e.g. `"geo"` or `"pubmed"`.
    fn name(&self) -> &str;

    /// The result kind this backend produces.
    fn kind(&self) -> BackendKind;

    /// Run a free-text search, returning at most `max_results` records.
    ///
    /// Dataset backends translate `filters` into source-side qualifiers;
    /// publication backends ignore them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError`] on network, rate-limit, or parse
    /// failures. An empty result set is `Ok`.
    async fn search(
        &self,
        query: &str,
        filters: &QueryFilters,
        max_results: usize,
    ) -> Result<BackendResults>;

    /// Fetch a single dataset record by accession.
    ///
    /// Only meaningful on [`BackendKind::Dataset`] backends, which override
    /// this; the default returns `Ok(None)`. `Ok(None)` means the accession
    /// does not exist in the registry.
    async fn fetch_dataset(&self, accession: &str) -> Result<Option<DatasetRecord>> {
        let _ = accession;
        Ok(None)
    }
}
