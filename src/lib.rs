//! # bioseek
//!
//! Federated search over biomedical research artifacts: one query, fanned
//! out to a structured dataset registry (NCBI GEO) and bibliographic
//! sources (PubMed, Europe PMC), merged into a single ranked, deduplicated
//! answer. Built for researchers who do not know in advance whether their
//! query names a dataset, a topic, or a paper.
//!
//! ## Design
//!
//! - Classifies each query (accession, dataset text, publication text, or
//!   hybrid) and dispatches only the backends that can answer it
//! - Queries backends concurrently with per-call timeouts; a failing or
//!   slow source degrades to an entry in `SearchResponse::errors`, never
//!   to a failed search
//! - Hybrid mode scans publication abstracts for registry accessions and
//!   folds the referenced datasets back into the result set
//! - Cross-source dedup: accession-exact for datasets, identifier +
//!   fuzzy-similarity for publications, keeping the most complete record
//! - Deterministic ranking from query overlap, recency, and sub-linear
//!   citation impact
//! - In-memory TTL cache tiered by volatility: accession lookups cache for
//!   a month, free-text results for hours
//! - Per-backend circuit breaker skips sources that keep failing
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> bioseek::Result<()> {
//! use bioseek::{SearchConfig, SearchPipeline, SearchQuery};
//!
//! let pipeline = SearchPipeline::with_default_backends(SearchConfig::default())?;
//! let response = pipeline.search(&SearchQuery::new("breast cancer methylation")).await?;
//! for dataset in &response.datasets {
//!     println!("{}: {}", dataset.accession, dataset.title);
//! }
//! for publication in &response.publications {
//!     println!("[{}] {}", publication.source, publication.title);
//! }
//! pipeline.close().await;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod backend;
pub mod backends;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod http;
pub mod optimizer;
pub mod orchestrator;
pub mod types;

pub use backend::{BackendKind, BackendResults, SearchBackend};
pub use cache::{MemoryCache, MetricsSnapshot, SearchCache};
pub use config::{RankingWeights, SearchConfig};
pub use error::{Result, SearchError};
pub use optimizer::QueryOptimizer;
pub use orchestrator::search::SearchPipeline;
pub use types::{
    DatasetRecord, OptimizedQuery, Publication, PublicationIds, QueryAnalysis, QueryFilters,
    RequestedType, SearchQuery, SearchResponse, SearchType,
};

use std::sync::Arc;

impl SearchPipeline {
    /// Build a pipeline over the bundled GEO, PubMed, and Europe PMC
    /// backends with an in-memory cache — the zero-configuration path.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid configuration, or
    /// [`SearchError::Backend`] when an HTTP client cannot be constructed.
    pub fn with_default_backends(config: SearchConfig) -> Result<Self> {
        let dataset = Arc::new(backends::GeoBackend::new(&config)?);
        let publication_backends: Vec<Arc<dyn SearchBackend>> = vec![
            Arc::new(backends::PubMedBackend::new(&config)?),
            Arc::new(backends::EuropePmcBackend::new(&config)?),
        ];
        Self::new(
            dataset,
            publication_backends,
            Arc::new(MemoryCache::new()),
            config,
        )
    }
}
