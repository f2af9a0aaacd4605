//! The search pipeline: cache check, classification, optimization,
//! concurrent backend fan-out, hybrid merge, dedup, rank, cache write.
//!
//! # State machine
//!
//! ```text
//! RECEIVED → CACHE_CHECK → (hit → DONE)
//!                        → ANALYZING → OPTIMIZING → DISPATCHING
//!                        → MERGING (hybrid only) → DEDUPING → RANKING
//!                        → CACHING → DONE
//! ```
//!
//! Every transition is logged at debug with the query type and elapsed
//! time. The terminal state is always reached: a backend that exceeds its
//! timeout is treated as failed for this request, never retried within the
//! same call, and the caller still gets a response. Only invalid input
//! returns an error.

use crate::analyzer;
use crate::backend::{BackendKind, BackendResults, SearchBackend};
use crate::cache::{cache_key, MetricsSnapshot, SearchCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::optimizer::QueryOptimizer;
use crate::orchestrator::{dedup, hybrid, ranking};
use crate::types::{
    DatasetRecord, OptimizedQuery, Publication, SearchQuery, SearchResponse, SearchType,
};
use chrono::Datelike;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::timeout;

/// The federated search pipeline.
///
/// Owns every shared handle (cache, circuit breaker, backend clients)
/// with construct-once, close-on-shutdown lifecycles; there is no
/// process-global state. One instance serves concurrent `search` calls.
pub struct SearchPipeline {
    dataset_backend: Arc<dyn SearchBackend>,
    publication_backends: Vec<Arc<dyn SearchBackend>>,
    optimizer: Option<Arc<dyn QueryOptimizer>>,
    cache: Arc<dyn SearchCache>,
    breaker: Mutex<CircuitBreaker>,
    config: SearchConfig,
}

impl SearchPipeline {
    /// Build a pipeline over explicit backends and cache.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] when the configuration is invalid
    /// or a backend is wired to the wrong slot.
    pub fn new(
        dataset_backend: Arc<dyn SearchBackend>,
        publication_backends: Vec<Arc<dyn SearchBackend>>,
        cache: Arc<dyn SearchCache>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        if dataset_backend.kind() != BackendKind::Dataset {
            return Err(SearchError::Config(format!(
                "backend '{}' is not a dataset backend",
                dataset_backend.name()
            )));
        }
        if let Some(wrong) = publication_backends
            .iter()
            .find(|b| b.kind() != BackendKind::Publication)
        {
            return Err(SearchError::Config(format!(
                "backend '{}' is not a publication backend",
                wrong.name()
            )));
        }
        if publication_backends.is_empty() {
            return Err(SearchError::Config(
                "at least one publication backend is required".into(),
            ));
        }

        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            cooldown_secs: config.breaker_cooldown_secs,
        });

        Ok(Self {
            dataset_backend,
            publication_backends,
            optimizer: None,
            cache,
            breaker: Mutex::new(breaker),
            config,
        })
    }

    /// Attach a query optimizer. Optional; without one the raw query text
    /// is dispatched unchanged.
    pub fn with_optimizer(mut self, optimizer: Arc<dyn QueryOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// Execute one federated search.
    ///
    /// Always produces a response — possibly with zero results and a
    /// populated `errors` list — except for invalid input, which fails
    /// fast with [`SearchError::InvalidQuery`].
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let started = Instant::now();

        let raw = query.raw_text.trim();
        if raw.is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".into()));
        }
        if query.max_results == 0 {
            return Err(SearchError::InvalidQuery(
                "max_results must be greater than 0".into(),
            ));
        }

        // Classification is pure, so it also feeds the cache key.
        let analysis = analyzer::resolve(query.requested_type, raw);
        let search_type = analysis.search_type;
        self.log_state("received", search_type, &started);

        // CACHE_CHECK
        let key = cache_key(raw, search_type, &query.filters);
        if let Some(mut cached) = self.cache_lookup(&key).await {
            cached.cache_hit = true;
            cached.search_time_ms = started.elapsed().as_millis() as u64;
            self.log_state("cache_hit", search_type, &started);
            return Ok(cached);
        }
        self.log_state("analyzing", search_type, &started);
        tracing::debug!(
            query_type = %search_type,
            confidence = analysis.confidence,
            "query classified"
        );

        // OPTIMIZING
        self.log_state("optimizing", search_type, &started);
        let optimized = self.run_optimizer(raw).await;
        let dispatch_text = optimized
            .as_ref()
            .map(|o| o.expanded_text.clone())
            .unwrap_or_else(|| raw.to_string());

        // DISPATCHING
        self.log_state("dispatching", search_type, &started);
        let mut errors: Vec<String> = Vec::new();
        let (mut datasets, mut publications) = match search_type {
            SearchType::Identifier => {
                let datasets = self.identifier_lookup(raw, query, &mut errors).await;
                (datasets, Vec::new())
            }
            _ => {
                self.fan_out(search_type, &dispatch_text, query, &mut errors)
                    .await
            }
        };

        // MERGING — hybrid only: fold referenced accessions into datasets.
        if search_type == SearchType::Hybrid {
            self.log_state("merging", search_type, &started);
            let referenced = hybrid::extract_dataset_ids(&mut publications);
            if !referenced.is_empty() {
                datasets = hybrid::fetch_and_merge(
                    referenced,
                    datasets,
                    self.dataset_backend.as_ref(),
                    self.config.hybrid_fetch_timeout(),
                )
                .await;
            }
        }

        // DEDUPING
        self.log_state("deduping", search_type, &started);
        let mut datasets = dedup::dedup_datasets(datasets);
        let publications = dedup::dedup_publications(publications);

        // RANKING — publications only; datasets keep backend order.
        self.log_state("ranking", search_type, &started);
        let now_year = chrono::Utc::now().year();
        let mut publications =
            ranking::rank_publications(publications, raw, &self.config.ranking, now_year);
        datasets.truncate(query.max_results);
        publications.truncate(query.max_results);

        let response = SearchResponse {
            search_type,
            optimized_query: optimized,
            total_results: datasets.len() + publications.len(),
            datasets,
            publications,
            cache_hit: false,
            search_time_ms: started.elapsed().as_millis() as u64,
            errors,
        };

        // CACHING — fire-and-forget; a write failure never delays or
        // fails the response.
        self.log_state("caching", search_type, &started);
        self.spawn_cache_write(key, &response);

        self.log_state("done", search_type, &started);
        Ok(response)
    }

    /// Current cache counter values.
    pub fn cache_metrics(&self) -> MetricsSnapshot {
        self.cache.metrics()
    }

    /// Shut the pipeline down: close the cache (which logs its final
    /// metrics) and report backend health.
    pub async fn close(&self) {
        for (backend, state, failures) in self.lock_breaker().health_report() {
            tracing::debug!(%backend, ?state, failures, "backend health at shutdown");
        }
        self.cache.close().await;
    }

    fn log_state(&self, state: &str, search_type: SearchType, started: &Instant) {
        tracing::debug!(
            state,
            query_type = %search_type,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline state"
        );
    }

    fn lock_breaker(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        // A poisoned lock only means another thread panicked mid-update;
        // breaker state is always safe to reuse.
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cache read; every failure degrades to a miss.
    async fn cache_lookup(&self, key: &str) -> Option<SearchResponse> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<SearchResponse>(&bytes) {
                Ok(response) => Some(response),
                Err(error) => {
                    tracing::warn!(%error, "cached payload undecodable, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Bounded optimizer call; failure or timeout falls back to the
    /// unmodified query.
    async fn run_optimizer(&self, raw: &str) -> Option<OptimizedQuery> {
        let optimizer = self.optimizer.as_ref()?;
        match timeout(self.config.optimizer_timeout(), optimizer.optimize(raw)).await {
            Ok(Ok(optimized)) => Some(optimized),
            Ok(Err(error)) => {
                tracing::warn!(%error, "query optimizer failed, using raw query");
                Some(OptimizedQuery::passthrough(raw))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.optimizer_timeout_secs,
                    "query optimizer timed out, using raw query"
                );
                Some(OptimizedQuery::passthrough(raw))
            }
        }
    }

    /// Identifier path: direct accession fetch against the dataset
    /// backend, falling back to an accession-text search when the direct
    /// fetch finds nothing.
    async fn identifier_lookup(
        &self,
        raw: &str,
        query: &SearchQuery,
        errors: &mut Vec<String>,
    ) -> Vec<DatasetRecord> {
        let backend = &self.dataset_backend;
        let name = backend.name().to_string();

        if !self.lock_breaker().should_attempt(&name) {
            errors.push(format!("{name}: skipped, circuit open"));
            return Vec::new();
        }

        let accession = raw.to_uppercase();
        let deadline = self.config.backend_timeout();

        match timeout(deadline, backend.fetch_dataset(&accession)).await {
            Ok(Ok(Some(record))) => {
                self.lock_breaker().record_success(&name);
                vec![record]
            }
            Ok(Ok(None)) => {
                self.lock_breaker().record_success(&name);
                tracing::debug!(%accession, "direct lookup empty, falling back to search");
                match timeout(
                    deadline,
                    backend.search(&accession, &query.filters, query.max_results),
                )
                .await
                {
                    Ok(Ok(BackendResults::Datasets(records))) => records,
                    Ok(Ok(BackendResults::Publications(_))) => Vec::new(),
                    Ok(Err(error)) => {
                        self.lock_breaker().record_failure(&name);
                        errors.push(format!("{name}: {error}"));
                        Vec::new()
                    }
                    Err(_) => {
                        self.lock_breaker().record_failure(&name);
                        errors.push(format!(
                            "{name}: timed out after {}s",
                            self.config.backend_timeout_secs
                        ));
                        Vec::new()
                    }
                }
            }
            Ok(Err(error)) => {
                self.lock_breaker().record_failure(&name);
                errors.push(format!("{name}: {error}"));
                Vec::new()
            }
            Err(_) => {
                self.lock_breaker().record_failure(&name);
                errors.push(format!(
                    "{name}: timed out after {}s",
                    self.config.backend_timeout_secs
                ));
                Vec::new()
            }
        }
    }

    /// Concurrent fan-out to the backends selected by `search_type`, with
    /// a per-call timeout and an explicit join before merging. A slow or
    /// failing backend becomes an `errors` entry, never a lost result set.
    async fn fan_out(
        &self,
        search_type: SearchType,
        dispatch_text: &str,
        query: &SearchQuery,
        errors: &mut Vec<String>,
    ) -> (Vec<DatasetRecord>, Vec<Publication>) {
        let mut targets: Vec<Arc<dyn SearchBackend>> = match search_type {
            SearchType::DatasetText => vec![Arc::clone(&self.dataset_backend)],
            SearchType::Publication => self.publication_backends.iter().map(Arc::clone).collect(),
            SearchType::Hybrid => {
                let mut all = vec![Arc::clone(&self.dataset_backend)];
                all.extend(self.publication_backends.iter().map(Arc::clone));
                all
            }
            // Identifier requests never reach the fan-out path.
            SearchType::Identifier => Vec::new(),
        };

        // Gate through the circuit breaker before spending any time.
        {
            let mut breaker = self.lock_breaker();
            targets.retain(|backend| {
                if breaker.should_attempt(backend.name()) {
                    true
                } else {
                    errors.push(format!("{}: skipped, circuit open", backend.name()));
                    false
                }
            });
        }

        let deadline = self.config.backend_timeout();
        let fan_out = targets.iter().map(|backend| {
            let backend = Arc::clone(backend);
            let name = backend.name().to_string();
            let text = dispatch_text.to_string();
            let filters = query.filters.clone();
            let limit = query.max_results;
            async move {
                let outcome = timeout(deadline, backend.search(&text, &filters, limit)).await;
                (name, outcome)
            }
        });

        let mut datasets = Vec::new();
        let mut publications = Vec::new();
        let outcomes = join_all(fan_out).await;

        let mut breaker = self.lock_breaker();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(Ok(results)) => {
                    breaker.record_success(&name);
                    tracing::debug!(backend = %name, count = results.len(), "backend returned results");
                    match results {
                        BackendResults::Datasets(records) => datasets.extend(records),
                        BackendResults::Publications(records) => publications.extend(records),
                    }
                }
                Ok(Err(error)) => {
                    breaker.record_failure(&name);
                    tracing::warn!(backend = %name, %error, "backend query failed");
                    errors.push(format!("{name}: {error}"));
                }
                Err(_) => {
                    breaker.record_failure(&name);
                    tracing::warn!(
                        backend = %name,
                        timeout_secs = self.config.backend_timeout_secs,
                        "backend timed out"
                    );
                    errors.push(format!(
                        "{name}: timed out after {}s",
                        self.config.backend_timeout_secs
                    ));
                }
            }
        }

        (datasets, publications)
    }

    /// Serialize and write the response to the cache without blocking the
    /// caller. Identical concurrent misses may both write; last-write-wins
    /// is fine because payloads for one key derive from the same inputs.
    fn spawn_cache_write(&self, key: String, response: &SearchResponse) {
        let ttl = self.config.ttl_for(response.search_type);
        match serde_json::to_vec(response) {
            Ok(bytes) => {
                let cache = Arc::clone(&self.cache);
                tokio::spawn(async move {
                    if let Err(error) = cache.set(&key, bytes, ttl).await {
                        tracing::warn!(%error, "cache write failed");
                    }
                });
            }
            Err(error) => {
                tracing::warn!(%error, "response serialization for cache failed");
            }
        }
    }
}
