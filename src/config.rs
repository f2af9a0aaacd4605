//! Pipeline configuration with sensible defaults.
//!
//! [`SearchConfig`] controls timeouts, cache TTL tiers, the ranking weights,
//! and backend politeness. The defaults are tuned for the public NCBI and
//! Europe PMC endpoints, which are rate-limited but reliable.

use crate::error::SearchError;
use crate::types::SearchType;
use std::time::Duration;

/// Weights of the publication ranking formula. They need not sum to 1.0,
/// but the defaults do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    /// Weight of query-token overlap with the title.
    pub title_match: f64,
    /// Weight of query-token overlap with the abstract.
    pub abstract_match: f64,
    /// Weight of the recency score.
    pub recency: f64,
    /// Weight of the citation score.
    pub citation: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            title_match: 0.40,
            abstract_match: 0.30,
            recency: 0.20,
            citation: 0.10,
        }
    }
}

/// Configuration for the search pipeline.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default maximum results per result kind when a query does not say.
    pub max_results: usize,
    /// Per-backend call timeout in seconds.
    pub backend_timeout_secs: u64,
    /// Query optimizer call timeout in seconds.
    pub optimizer_timeout_secs: u64,
    /// Per-accession fetch timeout during hybrid merge, in seconds.
    pub hybrid_fetch_timeout_secs: u64,
    /// Cache TTL for identifier-direct lookups, in seconds. Accession
    /// metadata is stable, so this tier is long (default 30 days).
    pub identifier_ttl_secs: u64,
    /// Cache TTL for free-text searches, in seconds. Relevance judgments
    /// and newly indexed records change fast, so this tier is short
    /// (default 6 hours).
    pub text_ttl_secs: u64,
    /// Random delay range in milliseconds `(min, max)` between successive
    /// HTTP calls inside one backend. Keeps request rates under the public
    /// endpoints' limits.
    pub request_jitter_ms: (u64, u64),
    /// Publication ranking weights.
    pub ranking: RankingWeights,
    /// Consecutive failures before a backend's circuit trips open.
    pub breaker_failure_threshold: u32,
    /// Seconds a tripped backend stays open before a probe is allowed.
    pub breaker_cooldown_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            backend_timeout_secs: 10,
            optimizer_timeout_secs: 3,
            hybrid_fetch_timeout_secs: 5,
            identifier_ttl_secs: 30 * 24 * 3600,
            text_ttl_secs: 6 * 3600,
            request_jitter_ms: (50, 200),
            ranking: RankingWeights::default(),
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 60,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.backend_timeout_secs == 0 {
            return Err(SearchError::Config(
                "backend_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.optimizer_timeout_secs == 0 {
            return Err(SearchError::Config(
                "optimizer_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.hybrid_fetch_timeout_secs == 0 {
            return Err(SearchError::Config(
                "hybrid_fetch_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.identifier_ttl_secs == 0 || self.text_ttl_secs == 0 {
            return Err(SearchError::Config(
                "cache TTLs must be greater than 0".into(),
            ));
        }
        if self.request_jitter_ms.0 > self.request_jitter_ms.1 {
            return Err(SearchError::Config(
                "request_jitter_ms min must be <= max".into(),
            ));
        }
        let w = &self.ranking;
        let weights = [w.title_match, w.abstract_match, w.recency, w.citation];
        if weights.iter().any(|v| *v < 0.0 || !v.is_finite()) {
            return Err(SearchError::Config(
                "ranking weights must be finite and non-negative".into(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(SearchError::Config(
                "at least one ranking weight must be positive".into(),
            ));
        }
        Ok(())
    }

    /// TTL tier for a cached result of the given search type.
    ///
    /// Identifier-direct lookups return stable registry metadata and cache
    /// for a long time; every free-text mode uses the short tier.
    pub fn ttl_for(&self, search_type: SearchType) -> Duration {
        match search_type {
            SearchType::Identifier => Duration::from_secs(self.identifier_ttl_secs),
            SearchType::DatasetText | SearchType::Publication | SearchType::Hybrid => {
                Duration::from_secs(self.text_ttl_secs)
            }
        }
    }

    /// Per-backend call timeout as a [`Duration`].
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Optimizer call timeout as a [`Duration`].
    pub fn optimizer_timeout(&self) -> Duration {
        Duration::from_secs(self.optimizer_timeout_secs)
    }

    /// Hybrid per-fetch timeout as a [`Duration`].
    pub fn hybrid_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.hybrid_fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_results, 20);
        assert_eq!(config.backend_timeout_secs, 10);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = RankingWeights::default();
        let sum = w.title_match + w.abstract_match + w.recency + w.citation;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_max_results_rejected() {
        let config = SearchConfig {
            max_results: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_results"));
    }

    #[test]
    fn zero_backend_timeout_rejected() {
        let config = SearchConfig {
            backend_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend_timeout"));
    }

    #[test]
    fn zero_ttl_rejected() {
        let config = SearchConfig {
            text_ttl_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TTL"));
    }

    #[test]
    fn inverted_jitter_range_rejected() {
        let config = SearchConfig {
            request_jitter_ms: (500, 100),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jitter"));
    }

    #[test]
    fn negative_weight_rejected() {
        let config = SearchConfig {
            ranking: RankingWeights {
                title_match: -0.1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn all_zero_weights_rejected() {
        let config = SearchConfig {
            ranking: RankingWeights {
                title_match: 0.0,
                abstract_match: 0.0,
                recency: 0.0,
                citation: 0.0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn identifier_ttl_is_the_long_tier() {
        let config = SearchConfig::default();
        let long = config.ttl_for(SearchType::Identifier);
        let short = config.ttl_for(SearchType::Hybrid);
        assert!(long > short);
        assert_eq!(long, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(short, Duration::from_secs(6 * 3600));
    }

    #[test]
    fn all_text_modes_share_the_short_tier() {
        let config = SearchConfig::default();
        let expected = Duration::from_secs(config.text_ttl_secs);
        assert_eq!(config.ttl_for(SearchType::DatasetText), expected);
        assert_eq!(config.ttl_for(SearchType::Publication), expected);
        assert_eq!(config.ttl_for(SearchType::Hybrid), expected);
    }
}
