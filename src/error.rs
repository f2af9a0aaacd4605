//! Error types for the bioseek crate.
//!
//! Only [`SearchError::InvalidQuery`] ever reaches callers of the pipeline's
//! `search` entry point; every other variant is recovered internally and
//! surfaced, at most, as a message in `SearchResponse::errors`.

/// Errors that can occur during federated search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query itself is unusable (empty text, zero result limit).
    /// This is the only error the pipeline returns to its caller.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A search backend failed (network, rate limit, malformed response).
    #[error("backend error: {0}")]
    Backend(String),

    /// A bounded call exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The result cache could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),

    /// A backend response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid pipeline configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for bioseek results.
pub type Result<T> = std::result::Result<T, SearchError>;
