//! Query optimizer seam.
//!
//! The entity-extraction/synonym-expansion service is an external
//! collaborator; the pipeline only depends on this trait and on the
//! fallback rule: any failure or timeout degrades to the unmodified query
//! via [`OptimizedQuery::passthrough`].

use crate::error::Result;
use crate::types::OptimizedQuery;
use async_trait::async_trait;

/// An external query expansion service.
///
/// Implementations may call out to an NLP service; the pipeline bounds the
/// call with a timeout and treats every failure as non-fatal.
#[async_trait]
pub trait QueryOptimizer: Send + Sync {
    /// Expand or annotate the raw query text.
    async fn optimize(&self, raw_text: &str) -> Result<OptimizedQuery>;
}

/// An optimizer that performs no expansion. Useful as a default and in
/// tests; equivalent to running the pipeline without an optimizer.
pub struct NoopOptimizer;

#[async_trait]
impl QueryOptimizer for NoopOptimizer {
    async fn optimize(&self, raw_text: &str) -> Result<OptimizedQuery> {
        Ok(OptimizedQuery::passthrough(raw_text))
    }
}
