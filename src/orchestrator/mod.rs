//! Search orchestration: classification, fan-out, hybrid merge, dedup,
//! ranking, and the tiered cache around it all.
//!
//! [`search::SearchPipeline`] composes the pieces; the submodules stay
//! pure and independently testable.

pub mod dedup;
pub mod hybrid;
pub mod ranking;
pub mod search;
