//! Shared HTTP client construction for backend requests.
//!
//! All backends talk to public JSON APIs that ask clients to identify
//! themselves and stay under per-second rate limits, so the client carries
//! a descriptive User-Agent and backends spread successive calls with a
//! small random jitter.

use crate::error::SearchError;
use rand::Rng;
use std::time::Duration;

/// Descriptive User-Agent sent with every backend request.
const USER_AGENT: &str = concat!("bioseek/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] configured for polite API access.
///
/// The client has:
/// - Timeout from `timeout_secs`
/// - A descriptive tool User-Agent
/// - Gzip and brotli decompression
///
/// # Errors
///
/// Returns [`SearchError::Backend`] if the client cannot be constructed.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Backend(format!("failed to build HTTP client: {e}")))
}

/// Pick a random delay inside the configured jitter range.
///
/// Backends sleep this long between successive calls to the same endpoint
/// (e.g. esearch followed by esummary) so bursts stay under rate limits.
pub fn request_jitter(range_ms: (u64, u64)) -> Duration {
    let (min, max) = range_ms;
    if min >= max {
        return Duration::from_millis(min);
    }
    let ms = rand::thread_rng().gen_range(min..=max);
    Duration::from_millis(ms)
}
