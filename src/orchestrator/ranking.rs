//! Publication scoring: query overlap, recency, and citation impact.
//!
//! The score is a weighted sum of four signals (see
//! [`crate::config::RankingWeights`]). Raw citation counts span 0 to
//! 30,000+; unbounded linear scaling would let a handful of foundational
//! papers dominate every result set regardless of topical relevance, so
//! each decade of citations contributes progressively less. Dataset
//! records lack comparable signals and are never re-scored; they keep
//! backend relevance order.

use crate::config::RankingWeights;
use crate::types::{Publication, RankedResult};
use std::collections::HashSet;

/// Recency score assigned when a publication has no date at all.
pub const RECENCY_MISSING: f64 = 0.3;

/// Ceiling of the logarithmic citation component, kept fractionally below
/// 1 so the citation term never fully saturates.
const MAX_LOG_COMPONENT: f64 = 0.99;

/// Sub-linear citation impact in `[0, 1)`.
///
/// - `0` citations → 0
/// - linear up to 100 citations (0.60 at 100)
/// - square-root growth up to 1000 (0.80 at 1000)
/// - logarithmic beyond, approaching but never reaching 1.0
///
/// Monotonic non-decreasing over the whole range.
pub fn citation_score(citations: u32) -> f64 {
    let c = citations as f64;
    if citations == 0 {
        0.0
    } else if c <= 100.0 {
        0.60 * (c / 100.0)
    } else if c <= 1000.0 {
        0.60 + 0.20 * ((c - 100.0) / 900.0).sqrt()
    } else {
        let log_component = ((c.log10() - 3.0) / 2.0).clamp(0.0, MAX_LOG_COMPONENT);
        0.80 + 0.20 * log_component
    }
}

/// Recency score: bonus up to 1.3 for work at most two years old, then
/// exponential decay with a floor of 0.1. Negative ages (future dates)
/// are clamped to 0, not rejected.
pub fn recency_score(age_years: f64) -> f64 {
    let age = age_years.max(0.0);
    if age <= 2.0 {
        1.0 + 0.3 * (2.0 - age) / 2.0
    } else {
        (-age / 5.0).exp().clamp(0.1, 1.0)
    }
}

/// Fraction of query tokens present in `text`, in `[0, 1]`.
fn token_overlap(query_tokens: &HashSet<String>, text: &str) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens = tokenize(text);
    let hits = query_tokens
        .iter()
        .filter(|token| text_tokens.contains(*token))
        .count();
    hits as f64 / query_tokens.len() as f64
}

/// Score one publication against the query. Pure; never fails.
pub fn score_publication(
    publication: &Publication,
    query_tokens: &HashSet<String>,
    weights: &RankingWeights,
    now_year: i32,
) -> f64 {
    let title = token_overlap(query_tokens, &publication.title);
    let abstract_match = publication
        .abstract_text
        .as_deref()
        .map(|text| token_overlap(query_tokens, text))
        .unwrap_or(0.0);
    let recency = match publication.year {
        Some(year) => recency_score((now_year - year) as f64),
        None => RECENCY_MISSING,
    };
    let citation = citation_score(publication.citation_count);

    weights.title_match * title
        + weights.abstract_match * abstract_match
        + weights.recency * recency
        + weights.citation * citation
}

/// Rank publications by descending score.
///
/// Ties break on descending citation count, then on the identifier string,
/// so the final order is fully deterministic for fixed inputs.
pub fn rank_publications(
    publications: Vec<Publication>,
    query_text: &str,
    weights: &RankingWeights,
    now_year: i32,
) -> Vec<Publication> {
    let query_tokens = tokenize(query_text);

    let mut ranked: Vec<RankedResult<Publication>> = publications
        .into_iter()
        .map(|publication| {
            let score = score_publication(&publication, &query_tokens, weights, now_year);
            RankedResult {
                item: publication,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.item.citation_count.cmp(&a.item.citation_count))
            .then_with(|| a.item.ids.best().cmp(b.item.ids.best()))
    });

    ranked.into_iter().map(|r| r.item).collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}
