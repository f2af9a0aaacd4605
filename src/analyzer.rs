//! Query classification: decide how a raw query routes across backends.
//!
//! Pure string analysis, no I/O, never fails. The matchers run in order:
//! exact accession → cue-word scoring → hybrid default. The hybrid default
//! favours recall: dataset records are often under-described, and the
//! publications that mention them supply the missing identifiers.

use crate::types::{QueryAnalysis, RequestedType, SearchType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Confidence assigned to an exact accession match.
const IDENTIFIER_CONFIDENCE: f64 = 1.0;

/// Confidence of the hybrid fallback when no strong signal exists.
const HYBRID_CONFIDENCE: f64 = 0.6;

/// Minimum cue hits on one side, and the margin over the other side,
/// required before a free-text query is routed to a single backend kind.
const CUE_STRONG_SIGNAL: usize = 2;

/// A query consisting solely of a GEO-style accession.
static ACCESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(GSE|GDS|GSM|GPL)\d{1,9}$").expect("valid accession regex"));

/// Vocabulary that signals a dataset-registry search.
const DATASET_CUES: &[&str] = &[
    "dataset",
    "datasets",
    "expression profiling",
    "rna-seq",
    "rnaseq",
    "scrna-seq",
    "microarray",
    "chip-seq",
    "atac-seq",
    "methylation array",
    "samples",
    "series",
    "platform",
    "transcriptome",
    "geo accession",
    "raw counts",
];

/// Vocabulary that signals a bibliographic search.
const PUBLICATION_CUES: &[&str] = &[
    "paper",
    "papers",
    "publication",
    "article",
    "articles",
    "author",
    "authors",
    "journal",
    "cited",
    "citations",
    "review",
    "meta-analysis",
    "clinical trial",
    "doi",
    "pubmed",
    "published",
];

/// Classify a raw query string.
///
/// # Matchers, in order
///
/// 1. Whole-query accession match → [`SearchType::Identifier`], confidence 1.0
/// 2. Cue-word scoring: whichever vocabulary (dataset vs bibliographic) hits
///    at least [`CUE_STRONG_SIGNAL`] times *and* leads the other side →
///    that type, confidence in `[0.5, 0.9]` growing with the hit count
/// 3. Otherwise → [`SearchType::Hybrid`], confidence 0.6
///
/// Unrecognised or empty input degrades to `Hybrid`; this function never
/// fails.
pub fn analyze(raw_text: &str) -> QueryAnalysis {
    let trimmed = raw_text.trim();

    if ACCESSION_RE.is_match(trimmed) {
        return QueryAnalysis {
            search_type: SearchType::Identifier,
            confidence: IDENTIFIER_CONFIDENCE,
        };
    }

    let lowered = trimmed.to_lowercase();
    let dataset_hits = count_cues(&lowered, DATASET_CUES);
    let publication_hits = count_cues(&lowered, PUBLICATION_CUES);

    if dataset_hits >= CUE_STRONG_SIGNAL && dataset_hits > publication_hits {
        return QueryAnalysis {
            search_type: SearchType::DatasetText,
            confidence: cue_confidence(dataset_hits),
        };
    }
    if publication_hits >= CUE_STRONG_SIGNAL && publication_hits > dataset_hits {
        return QueryAnalysis {
            search_type: SearchType::Publication,
            confidence: cue_confidence(publication_hits),
        };
    }

    QueryAnalysis {
        search_type: SearchType::Hybrid,
        confidence: HYBRID_CONFIDENCE,
    }
}

/// Resolve the caller's requested type against the analyzer.
///
/// `Auto` defers to [`analyze`]; an explicit request is honoured verbatim
/// with full confidence.
pub fn resolve(requested: RequestedType, raw_text: &str) -> QueryAnalysis {
    let forced = match requested {
        RequestedType::Auto => return analyze(raw_text),
        RequestedType::Identifier => SearchType::Identifier,
        RequestedType::DatasetText => SearchType::DatasetText,
        RequestedType::Publication => SearchType::Publication,
        RequestedType::Hybrid => SearchType::Hybrid,
    };
    QueryAnalysis {
        search_type: forced,
        confidence: 1.0,
    }
}

/// Count how many cues from `vocabulary` occur in the lowered query.
fn count_cues(lowered: &str, vocabulary: &[&str]) -> usize {
    vocabulary.iter().filter(|cue| lowered.contains(*cue)).count()
}

/// Map a cue hit count to a confidence in `[0.5, 0.9]`.
fn cue_confidence(hits: usize) -> f64 {
    (0.5 + 0.1 * hits as f64).min(0.9)
}
