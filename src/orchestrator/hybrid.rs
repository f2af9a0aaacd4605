//! Hybrid merge: fold dataset accessions mentioned in publication text
//! back into the dataset result set.
//!
//! Publications frequently cite the registry accessions of the data they
//! analysed; a free-text dataset search misses those records when the
//! registry entry itself is poorly described. The merger scans each
//! publication's title and abstract, then fetches any accession the
//! dataset backend has not already returned.

use crate::backend::SearchBackend;
use crate::types::{DatasetRecord, Publication};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

/// Registry accessions embedded in running text.
static ACCESSION_SCAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:GSE|GDS|GSM|GPL)\d{1,9}\b").expect("valid accession scan regex")
});

/// Scan title and abstract of every publication for registry accessions.
///
/// Fills each publication's `referenced_dataset_ids` (sorted, deduplicated,
/// uppercased) and returns the union across all publications. The returned
/// set is ordered, so downstream fetches run in a deterministic order.
pub fn extract_dataset_ids(publications: &mut [Publication]) -> BTreeSet<String> {
    let mut all_ids = BTreeSet::new();

    for publication in publications.iter_mut() {
        let mut found = BTreeSet::new();
        scan_into(&publication.title, &mut found);
        if let Some(abstract_text) = publication.abstract_text.as_deref() {
            scan_into(abstract_text, &mut found);
        }
        publication.referenced_dataset_ids = found.iter().cloned().collect();
        all_ids.extend(found);
    }

    all_ids
}

fn scan_into(text: &str, found: &mut BTreeSet<String>) {
    for m in ACCESSION_SCAN_RE.find_iter(text) {
        found.insert(m.as_str().to_uppercase());
    }
}

/// Fetch records for any accession not already present and return the
/// union with `existing`.
///
/// Fetches run concurrently, each bounded by `per_fetch_timeout`. An
/// accession that fails to fetch (error, timeout, or not found) is
/// skipped and logged; it never aborts the batch. The result still goes
/// through dataset dedup downstream.
pub async fn fetch_and_merge(
    ids: BTreeSet<String>,
    mut existing: Vec<DatasetRecord>,
    backend: &dyn SearchBackend,
    per_fetch_timeout: Duration,
) -> Vec<DatasetRecord> {
    let known: HashSet<String> = existing
        .iter()
        .map(|record| record.accession.to_uppercase())
        .collect();

    let missing: Vec<String> = ids.into_iter().filter(|id| !known.contains(id)).collect();
    if missing.is_empty() {
        return existing;
    }
    tracing::debug!(count = missing.len(), "fetching referenced dataset records");

    let fetches = missing.iter().map(|accession| async move {
        match tokio::time::timeout(per_fetch_timeout, backend.fetch_dataset(accession)).await {
            Ok(Ok(Some(record))) => Some(record),
            Ok(Ok(None)) => {
                tracing::debug!(%accession, "referenced accession not found in registry");
                None
            }
            Ok(Err(error)) => {
                tracing::warn!(%accession, %error, "referenced accession fetch failed, skipping");
                None
            }
            Err(_) => {
                tracing::warn!(%accession, "referenced accession fetch timed out, skipping");
                None
            }
        }
    });

    let fetched = join_all(fetches).await;
    existing.extend(fetched.into_iter().flatten());
    existing
}
