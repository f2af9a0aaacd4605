//! Cross-source result deduplication.
//!
//! Datasets dedup by accession alone — accessions are authoritative unique
//! identifiers, so no similarity heuristics apply. Publications need two
//! passes: exact identifier partitioning, then fuzzy matching over the
//! remainder, because the same article arrives from different indexes with
//! different identifier subsets. Among duplicates, the record with the most
//! populated significant fields survives.

use crate::types::{DatasetRecord, Publication};
use std::collections::{HashMap, HashSet};

/// Minimum title token similarity (Dice coefficient) for a fuzzy match.
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Minimum author-set overlap (Jaccard) for a fuzzy match.
pub const AUTHOR_OVERLAP_THRESHOLD: f64 = 0.80;

/// Maximum publication-year difference for a fuzzy match.
pub const MAX_YEAR_DELTA: i32 = 1;

/// Deduplicate dataset records by accession.
///
/// Single `O(n)` pass; the first occurrence wins and input order is
/// preserved. Idempotent: applying it twice changes nothing.
pub fn dedup_datasets(records: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for record in records {
        if seen.insert(record.accession.to_uppercase()) {
            kept.push(record);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, kept = kept.len(), "dropped duplicate dataset records");
    }
    kept
}

/// Deduplicate publications across sources.
///
/// Pass 1 groups records sharing any non-empty doi/pmid/pmcid (groups
/// bridged by a record carrying both identifiers are merged). Pass 2
/// fuzzy-merges the remaining singletons using [`is_same_publication`].
/// Each group keeps its most complete member per [`completeness_score`];
/// output order follows the first occurrence of each surviving group.
pub fn dedup_publications(publications: Vec<Publication>) -> Vec<Publication> {
    if publications.is_empty() {
        return publications;
    }
    let total = publications.len();

    // Pass 1: exact identifier partitioning.
    let mut groups: Vec<Vec<Publication>> = Vec::new();
    let mut id_index: HashMap<String, usize> = HashMap::new();

    for publication in publications {
        let keys = id_keys(&publication);
        let mut matched: Vec<usize> = keys
            .iter()
            .filter_map(|key| id_index.get(key).copied())
            .collect();
        matched.sort_unstable();
        matched.dedup();

        let target = match matched.first() {
            None => {
                groups.push(Vec::new());
                groups.len() - 1
            }
            Some(&first) => {
                // A record carrying several identifiers can bridge groups
                // formed earlier; fold them into the first.
                for &other in matched.iter().skip(1) {
                    let moved = std::mem::take(&mut groups[other]);
                    groups[first].extend(moved);
                    for index in id_index.values_mut() {
                        if *index == other {
                            *index = first;
                        }
                    }
                }
                first
            }
        };

        for key in keys {
            id_index.insert(key, target);
        }
        groups[target].push(publication);
    }
    groups.retain(|group| !group.is_empty());

    // Pass 2: fuzzy-merge the singletons left ungrouped by pass 1.
    let mut merged: Vec<(bool, Vec<Publication>)> = Vec::new();
    for group in groups {
        if group.len() > 1 {
            merged.push((false, group));
            continue;
        }
        let candidate = match group.into_iter().next() {
            Some(publication) => publication,
            None => continue,
        };
        let position = merged.iter().position(|(from_singleton, members)| {
            *from_singleton && is_same_publication(&members[0], &candidate)
        });
        match position {
            Some(index) => merged[index].1.push(candidate),
            None => merged.push((true, vec![candidate])),
        }
    }

    // Pick the most complete representative of every group.
    let kept: Vec<Publication> = merged
        .into_iter()
        .filter_map(|(_, members)| select_representative(members))
        .collect();

    let dropped = total - kept.len();
    if dropped > 0 {
        tracing::debug!(dropped, kept = kept.len(), "merged duplicate publications");
    }
    kept
}

/// Decide whether two publications are the same entity.
///
/// True when they share any non-empty identifier, or when title similarity,
/// author overlap, and year proximity all clear their thresholds. A missing
/// year on either side does not veto an otherwise strong match.
pub fn is_same_publication(a: &Publication, b: &Publication) -> bool {
    if a.ids.matches(&b.ids) {
        return true;
    }

    let year_compatible = match (a.year, b.year) {
        (Some(x), Some(y)) => (x - y).abs() <= MAX_YEAR_DELTA,
        _ => true,
    };

    year_compatible
        && title_similarity(&a.title, &b.title) >= TITLE_SIMILARITY_THRESHOLD
        && author_overlap(&a.authors, &b.authors) >= AUTHOR_OVERLAP_THRESHOLD
}

/// Count of populated significant fields, used to pick the representative
/// among duplicates: abstract, year, citations, each identifier, authors.
pub fn completeness_score(publication: &Publication) -> u32 {
    let mut score = 0;
    if publication
        .abstract_text
        .as_deref()
        .is_some_and(|a| !a.is_empty())
    {
        score += 1;
    }
    if publication.year.is_some() {
        score += 1;
    }
    if publication.citation_count > 0 {
        score += 1;
    }
    if publication.ids.doi.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 1;
    }
    if publication.ids.pmid.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 1;
    }
    if publication
        .ids
        .pmcid
        .as_deref()
        .is_some_and(|v| !v.is_empty())
    {
        score += 1;
    }
    if !publication.authors.is_empty() {
        score += 1;
    }
    score
}

/// Dice coefficient over lowercased word tokens, in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let shared = tokens_a.intersection(&tokens_b).count();
    (2.0 * shared as f64) / (tokens_a.len() + tokens_b.len()) as f64
}

/// Jaccard overlap of normalised author names, in `[0, 1]`.
///
/// Empty author lists cannot confirm an overlap, so either side being
/// empty yields 0.
pub fn author_overlap(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<String> = a.iter().map(|name| normalize_author(name)).collect();
    let set_b: HashSet<String> = b.iter().map(|name| normalize_author(name)).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let shared = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - shared;
    shared as f64 / union as f64
}

fn id_keys(publication: &Publication) -> Vec<String> {
    let ids = &publication.ids;
    let mut keys = Vec::with_capacity(3);
    if let Some(doi) = ids.doi.as_deref().filter(|v| !v.is_empty()) {
        keys.push(format!("doi:{doi}"));
    }
    if let Some(pmid) = ids.pmid.as_deref().filter(|v| !v.is_empty()) {
        keys.push(format!("pmid:{pmid}"));
    }
    if let Some(pmcid) = ids.pmcid.as_deref().filter(|v| !v.is_empty()) {
        keys.push(format!("pmcid:{pmcid}"));
    }
    keys
}

/// Keep the member with the highest completeness score; on ties the
/// earliest occurrence wins, keeping the output deterministic.
fn select_representative(members: Vec<Publication>) -> Option<Publication> {
    let mut best_index = 0;
    let mut best_score = 0;
    for (index, member) in members.iter().enumerate() {
        let score = completeness_score(member);
        if index == 0 || score > best_score {
            best_index = index;
            best_score = score;
        }
    }
    members.into_iter().nth(best_index)
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_author(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublicationIds;

    fn make_dataset(accession: &str) -> DatasetRecord {
        DatasetRecord {
            accession: accession.into(),
            title: format!("Dataset {accession}"),
            summary: String::new(),
            organism: None,
            platform: None,
            sample_count: None,
            published_at: None,
        }
    }

    fn make_publication(
        doi: Option<&str>,
        pmid: Option<&str>,
        title: &str,
        authors: &[&str],
        year: Option<i32>,
    ) -> Publication {
        Publication {
            ids: PublicationIds {
                doi: doi.map(String::from),
                pmid: pmid.map(String::from),
                pmcid: None,
            },
            title: title.into(),
            abstract_text: None,
            authors: authors.iter().map(|a| a.to_string()).collect(),
            year,
            citation_count: 0,
            source: "test".into(),
            referenced_dataset_ids: vec![],
        }
    }

    #[test]
    fn dataset_dedup_first_occurrence_wins() {
        let records = vec![
            make_dataset("GSE1"),
            make_dataset("GSE2"),
            make_dataset("GSE1"),
        ];
        let deduped = dedup_datasets(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].accession, "GSE1");
        assert_eq!(deduped[1].accession, "GSE2");
    }

    #[test]
    fn dataset_dedup_is_case_insensitive_on_accession() {
        let records = vec![make_dataset("GSE1"), make_dataset("gse1")];
        assert_eq!(dedup_datasets(records).len(), 1);
    }

    #[test]
    fn dataset_dedup_is_idempotent() {
        let records = vec![
            make_dataset("GSE1"),
            make_dataset("GSE2"),
            make_dataset("GSE1"),
            make_dataset("GSE3"),
        ];
        let once = dedup_datasets(records);
        let twice = dedup_datasets(once.clone());
        let accessions = |v: &[DatasetRecord]| {
            v.iter().map(|r| r.accession.clone()).collect::<Vec<_>>()
        };
        assert_eq!(accessions(&once), accessions(&twice));
    }

    #[test]
    fn dataset_dedup_empty_input() {
        assert!(dedup_datasets(vec![]).is_empty());
    }

    #[test]
    fn shared_pmid_merges_and_keeps_more_complete() {
        // Same PMID, different DOIs; the second record carries a year and
        // authors so it is the more complete one.
        let sparse = make_publication(Some("10.1/a"), Some("111"), "Title", &[], None);
        let complete = make_publication(
            Some("10.1/b"),
            Some("111"),
            "Title",
            &["Smith J"],
            Some(2021),
        );
        let deduped = dedup_publications(vec![sparse, complete]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].ids.doi.as_deref(), Some("10.1/b"));
    }

    #[test]
    fn completeness_tie_keeps_first_occurrence() {
        let a = make_publication(None, Some("1"), "Same title", &["X"], Some(2020));
        let mut b = a.clone();
        b.source = "second".into();
        let deduped = dedup_publications(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source, "test");
    }

    #[test]
    fn disjoint_ids_and_titles_pass_through() {
        let a = make_publication(Some("10.1/a"), None, "Alpha study of livers", &["X"], Some(2020));
        let b = make_publication(Some("10.1/b"), None, "Beta survey of kidneys", &["Y"], Some(2021));
        assert_eq!(dedup_publications(vec![a, b]).len(), 2);
    }

    #[test]
    fn bridging_record_merges_two_groups() {
        // First two records share nothing; the third carries both their ids.
        let doi_only = make_publication(Some("10.1/x"), None, "T1", &[], None);
        let pmid_only = make_publication(None, Some("999"), "T2", &[], None);
        let bridge = make_publication(Some("10.1/x"), Some("999"), "T3", &["A"], Some(2022));
        let deduped = dedup_publications(vec![doi_only, pmid_only, bridge]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn fuzzy_match_merges_near_identical_records() {
        let a = make_publication(
            Some("10.1/a"),
            None,
            "DNA methylation landscapes in breast cancer",
            &["Smith J", "Jones A"],
            Some(2021),
        );
        let b = make_publication(
            None,
            Some("222"),
            "DNA methylation landscapes in breast cancer",
            &["Smith J", "Jones A"],
            Some(2022),
        );
        let deduped = dedup_publications(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        // The kept record is the first: both score 3 (one id, authors, year).
        assert_eq!(deduped[0].ids.doi.as_deref(), Some("10.1/a"));
    }

    #[test]
    fn fuzzy_match_rejects_distant_years() {
        let a = make_publication(Some("10.1/a"), None, "Same exact title here", &["X"], Some(2015));
        let b = make_publication(Some("10.1/b"), None, "Same exact title here", &["X"], Some(2020));
        assert!(!is_same_publication(&a, &b));
        assert_eq!(dedup_publications(vec![a, b]).len(), 2);
    }

    #[test]
    fn fuzzy_match_rejects_different_author_sets() {
        let a = make_publication(
            Some("10.1/a"),
            None,
            "Same exact title here",
            &["Smith J", "Jones A"],
            Some(2020),
        );
        let b = make_publication(
            Some("10.1/b"),
            None,
            "Same exact title here",
            &["Zhang W", "Lee K"],
            Some(2020),
        );
        assert!(!is_same_publication(&a, &b));
    }

    #[test]
    fn missing_year_does_not_veto_fuzzy_match() {
        let a = make_publication(Some("10.1/a"), None, "Same exact title here", &["X"], None);
        let b = make_publication(Some("10.1/b"), None, "Same exact title here", &["X"], Some(2020));
        assert!(is_same_publication(&a, &b));
    }

    #[test]
    fn title_similarity_bounds() {
        assert!((title_similarity("a b c", "a b c") - 1.0).abs() < f64::EPSILON);
        assert!((title_similarity("a b", "c d") - 0.0).abs() < f64::EPSILON);
        assert!((title_similarity("", "anything") - 0.0).abs() < f64::EPSILON);
        let partial = title_similarity("gene expression atlas", "gene expression map");
        assert!(partial > 0.5 && partial < 1.0);
    }

    #[test]
    fn title_similarity_ignores_case_and_punctuation() {
        let sim = title_similarity(
            "DNA Methylation Landscapes in Breast Cancer.",
            "dna methylation landscapes in breast cancer",
        );
        assert!((sim - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn author_overlap_normalises_names() {
        let a = vec!["Smith J".to_string(), "Jones A".to_string()];
        let b = vec!["smith, j.".to_string(), "jones, a.".to_string()];
        assert!((author_overlap(&a, &b) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn author_overlap_empty_sides_yield_zero() {
        let some = vec!["Smith J".to_string()];
        assert!((author_overlap(&[], &some) - 0.0).abs() < f64::EPSILON);
        assert!((author_overlap(&some, &[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn completeness_counts_significant_fields() {
        let mut publication =
            make_publication(Some("10.1/a"), Some("1"), "T", &["X"], Some(2020));
        publication.abstract_text = Some("abstract".into());
        publication.citation_count = 5;
        publication.ids.pmcid = Some("PMC1".into());
        assert_eq!(completeness_score(&publication), 7);

        let bare = make_publication(None, None, "T", &[], None);
        assert_eq!(completeness_score(&bare), 0);
    }

    #[test]
    fn publication_dedup_empty_input() {
        assert!(dedup_publications(vec![]).is_empty());
    }

    #[test]
    fn publication_dedup_is_idempotent() {
        let records = vec![
            make_publication(Some("10.1/a"), Some("1"), "One", &["A"], Some(2020)),
            make_publication(None, Some("1"), "One", &["A"], Some(2020)),
            make_publication(Some("10.1/b"), None, "Two", &["B"], Some(2019)),
        ];
        let once = dedup_publications(records);
        let twice = dedup_publications(once.clone());
        assert_eq!(once.len(), twice.len());
    }
}
