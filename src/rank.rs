//! Ranking and deduplication of work records.

use crate::records::WorkRecord;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Deduplicate by id (first occurrence wins), order, then truncate to `limit`.
///
/// Truncation happens last so the ordering sees every fetched candidate.
pub fn rank(records: Vec<WorkRecord>, limit: usize) -> Vec<WorkRecord> {
    let mut ranked = dedupe(records);
    ranked.sort_by(compare);
    ranked.truncate(limit);
    ranked
}

/// Drop records whose id was already seen, keeping fetch order.
pub fn dedupe(records: Vec<WorkRecord>) -> Vec<WorkRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

/// Citation count descending, then year descending (unknown last), then id ascending.
pub fn compare(a: &WorkRecord, b: &WorkRecord) -> Ordering {
    b.citation_count
        .cmp(&a.citation_count)
        .then_with(|| b.publication_year.cmp(&a.publication_year))
        .then_with(|| a.id.cmp(&b.id))
}
