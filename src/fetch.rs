//! Paginated result retrieval.
//!
//! Pages come from a lazy stream that is only polled while more records are
//! needed. A failure on the first page aborts the query; a failure after at least
//! one good page keeps what was retrieved and records a [`PartialResultWarning`].

use crate::error::{CitesearchError, Result};
use crate::openalex::{Normalize, OpenAlexClient, Page, RateLimitInfo, FIRST_CURSOR};
use crate::query::QueryDescriptor;
use crate::records::AuthorRecord;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Results are incomplete because a later page failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResultWarning {
    /// Pages retrieved successfully before the failure
    pub pages_fetched: u32,
    /// Records kept from those pages
    pub records_kept: usize,
    /// Description of the failure
    pub cause: String,
}

impl fmt::Display for PartialResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results truncated: page {} failed after {} records were retrieved ({})",
            self.pages_fetched + 1,
            self.records_kept,
            self.cause
        )
    }
}

/// Everything retrieved for one descriptor.
#[derive(Debug, Clone)]
pub struct FetchedSet<T> {
    /// Unique records in fetch order
    pub records: Vec<T>,
    pub pages_fetched: u32,
    /// Total matches reported by the index
    pub total_available: Option<u64>,
    pub rate_limit: RateLimitInfo,
    pub warning: Option<PartialResultWarning>,
}

/// Lazy page sequence for a descriptor.
///
/// Ends after the page without a next cursor, after an error, or once
/// `descriptor.max_pages` pages were produced.
pub fn pages<'a, T>(
    client: &'a OpenAlexClient,
    descriptor: &'a QueryDescriptor,
) -> impl Stream<Item = Result<Page<T>>> + 'a
where
    T: Normalize + 'a,
{
    let start = (Some(FIRST_CURSOR.to_string()), 0u32);
    stream::try_unfold(start, move |(cursor, fetched)| async move {
        let cursor = match cursor {
            Some(c) if fetched < descriptor.max_pages => c,
            Some(_) => {
                debug!(max_pages = descriptor.max_pages, "Page limit reached");
                return Ok(None);
            }
            None => return Ok(None),
        };
        let page = client.fetch_page::<T>(descriptor, &cursor).await?;
        let next = page.next_cursor.clone();
        Ok::<_, CitesearchError>(Some((page, (next, fetched + 1))))
    })
}

/// Retrieve up to `descriptor.target` unique records.
///
/// Records below the descriptor's citation floor are dropped as they arrive and
/// never count toward the target, so paging continues past them.
pub async fn collect<T: Normalize>(
    client: &OpenAlexClient,
    descriptor: &QueryDescriptor,
) -> Result<FetchedSet<T>> {
    let target = descriptor.target as usize;
    let floor = descriptor.citation_floor();
    let mut seen = HashSet::new();
    let mut set = FetchedSet {
        records: Vec::new(),
        pages_fetched: 0,
        total_available: None,
        rate_limit: RateLimitInfo::default(),
        warning: None,
    };

    let page_stream = pages::<T>(client, descriptor);
    futures::pin_mut!(page_stream);

    while set.records.len() < target {
        match page_stream.next().await {
            Some(Ok(page)) => {
                set.pages_fetched += 1;
                set.total_available = page.total.or(set.total_available);
                set.rate_limit = page.rate_limit;
                let before = set.records.len();
                let mut below_floor = 0usize;
                for record in page.records {
                    if !seen.insert(record.key().to_string()) {
                        continue;
                    }
                    if record.citations() < floor {
                        below_floor += 1;
                        continue;
                    }
                    set.records.push(record);
                }
                if below_floor > 0 {
                    warn!(
                        collection = descriptor.collection.path(),
                        dropped = below_floor,
                        min_citations = floor,
                        "Index returned records below the citation threshold"
                    );
                }
                debug!(
                    collection = descriptor.collection.path(),
                    page = set.pages_fetched,
                    added = set.records.len() - before,
                    "Page retrieved"
                );
            }
            Some(Err(e)) if set.pages_fetched == 0 => {
                warn!(collection = descriptor.collection.path(), error = %e, "First page failed");
                return Err(CitesearchError::Fetch(e.to_string()));
            }
            Some(Err(e)) => {
                warn!(
                    collection = descriptor.collection.path(),
                    pages = set.pages_fetched,
                    kept = set.records.len(),
                    error = %e,
                    "Later page failed, keeping partial results"
                );
                set.warning = Some(PartialResultWarning {
                    pages_fetched: set.pages_fetched,
                    records_kept: set.records.len(),
                    cause: e.to_string(),
                });
                break;
            }
            None => break,
        }
    }

    info!(
        collection = descriptor.collection.path(),
        records = set.records.len(),
        pages = set.pages_fetched,
        total = ?set.total_available,
        partial = set.warning.is_some(),
        "Fetch complete"
    );
    Ok(set)
}

/// Author chosen for an author-mode search, plus every candidate considered.
#[derive(Debug, Clone)]
pub struct AuthorResolution {
    pub selected: AuthorRecord,
    /// Candidates ordered by citations, selected first
    pub candidates: Vec<AuthorRecord>,
    pub rate_limit: RateLimitInfo,
}

/// Run an authors-collection descriptor and pick the top candidate.
pub async fn resolve_author(
    client: &OpenAlexClient,
    descriptor: &QueryDescriptor,
) -> Result<AuthorResolution> {
    let term = descriptor.text.clone().unwrap_or_default();
    let fetched = collect::<AuthorRecord>(client, descriptor).await?;

    let candidates = order_candidates(fetched.records);
    let selected = candidates
        .first()
        .cloned()
        .ok_or_else(|| CitesearchError::NoAuthorMatch(term.clone()))?;

    info!(
        term = %term,
        author = %selected.display_name,
        id = %selected.id,
        candidates = candidates.len(),
        "Author resolved"
    );

    Ok(AuthorResolution {
        selected,
        candidates,
        rate_limit: fetched.rate_limit,
    })
}

/// Order by `cited_by_count` desc, then `works_count` desc, then id.
pub fn order_candidates(mut candidates: Vec<AuthorRecord>) -> Vec<AuthorRecord> {
    candidates.sort_by(|a, b| {
        b.cited_by_count
            .cmp(&a.cited_by_count)
            .then_with(|| b.works_count.cmp(&a.works_count))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}
