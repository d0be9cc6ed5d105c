//! Query builder.
//!
//! Resolves a [`FilterSpec`] into an ordered list of [`QueryDescriptor`]s. Keyword
//! mode yields one works query; author mode yields an authors query followed by a
//! works query whose author predicate is bound once the author is known. Everything
//! downstream works from descriptors and never looks at the search mode again.

use crate::config::{Config, OPENALEX_MAX_PER_PAGE};
use crate::error::{CitesearchError, Result};
use crate::filters::{is_valid_email, FilterSpec, SearchMode};
use serde::Serialize;
use std::fmt;
use tracing::warn;
use url::Url;

/// Remote collection a descriptor targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Works,
    Authors,
}

impl Collection {
    pub fn path(self) -> &'static str {
        match self {
            Self::Works => "works",
            Self::Authors => "authors",
        }
    }
}

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Predicate {
    /// Published on or after January 1st of the year
    FromYear(i32),
    /// Published on or before December 31st of the year
    ToYear(i32),
    /// Citation count at least N
    MinCitations(u64),
    /// Open-access works only
    OpenAccess,
    /// Works by the given author key
    AuthorId(String),
    /// Placeholder for the author resolved by a preceding authors query
    PendingAuthor,
}

impl Predicate {
    /// OpenAlex `filter` clause, or `None` when the predicate is a no-op.
    fn clause(&self) -> Option<String> {
        match self {
            Self::FromYear(y) => Some(format!("from_publication_date:{}-01-01", y)),
            Self::ToYear(y) => Some(format!("to_publication_date:{}-12-31", y)),
            Self::MinCitations(0) => None,
            Self::MinCitations(n) => Some(format!("cited_by_count:>{}", n - 1)),
            Self::OpenAccess => Some("is_oa:true".to_string()),
            Self::AuthorId(id) => Some(format!("author.id:{}", id)),
            Self::PendingAuthor => None,
        }
    }
}

/// Sort order applied by the remote index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortKey {
    CitedByCountDesc,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CitedByCountDesc => write!(f, "cited_by_count:desc"),
        }
    }
}

/// One remote query, independent of search mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDescriptor {
    pub collection: Collection,
    /// Full-text search string
    pub text: Option<String>,
    pub predicates: Vec<Predicate>,
    pub sort: SortKey,
    pub per_page: u32,
    /// Records wanted from this query
    pub target: u32,
    /// Page ceiling for this query
    pub max_pages: u32,
    /// Polite-pool contact
    pub mailto: Option<String>,
}

impl QueryDescriptor {
    /// Whether this descriptor still waits for an author id.
    pub fn needs_author(&self) -> bool {
        self.predicates.contains(&Predicate::PendingAuthor)
    }

    /// Copy with the pending author placeholder replaced by `author_id`.
    pub fn bind_author(&self, author_id: &str) -> Self {
        let mut bound = self.clone();
        for predicate in &mut bound.predicates {
            if *predicate == Predicate::PendingAuthor {
                *predicate = Predicate::AuthorId(author_id.to_string());
            }
        }
        bound
    }

    /// Lowest citation count a record may have to count toward `target`.
    pub fn citation_floor(&self) -> u64 {
        self.predicates
            .iter()
            .filter_map(|p| match p {
                Predicate::MinCitations(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Joined `filter` parameter value, if any predicate is active.
    pub fn filter_param(&self) -> Option<String> {
        let clauses: Vec<String> = self.predicates.iter().filter_map(Predicate::clause).collect();
        (!clauses.is_empty()).then(|| clauses.join(","))
    }

    /// Request URL for one page. `cursor` is `*` for the first page.
    pub fn page_url(&self, base_url: &str, cursor: &str) -> Result<Url> {
        if self.needs_author() {
            return Err(CitesearchError::Fetch(
                "works query issued before the author was resolved".to_string(),
            ));
        }

        let endpoint = format!("{}/{}", base_url.trim_end_matches('/'), self.collection.path());
        let mut url = Url::parse(&endpoint)
            .map_err(|e| CitesearchError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;

        {
            let mut params = url.query_pairs_mut();
            if let Some(text) = &self.text {
                params.append_pair("search", text);
            }
            if let Some(filter) = self.filter_param() {
                params.append_pair("filter", &filter);
            }
            params.append_pair("sort", &self.sort.to_string());
            params.append_pair("per-page", &self.per_page.to_string());
            params.append_pair("cursor", cursor);
            if let Some(email) = &self.mailto {
                params.append_pair("mailto", email);
            }
        }

        Ok(url)
    }
}

/// Build the descriptor sequence for a search.
///
/// Fails with [`CitesearchError::InvalidFilter`] before producing anything when the
/// filter does not validate.
pub fn build(filters: &FilterSpec, config: &Config) -> Result<Vec<QueryDescriptor>> {
    filters.validate()?;

    if filters.polite_email().is_none() {
        if let Some(email) = filters.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
            warn!(email = %email.trim(), "Ignoring malformed contact email");
        }
    }
    let mailto = filters
        .polite_email()
        .or_else(|| {
            config
                .contact_email
                .as_deref()
                .map(str::trim)
                .filter(|e| is_valid_email(e))
        })
        .map(str::to_string);

    let mut work_predicates = Vec::new();
    if let Some(year) = filters.min_year {
        work_predicates.push(Predicate::FromYear(year));
    }
    if let Some(year) = filters.max_year {
        work_predicates.push(Predicate::ToYear(year));
    }
    if filters.min_citations > 0 {
        work_predicates.push(Predicate::MinCitations(filters.min_citations));
    }
    if filters.open_access_only {
        work_predicates.push(Predicate::OpenAccess);
    }

    let per_page_cap = config.max_per_page.clamp(1, OPENALEX_MAX_PER_PAGE);

    let works = |text: Option<String>, mut predicates: Vec<Predicate>| {
        predicates.extend(work_predicates.iter().cloned());
        QueryDescriptor {
            collection: Collection::Works,
            text,
            predicates,
            sort: SortKey::CitedByCountDesc,
            per_page: filters.result_count.min(per_page_cap),
            target: filters.result_count,
            max_pages: config.max_pages.max(1),
            mailto: mailto.clone(),
        }
    };

    let descriptors = match filters.mode {
        SearchMode::Keyword => vec![works(Some(filters.term().to_string()), Vec::new())],
        SearchMode::Author => {
            let candidates = config.author_candidates.clamp(1, 5);
            vec![
                QueryDescriptor {
                    collection: Collection::Authors,
                    text: Some(filters.term().to_string()),
                    predicates: Vec::new(),
                    sort: SortKey::CitedByCountDesc,
                    per_page: candidates,
                    target: candidates,
                    max_pages: 1,
                    mailto: mailto.clone(),
                },
                works(None, vec![Predicate::PendingAuthor]),
            ]
        }
    };

    Ok(descriptors)
}
