//! Search pipeline: filters → descriptors → pages → ranked records.
//!
//! The citation floor is enforced while paging (see [`fetch::collect`]), so
//! every work that reaches ranking already meets `min_citations`.

use crate::config::Config;
use crate::error::{CitesearchError, Result};
use crate::fetch::{self, PartialResultWarning};
use crate::filters::FilterSpec;
use crate::openalex::{OpenAlexClient, RateLimitInfo};
use crate::query::{self, Collection};
use crate::rank;
use crate::records::{AuthorRecord, WorkRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which OpenAlex pool served the search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// A contact email was sent
    pub polite: bool,
    pub email: Option<String>,
    pub rate_limit: RateLimitInfo,
}

/// Everything one search produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Ranked, deduplicated, truncated works
    pub works: Vec<WorkRecord>,
    /// Selected author (author mode only)
    pub author: Option<AuthorRecord>,
    /// All author candidates considered, selected first
    #[serde(default)]
    pub author_candidates: Vec<AuthorRecord>,
    /// Set when a later page failed and results are incomplete
    pub warning: Option<PartialResultWarning>,
    pub pool: PoolStatus,
    /// Total matches reported by the index for the works query
    pub total_available: Option<u64>,
    pub retrieved_at: DateTime<Utc>,
}

/// Runs searches against one OpenAlex endpoint.
#[derive(Debug, Clone)]
pub struct Searcher {
    config: Config,
    client: OpenAlexClient,
}

impl Searcher {
    pub fn new(config: Config) -> Result<Self> {
        let client = OpenAlexClient::new(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one search invocation.
    pub async fn search(&self, filters: &FilterSpec) -> Result<SearchOutcome> {
        let descriptors = query::build(filters, &self.config)?;

        info!(
            mode = %filters.mode,
            term = filters.term(),
            count = filters.result_count,
            queries = descriptors.len(),
            "Starting search"
        );

        let mut author: Option<AuthorRecord> = None;
        let mut author_candidates = Vec::new();
        let mut works = Vec::new();
        let mut warning = None;
        let mut total_available = None;
        let mut rate_limit = RateLimitInfo::default();
        let mailto = descriptors.first().and_then(|d| d.mailto.clone());

        for descriptor in descriptors {
            let descriptor = if descriptor.needs_author() {
                let selected = author.as_ref().ok_or_else(|| {
                    CitesearchError::Fetch("no author resolved for works query".to_string())
                })?;
                descriptor.bind_author(&selected.id)
            } else {
                descriptor
            };

            match descriptor.collection {
                Collection::Authors => {
                    let resolution = fetch::resolve_author(&self.client, &descriptor).await?;
                    rate_limit = resolution.rate_limit;
                    author = Some(resolution.selected);
                    author_candidates = resolution.candidates;
                }
                Collection::Works => {
                    let fetched = fetch::collect::<WorkRecord>(&self.client, &descriptor).await?;
                    rate_limit = fetched.rate_limit;
                    total_available = fetched.total_available;
                    if fetched.warning.is_some() {
                        warning = fetched.warning;
                    }
                    works.extend(fetched.records);
                }
            }
        }

        let works = rank::rank(works, filters.result_count as usize);

        info!(
            results = works.len(),
            partial = warning.is_some(),
            author = author.as_ref().map(|a| a.display_name.as_str()),
            "Search complete"
        );

        Ok(SearchOutcome {
            works,
            author,
            author_candidates,
            warning,
            pool: PoolStatus {
                polite: mailto.is_some(),
                email: mailto,
                rate_limit,
            },
            total_available,
            retrieved_at: Utc::now(),
        })
    }
}
