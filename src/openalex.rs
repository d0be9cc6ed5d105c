//! OpenAlex API Client
//!
//! Executes [`QueryDescriptor`]s one page at a time and normalizes raw works and
//! authors into [`WorkRecord`] / [`AuthorRecord`].
//!
//! API Best Practices (per OpenAlex docs):
//! - Use `mailto:email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Use cursor paging (`cursor=*`, then `meta.next_cursor`) for deep result sets
//! - Back off on HTTP 429

use crate::config::Config;
use crate::error::{CitesearchError, Result};
use crate::query::QueryDescriptor;
use crate::records::{bare_doi, short_id, AuthorRecord, WorkRecord};
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Cursor value that requests the first page
pub const FIRST_CURSOR: &str = "*";

/// Longest wait honoured from a `Retry-After` hint before the single retry
const MAX_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Rate-limit headers reported by OpenAlex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: Option<String>,
    pub remaining: Option<String>,
}

impl RateLimitInfo {
    fn from_headers(headers: &HeaderMap) -> Self {
        let read = |primary: &str, fallback: &str| {
            headers
                .get(primary)
                .or_else(|| headers.get(fallback))
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            limit: read("ratelimit-limit", "x-ratelimit-limit"),
            remaining: read("ratelimit-remaining", "x-ratelimit-remaining"),
        }
    }
}

/// One retrieved page of normalized records.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Cursor for the following page; `None` when the index is exhausted
    pub next_cursor: Option<String>,
    /// Total matches reported by the index
    pub total: Option<u64>,
    pub rate_limit: RateLimitInfo,
}

/// A record type that can be built from an OpenAlex result object.
pub trait Normalize: Sized {
    /// Raw API shape
    type Raw: DeserializeOwned;

    /// Convert a raw result; `None` drops records without a usable identifier.
    fn normalize(raw: Self::Raw) -> Option<Self>;

    /// Stable identifier used for deduplication.
    fn key(&self) -> &str;

    /// Citation count checked against a descriptor's citation floor.
    fn citations(&self) -> u64;
}

/// OpenAlex API client.
#[derive(Debug, Clone)]
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CitesearchError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page, retrying once on a transient failure.
    pub async fn fetch_page<T: Normalize>(
        &self,
        descriptor: &QueryDescriptor,
        cursor: &str,
    ) -> Result<Page<T>> {
        match self.try_fetch_page(descriptor, cursor).await {
            Ok(page) => Ok(page),
            Err(e) if e.is_transient() => {
                let wait = match &e {
                    CitesearchError::RateLimited(secs) => {
                        Duration::from_secs(*secs).min(MAX_RETRY_WAIT)
                    }
                    _ => Duration::ZERO,
                };
                warn!(
                    collection = descriptor.collection.path(),
                    error = %e,
                    wait_ms = wait.as_millis() as u64,
                    "Transient failure, retrying page once"
                );
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                self.try_fetch_page(descriptor, cursor).await
            }
            Err(e) => Err(e),
        }
    }

    async fn try_fetch_page<T: Normalize>(
        &self,
        descriptor: &QueryDescriptor,
        cursor: &str,
    ) -> Result<Page<T>> {
        let url = descriptor.page_url(&self.base_url, cursor)?;
        debug!(url = %url, "Fetching OpenAlex page");

        let mut request = self.client.get(url);
        request = request.header(USER_AGENT, user_agent(descriptor.mailto.as_deref()));

        let response = request.send().await?;
        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1);
            return Err(CitesearchError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CitesearchError::Api {
                code: status.as_u16(),
                message: format!("OpenAlex API error: {} {}", status, truncate(&body, 200)),
            });
        }

        let body = response.text().await?;
        let mut page = parse_page::<T>(&body)?;
        page.rate_limit = rate_limit;
        Ok(page)
    }
}

fn user_agent(mailto: Option<&str>) -> String {
    match mailto {
        Some(email) => format!("citesearch/{} (mailto:{})", env!("CARGO_PKG_VERSION"), email),
        None => format!("citesearch/{}", env!("CARGO_PKG_VERSION")),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// OpenAlex API response structures
#[derive(Debug, Deserialize)]
struct OpenAlexResponse<R> {
    #[serde(default)]
    meta: OpenAlexMeta,
    #[serde(default = "Vec::new")]
    results: Vec<R>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAlexMeta {
    count: Option<u64>,
    next_cursor: Option<String>,
}

/// Parse an OpenAlex list response into a page of normalized records.
pub fn parse_page<T: Normalize>(json_str: &str) -> Result<Page<T>> {
    let response: OpenAlexResponse<T::Raw> = serde_json::from_str(json_str)
        .map_err(|e| CitesearchError::Parse(format!("Failed to parse OpenAlex response: {}", e)))?;

    let raw_count = response.results.len();
    let records: Vec<T> = response.results.into_iter().filter_map(T::normalize).collect();
    if records.len() < raw_count {
        debug!(dropped = raw_count - records.len(), "Dropped results without an id");
    }

    // An empty page ends pagination even if a cursor came back with it.
    let next_cursor = if raw_count == 0 {
        None
    } else {
        response.meta.next_cursor.filter(|c| !c.is_empty())
    };

    Ok(Page {
        records,
        next_cursor,
        total: response.meta.count,
        rate_limit: RateLimitInfo::default(),
    })
}

#[derive(Debug, Deserialize)]
pub struct OpenAlexWork {
    id: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    cited_by_count: Option<i64>,
    authorships: Option<Vec<OpenAlexAuthorship>>,
    primary_location: Option<OpenAlexLocation>,
    open_access: Option<OpenAlexOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorship {
    author: Option<OpenAlexAuthorRef>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    source: Option<OpenAlexSource>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexOpenAccess {
    is_oa: Option<bool>,
}

impl Normalize for WorkRecord {
    type Raw = OpenAlexWork;

    fn normalize(work: OpenAlexWork) -> Option<Self> {
        let id = work.id.as_deref().map(short_id).filter(|id| !id.is_empty())?;

        let title = work
            .display_name
            .or(work.title)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "No title".to_string());

        let author_names = work
            .authorships
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.author)
            .filter_map(|a| a.display_name)
            .filter(|name| !name.trim().is_empty())
            .collect();

        let source_name = work
            .primary_location
            .and_then(|l| l.source)
            .and_then(|s| s.display_name)
            .filter(|s| !s.trim().is_empty());

        Some(Self {
            id,
            title,
            publication_year: work.publication_year,
            citation_count: work.cited_by_count.unwrap_or(0).max(0) as u64,
            source_name,
            doi: work.doi.map(|d| bare_doi(&d)).filter(|d| !d.is_empty()),
            is_open_access: work.open_access.and_then(|oa| oa.is_oa).unwrap_or(false),
            author_names,
        })
    }

    fn key(&self) -> &str {
        &self.id
    }

    fn citations(&self) -> u64 {
        self.citation_count
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenAlexAuthor {
    id: Option<String>,
    display_name: Option<String>,
    orcid: Option<String>,
    works_count: Option<i64>,
    cited_by_count: Option<i64>,
    last_known_institution: Option<OpenAlexInstitution>,
    last_known_institutions: Option<Vec<OpenAlexInstitution>>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexInstitution {
    display_name: Option<String>,
}

impl Normalize for AuthorRecord {
    type Raw = OpenAlexAuthor;

    fn normalize(author: OpenAlexAuthor) -> Option<Self> {
        let id = author.id.as_deref().map(short_id).filter(|id| !id.is_empty())?;

        let affiliation = author
            .last_known_institutions
            .and_then(|list| list.into_iter().next())
            .or(author.last_known_institution)
            .and_then(|i| i.display_name)
            .filter(|name| !name.trim().is_empty());

        Some(Self {
            id,
            display_name: author.display_name.unwrap_or_else(|| "Unknown".to_string()),
            affiliation,
            works_count: author.works_count.unwrap_or(0).max(0) as u64,
            cited_by_count: author.cited_by_count.unwrap_or(0).max(0) as u64,
            orcid: author.orcid.filter(|o| !o.is_empty()),
        })
    }

    fn key(&self) -> &str {
        &self.id
    }

    fn citations(&self) -> u64 {
        self.cited_by_count
    }
}
