//! Search mode and filter specification.
//!
//! A [`FilterSpec`] is built by the surface (CLI, HTTP handler) and validated
//! before anything touches the network.

use crate::error::{CitesearchError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Smallest accepted result count
pub const MIN_RESULT_COUNT: u32 = 5;

/// Largest accepted result count
pub const MAX_RESULT_COUNT: u32 = 100;

/// Default result count
pub const DEFAULT_RESULT_COUNT: u32 = 10;

/// How the search term is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Full-text search over works
    #[default]
    Keyword,
    /// Resolve an author first, then rank their works
    Author,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword => write!(f, "keyword"),
            Self::Author => write!(f, "author"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = CitesearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "author" => Ok(Self::Author),
            other => Err(CitesearchError::invalid_filter(
                "mode",
                format!("expected `keyword` or `author`, got `{}`", other),
            )),
        }
    }
}

/// User constraints for one search invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub mode: SearchMode,
    pub search_term: String,
    #[serde(default = "default_result_count")]
    pub result_count: u32,
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
    #[serde(default)]
    pub min_citations: u64,
    #[serde(default)]
    pub open_access_only: bool,
    #[serde(default)]
    pub contact_email: Option<String>,
}

fn default_result_count() -> u32 {
    DEFAULT_RESULT_COUNT
}

impl FilterSpec {
    /// Keyword search with default filters.
    pub fn keyword(term: impl Into<String>) -> Self {
        Self::new(SearchMode::Keyword, term)
    }

    /// Author search with default filters.
    pub fn author(term: impl Into<String>) -> Self {
        Self::new(SearchMode::Author, term)
    }

    fn new(mode: SearchMode, term: impl Into<String>) -> Self {
        Self {
            mode,
            search_term: term.into(),
            result_count: DEFAULT_RESULT_COUNT,
            min_year: None,
            max_year: None,
            min_citations: 0,
            open_access_only: false,
            contact_email: None,
        }
    }

    pub fn with_result_count(mut self, count: u32) -> Self {
        self.result_count = count;
        self
    }

    pub fn with_years(mut self, min_year: Option<i32>, max_year: Option<i32>) -> Self {
        self.min_year = min_year;
        self.max_year = max_year;
        self
    }

    pub fn with_min_citations(mut self, min_citations: u64) -> Self {
        self.min_citations = min_citations;
        self
    }

    pub fn with_open_access_only(mut self, open_access_only: bool) -> Self {
        self.open_access_only = open_access_only;
        self
    }

    pub fn with_contact_email(mut self, email: Option<String>) -> Self {
        self.contact_email = email;
        self
    }

    /// Check every field, reporting the first offending one.
    ///
    /// A malformed contact email is not an error; the search runs in the
    /// common pool instead (see [`FilterSpec::polite_email`]).
    pub fn validate(&self) -> Result<()> {
        if self.search_term.trim().is_empty() {
            let what = match self.mode {
                SearchMode::Keyword => "search keyword",
                SearchMode::Author => "author name",
            };
            return Err(CitesearchError::invalid_filter(
                "search_term",
                format!("please enter a {}", what),
            ));
        }

        if !(MIN_RESULT_COUNT..=MAX_RESULT_COUNT).contains(&self.result_count) {
            return Err(CitesearchError::invalid_filter(
                "result_count",
                format!(
                    "{} is outside {}..={}",
                    self.result_count, MIN_RESULT_COUNT, MAX_RESULT_COUNT
                ),
            ));
        }

        if let (Some(lo), Some(hi)) = (self.min_year, self.max_year) {
            if lo > hi {
                return Err(CitesearchError::invalid_filter(
                    "year_range",
                    format!("min_year {} exceeds max_year {}", lo, hi),
                ));
            }
        }

        Ok(())
    }

    /// Trimmed search term.
    pub fn term(&self) -> &str {
        self.search_term.trim()
    }

    /// The contact email to send, if present and well-formed.
    pub fn polite_email(&self) -> Option<&str> {
        self.contact_email
            .as_deref()
            .map(str::trim)
            .filter(|e| is_valid_email(e))
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .unwrap_or_else(|_| Regex::new(r"^\S+@\S+\.\S+$").expect("fallback email regex"))
    })
}

/// Loose syntactic email check.
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}
