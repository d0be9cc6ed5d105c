//! Custom error types for citesearch.
//!
//! This module defines all error types used throughout the search pipeline.
//! All functions return `Result<T, CitesearchError>` instead of using `unwrap()`.
//! Transport failures never leave the fetcher as raw `reqwest` errors: they are
//! folded into [`CitesearchError::Fetch`] (or a partial-result warning) there.

use thiserror::Error;

/// Main error type for citesearch operations.
#[derive(Debug, Error)]
pub enum CitesearchError {
    /// A filter field is malformed or out of range. No request was issued.
    #[error("Invalid filter `{field}`: {message}")]
    InvalidFilter {
        /// Name of the offending field
        field: &'static str,
        /// Human-readable reason
        message: String,
    },

    /// Author search matched no candidates
    #[error("No author found matching \"{0}\"")]
    NoAuthorMatch(String),

    /// Remote failure before any page was retrieved
    #[error("Search failed: {0}")]
    Fetch(String),

    /// Export rendering failed
    #[error("Export error: {0}")]
    Export(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// External API returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },

    /// Rate limited by the remote API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl CitesearchError {
    /// Shorthand for an [`CitesearchError::InvalidFilter`].
    pub fn invalid_filter(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field,
            message: message.into(),
        }
    }

    /// Whether a single immediate retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { code, .. } => *code >= 500,
            Self::RateLimited(_) => true,
            _ => false,
        }
    }
}

impl From<csv::Error> for CitesearchError {
    fn from(e: csv::Error) -> Self {
        Self::Export(e.to_string())
    }
}

/// Result type alias using `CitesearchError`
pub type Result<T> = std::result::Result<T, CitesearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_display() {
        let err = CitesearchError::invalid_filter("year_range", "min_year 2030 exceeds max_year 2020");
        assert_eq!(
            err.to_string(),
            "Invalid filter `year_range`: min_year 2030 exceeds max_year 2020"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(CitesearchError::RateLimited(1).is_transient());
        assert!(CitesearchError::Api { code: 503, message: String::new() }.is_transient());
        assert!(!CitesearchError::Api { code: 404, message: String::new() }.is_transient());
        assert!(!CitesearchError::Parse("bad".into()).is_transient());
    }
}
