//! Runtime configuration.
//!
//! Values are resolved once at process start: built-in defaults, then an optional
//! JSON file at `<config_dir>/citesearch/config.json`, then environment variables.
//! CLI flags override the result in `main`.

use crate::error::{CitesearchError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// OpenAlex API base URL
pub const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Hard per-page maximum enforced by OpenAlex
pub const OPENALEX_MAX_PER_PAGE: u32 = 200;

/// Default page size; keeps round-trips low without over-fetching small result counts
pub const DEFAULT_MAX_PER_PAGE: u32 = 25;

/// Default ceiling on pages fetched per query
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Default number of author candidates requested for disambiguation
pub const DEFAULT_AUTHOR_CANDIDATES: u32 = 5;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Search configuration shared by the client and pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL for the OpenAlex API (overridable for mock servers)
    pub base_url: String,
    /// Contact email used for the polite pool when a search supplies none
    pub contact_email: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Upper bound on page size
    pub max_per_page: u32,
    /// Upper bound on pages fetched for one query
    pub max_pages: u32,
    /// Author candidates requested in author mode (1..=5)
    pub author_candidates: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: OPENALEX_API_BASE.to_string(),
            contact_email: None,
            request_timeout: DEFAULT_TIMEOUT,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
            author_candidates: DEFAULT_AUTHOR_CANDIDATES,
        }
    }
}

/// On-disk configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    contact_email: Option<String>,
    request_timeout_secs: Option<u64>,
    max_per_page: Option<u32>,
    max_pages: Option<u32>,
    author_candidates: Option<u32>,
}

/// Default config file path: `<config_dir>/citesearch/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("citesearch").join("config.json"))
}

impl Config {
    /// Resolve configuration from the default file location and the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = default_config_path() {
            if path.exists() {
                config.merge_file(&path)?;
            }
        }
        config.merge_env(|key| std::env::var(key).ok())?;
        config.normalize();
        info!(
            base_url = %config.base_url,
            has_email = config.contact_email.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Test configuration pointing at a mock server.
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Overlay values from a JSON config file.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        debug!(path = ?path, "Reading config file");
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig = serde_json::from_str(&content)
            .map_err(|e| CitesearchError::Config(format!("{}: {}", path.display(), e)))?;

        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if file.contact_email.is_some() {
            self.contact_email = file.contact_email;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = file.max_per_page {
            self.max_per_page = n;
        }
        if let Some(n) = file.max_pages {
            self.max_pages = n;
        }
        if let Some(n) = file.author_candidates {
            self.author_candidates = n;
        }
        Ok(())
    }

    /// Overlay values from environment variables, read through `lookup`.
    pub fn merge_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(email) = lookup("OPENALEX_EMAIL").filter(|e| !e.trim().is_empty()) {
            self.contact_email = Some(email.trim().to_string());
        }
        if let Some(url) = lookup("OPENALEX_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = lookup("CITESEARCH_MAX_PAGES") {
            self.max_pages = raw.parse().map_err(|_| {
                CitesearchError::Config(format!("CITESEARCH_MAX_PAGES is not a number: {}", raw))
            })?;
        }
        Ok(())
    }

    /// Clamp numeric settings into the ranges the API accepts.
    pub fn normalize(&mut self) {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.max_per_page = self.max_per_page.clamp(1, OPENALEX_MAX_PER_PAGE);
        self.max_pages = self.max_pages.max(1);
        self.author_candidates = self.author_candidates.clamp(1, 5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, OPENALEX_API_BASE);
        assert_eq!(config.max_per_page, 25);
        assert!(config.contact_email.is_none());
    }

    #[test]
    fn test_merge_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"contact_email": "file@example.org", "max_pages": 3, "author_candidates": 9}}"#
        )
        .unwrap();

        let mut config = Config::default();
        config.merge_file(file.path()).unwrap();
        assert_eq!(config.contact_email.as_deref(), Some("file@example.org"));
        assert_eq!(config.max_pages, 3);

        let env: HashMap<&str, &str> = [("OPENALEX_EMAIL", "env@example.org")].into();
        config.merge_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        config.normalize();

        assert_eq!(config.contact_email.as_deref(), Some("env@example.org"));
        assert_eq!(config.author_candidates, 5);
    }

    #[test]
    fn test_bad_env_number() {
        let mut config = Config::default();
        let result = config.merge_env(|k| (k == "CITESEARCH_MAX_PAGES").then(|| "lots".to_string()));
        assert!(matches!(result, Err(CitesearchError::Config(_))));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let mut config = Config::default();
        assert!(matches!(
            config.merge_file(file.path()),
            Err(CitesearchError::Config(_))
        ));
    }
}
