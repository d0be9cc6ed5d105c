//! # citesearch
//!
//! Find the most cited papers in OpenAlex by keyword or by author, with year,
//! citation and open-access filters, and export them as text or CSV.
//!
//! ## Modules
//!
//! - [`filters`] - Search mode and filter validation
//! - [`query`] - Query builder (filters → remote query descriptors)
//! - [`openalex`] - OpenAlex HTTP client and record normalization
//! - [`fetch`] - Pagination, partial results, author disambiguation
//! - [`rank`] - Deduplication and citation ranking
//! - [`export`] - Title list, full text and CSV exports
//! - [`pipeline`] - End-to-end search
//! - [`config`] - Runtime configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use citesearch::{export, Config, ExportFormat, FilterSpec, Searcher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let searcher = Searcher::new(Config::load()?)?;
//!     let outcome = searcher.search(&FilterSpec::keyword("CRISPR")).await?;
//!     let csv = export::format(&outcome.works, outcome.author.as_ref(), ExportFormat::Csv)?;
//!     println!("{} results, {} bytes of CSV", outcome.works.len(), csv.content.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filters;
pub mod openalex;
pub mod pipeline;
pub mod query;
pub mod rank;
pub mod records;

pub use config::Config;
pub use error::{CitesearchError, Result};
pub use export::{ExportArtifact, ExportFormat};
pub use fetch::PartialResultWarning;
pub use filters::{FilterSpec, SearchMode};
pub use pipeline::{SearchOutcome, Searcher};
pub use records::{AuthorRecord, WorkRecord};
