//! Normalized record shapes shared by the fetcher, ranker and exporters.

use scraper::Html;
use serde::{Deserialize, Serialize};

/// DOI resolver prefix
pub const DOI_RESOLVER: &str = "https://doi.org/";

/// One scholarly publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Short OpenAlex key, e.g. `W2741809807`
    pub id: String,
    /// Display title; may carry inline markup such as `<i>` or `<sup>`
    pub title: String,
    pub publication_year: Option<i32>,
    pub citation_count: u64,
    pub source_name: Option<String>,
    /// Bare DOI without resolver prefix
    pub doi: Option<String>,
    pub is_open_access: bool,
    #[serde(default)]
    pub author_names: Vec<String>,
}

impl WorkRecord {
    /// Title with markup removed, for exports.
    pub fn plain_title(&self) -> String {
        strip_markup(&self.title)
    }

    /// Resolver URL for the DOI.
    pub fn url(&self) -> Option<String> {
        self.doi.as_ref().map(|doi| format!("{}{}", DOI_RESOLVER, doi))
    }
}

/// A candidate (or the selected) author in author mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    /// Short OpenAlex key, e.g. `A5023888391`
    pub id: String,
    pub display_name: String,
    /// Last known institution
    pub affiliation: Option<String>,
    pub works_count: u64,
    pub cited_by_count: u64,
    pub orcid: Option<String>,
}

/// Reduce text with inline HTML-ish markup to its plain characters.
///
/// `<i>Escherichia coli</i> K-12` becomes `Escherichia coli K-12`; entities such
/// as `&amp;` are decoded. Whitespace runs collapse to single spaces.
pub fn strip_markup(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return collapse_whitespace(text);
    }
    let fragment = Html::parse_fragment(text);
    let plain: String = fragment.root_element().text().collect();
    collapse_whitespace(&plain)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a URL prefix such as `https://openalex.org/` from an identifier.
pub fn short_id(raw: &str) -> String {
    raw.rsplit('/').next().unwrap_or(raw).to_string()
}

/// Strip the resolver prefix from a DOI.
pub fn bare_doi(raw: &str) -> String {
    let trimmed = raw.trim();
    ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .to_string()
}
