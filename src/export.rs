//! Export formatting.
//!
//! Renders a ranked record set as a title list, a full-detail text report or CSV.
//! Output depends only on the records passed in, so exporting the same set twice
//! yields identical bytes. Titles are always reduced to plain characters here.

use crate::error::{CitesearchError, Result};
use crate::records::{AuthorRecord, WorkRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// CSV column order
pub const CSV_COLUMNS: &[&str] = &[
    "id",
    "title",
    "publication_year",
    "citation_count",
    "source_name",
    "doi",
    "is_open_access",
    "author_names",
];

/// Separator between author names inside one CSV field
pub const AUTHOR_DELIMITER: &str = "; ";

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "titles-txt")]
    TitlesTxt,
    #[serde(rename = "full-txt")]
    FullTxt,
    #[serde(rename = "csv")]
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::TitlesTxt, Self::FullTxt, Self::Csv];

    /// Fixed download name; author-mode exports get their own set.
    pub fn filename(self, author_mode: bool) -> &'static str {
        match (self, author_mode) {
            (Self::TitlesTxt, false) => "citation_titles.txt",
            (Self::FullTxt, false) => "citation_full.txt",
            (Self::Csv, false) => "citation_papers.csv",
            (Self::TitlesTxt, true) => "author_citation_titles.txt",
            (Self::FullTxt, true) => "author_citation_full.txt",
            (Self::Csv, true) => "author_citation_papers.csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::TitlesTxt | Self::FullTxt => "text/plain; charset=utf-8",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TitlesTxt => "titles-txt",
            Self::FullTxt => "full-txt",
            Self::Csv => "csv",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = CitesearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "titles-txt" | "titles" => Ok(Self::TitlesTxt),
            "full-txt" | "full" => Ok(Self::FullTxt),
            "csv" => Ok(Self::Csv),
            other => Err(CitesearchError::Export(format!(
                "unknown export format `{}` (expected titles-txt, full-txt or csv)",
                other
            ))),
        }
    }
}

/// A rendered download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub filename: &'static str,
    pub content_type: &'static str,
    pub content: Vec<u8>,
}

impl ExportArtifact {
    /// Write into `dir` under the fixed filename, replacing any earlier export.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.filename);
        std::fs::write(&path, &self.content)?;
        info!(path = ?path, bytes = self.content.len(), "Export written");
        Ok(path)
    }
}

/// Render `records` in the requested encoding.
///
/// `author` marks an author-mode result set, which selects the author filenames.
pub fn format(
    records: &[WorkRecord],
    author: Option<&AuthorRecord>,
    encoding: ExportFormat,
) -> Result<ExportArtifact> {
    let content = match encoding {
        ExportFormat::TitlesTxt => titles_txt(records).into_bytes(),
        ExportFormat::FullTxt => full_txt(records)?.into_bytes(),
        ExportFormat::Csv => csv_bytes(records)?,
    };

    Ok(ExportArtifact {
        format: encoding,
        filename: encoding.filename(author.is_some()),
        content_type: encoding.content_type(),
        content,
    })
}

fn titles_txt(records: &[WorkRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}\n", r.plain_title()))
        .collect()
}

fn full_txt(records: &[WorkRecord]) -> Result<String> {
    let blocks = records
        .iter()
        .enumerate()
        .map(|(i, r)| full_block(i + 1, r))
        .collect::<std::result::Result<Vec<_>, fmt::Error>>()
        .map_err(|e| CitesearchError::Export(format!("Failed to render text export: {}", e)))?;
    Ok(blocks.join("\n"))
}

fn full_block(rank: usize, r: &WorkRecord) -> std::result::Result<String, fmt::Error> {
    let mut block = String::new();
    writeln!(block, "{}. {}", rank, r.plain_title())?;
    writeln!(block, "   Year: {}", display_year(r.publication_year))?;
    writeln!(block, "   Citations: {}", r.citation_count)?;
    writeln!(block, "   Source: {}", r.source_name.as_deref().unwrap_or("Unknown"))?;
    writeln!(block, "   DOI: {}", r.doi.as_deref().unwrap_or("N/A"))?;
    writeln!(block, "   URL: {}", r.url().as_deref().unwrap_or("N/A"))?;
    writeln!(block, "   Open Access: {}", if r.is_open_access { "Yes" } else { "No" })?;
    writeln!(block, "   Authors: {}", display_authors(&r.author_names))?;
    Ok(block)
}

fn display_year(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "Unknown".to_string())
}

fn display_authors(names: &[String]) -> String {
    if names.is_empty() {
        "Unknown".to_string()
    } else {
        names.join(", ")
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    title: String,
    publication_year: Option<i32>,
    citation_count: u64,
    source_name: Option<&'a str>,
    doi: Option<&'a str>,
    is_open_access: bool,
    author_names: String,
}

fn csv_bytes(records: &[WorkRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record(CSV_COLUMNS)?;

    for r in records {
        wtr.serialize(CsvRow {
            id: &r.id,
            title: r.plain_title(),
            publication_year: r.publication_year,
            citation_count: r.citation_count,
            source_name: r.source_name.as_deref(),
            doi: r.doi.as_deref(),
            is_open_access: r.is_open_access,
            author_names: r.author_names.join(AUTHOR_DELIMITER),
        })?;
    }

    wtr.into_inner()
        .map_err(|e| CitesearchError::Export(format!("Failed to flush CSV: {}", e)))
}
