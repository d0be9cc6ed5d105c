//! citesearch - top cited papers from OpenAlex
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! citesearch search "CRISPR" -n 25 --min-year 2015 --export csv
//! citesearch search "Marie Curie" --author --export full-txt
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! citesearch serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use citesearch::{
    export, CitesearchError, Config, ExportFormat, FilterSpec, SearchMode, SearchOutcome,
    Searcher,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Find the most cited papers in OpenAlex by keyword or author
#[derive(Parser)]
#[command(name = "citesearch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// OpenAlex API base URL
    #[arg(long, global = true, env = "OPENALEX_BASE_URL")]
    base_url: Option<String>,

    /// Maximum pages fetched per query
    #[arg(long, global = true)]
    max_pages: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search OpenAlex and print the top cited papers
    Search {
        /// Keyword, or author name with --author
        term: String,

        /// Treat the term as an author name
        #[arg(long)]
        author: bool,

        /// Number of results (5-100)
        #[arg(short = 'n', long, default_value = "10")]
        count: u32,

        /// Earliest publication year
        #[arg(long)]
        min_year: Option<i32>,

        /// Latest publication year
        #[arg(long)]
        max_year: Option<i32>,

        /// Minimum citation count
        #[arg(long, default_value = "0")]
        min_citations: u64,

        /// Only open-access papers
        #[arg(long)]
        open_access: bool,

        /// Contact email for the OpenAlex polite pool
        #[arg(long)]
        email: Option<String>,

        /// Export formats to write: titles-txt, full-txt, csv
        #[arg(long, value_delimiter = ',')]
        export: Vec<ExportFormat>,

        /// Output directory for exports
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Print the full outcome as JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(pages) = cli.max_pages {
        config.max_pages = pages;
    }
    config.normalize();

    match cli.command {
        Commands::Search {
            term,
            author,
            count,
            min_year,
            max_year,
            min_citations,
            open_access,
            email,
            export: formats,
            output,
            json,
        } => {
            let mode = if author { SearchMode::Author } else { SearchMode::Keyword };
            let filters = FilterSpec {
                mode,
                search_term: term,
                result_count: count,
                min_year,
                max_year,
                min_citations,
                open_access_only: open_access,
                contact_email: email,
            };
            run_search(config, filters, &formats, output, json).await
        }
        Commands::Serve { port, host } => run_server(config, host, port).await,
    }
}

// ============================================================================
// Search Command
// ============================================================================

async fn run_search(
    config: Config,
    filters: FilterSpec,
    formats: &[ExportFormat],
    output_dir: PathBuf,
    json: bool,
) -> Result<()> {
    let searcher = Searcher::new(config)?;

    let outcome = match searcher.search(&filters).await {
        Ok(outcome) => outcome,
        Err(CitesearchError::NoAuthorMatch(term)) => {
            println!("No author found matching \"{}\". Try a different spelling.", term);
            return Ok(());
        }
        Err(e @ CitesearchError::InvalidFilter { .. }) => anyhow::bail!("{}", e),
        Err(e) => return Err(e).context("Search failed, please retry"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.works.is_empty() || formats.is_empty() {
        return Ok(());
    }

    for format in formats {
        let artifact = export::format(&outcome.works, outcome.author.as_ref(), *format)
            .with_context(|| format!("Failed to export {}", format))?;
        let path = artifact.write_to_dir(&output_dir)?;
        println!("Saved: {}", path.display());
    }

    Ok(())
}

fn print_outcome(outcome: &SearchOutcome) {
    let pool = &outcome.pool;
    let limit = pool.rate_limit.limit.as_deref().unwrap_or("unknown");
    let remaining = pool.rate_limit.remaining.as_deref().unwrap_or("unknown");
    match &pool.email {
        Some(email) => println!(
            "Polite pool (email: {}) | rate limit {} req/s, remaining {}",
            email, limit, remaining
        ),
        None => println!(
            "Common pool (no email) | rate limit {} req/s, remaining {}. Pass --email for the polite pool.",
            limit, remaining
        ),
    }

    if let Some(author) = &outcome.author {
        println!();
        println!("Author found: {}", author.display_name);
        println!("Institution: {}", author.affiliation.as_deref().unwrap_or("Unknown"));
        println!(
            "Total works: {} | Total citations: {}",
            author.works_count, author.cited_by_count
        );
        if let Some(orcid) = &author.orcid {
            println!("ORCID: {}", orcid);
        }
        if outcome.author_candidates.len() > 1 {
            println!("Other candidates:");
            for candidate in outcome.author_candidates.iter().skip(1) {
                println!(
                    "  - {} ({}, {} citations)",
                    candidate.display_name,
                    candidate.affiliation.as_deref().unwrap_or("unknown institution"),
                    candidate.cited_by_count
                );
            }
        }
        println!();
        println!("Found {} papers by {}", outcome.works.len(), author.display_name);
    } else {
        println!();
        println!("Found {} papers", outcome.works.len());
    }

    if let Some(warning) = &outcome.warning {
        println!("WARNING: {}", warning);
    }

    for (i, work) in outcome.works.iter().enumerate() {
        println!();
        println!("{}. {}", i + 1, work.title);
        let authors = if work.author_names.is_empty() {
            "Unknown".to_string()
        } else {
            work.author_names.join(", ")
        };
        println!("   {}", authors);
        println!(
            "   {} | {} | {} citations{}",
            work.publication_year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            work.source_name.as_deref().unwrap_or("Unknown"),
            work.citation_count,
            if work.is_open_access { " | Open Access" } else { "" }
        );
        if let Some(doi) = &work.doi {
            println!("   DOI: {}", doi);
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(config: Config, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = Arc::new(AppState {
        searcher: Searcher::new(config)?,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/export", post(export_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

struct AppState {
    searcher: Searcher,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Error body returned by the API
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

fn error_response(e: CitesearchError) -> Response {
    let (status, field) = match &e {
        CitesearchError::InvalidFilter { field, .. } => (StatusCode::BAD_REQUEST, Some(*field)),
        CitesearchError::NoAuthorMatch(_) => (StatusCode::NOT_FOUND, None),
        CitesearchError::Export(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
        CitesearchError::Fetch(_) => (StatusCode::BAD_GATEWAY, None),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
            field,
        }),
    )
        .into_response()
}

/// Malformed request bodies get the same JSON error shape as search failures.
fn rejection_response(rejection: JsonRejection) -> Response {
    (
        rejection.status(),
        Json(ErrorBody {
            error: rejection.body_text(),
            field: None,
        }),
    )
        .into_response()
}

/// Search endpoint handler
async fn search_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<FilterSpec>, JsonRejection>,
) -> Response {
    let Json(filters) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    info!(mode = %filters.mode, term = %filters.search_term, "Search request");

    match state.searcher.search(&filters).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

/// Export request body: a ranked result set previously returned by `/search`
#[derive(Debug, Deserialize)]
struct ExportRequest {
    works: Vec<citesearch::WorkRecord>,
    #[serde(default)]
    author: Option<citesearch::AuthorRecord>,
    format: ExportFormat,
}

/// Export endpoint handler
async fn export_handler(payload: std::result::Result<Json<ExportRequest>, JsonRejection>) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    match export::format(&req.works, req.author.as_ref(), req.format) {
        Ok(artifact) => (
            [
                (header::CONTENT_TYPE, artifact.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.filename),
                ),
            ],
            artifact.content,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::FromRequest;
    use axum::http::Request;

    async fn export_request(body: &'static str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/export")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        export_handler(Json::<ExportRequest>::from_request(request, &()).await).await
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_export_malformed_body_is_json_error() {
        let response = export_request("{not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_export_unknown_format_is_json_error() {
        let response = export_request(r#"{"works": [], "format": "docx"}"#).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_export_renders_attachment() {
        let response = export_request(r#"{"works": [], "format": "titles-txt"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("citation_titles.txt"));
    }
}
