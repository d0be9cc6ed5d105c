//! End-to-end search tests against a mocked OpenAlex API.

use citesearch::{export, CitesearchError, Config, ExportFormat, FilterSpec, Searcher};
use serde_json::{json, Value};
use wiremock::matchers::{any, header_exists, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn work_json(id: &str, citations: i64, year: i32) -> Value {
    json!({
        "id": format!("https://openalex.org/{}", id),
        "display_name": format!("Paper {}", id),
        "publication_year": year,
        "doi": format!("https://doi.org/10.1234/{}", id.to_lowercase()),
        "cited_by_count": citations,
        "authorships": [{"author": {"display_name": "Test Author"}}],
        "primary_location": {"source": {"display_name": "Test Journal"}},
        "open_access": {"is_oa": citations % 2 == 0}
    })
}

fn page_json(results: Vec<Value>, count: u64, next_cursor: Option<&str>) -> Value {
    json!({
        "meta": {"count": count, "next_cursor": next_cursor, "per_page": results.len()},
        "results": results
    })
}

fn works_range(start: usize, end: usize) -> Vec<Value> {
    (start..end)
        .map(|i| work_json(&format!("W{:03}", i), (i as i64 * 37) % 1000, 1990 + (i % 30) as i32))
        .collect()
}

fn searcher(server: &MockServer) -> Searcher {
    Searcher::new(Config::for_testing(&server.uri())).unwrap()
}

#[tokio::test]
async fn test_keyword_search_returns_requested_count() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("search", "CRISPR"))
        .and(query_param("sort", "cited_by_count:desc"))
        .and(query_param("per-page", "10"))
        .and(query_param("cursor", "*"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 10), 5000, Some("next"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = searcher(&server)
        .search(&FilterSpec::keyword("CRISPR").with_result_count(10))
        .await
        .unwrap();

    assert_eq!(outcome.works.len(), 10);
    let top = outcome.works[0].citation_count;
    assert!(outcome.works.iter().all(|w| w.citation_count <= top));
    assert!(outcome.author.is_none());
    assert!(outcome.warning.is_none());
    assert_eq!(outcome.total_available, Some(5000));
    assert!(!outcome.pool.polite);
}

#[tokio::test]
async fn test_author_without_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/authors"))
        .and(query_param("search", "Marie Curie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![], 0, None)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = searcher(&server).search(&FilterSpec::author("Marie Curie")).await;
    match result {
        Err(CitesearchError::NoAuthorMatch(term)) => assert_eq!(term, "Marie Curie"),
        other => panic!("expected NoAuthorMatch, got {:?}", other.map(|o| o.works.len())),
    }
}

#[tokio::test]
async fn test_invalid_years_issue_no_request() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let spec = FilterSpec::keyword("CRISPR").with_years(Some(2030), Some(2020));
    let result = searcher(&server).search(&spec).await;
    assert!(matches!(
        result,
        Err(CitesearchError::InvalidFilter { field: "year_range", .. })
    ));
}

#[tokio::test]
async fn test_later_page_failure_keeps_partial_results() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 20), 400, Some("page2"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    // One attempt plus one immediate retry.
    Mock::given(path("/works"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(2)
        .mount(&server)
        .await;

    let outcome = searcher(&server)
        .search(&FilterSpec::keyword("graphene").with_result_count(50))
        .await
        .unwrap();

    assert_eq!(outcome.works.len(), 20);
    let warning = outcome.warning.as_ref().expect("partial warning");
    assert_eq!(warning.pages_fetched, 1);
    assert_eq!(warning.records_kept, 20);
    for pair in outcome.works.windows(2) {
        assert!(pair[0].citation_count >= pair[1].citation_count);
    }

    let artifact = export::format(&outcome.works, None, ExportFormat::FullTxt).unwrap();
    let body = String::from_utf8(artifact.content).unwrap();
    assert_eq!(body.split("\n\n").count(), 20);
}

#[tokio::test]
async fn test_first_page_failure_aborts() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let result = searcher(&server).search(&FilterSpec::keyword("graphene")).await;
    assert!(matches!(result, Err(CitesearchError::Fetch(_))));
}

#[tokio::test]
async fn test_transient_failure_is_retried_once() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 5), 5, None)))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = searcher(&server)
        .search(&FilterSpec::keyword("graphene").with_result_count(5))
        .await
        .unwrap();
    assert_eq!(outcome.works.len(), 5);
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .expect(1)
        .mount(&server)
        .await;

    let result = searcher(&server).search(&FilterSpec::keyword("graphene")).await;
    match result {
        Err(CitesearchError::Fetch(message)) => assert!(message.contains("400")),
        other => panic!("expected Fetch error, got {:?}", other.map(|o| o.works.len())),
    }
}

#[tokio::test]
async fn test_author_search_selects_most_cited_candidate() {
    let server = MockServer::start().await;

    Mock::given(path("/authors"))
        .and(query_param("search", "J. Smith"))
        .and(query_param("per-page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            vec![
                json!({
                    "id": "https://openalex.org/A1",
                    "display_name": "John Smith",
                    "works_count": 300,
                    "cited_by_count": 1200,
                    "last_known_institutions": [{"display_name": "MIT"}]
                }),
                json!({
                    "id": "https://openalex.org/A2",
                    "display_name": "Jane Smith",
                    "works_count": 80,
                    "cited_by_count": 45000,
                    "orcid": "https://orcid.org/0000-0001-2345-6789",
                    "last_known_institution": {"display_name": "Oxford"}
                }),
            ],
            2,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .and(query_param("filter", "author.id:A2,is_oa:true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 5), 80, Some("x"))))
        .expect(1)
        .mount(&server)
        .await;

    let spec = FilterSpec::author("J. Smith")
        .with_result_count(5)
        .with_open_access_only(true);
    let outcome = searcher(&server).search(&spec).await.unwrap();

    let author = outcome.author.as_ref().unwrap();
    assert_eq!(author.id, "A2");
    assert_eq!(author.affiliation.as_deref(), Some("Oxford"));
    assert_eq!(outcome.author_candidates.len(), 2);
    assert_eq!(outcome.author_candidates[1].display_name, "John Smith");
    assert_eq!(outcome.works.len(), 5);

    let csv = export::format(&outcome.works, outcome.author.as_ref(), ExportFormat::Csv).unwrap();
    assert_eq!(csv.filename, "author_citation_papers.csv");
}

#[tokio::test]
async fn test_overlapping_pages_are_deduplicated() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "*"))
        .and(query_param("per-page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 5), 100, Some("p2"))))
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(3, 8), 100, Some("p3"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "p3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(8, 13), 100, None)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::for_testing(&server.uri());
    config.max_per_page = 5;
    let outcome = Searcher::new(config)
        .unwrap()
        .search(&FilterSpec::keyword("graphene").with_result_count(10))
        .await
        .unwrap();

    assert_eq!(outcome.works.len(), 10);
    let mut ids: Vec<&str> = outcome.works.iter().map(|w| w.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_page_limit_stops_pagination() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 25), 10_000, Some("p2"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(25, 50), 10_000, Some("p3"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "p3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(50, 75), 10_000, None)))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = Config::for_testing(&server.uri());
    config.max_pages = 2;
    let outcome = Searcher::new(config)
        .unwrap()
        .search(&FilterSpec::keyword("graphene").with_result_count(100))
        .await
        .unwrap();

    assert_eq!(outcome.works.len(), 50);
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn test_polite_pool_and_citation_threshold() {
    let server = MockServer::start().await;

    let mut results = works_range(0, 5);
    results.push(work_json("W999", 3, 2020));

    Mock::given(path("/works"))
        .and(query_param("mailto", "me@example.org"))
        .and(query_param("filter", "cited_by_count:>99"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "10")
                .insert_header("x-ratelimit-remaining", "99990")
                .set_body_json(page_json(results, 6, None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let spec = FilterSpec::keyword("graphene")
        .with_min_citations(100)
        .with_contact_email(Some("me@example.org".to_string()));
    let outcome = searcher(&server).search(&spec).await.unwrap();

    assert!(outcome.pool.polite);
    assert_eq!(outcome.pool.email.as_deref(), Some("me@example.org"));
    assert_eq!(outcome.pool.rate_limit.limit.as_deref(), Some("10"));
    assert_eq!(outcome.pool.rate_limit.remaining.as_deref(), Some("99990"));
    assert!(outcome.works.iter().all(|w| w.citation_count >= 100));
    assert!(outcome.works.iter().all(|w| w.id != "W999"));
}

#[tokio::test]
async fn test_citation_floor_keeps_paging_when_index_ignores_it() {
    let server = MockServer::start().await;

    let mut first: Vec<Value> = (0..7).map(|i| work_json(&format!("W{:03}", i), 500, 2020)).collect();
    first.extend((7..10).map(|i| work_json(&format!("W{:03}", i), 5, 2020)));
    let second: Vec<Value> = (100..110).map(|i| work_json(&format!("W{:03}", i), 400, 2019)).collect();

    Mock::given(path("/works"))
        .and(query_param("cursor", "*"))
        .and(query_param("filter", "cited_by_count:>99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(first, 20, Some("p2"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(second, 20, Some("p3"))))
        .expect(1)
        .mount(&server)
        .await;

    let spec = FilterSpec::keyword("x").with_result_count(10).with_min_citations(100);
    let outcome = searcher(&server).search(&spec).await.unwrap();

    assert_eq!(outcome.works.len(), 10);
    assert!(outcome.works.iter().all(|w| w.citation_count >= 100));
    assert_eq!(outcome.works.iter().filter(|w| w.citation_count == 500).count(), 7);
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn test_malformed_email_falls_back_to_common_pool() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .and(query_param_is_missing("mailto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 10), 10, None)))
        .expect(1)
        .mount(&server)
        .await;

    let spec = FilterSpec::keyword("graphene").with_contact_email(Some("not-an-email".to_string()));
    let outcome = searcher(&server).search(&spec).await.unwrap();

    assert_eq!(outcome.works.len(), 10);
    assert!(!outcome.pool.polite);
    assert!(outcome.pool.email.is_none());
}

#[tokio::test]
async fn test_rate_limited_page_is_retried_after_hint() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(works_range(0, 10), 10, None)))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = searcher(&server).search(&FilterSpec::keyword("graphene")).await.unwrap();
    assert_eq!(outcome.works.len(), 10);
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn test_repeated_rate_limit_is_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let result = searcher(&server).search(&FilterSpec::keyword("graphene")).await;
    assert!(matches!(result, Err(CitesearchError::Fetch(_))));
}

#[tokio::test]
async fn test_author_lookup_failure_is_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(path("/authors"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(path("/works"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = searcher(&server).search(&FilterSpec::author("Marie Curie")).await;
    match result {
        Err(CitesearchError::Fetch(message)) => assert!(message.contains("500")),
        other => panic!("expected Fetch error, got {:?}", other.map(|o| o.works.len())),
    }
}
