// Tests for crawl orchestration and reporting

use async_trait::async_trait;
use snaptrack_core::crawl::{
    CrawlOptions, execute_crawl, extract_url_path, generate_crawl_report,
    latest_snapshots_in_scope,
};
use snaptrack_core::data::Database;
use snaptrack_scanner::{
    CrawlStats, Fetcher, HeaderMap, MemoryStore, PageCapture, Result, ScanError, SnapshotStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct StaticSite {
    pages: HashMap<String, String>,
}

impl StaticSite {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl Fetcher for StaticSite {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<PageCapture> {
        let body = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScanError::FetchError(format!("connection refused: {}", url)))?;
        Ok(PageCapture {
            body,
            status_code: 200,
            request_headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
        })
    }
}

fn capture(body: &str, status_code: u16) -> PageCapture {
    PageCapture {
        body: body.to_string(),
        status_code,
        request_headers: HeaderMap::new(),
        response_headers: HeaderMap::new(),
    }
}

// ============================================================================
// URL Path Extraction Tests
// ============================================================================

#[test]
fn test_extract_url_path_root() {
    assert_eq!(extract_url_path("http://example.com/"), "/");
    assert_eq!(extract_url_path("http://example.com"), "/");
}

#[test]
fn test_extract_url_path_nested() {
    assert_eq!(extract_url_path("http://example.com/docs/v1/intro"), "/docs/v1/intro");
}

#[test]
fn test_extract_url_path_drops_query_and_fragment() {
    assert_eq!(extract_url_path("http://example.com/page?tab=2#top"), "/page");
}

#[test]
fn test_extract_url_path_with_port() {
    assert_eq!(extract_url_path("http://localhost:3000/about"), "/about");
}

#[test]
fn test_extract_url_path_invalid_url() {
    let url = "not a valid url";
    // Unparsable input comes back as-is
    assert_eq!(extract_url_path(url), url);
}

// ============================================================================
// Crawl Execution Tests
// ============================================================================

#[tokio::test]
async fn test_execute_crawl_stores_same_origin_pages() {
    let fetcher = Arc::new(StaticSite::new(&[
        (
            "http://a.test/",
            r#"<a href="/x">x</a><a href="http://other.test/">away</a>"#,
        ),
        ("http://a.test/x", "<p>leaf</p>"),
        ("http://other.test/", "<p>never fetched</p>"),
    ]));
    let store = Arc::new(Database::open_in_memory().unwrap());

    let stats = execute_crawl(CrawlOptions::new("http://a.test"), fetcher, store.clone())
        .await
        .unwrap();

    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.stored, 2);
    assert_eq!(
        store.distinct_urls().unwrap(),
        vec!["http://a.test/".to_string(), "http://a.test/x".to_string()]
    );
}

#[tokio::test]
async fn test_execute_crawl_twice_stores_nothing_new() {
    let fetcher = Arc::new(StaticSite::new(&[
        ("http://a.test/", r#"<a href="/x">x</a>"#),
        ("http://a.test/x", "<p>leaf</p>"),
    ]));
    let store = Arc::new(Database::open_in_memory().unwrap());

    execute_crawl(CrawlOptions::new("http://a.test/"), fetcher.clone(), store.clone())
        .await
        .unwrap();
    let second = execute_crawl(CrawlOptions::new("http://a.test/"), fetcher, store.clone())
        .await
        .unwrap();

    assert_eq!(second.stored, 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(store.count_snapshots().unwrap(), 2);
}

#[tokio::test]
async fn test_execute_crawl_respects_configured_depth() {
    let fetcher = Arc::new(StaticSite::new(&[
        ("http://a.test/", r#"<a href="/1">1</a>"#),
        ("http://a.test/1", r#"<a href="/2">2</a>"#),
        ("http://a.test/2", "<p>deep</p>"),
    ]));
    let store = Arc::new(MemoryStore::new());

    let mut options = CrawlOptions::new("http://a.test/");
    options.config.max_depth = 1;

    let stats = execute_crawl(options, fetcher, store.clone()).await.unwrap();

    assert_eq!(stats.fetched, 2);
    assert!(store.last_snapshot("http://a.test/2").is_err());
}

#[tokio::test]
async fn test_execute_crawl_rejects_invalid_seed() {
    let fetcher = Arc::new(StaticSite::new(&[]));
    let store = Arc::new(MemoryStore::new());

    let result = execute_crawl(CrawlOptions::new("not a url"), fetcher, store.clone()).await;

    assert!(matches!(result, Err(ScanError::InvalidSeed(_))));
    assert_eq!(store.snapshot_count().unwrap(), 0);
}

#[tokio::test]
async fn test_execute_crawl_with_progress_bars() {
    let fetcher = Arc::new(StaticSite::new(&[("http://a.test/", "<p>home</p>")]));
    let store = Arc::new(MemoryStore::new());

    let mut options = CrawlOptions::new("http://a.test/");
    options.show_progress_bars = true;

    let stats = execute_crawl(options, fetcher, store).await.unwrap();
    assert_eq!(stats.fetched, 1);
}

// ============================================================================
// Report Tests
// ============================================================================

#[test]
fn test_latest_snapshots_in_scope_filters_by_origin() {
    let store = MemoryStore::new();
    store
        .store_or_update_snapshot("http://a.test/", &capture("v1", 200))
        .unwrap();
    store
        .store_or_update_snapshot("http://a.test/", &capture("v2", 200))
        .unwrap();
    store
        .store_or_update_snapshot("http://a.test/missing", &capture("gone", 404))
        .unwrap();
    store
        .store_or_update_snapshot("http://b.test/", &capture("elsewhere", 200))
        .unwrap();

    let pages = latest_snapshots_in_scope(&store, "http://a.test/").unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].url, "http://a.test/");
    assert_eq!(pages[0].html_body, "v2");
    assert_eq!(pages[1].status_code, 404);
}

#[test]
fn test_latest_snapshots_in_scope_invalid_seed() {
    let store = MemoryStore::new();
    let result = latest_snapshots_in_scope(&store, "::nope::");
    assert!(matches!(result, Err(ScanError::InvalidSeed(_))));
}

#[test]
fn test_generate_crawl_report_summary() {
    let stats = CrawlStats {
        scheduled: 4,
        fetched: 3,
        failed: 1,
        stored: 2,
        unchanged: 1,
        ..Default::default()
    };

    let report = generate_crawl_report(&stats, &[]);

    assert!(report.contains("Pages scheduled: 4"));
    assert!(report.contains("Pages fetched: 3"));
    assert!(report.contains("Fetch failures: 1"));
    assert!(report.contains("New snapshots: 2"));
    assert!(report.contains("Unchanged pages: 1"));
    assert!(!report.contains("Storage errors"));
}

#[test]
fn test_generate_crawl_report_mentions_storage_errors() {
    let stats = CrawlStats {
        storage_errors: 2,
        ..Default::default()
    };

    let report = generate_crawl_report(&stats, &[]);
    assert!(report.contains("Storage errors: 2"));
}

#[test]
fn test_generate_crawl_report_groups_pages_by_host() {
    colored::control::set_override(false);

    let store = MemoryStore::new();
    store
        .store_or_update_snapshot("http://a.test/", &capture("home", 200))
        .unwrap();
    store
        .store_or_update_snapshot("http://a.test/docs", &capture("docs", 200))
        .unwrap();
    store
        .store_or_update_snapshot("http://a.test/old", &capture("gone", 404))
        .unwrap();
    let pages = latest_snapshots_in_scope(&store, "http://a.test/").unwrap();

    let report = generate_crawl_report(&CrawlStats::default(), &pages);

    assert!(report.contains("## a.test"));
    assert!(report.contains("3 pages tracked"));
    assert!(report.contains("200 /docs"));
    assert!(report.contains("404 /old"));

    colored::control::unset_override();
}
