//! Integration tests for the scraper
//!
//! These tests use wiremock to create mock dictionary sites and test the
//! full scrape cycle end-to-end, plus instrumented transports for the
//! politeness properties.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use vernala_scraper::config::{Config, CrawlerConfig, LanguageEntry, OutputConfig, UserAgentConfig};
use vernala_scraper::crawler::{
    normalize_text, run_scrape, run_scrape_with_transport, ScrapeScope, Transport, TransportError, TransportResponse,
};
use vernala_scraper::output::{CombinationStatus, EntryDocument};
use vernala_scraper::storage::{RunStatus, SqliteStorage, Storage};
use vernala_scraper::{Combination, SourceLanguage};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for a single test language served from `base_url`
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            min_request_interval_ms: 0, // No pacing unless a test asks for it
            max_concurrent_requests: 2,
            max_concurrent_combinations: 2,
            max_retries: 1,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 20,
            request_timeout_secs: 5,
            page_size: 2,
            max_pages_per_letter: 10,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.join("vernala.db").to_string_lossy().into_owned(),
            json_dir: None,
            summary_path: dir.join("summary.md").to_string_lossy().into_owned(),
        },
        languages: vec![LanguageEntry {
            id: "testlang".to_string(),
            name: "Test Language".to_string(),
            code: "tst".to_string(),
            url_template: format!(
                "{}/testlang/{{path}}?letter={{letter}}&key={{source}}&pagenr={{page}}",
                base_url
            ),
            letters: Some(vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]),
            sources: Some(vec![SourceLanguage::English]),
        }],
    }
}

fn scope(letters: &[&str]) -> ScrapeScope {
    ScrapeScope {
        languages: vec!["testlang".to_string()],
        letters: letters.iter().map(|l| l.to_string()).collect(),
        sources: vec![SourceLanguage::English],
    }
}

fn combination(letter: &str) -> Combination {
    Combination::new("testlang", letter, SourceLanguage::English)
}

/// One entry block with a single vernacular translation
fn entry_block(headword: &str, word: &str) -> String {
    format!(
        r#"<div class="post">
             <span class="reversalform">{headword}</span>
             <span class="sensesr"><span class="headword"><span lang="tst"><a href="/testlang/{word}">{word}</a></span></span></span>
           </div>"#
    )
}

fn page(blocks: &[String], footer: &str) -> String {
    format!(
        "<html><body><div id=\"results\">{}</div>{}</body></html>",
        blocks.concat(),
        footer
    )
}

fn total_entries(n: u32) -> String {
    format!(r#"<div data-total-entries="{}"></div>"#, n)
}

fn pager(pages: u32) -> String {
    format!(
        r#"<div id="wp_page_numbers"><ul><li class="page_info">Page 1 of {}</li></ul></div>"#,
        pages
    )
}

async fn mount_page(server: &MockServer, letter: &str, number: u32, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(query_param("letter", letter))
        .and(query_param("pagenr", number.to_string().as_str()))
        .respond_with(template)
        .mount(server)
        .await;
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open storage")
}

/// Serves the standard fixture: 2 entries + hint of 3 on page 1, 1 entry on page 2
async fn mount_three_entries(server: &MockServer, letter: &str) {
    mount_page(
        server,
        letter,
        1,
        html(page(
            &[entry_block("apple", "pɔ́m"), entry_block("arm", "bɔ̀")],
            &total_entries(3),
        )),
    )
    .await;
    mount_page(server, letter, 2, html(page(&[entry_block("axe", "ŋgáŋ")], ""))).await;
}

#[tokio::test]
async fn test_full_scrape_two_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());
    mount_three_entries(&server, "a").await;

    let report = run_scrape(&config, "hash", &scope(&["a"]), CancellationToken::new())
        .await
        .expect("Scrape should succeed");

    assert_eq!(report.combinations.len(), 1);
    let combo = &report.combinations[0];
    assert_eq!(combo.status, CombinationStatus::Written);
    assert_eq!(combo.entries_written, 3);
    assert_eq!(combo.pages_fetched, 2);
    assert_eq!(combo.pages_failed, 0);
    assert!(!report.all_failed());

    // Entries are stored in page-then-block order
    let storage = open(&config);
    let stored = storage.load_combination(&combination("a")).unwrap();
    let headwords: Vec<_> = stored.iter().map(|e| e.headword.as_str()).collect();
    assert_eq!(headwords, vec!["apple", "arm", "axe"]);
    assert_eq!(stored[2].words(), vec![normalize_text("ŋgáŋ").as_str()]);
    assert_eq!(stored[0].translations[0].link.as_deref(), Some("/testlang/pɔ́m"));

    // Run ledger and per-combination report
    let run = storage.get_latest_run().unwrap().expect("Run should be recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash");
    let reports = storage.get_combination_reports(run.id).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].entries_written, 3);

    // Markdown summary
    let summary = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(summary.contains("| testlang | en | a | written | 3 | 2 | 0 | 0 | 0 |"));
}

#[tokio::test]
async fn test_failed_page_is_a_gap() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_page(
        &server,
        "a",
        1,
        html(page(
            &[entry_block("apple", "pɔ́m"), entry_block("arm", "bɔ̀")],
            &total_entries(3),
        )),
    )
    .await;
    Mock::given(method("GET"))
        .and(query_param("pagenr", "2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2) // First attempt plus one retry
        .mount(&server)
        .await;

    let report = run_scrape(&config, "hash", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    let combo = &report.combinations[0];
    assert_eq!(combo.status, CombinationStatus::Written);
    assert_eq!(combo.pages_fetched, 1);
    assert_eq!(combo.pages_failed, 1);
    assert_eq!(combo.entries_written, 2);
    assert!(combo.error.as_ref().unwrap().contains("503"));

    let stored = open(&config).load_combination(&combination("a")).unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_block_without_headword_is_dropped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let headless = r#"<div class="post">
        <span class="sensesr"><span class="headword"><span lang="tst"><a href="/x">kɛ̀</a></span></span></span>
    </div>"#
        .to_string();
    mount_page(
        &server,
        "b",
        1,
        html(page(
            &[entry_block("bag", "ntʉ̀"), headless, entry_block("bird", "ŋnɔ̀")],
            &total_entries(3),
        )),
    )
    .await;

    let report = run_scrape(&config, "hash", &scope(&["b"]), CancellationToken::new())
        .await
        .unwrap();

    let combo = &report.combinations[0];
    assert_eq!(combo.parse_failures, 1);
    assert_eq!(combo.entries_written, 2);

    let stored = open(&config).load_combination(&combination("b")).unwrap();
    let headwords: Vec<_> = stored.iter().map(|e| e.headword.as_str()).collect();
    assert_eq!(headwords, vec!["bag", "bird"]);
}

#[tokio::test]
async fn test_empty_page_stops_early() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_page(
        &server,
        "c",
        1,
        html(page(&[entry_block("cat", "ŋkáp"), entry_block("cow", "nàʼ")], &pager(3))),
    )
    .await;
    mount_page(&server, "c", 2, html(page(&[], ""))).await;
    Mock::given(method("GET"))
        .and(query_param("pagenr", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = run_scrape(&config, "hash", &scope(&["c"]), CancellationToken::new())
        .await
        .unwrap();

    let combo = &report.combinations[0];
    assert_eq!(combo.stopped_early_at, Some(2));
    assert_eq!(combo.pages_fetched, 2);
    assert_eq!(combo.entries_written, 2);
    assert_eq!(combo.expected_pages, Some(3));

    let stored = open(&config)
        .get_combination_reports(report.run_id.unwrap())
        .unwrap();
    assert_eq!(stored[0].expected_pages, Some(3));
    assert_eq!(stored[0].stopped_early_at, Some(2));
}

#[tokio::test]
async fn test_rescrape_replaces_previous_set() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_three_entries(&server, "a").await;
    run_scrape(&config, "first", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    server.reset().await;
    mount_page(
        &server,
        "a",
        1,
        html(page(&[entry_block("anchor", "lə̀ŋ")], &total_entries(1))),
    )
    .await;
    run_scrape(&config, "second", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    let storage = open(&config);
    let stored = storage.load_combination(&combination("a")).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].headword, "anchor");
    assert_eq!(storage.count_entries().unwrap(), 1);
    assert_eq!(storage.count_translations().unwrap(), 1);
}

#[tokio::test]
async fn test_nothing_fetched_keeps_stored_set() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_three_entries(&server, "a").await;
    run_scrape(&config, "first", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    // The site is now down: 404 fails after a single attempt
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = run_scrape(&config, "second", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.combinations[0].status, CombinationStatus::NothingFetched);
    assert!(report.all_failed());

    let storage = open(&config);
    assert_eq!(storage.load_combination(&combination("a")).unwrap().len(), 3);
    assert_eq!(storage.get_latest_run().unwrap().unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(query_param("pagenr", "1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "a",
        1,
        html(page(&[entry_block("apple", "pɔ́m")], &total_entries(1))),
    )
    .await;

    let started = std::time::Instant::now();
    let report = run_scrape(&config, "hash", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.combinations[0].entries_written, 1);
    assert_eq!(report.combinations[0].pages_failed, 0);
    // Retry-After is honored through the gate
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_json_documents_written() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path());
    let json_dir = dir.path().join("json");
    config.output.json_dir = Some(json_dir.to_string_lossy().into_owned());

    mount_three_entries(&server, "a").await;
    run_scrape(&config, "hash", &scope(&["a"]), CancellationToken::new())
        .await
        .unwrap();

    let text = std::fs::read_to_string(json_dir.join("testlang").join("en").join("a.json")).unwrap();
    let docs: Vec<EntryDocument> = serde_json::from_str(&text).unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].headword, "apple");
    assert_eq!(docs[0].translations, vec!["pɔ́m"]);
    assert_eq!(docs[0].source_language, "en");
    assert_eq!(docs[0].language, "tst");

    // The database was written as well
    assert_eq!(open(&config).count_entries().unwrap(), 3);
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = run_scrape(&config, "hash", &scope(&["a", "b"]), cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.combinations.len(), 2);
    assert!(report.combinations.iter().all(|c| c.cancelled));
    assert!(!report.all_failed());

    let storage = open(&config);
    assert_eq!(storage.count_entries().unwrap(), 0);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
}

/// Serves page 1 of a three-page letter, then cancels the run
struct CancellingTransport {
    cancel: CancellationToken,
    requests: AtomicUsize,
}

#[async_trait]
impl Transport for CancellingTransport {
    async fn get(&self, _url: &Url) -> Result<TransportResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let body = page(&[entry_block("apple", "pɔ́m"), entry_block("arm", "bɔ̀")], &pager(3));
        self.cancel.cancel();
        Ok(TransportResponse::new(200, body))
    }
}

#[tokio::test]
async fn test_cancelled_mid_run_writes_partial_result() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://dict.test", dir.path());
    let cancel = CancellationToken::new();
    let transport = Arc::new(CancellingTransport {
        cancel: cancel.clone(),
        requests: AtomicUsize::new(0),
    });

    let report = run_scrape_with_transport(&config, "hash", &scope(&["a"]), cancel, transport.clone())
        .await
        .unwrap();

    assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
    assert!(report.cancelled);
    assert!(!report.all_failed());

    let combo = &report.combinations[0];
    assert_eq!(combo.status, CombinationStatus::Written);
    assert!(combo.cancelled);
    assert_eq!(combo.pages_fetched, 1);
    assert_eq!(combo.entries_written, 2);
    assert_eq!(combo.expected_pages, Some(3));

    let storage = open(&config);
    let stored = storage.load_combination(&combination("a")).unwrap();
    let headwords: Vec<_> = stored.iter().map(|e| e.headword.as_str()).collect();
    assert_eq!(headwords, vec!["apple", "arm"]);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
}

#[tokio::test]
async fn test_unknown_language_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9", dir.path());
    let scope = ScrapeScope {
        languages: vec!["nowhere".to_string()],
        ..ScrapeScope::default()
    };

    let result = run_scrape(&config, "hash", &scope, CancellationToken::new()).await;
    assert!(result.is_err());
}

/// Serves one single-entry page per request and records issue times and concurrency
struct InstrumentedTransport {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    issued: Mutex<Vec<tokio::time::Instant>>,
    latency: Duration,
}

impl InstrumentedTransport {
    fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
            latency,
        })
    }
}

#[async_trait]
impl Transport for InstrumentedTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        self.issued.lock().unwrap().push(tokio::time::Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let letter = url
            .query_pairs()
            .find(|(k, _)| k == "letter")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let body = page(&[entry_block(&format!("{}-word", letter), "wɔ")], &total_entries(1));
        Ok(TransportResponse::new(200, body))
    }
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_cap_across_combinations() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config("http://dict.test", dir.path());
    config.crawler.max_concurrent_requests = 2;
    config.crawler.max_concurrent_combinations = 4;

    let transport = InstrumentedTransport::new(Duration::from_millis(300));
    let report = run_scrape_with_transport(
        &config,
        "hash",
        &scope(&["a", "b", "c", "d"]),
        CancellationToken::new(),
        transport.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.written_count(), 4);
    assert_eq!(transport.issued.lock().unwrap().len(), 4);
    assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_issue_times_respect_interval() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config("http://dict.test", dir.path());
    config.crawler.min_request_interval_ms = 250;
    config.crawler.max_concurrent_requests = 4;
    config.crawler.max_concurrent_combinations = 4;

    let transport = InstrumentedTransport::new(Duration::from_millis(10));
    run_scrape_with_transport(
        &config,
        "hash",
        &scope(&["a", "b", "c", "d"]),
        CancellationToken::new(),
        transport.clone(),
    )
    .await
    .unwrap();

    let mut issued = transport.issued.lock().unwrap().clone();
    issued.sort();
    assert_eq!(issued.len(), 4);
    for pair in issued.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(250));
    }
}
