//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the directory API and drive
//! full crawls end-to-end against a temporary SQLite database.

use profile_sieve::api::DirectoryClient;
use profile_sieve::config::{load_config, Config, SettingsProvider};
use profile_sieve::crawler::{CrawlSettings, Crawler};
use profile_sieve::output::generate_markdown_summary;
use profile_sieve::pool::CredentialPool;
use profile_sieve::state::{CellState, GenderStrategy, RunStatus};
use profile_sieve::storage::{ProgressStore, SearchControl, SqliteStorage};
use profile_sieve::{ConfigError, RunOutcome};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a test configuration pointing at the mock server
fn write_config(dir: &TempDir, base_url: &str, tokens: &[&str]) -> std::path::PathBuf {
    let db_path = dir.path().join("sieve.db");
    let summary_path = dir.path().join("found.md");
    let tokens = tokens
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(", ");

    let toml = format!(
        r#"
[api]
base-url = "{base_url}"
min-population = 5
request-timeout-secs = 5

[credentials]
tokens = [{tokens}]

[delays]
request = 0
recent-activity = 0
found-profile = 0
between-pages = 0
between-ages = 0
between-strategies = 0
between-cities = 0
rate-limit-cooldown = 0

[output]
database-path = "{db}"
summary-path = "{summary}"

[[search]]
user = "alice"
cities = ["Springfield", "Atlantis"]
keywords = ["Chess"]
age-from = 20
age-to = 20
"#,
        base_url = base_url,
        tokens = tokens,
        db = db_path.display(),
        summary = summary_path.display(),
    );

    let config_path = dir.path().join("sieve.toml");
    std::fs::write(&config_path, toml).unwrap();
    config_path
}

fn build_crawler(config: &Config) -> (Arc<SqliteStorage>, Crawler) {
    let pool = Arc::new(CredentialPool::new(
        config.credentials.usable_tokens(),
        config.pool.clone(),
    ));
    let client = DirectoryClient::new(&config.api, &config.delays, pool).unwrap();
    let storage =
        Arc::new(SqliteStorage::new(Path::new(&config.output.database_path)).unwrap());

    let crawler = Crawler::new(
        Arc::new(client),
        storage.clone(),
        storage.clone(),
        storage.clone(),
        CrawlSettings::from_config(config),
    );
    (storage, crawler)
}

fn profiles(first_id: i64, n: usize, matching: usize) -> serde_json::Value {
    json!((0..n)
        .map(|i| json!({
            "id": first_id + i as i64,
            "first_name": "Test",
            "last_name": format!("User{}", i),
            "is_closed": false,
            "photo_200": "https://img.example.com/p.jpg",
            "about": if i < matching { "Chess every weekend" } else { "Gardening" },
        }))
        .collect::<Vec<_>>())
}

fn ok(payload: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "response": payload }))
}

/// Mounts a directory where Springfield has 60 primary and 3 secondary profiles
async fn mount_directory(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/method/database.getCities"))
        .and(query_param("q", "Springfield"))
        .respond_with(ok(json!({ "count": 1, "items": [{ "id": 42, "title": "Springfield" }] })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/database.getCities"))
        .and(query_param("q", "Atlantis"))
        .respond_with(ok(json!({ "count": 0, "items": [] })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/users.search"))
        .and(query_param("city", "42"))
        .and(query_param("sex", "1"))
        .and(query_param("offset", "0"))
        .respond_with(ok(json!({ "count": 60, "items": profiles(1, 50, 2) })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/users.search"))
        .and(query_param("city", "42"))
        .and(query_param("sex", "1"))
        .and(query_param("offset", "50"))
        .respond_with(ok(json!({ "count": 60, "items": profiles(51, 10, 1) })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/users.search"))
        .and(query_param("city", "42"))
        .and(query_param("sex", "2"))
        .respond_with(ok(json!({ "count": 3, "items": profiles(100, 3, 3) })))
        .mount(server)
        .await;
}

async fn search_requests(server: &MockServer) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/method/users.search")
        .collect()
}

#[tokio::test]
async fn test_full_crawl_records_matches_and_completes() {
    let server = MockServer::start().await;
    mount_directory(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&write_config(&dir, &server.uri(), &["token-a"])).unwrap();
    let (storage, crawler) = build_crawler(&config);
    let settings = config.get_settings("alice").unwrap();

    storage.set_searching("alice", true).unwrap();
    let summary = crawler.run_crawl("alice", &settings).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.profiles_found, 3);
    assert_eq!(storage.count_found("alice").unwrap(), 3);
    assert!(!storage.is_still_searching("alice").unwrap());

    let progress = storage.load_progress("alice").unwrap().unwrap();
    assert_eq!(progress.status, RunStatus::Completed);

    let primary = progress
        .cell("Springfield", GenderStrategy::Primary, 20)
        .unwrap();
    assert_eq!(primary.offset, 60);
    assert_eq!(primary.found, 3);
    assert_eq!(primary.state(), CellState::Completed);

    let secondary = progress
        .cell("Springfield", GenderStrategy::Secondary, 20)
        .unwrap();
    assert_eq!(secondary.state(), CellState::Skipped);

    let atlantis = progress.city("Atlantis").unwrap();
    assert!(atlantis.completed);
    assert_eq!(atlantis.place_id, None);

    let found = storage.list_found("alice").unwrap();
    let ids: Vec<i64> = found.iter().map(|r| r.profile.profile_id).collect();
    assert_eq!(ids, vec![1, 2, 51]);
    assert_eq!(found[0].profile.profile_url, "https://vk.com/id1");
    assert_eq!(found[0].profile.hits[0].field, "about");

    let summary_path = Path::new(&config.output.summary_path);
    let written = generate_markdown_summary(&storage, &config.users(), summary_path).unwrap();
    assert_eq!(written, 3);
    let markdown = std::fs::read_to_string(summary_path).unwrap();
    assert!(markdown.contains("### Springfield"));
    assert!(markdown.contains("https://vk.com/id51"));
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_found_profiles() {
    let server = MockServer::start().await;
    mount_directory(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&write_config(&dir, &server.uri(), &["token-a"])).unwrap();
    let (storage, crawler) = build_crawler(&config);
    let settings = config.get_settings("alice").unwrap();

    storage.set_searching("alice", true).unwrap();
    crawler.run_crawl("alice", &settings).await.unwrap();

    storage.set_searching("alice", true).unwrap();
    let again = crawler.run_crawl("alice", &settings).await.unwrap();

    assert!(!again.resumed);
    assert_eq!(again.pages_fetched, 3);
    assert_eq!(again.profiles_found, 0);
    assert_eq!(storage.count_found("alice").unwrap(), 3);
}

#[tokio::test]
async fn test_stop_and_resume() {
    let server = MockServer::start().await;
    mount_directory(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&write_config(&dir, &server.uri(), &["token-a"])).unwrap();
    let settings = config.get_settings("alice").unwrap();

    // Stop was requested before the crawl got going
    {
        let (storage, crawler) = build_crawler(&config);
        storage.set_searching("alice", false).unwrap();

        let summary = crawler.run_crawl("alice", &settings).await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert!(search_requests(&server).await.is_empty());

        let progress = storage.load_progress("alice").unwrap().unwrap();
        assert_eq!(progress.status, RunStatus::Stopped);
    }

    // A new process picks the stored cursor up
    let (storage, crawler) = build_crawler(&config);
    storage.set_searching("alice", true).unwrap();

    let summary = crawler.run_crawl("alice", &settings).await.unwrap();
    assert!(summary.resumed);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(search_requests(&server).await.len(), 3);
}

#[tokio::test]
async fn test_rate_limited_page_retried_with_other_credential() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/users.search"))
        .and(query_param("sex", "1"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "error_code": 29, "error_msg": "Rate limit reached" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_directory(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config =
        load_config(&write_config(&dir, &server.uri(), &["token-a", "token-b"])).unwrap();
    let (storage, crawler) = build_crawler(&config);
    let settings = config.get_settings("alice").unwrap();

    storage.set_searching("alice", true).unwrap();
    let summary = crawler.run_crawl("alice", &settings).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(storage.count_found("alice").unwrap(), 3);

    let requests = search_requests(&server).await;
    assert_eq!(requests.len(), 4);

    let token = |r: &wiremock::Request| {
        r.url
            .query_pairs()
            .find(|(k, _)| k == "access_token")
            .map(|(_, v)| v.to_string())
            .unwrap()
    };
    assert_ne!(token(&requests[0]), token(&requests[1]));
    assert_eq!(
        requests[0].url.query_pairs().find(|(k, _)| k == "offset"),
        requests[1].url.query_pairs().find(|(k, _)| k == "offset")
    );
}

#[test]
fn test_config_without_credentials_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "http://127.0.0.1:9", &["", "  "]);

    assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
}
