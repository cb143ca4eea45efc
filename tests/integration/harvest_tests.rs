//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small synthetic job board and run the
//! full harvest cycle end-to-end against it.

use gleaner::config::{parse_config, Config};
use gleaner::crawler::run_harvest;
use gleaner::output::FlushStatus;
use gleaner::state::StopReason;
use gleaner::storage::history_path;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a config pointing at the mock board with pauses disabled
fn create_test_config(base_url: &str, state: &Path, output: &Path, extra: &str) -> Config {
    let toml = format!(
        r#"
[harvest]
quota = 10
max-consecutive-empty-pages = 3

[pacing]
page-pause-ms = [0, 0]
short-pause-ms = [0, 0]
long-pause-ms = [0, 0]
max-attempts = 1
retry-backoff-ms = 0

[session]
page-load-timeout-secs = 5

[output]
directory = '{output}'

[dedup]
backend = "file"
directory = '{state}'
database-path = '{state}/gleaner.db'

[[source]]
name = "Board"
category = "IT"
listing-url = "{base}/jobs?page={{page}}"
card-selector = "div.job"
link-selector = "a.title"
id-pattern = '/job/(\d+)\.html'
listing-ready-selector = "div.listing"
detail-ready-selector = "h1"
{extra}

[[source.field]]
name = "title"
selector = "h1"

[[source.field]]
name = "company"
selector = "div.company"
strip-prefix = "Company: "
"#,
        base = base_url,
        state = state.display(),
        output = output.display(),
        extra = extra,
    );
    parse_config(&toml).expect("test config should be valid")
}

fn listing_page(ids: &[u32], last_page: u32) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="job"><a class="title" href="/job/{}.html?utm_source=list">Job {}</a></div>"#,
                id, id
            )
        })
        .collect();
    let pages: String = (1..=last_page)
        .map(|p| format!("<li><a>{}</a></li>", p))
        .collect();
    format!(
        r#"<html><body><div class="listing">{}</div><ul class="pagination">{}</ul></body></html>"#,
        cards, pages
    )
}

fn detail_page(id: u32) -> String {
    format!(
        r#"<html><body><h1>Rust developer {}</h1><div class="company">Company: Acme {}</div></body></html>"#,
        id, id
    )
}

async fn mount_listing(server: &MockServer, page: u32, ids: &[u32], last_page: u32) {
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(ids, last_page))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: u32, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/job/{}.html", id)))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(detail_page(id))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Two listing pages with jobs 101-103
async fn mount_board(server: &MockServer, failing_detail: Option<u32>) {
    mount_listing(server, 1, &[101, 102], 2).await;
    mount_listing(server, 2, &[103], 2).await;
    for id in [101, 102, 103] {
        let status = if Some(id) == failing_detail { 404 } else { 200 };
        mount_detail(server, id, status).await;
    }
}

fn csv_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("output dir should exist")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| p.extension().map(|e| e == "csv").unwrap_or(false))
        .collect()
}

#[tokio::test]
async fn test_full_harvest_then_idempotent_rerun() {
    let server = MockServer::start().await;
    mount_board(&server, None).await;

    let state = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let config = create_test_config(&server.uri(), state.path(), output.path(), "");
    let summary = run_harvest(config, Some("Board"), None)
        .await
        .expect("harvest failed");

    assert_eq!(summary.page_budget, 2);
    assert_eq!(summary.pages_scanned, 2);
    assert_eq!(summary.committed, 3);
    assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(summary.flush, FlushStatus::Flushed);

    let artifact = summary.artifact.expect("artifact should be committed");
    let name = artifact.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("Board_IT_jobs_"), "unexpected name {}", name);

    let csv = fs::read_to_string(&artifact).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "title,company,link,source,scraped_at");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with(&format!(
        "Rust developer 101,Acme 101,{}/job/101.html,Board,",
        server.uri()
    )));

    let history_file = history_path(state.path(), "Board");
    let history = fs::read(&history_file).unwrap();
    assert_eq!(String::from_utf8_lossy(&history), "101\n102\n103\n");

    // Second run against the unchanged board finds nothing new
    let config = create_test_config(&server.uri(), state.path(), output.path(), "");
    let rerun = run_harvest(config, Some("Board"), None)
        .await
        .expect("rerun failed");

    assert_eq!(rerun.accepted, 0);
    assert!(rerun.artifact.is_none());
    assert_eq!(rerun.flush, FlushStatus::Skipped);
    assert_eq!(fs::read(&history_file).unwrap(), history);
    assert_eq!(csv_files(output.path()).len(), 1);
}

#[tokio::test]
async fn test_failed_detail_retried_next_run() {
    let server = MockServer::start().await;
    mount_board(&server, Some(102)).await;

    let state = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let config = create_test_config(&server.uri(), state.path(), output.path(), "");
    let summary = run_harvest(config, None, None).await.unwrap();

    assert_eq!(summary.committed, 2);
    assert_eq!(summary.failed, 1);
    let retry: Vec<&str> = summary
        .retry_eligible()
        .map(|o| o.identifier().as_str())
        .collect();
    assert_eq!(retry, vec!["102"]);

    let history = fs::read_to_string(history_path(state.path(), "Board")).unwrap();
    assert_eq!(history, "101\n103\n");

    // The detail page recovers
    server.reset().await;
    mount_board(&server, None).await;

    let config = create_test_config(&server.uri(), state.path(), output.path(), "");
    let summary = run_harvest(config, None, None).await.unwrap();

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.committed, 1);
    let history = fs::read_to_string(history_path(state.path(), "Board")).unwrap();
    assert_eq!(history, "101\n103\n102\n");
}

#[tokio::test]
async fn test_unreachable_discovery_walks_one_page() {
    let server = MockServer::start().await;
    mount_board(&server, None).await;

    let state = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let extra = format!("entry-url = \"{}/missing\"", server.uri());
    let config = create_test_config(&server.uri(), state.path(), output.path(), &extra);
    let summary = run_harvest(config, None, None).await.unwrap();

    assert_eq!(summary.page_budget, 1);
    assert_eq!(summary.pages_scanned, 1);
    assert_eq!(summary.committed, 2);
}

#[tokio::test]
async fn test_sqlite_backend_shares_history() {
    let server = MockServer::start().await;
    mount_board(&server, None).await;

    let state = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let mut config = create_test_config(&server.uri(), state.path(), output.path(), "");
    config.dedup.backend = gleaner::config::DedupBackendKind::Sqlite;
    let first = run_harvest(config.clone(), None, None).await.unwrap();
    assert_eq!(first.committed, 3);
    assert!(state.path().join("gleaner.db").exists());

    let second = run_harvest(config, None, None).await.unwrap();
    assert_eq!(second.accepted, 0);
    assert!(second.artifact.is_none());
}

#[tokio::test]
async fn test_unknown_source_is_rejected() {
    let state = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let config = create_test_config("http://127.0.0.1:9", state.path(), output.path(), "");
    let result = run_harvest(config, Some("Nope"), None).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Nope"));
}
