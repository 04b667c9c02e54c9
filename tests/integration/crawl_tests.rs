//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the game site and run full
//! harvests end-to-end, checking the CSV output and the run summary.

use hltb_harvest::config::{Config, CrawlConfig, OutputConfig, RetryConfig};
use hltb_harvest::crawler::Coordinator;
use hltb_harvest::output::{load_statistics, split_dataset};
use hltb_harvest::HarvestError;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output: &Path, start: u64, count: u64) -> Config {
    Config {
        crawl: CrawlConfig {
            base_url: format!("{}/game", base_url),
            start: Some(start),
            count: Some(count),
            concurrency: 3,
            miss_threshold: 10,
            politeness_delay_ms: 0, // No pauses in tests
            politeness_jitter_ms: 0,
            commit_empty: true,
        },
        retry: RetryConfig {
            max_attempts: 3,
            backoff_base_ms: 5,
            backoff_cap_ms: 20,
            jitter_window_ms: 5,
            attempt_timeout_secs: 5,
            max_retry_after_ms: 1_000,
        },
        http: Default::default(),
        output: OutputConfig {
            path: output.to_string_lossy().into_owned(),
            resume: true,
        },
        labels: Default::default(),
        logging: Default::default(),
    }
}

fn harvester(config: Config) -> Result<Coordinator, HarvestError> {
    Coordinator::new(config, CancellationToken::new())
}

/// Renders a game page in the site's layout
fn game_page(title: &str, note: Option<&str>, release: &str, rows: &[(&str, &str, &str)]) -> String {
    let note = note
        .map(|n| format!(r#"<div class="GameSummary_profile_info__HZFQu"><strong>Note:</strong> {}</div>"#, n))
        .unwrap_or_default();
    let rows: String = rows
        .iter()
        .map(|(label, polled, average)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                label, polled, average
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head><title>How long is {title}? | HowLongToBeat</title></head>
<body>
  <div class="GameHeader_profile_header__q_PID shadow_text">{title}</div>
  {note}
  <div class="GameSummary_profile_info__HZFQu GameSummary_medium___r_ia"><strong>NA:</strong> {release}</div>
  <table class="GameTimeTable_game_main_table__7uN3H">
    <thead><tr><td>Single-Player</td><td>Polled</td><td>Average</td></tr></thead>
    <tbody>{rows}</tbody>
  </table>
</body></html>"#
    )
}

const NOT_FOUND_PAGE: &str = r#"<html><head><title>404 Page Not Found | HowLongToBeat</title></head>
<body><div class="error">Sorry, we could not find that page.</div></body></html>"#;

async fn mount_page(server: &MockServer, id: u64, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/game/{}", id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, id: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/game/{}", id)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn requests_for(server: &MockServer, id: u64) -> usize {
    let wanted = format!("/game/{}", id);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

/// Reads the output as header-keyed rows
fn read_rows(output: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(output).expect("output should be readable");
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

async fn mount_catalogue(server: &MockServer) {
    mount_page(
        server,
        1,
        game_page(
            "Portal",
            None,
            "October 10th, 2007",
            &[
                ("Main Story", "2,311", "3½ Hours"),
                ("Main + Extras", "1,180", "5h 30m"),
                ("Completionist", "512", "9 Hours"),
            ],
        ),
    )
    .await;
    mount_page(
        server,
        2,
        game_page(
            "Portal: Still Alive",
            Some("DLC/Expansion"),
            "2008",
            &[("Main Story", "12", "2 Hours")],
        ),
    )
    .await;
    mount_page(
        server,
        3,
        game_page(
            "Left 4 Dead",
            Some("Multiplayer Focused"),
            "November 2008",
            &[("Co-Op", "1.2K", "10 - 12 Hours"), ("Vs.", "340", "45 Mins")],
        ),
    )
    .await;
    mount_status(server, 4, 404).await;
    mount_page(server, 5, NOT_FOUND_PAGE.to_string()).await;
    mount_page(
        server,
        6,
        game_page("Unreleased Thing", None, "TBA", &[("Main Story", "0", "--")]),
    )
    .await;
}

#[tokio::test]
async fn test_full_harvest_against_mock_site() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 6);

    let coordinator =
        harvester(config).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Harvest failed");

    assert_eq!(summary.committed, 4);
    assert_eq!(summary.not_found, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.errors, 0);
    assert!(!summary.cancelled);

    let rows = read_rows(&output);
    assert_eq!(rows.len(), 4);
    let by_id: HashMap<&str, &HashMap<String, String>> =
        rows.iter().map(|r| (r["id"].as_str(), r)).collect();

    let portal = by_id["1"];
    assert_eq!(portal["title"], "Portal");
    assert_eq!(portal["content_type"], "game");
    assert_eq!(portal["release_precision"], "day");
    assert_eq!(portal["release_year"], "2007");
    assert_eq!(portal["release_month"], "10");
    assert_eq!(portal["release_day"], "10");
    assert_eq!(portal["main_story"], "3.5");
    assert_eq!(portal["main_story_polled"], "2311");
    assert_eq!(portal["single_player"], "3.5");
    assert_eq!(portal["main_plus_sides"], "5.5");
    assert_eq!(portal["completionist"], "9");
    assert!(portal["source_url"].ends_with("/game/1"));
    assert!(!portal["crawled_at"].is_empty());

    let dlc = by_id["2"];
    assert_eq!(dlc["content_type"], "dlc");
    assert_eq!(dlc["release_precision"], "year");
    assert_eq!(dlc["release_month"], "");

    let l4d = by_id["3"];
    assert_eq!(l4d["content_type"], "multiplayer");
    assert_eq!(l4d["release_precision"], "month");
    assert_eq!(l4d["co_op"], "11");
    assert_eq!(l4d["co_op_polled"], "1200");
    assert_eq!(l4d["versus"], "0.75");

    // Valid page without any times is still committed
    let unreleased = by_id["6"];
    assert_eq!(unreleased["main_story"], "");
    assert_eq!(unreleased["release_precision"], "unknown");
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;

    // First request is throttled, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/game/1"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        1,
        game_page("Celeste", None, "January 25th, 2018", &[("Main Story", "900", "8 Hours")]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 1);

    let summary = harvester(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.committed, 1);
    assert_eq!(requests_for(&server, 1).await, 2);
    assert_eq!(read_rows(&output)[0]["title"], "Celeste");
}

#[tokio::test]
async fn test_persistent_server_error_is_failed_after_max_attempts() {
    let server = MockServer::start().await;
    mount_status(&server, 1, 500).await;
    mount_status(&server, 2, 403).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 2);

    let summary = harvester(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    // 5xx is retried up to the attempt limit, other 4xx is not retried
    assert_eq!(requests_for(&server, 1).await, 3);
    assert_eq!(requests_for(&server, 2).await, 1);
    assert!(read_rows(&output).is_empty());
}

#[tokio::test]
async fn test_unrecognized_layout_counts_as_error() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        "<html><head><title>Maintenance</title></head><body><p>Back soon</p></body></html>"
            .to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 1);

    let summary = harvester(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.committed, 0);
    // Extraction failures are not retried
    assert_eq!(requests_for(&server, 1).await, 1);
}

#[tokio::test]
async fn test_resume_is_idempotent() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 3);

    let first = harvester(config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.committed, 3);

    let before = std::fs::read(&output).unwrap();
    let requests_before = server.received_requests().await.unwrap_or_default().len();

    let second = harvester(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(second.committed, 0);
    assert_eq!(second.skipped_existing, 3);
    assert_eq!(second.total(), 3);
    assert_eq!(std::fs::read(&output).unwrap(), before);
    assert_eq!(
        server.received_requests().await.unwrap_or_default().len(),
        requests_before
    );
}

#[tokio::test]
async fn test_interrupted_harvest_resumes_without_duplicates() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");

    // First pass only covers part of the range
    let partial = create_test_config(&server.uri(), &output, 1, 2);
    harvester(partial)
        .unwrap()
        .run()
        .await
        .unwrap();

    // Simulate a crash in the middle of writing the next row
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&output).unwrap();
        file.write_all(b"\"3\",\"Left 4 De").unwrap();
    }

    let full = create_test_config(&server.uri(), &output, 1, 6);
    let summary = harvester(full)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.skipped_existing, 2);
    assert_eq!(summary.committed, 2);

    let mut ids: Vec<u64> = read_rows(&output)
        .iter()
        .map(|r| r["id"].parse().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 6]);
}

#[tokio::test]
async fn test_fresh_run_truncates_output() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");

    let config = create_test_config(&server.uri(), &output, 1, 3);
    harvester(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    let mut fresh = create_test_config(&server.uri(), &output, 2, 1);
    fresh.output.resume = false;
    let summary = harvester(fresh)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.committed, 1);
    let rows = read_rows(&output);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "2");
}

#[tokio::test]
async fn test_mismatched_output_header_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    std::fs::write(&output, "id,name,main_story\n1,Portal,3.5\n").unwrap();

    let config = create_test_config("http://127.0.0.1:9", &output, 1, 1);
    let result = harvester(config);

    assert!(matches!(result, Err(HarvestError::Storage(_))));
    // The existing file is left untouched
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "id,name,main_story\n1,Portal,3.5\n"
    );
}

#[tokio::test]
async fn test_stats_and_split_after_harvest() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 6);
    harvester(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    let stats = load_statistics(&output).unwrap();
    assert_eq!(stats.total_rows, 4);
    assert_eq!(stats.rows_with_times, 3);
    assert_eq!(stats.rows_by_content_type.get("game"), Some(&2));

    let export = dir.path().join("export");
    let report = split_dataset(&output, &export).unwrap();
    assert_eq!(report.total_rows, 4);
    assert_eq!(report.kept_rows, 3);
    assert_eq!(report.other_rows, 0);
    for file in &report.files {
        assert_eq!(file.rows, 1, "{} should have one row", file.content_type);
        assert!(file.path.exists());
    }
    assert!(export.join("hltb_filtered.csv").exists());
}

#[tokio::test]
async fn test_cancelled_token_stops_before_dispatch() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 6);

    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(config, cancel.clone()).unwrap();
    cancel.cancel();
    let summary = coordinator.run().await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.total(), 0);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_cancel_during_harvest_keeps_output_and_ledger_in_step() {
    let server = MockServer::start().await;
    let body = game_page("Tetris", None, "June 6th, 1984", &[("Main Story", "50", "2 Hours")]);
    Mock::given(method("GET"))
        .and(path_regex(r"^/game/\d+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(Duration::from_millis(15)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 150);

    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(config.clone(), cancel.clone()).unwrap();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });
    let summary = coordinator.run().await.unwrap();

    assert!(summary.cancelled);
    assert!(summary.committed < 150);

    let rows = read_rows(&output);
    assert_eq!(rows.len() as u64, summary.committed);
    assert_eq!(coordinator.ledger().len(), rows.len());
    for row in &rows {
        let id: u64 = row["id"].parse().unwrap();
        assert!(coordinator.ledger().is_committed(id));
    }
    drop(coordinator);

    // The interrupted output resumes cleanly to the full range
    let summary = harvester(config).unwrap().run().await.unwrap();
    assert_eq!(summary.skipped_existing as usize, rows.len());

    let mut ids: Vec<u64> = read_rows(&output)
        .iter()
        .map(|row| row["id"].parse().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=150).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_oversized_retry_after_is_not_waited_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/game/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "4294967295"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("hltb.csv");
    let config = create_test_config(&server.uri(), &output, 1, 1);

    let coordinator = harvester(config).unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("run waited on the server's retry-after")
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(requests_for(&server, 1).await, 1);
}
