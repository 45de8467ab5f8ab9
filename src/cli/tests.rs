//! Tests for CLI module

use super::*;
use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: &str = r#"
url_base: "{{ config.base }}"
http:
  max_retries: 0
streams:
  - name: events
    requester:
      path: /events
    record_selector:
      extractor:
        field_path: [data]
    incremental:
      type: incrementing
      cursor_field: seq
      start_value_option:
        inject_into: request_parameter
        field_name: since
  - name: broken
    requester:
      path: /broken
"#;

fn manifest_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(MANIFEST.as_bytes()).unwrap();
    file
}

async fn run(args: &[&str]) -> (crate::error::Result<()>, Vec<Value>) {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    let result = Runner::new(cli).execute(&mut out).await;
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (result, lines)
}

fn of_type<'a>(lines: &'a [Value], kind: &str) -> Vec<&'a Value> {
    lines.iter().filter(|l| l["type"] == kind).collect()
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

#[test]
fn test_parse_read() {
    let cli = Cli::try_parse_from([
        "solidafy-retriever",
        "read",
        "--manifest",
        "m.yaml",
        "--stream",
        "users",
        "--stream",
        "orders",
        "--limit-slices",
        "2",
        "--limit-pages",
        "3",
    ])
    .unwrap();

    assert_eq!(cli.manifest.unwrap().to_str(), Some("m.yaml"));
    assert_eq!(
        cli.command,
        Commands::Read {
            streams: vec!["users".to_string(), "orders".to_string()],
            incremental: false,
            max_records: None,
            limit_slices: Some(2),
            limit_pages: Some(3),
        }
    );
}

#[test]
fn test_parse_check_with_global_flags() {
    let cli = Cli::try_parse_from([
        "solidafy-retriever",
        "-m",
        "m.yaml",
        "--config-json",
        "{}",
        "check",
    ])
    .unwrap();
    assert_eq!(cli.command, Commands::Check);
    assert_eq!(cli.config_json.as_deref(), Some("{}"));
}

#[test]
fn test_parse_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["solidafy-retriever", "serve"]).is_err());
}

// ============================================================================
// Runner Tests
// ============================================================================

#[tokio::test]
async fn test_missing_manifest() {
    let (result, lines) = run(&["solidafy-retriever", "streams"]).await;
    assert!(matches!(result, Err(crate::error::Error::Config { .. })));
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_streams_command() {
    let manifest = manifest_file();
    let (result, lines) = run(&[
        "solidafy-retriever",
        "streams",
        "-m",
        manifest.path().to_str().unwrap(),
    ])
    .await;

    result.unwrap();
    assert_eq!(lines[0]["type"], "STREAMS");
    assert_eq!(lines[0]["streams"][0]["name"], "events");
    assert_eq!(lines[0]["streams"][0]["cursor_field"], "seq");
    assert_eq!(lines[0]["streams"][1]["cursor_field"], Value::Null);
}

#[tokio::test]
async fn test_check_command() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&mock_server)
        .await;

    let manifest = manifest_file();
    let config = json!({"base": mock_server.uri()}).to_string();
    let (result, lines) = run(&[
        "solidafy-retriever",
        "check",
        "-m",
        manifest.path().to_str().unwrap(),
        "--config-json",
        config.as_str(),
    ])
    .await;

    result.unwrap();
    assert_eq!(lines[0]["connectionStatus"]["status"], "SUCCEEDED");
}

#[tokio::test]
async fn test_check_command_reports_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let manifest = manifest_file();
    let config = json!({"base": mock_server.uri()}).to_string();
    let (result, lines) = run(&[
        "solidafy-retriever",
        "check",
        "-m",
        manifest.path().to_str().unwrap(),
        "--config-json",
        config.as_str(),
    ])
    .await;

    result.unwrap();
    assert_eq!(lines[0]["connectionStatus"]["status"], "FAILED");
}

#[tokio::test]
async fn test_read_incremental_with_state_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("since", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"seq": 4}, {"seq": 5}]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let manifest = manifest_file();
    let state_dir = tempfile::tempdir().unwrap();
    let state_path = state_dir.path().join("state.json");
    std::fs::write(&state_path, r#"{"streams": {"events": {"seq": 3}}}"#).unwrap();

    let config = json!({"base": mock_server.uri()}).to_string();
    let (result, lines) = run(&[
        "solidafy-retriever",
        "read",
        "-m",
        manifest.path().to_str().unwrap(),
        "--config-json",
        config.as_str(),
        "--state",
        state_path.to_str().unwrap(),
        "--stream",
        "events",
        "--incremental",
    ])
    .await;

    result.unwrap();
    assert_eq!(of_type(&lines, "RECORD").len(), 2);
    assert_eq!(of_type(&lines, "STATE").last().unwrap()["data"], json!({"seq": 5}));

    let summary = of_type(&lines, "SYNC_SUMMARY")[0];
    assert_eq!(summary["summary"]["status"], "SUCCEEDED");
    assert_eq!(summary["summary"]["total_records"], 2);

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(saved, json!({"streams": {"events": {"seq": 5}}}));
}

#[tokio::test]
async fn test_read_reports_failed_stream() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"seq": 1}]})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(400).set_body_string("nope"))
        .mount(&mock_server)
        .await;

    let manifest = manifest_file();
    let config = json!({"base": mock_server.uri()}).to_string();
    let (result, lines) = run(&[
        "solidafy-retriever",
        "read",
        "-m",
        manifest.path().to_str().unwrap(),
        "--config-json",
        config.as_str(),
    ])
    .await;

    result.unwrap();
    let summary = &of_type(&lines, "SYNC_SUMMARY")[0]["summary"];
    assert_eq!(summary["status"], "PARTIAL");
    assert_eq!(summary["failed_streams"], 1);
    assert_eq!(summary["streams"][1]["status"], "FAILED");
    assert!(of_type(&lines, "LOG")
        .iter()
        .any(|l| l["level"] == "ERROR"));
}

#[tokio::test]
async fn test_read_unknown_stream() {
    let manifest = manifest_file();
    let (result, _) = run(&[
        "solidafy-retriever",
        "read",
        "-m",
        manifest.path().to_str().unwrap(),
        "--config-json",
        r#"{"base": "http://localhost:1"}"#,
        "--stream",
        "orders",
    ])
    .await;

    assert!(matches!(
        result,
        Err(crate::error::Error::StreamNotFound { .. })
    ));
}

#[tokio::test]
async fn test_read_keeps_delivered_state_when_a_slice_fails() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("region", "eu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"seq": 5}]})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("region", "us"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&mock_server)
        .await;

    let mut manifest = NamedTempFile::new().unwrap();
    manifest
        .write_all(
            br#"
url_base: "{{ config.base }}"
http:
  max_retries: 0
streams:
  - name: regions
    requester:
      path: /events
    record_selector:
      extractor:
        field_path: [data]
    partition_router:
      type: list
      values: [eu, us]
      cursor_field: region
      request_option:
        inject_into: request_parameter
        field_name: region
    incremental:
      type: incrementing
      cursor_field: seq
"#,
        )
        .unwrap();

    let state_dir = tempfile::tempdir().unwrap();
    let state_path = state_dir.path().join("state.json");
    let config = json!({"base": mock_server.uri()}).to_string();
    let (result, lines) = run(&[
        "solidafy-retriever",
        "read",
        "-m",
        manifest.path().to_str().unwrap(),
        "--config-json",
        config.as_str(),
        "--state",
        state_path.to_str().unwrap(),
        "--incremental",
    ])
    .await;

    result.unwrap();
    let records = of_type(&lines, "RECORD");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["data"], json!({"seq": 5}));

    let last_state = of_type(&lines, "STATE").last().unwrap()["data"].clone();
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(saved["streams"]["regions"], last_state);
    assert_eq!(of_type(&lines, "SYNC_SUMMARY")[0]["summary"]["status"], "FAILED");
}
