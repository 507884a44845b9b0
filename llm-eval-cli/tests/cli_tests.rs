//! End-to-end tests of the `llm-eval` binary.
//!
//! Each test points the CLI at its own config directory and, where the
//! backend is involved, at a wiremock server with a bearer token override.

use assert_cmd::Command;
use llm_eval_core::report::ReportExport;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT_ID: &str = "4f1c2a9e-1b7d-4c55-9a0e-6d2f3b8c1a11";
const EXPERIMENT_ID: &str = "9b2e7c41-5d3a-4f68-8e1b-2c7d9a0f4e22";
const DATASET_ID: &str = "0c6d8e2f-3a4b-4c5d-8e9f-1a2b3c4d5e6f";

fn llm_eval(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("llm-eval").unwrap();
    cmd.env("LLM_EVAL_CONFIG_DIR", config_dir)
        .env_remove("LLM_EVAL_TOKEN")
        .env_remove("LLM_EVAL_PROFILE")
        .env_remove("LLM_EVAL_PROJECT")
        .env_remove("LLM_EVAL_API_URL")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

/// Runs a prepared command off the async runtime so the mock server keeps
/// serving while the binary blocks.
async fn run(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap()
}

fn project_json() -> serde_json::Value {
    json!({
        "id": PROJECT_ID,
        "name": "Support Bot",
        "api_key": "sk-test",
        "test_endpoint": "https://bot.example.com/chat",
        "created_at": "2024-05-01T10:00:00Z"
    })
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    llm_eval(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("projects")
                .and(predicate::str::contains("datasets"))
                .and(predicate::str::contains("parameters"))
                .and(predicate::str::contains("experiments"))
                .and(predicate::str::contains("report"))
                .and(predicate::str::contains("wizard")),
        );
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();

    llm_eval(dir.path())
        .args(["config", "set", "timeout_secs", "45"])
        .assert()
        .success();
    llm_eval(dir.path())
        .args(["config", "get", "timeout_secs"])
        .assert()
        .success()
        .stdout("45\n");

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_unknown_output_format() {
    let dir = TempDir::new().unwrap();
    llm_eval(dir.path())
        .args(["config", "set", "output_format", "xml"])
        .assert()
        .failure();
}

#[test]
fn test_commands_need_a_session() {
    let dir = TempDir::new().unwrap();
    llm_eval(dir.path())
        .args(["projects", "list", "--api-url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_projects_list_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects-list"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_json()])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = llm_eval(dir.path());
    cmd.args(["projects", "list", "-o", "json", "--token", "test-token"])
        .args(["--api-url", &server.uri()]);
    let output = run(cmd).await.success().get_output().stdout.clone();

    let listed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(listed[0]["id"], PROJECT_ID);
    assert_eq!(listed[0]["name"], "Support Bot");
    assert_eq!(listed[0]["active"], true);
    assert!(listed[0].get("api_key").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_tolerance_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parameters-create"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_json()])))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = llm_eval(dir.path());
    cmd.args(["parameters", "create", "--name", "Accuracy", "--tolerance", "1.5"])
        .args(["-o", "json", "--token", "test-token", "--api-url", &server.uri()]);
    run(cmd)
        .await
        .failure()
        .stderr(predicate::str::contains("tolerance"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_export_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/experiments-details"))
        .and(query_param("id", EXPERIMENT_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": EXPERIMENT_ID,
            "name": "Baseline v1",
            "project_id": PROJECT_ID,
            "dataset_id": DATASET_ID,
            "parameter_ids": [],
            "worker_count": 2,
            "created_at": "2024-05-02T09:00:00Z",
            "results": [
                {"response_time": 1.0, "evaluations": [
                    {"name": "Semantic Similarity", "score": 0.9, "comment": "close"},
                    {"name": "Accuracy", "score": 0.8, "comment": "ok"}
                ]},
                {"response_time": 3.0, "evaluations": [
                    {"name": "Semantic Similarity", "score": 0.5, "comment": "off"},
                    {"name": "Accuracy", "score": 0.6, "comment": "partly"}
                ]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects-details"))
        .and(query_param("id", PROJECT_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_json()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.json");
    let mut cmd = llm_eval(dir.path());
    cmd.args(["report", "export", EXPERIMENT_ID, "--out"])
        .arg(&out)
        .args(["-o", "json", "--token", "test-token", "--api-url", &server.uri()]);
    run(cmd).await.success();

    let export = ReportExport::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(export.metadata.experiment_name, "Baseline v1");
    assert_eq!(export.metadata.project_name, "Support Bot");
    assert_eq!(export.report_data.conversations_tested, 2);
    assert_eq!(export.report_data.avg_response_time, 2.0);
    assert!((export.report_data.semantic_similarity - 0.7).abs() < 1e-9);
    assert!((export.report_data.parameter_scores["accuracy"] - 0.7).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_export_refuses_running_experiment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/experiments-details"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": EXPERIMENT_ID,
            "name": "Still going",
            "project_id": PROJECT_ID,
            "dataset_id": DATASET_ID,
            "created_at": "2024-05-02T09:00:00Z"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = llm_eval(dir.path());
    cmd.args(["report", "export", EXPERIMENT_ID])
        .args(["-o", "json", "--token", "test-token", "--api-url", &server.uri()]);
    run(cmd)
        .await
        .failure()
        .stderr(predicate::str::contains("no results yet"));
}
