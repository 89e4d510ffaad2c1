//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with `STUDYFOCUS_HOME` pointing at a
//! temporary directory and verify its JSON output.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command against `home` and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_studyfocus"))
        .args(args)
        .env("STUDYFOCUS_HOME", home)
        .env_remove("STUDYFOCUS_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "command {args:?} failed: {stderr}");
    stdout
}

/// Every JSON document printed by a command, in order.
fn json_documents(stdout: &str) -> Vec<Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .expect("Failed to parse JSON output")
}

fn event<'a>(docs: &'a [Value], kind: &str) -> &'a Value {
    docs.iter()
        .find(|d| d["type"] == kind)
        .unwrap_or_else(|| panic!("no {kind} event in {docs:?}"))
}

fn add_task(home: &Path, title: &str) -> String {
    let out = run_cli_success(home, &["task", "add", title, "--priority", "high"]);
    let docs = json_documents(&out);
    event(&docs, "task_added")["task_id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_task_add_and_list() {
    let home = tempfile::tempdir().unwrap();
    let id = add_task(home.path(), "Revise calculus");

    let out = run_cli_success(home.path(), &["task", "list"]);
    let tasks = json_documents(&out).remove(0);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], id.as_str());
    assert_eq!(tasks[0]["title"], "Revise calculus");
    assert_eq!(tasks[0]["priority"], "high");
}

#[test]
fn test_task_current_and_delete() {
    let home = tempfile::tempdir().unwrap();
    let id = add_task(home.path(), "Read paper");

    let out = run_cli_success(home.path(), &["task", "current", &id]);
    let docs = json_documents(&out);
    assert_eq!(docs[0]["id"], id.as_str());
    assert_eq!(event(&docs, "current_task_changed")["task_id"], id.as_str());

    let out = run_cli_success(home.path(), &["task", "delete", &id]);
    event(&json_documents(&out), "task_deleted");

    let out = run_cli_success(home.path(), &["task", "current"]);
    assert_eq!(json_documents(&out)[0], Value::Null);
}

#[test]
fn test_task_complete_counts_in_stats() {
    let home = tempfile::tempdir().unwrap();
    let id = add_task(home.path(), "Submit homework");
    run_cli_success(home.path(), &["task", "complete", &id]);

    let out = run_cli_success(home.path(), &["stats", "show"]);
    let report = json_documents(&out).remove(0);
    assert_eq!(report["stats"]["completed_tasks"], 1);

    let (_, stderr, code) = run_cli(home.path(), &["task", "current", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_task_import_from_file() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("planner.json");
    std::fs::write(
        &file,
        r#"[
            {"external_id": "p-1", "title": "Flashcards", "priority": "low"},
            {"external_id": "p-2", "title": "Past paper"}
        ]"#,
    )
    .unwrap();
    let path = file.to_str().unwrap();

    let out = run_cli_success(home.path(), &["task", "import", path, "--source", "planner"]);
    assert_eq!(event(&json_documents(&out), "tasks_imported")["imported"], 2);

    let out = run_cli_success(home.path(), &["task", "import", path, "--source", "planner"]);
    assert_eq!(event(&json_documents(&out), "tasks_imported")["imported"], 0);
}

#[test]
fn test_timer_start_status_pause() {
    let home = tempfile::tempdir().unwrap();

    let out = run_cli_success(home.path(), &["timer", "start"]);
    assert_eq!(event(&json_documents(&out), "timer_started")["mode"], "work");

    let out = run_cli_success(home.path(), &["timer", "status"]);
    let status = event(&json_documents(&out), "state_snapshot").clone();
    assert_eq!(status["is_running"], true);

    let out = run_cli_success(home.path(), &["timer", "pause"]);
    event(&json_documents(&out), "timer_paused");

    let out = run_cli_success(home.path(), &["timer", "status"]);
    assert_eq!(event(&json_documents(&out), "state_snapshot")["is_running"], false);
}

#[test]
fn test_timer_skip_and_mode() {
    let home = tempfile::tempdir().unwrap();

    let out = run_cli_success(home.path(), &["timer", "skip"]);
    let skipped = event(&json_documents(&out), "timer_skipped").clone();
    assert_eq!(skipped["from"], "work");
    assert_eq!(skipped["to"], "break");

    run_cli_success(home.path(), &["timer", "mode", "long-break"]);
    let out = run_cli_success(home.path(), &["timer", "status"]);
    assert_eq!(event(&json_documents(&out), "state_snapshot")["mode"], "long_break");
}

#[test]
fn test_timer_complete_records_history() {
    let home = tempfile::tempdir().unwrap();

    let out = run_cli_success(home.path(), &["timer", "complete"]);
    let completed = event(&json_documents(&out), "session_completed").clone();
    assert_eq!(completed["mode"], "work");
    assert_eq!(completed["next_mode"], "break");

    let out = run_cli_success(home.path(), &["stats", "show"]);
    assert_eq!(json_documents(&out)[0]["stats"]["total_sessions"], 1);

    let out = run_cli_success(home.path(), &["stats", "history"]);
    let history = json_documents(&out).remove(0);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["mode"], "work");
}

#[test]
fn test_config_set_applies_to_timer() {
    let home = tempfile::tempdir().unwrap();

    let out = run_cli_success(home.path(), &["config", "set", "timer.work_duration", "30"]);
    assert!(out.starts_with("ok"));

    let out = run_cli_success(home.path(), &["config", "get", "timer.work_duration"]);
    assert_eq!(out.trim(), "30");

    let out = run_cli_success(home.path(), &["timer", "status"]);
    assert_eq!(event(&json_documents(&out), "state_snapshot")["remaining_secs"], 1800);
}

#[test]
fn test_config_rejects_out_of_range() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "timer.work_duration", "3"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, _, code) = run_cli(home.path(), &["config", "get", "timer.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_sites_block_and_check() {
    let home = tempfile::tempdir().unwrap();
    let out = run_cli_success(home.path(), &["sites", "add", "https://www.YouTube.com/feed"]);
    assert!(out.contains("blocked youtube.com"));

    let out = run_cli_success(home.path(), &["sites", "check", "m.youtube.com"]);
    assert_eq!(out.trim(), "blocked");

    let out = run_cli_success(home.path(), &["sites", "list"]);
    assert_eq!(json_documents(&out)[0], serde_json::json!(["youtube.com"]));

    run_cli_success(home.path(), &["sites", "remove", "youtube.com"]);
    let out = run_cli_success(home.path(), &["sites", "check", "youtube.com"]);
    assert_eq!(out.trim(), "allowed");
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    let out = run_cli_success(home.path(), &["completions", "bash"]);
    assert!(out.contains("studyfocus"));
}
