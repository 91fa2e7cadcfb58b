//! Integration tests for the schemagraph CLI.
//!
//! Every command except `init-config` runs against the warehouse fixture, so
//! no relationship service is needed.

use rstest::{fixture, rstest};
use std::process::Output;
use tempfile::TempDir;

mod common;
use common::{fixture_path, run_schemagraph_in_dir};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Provides a fresh temporary directory for each test
#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Run the CLI in `dir` against the warehouse fixture
fn run_offline(dir: &TempDir, args: &[&str]) -> Output {
    let fixture = fixture_path();
    let mut full = vec!["--fixture", fixture.to_str().unwrap()];
    full.extend_from_slice(args);
    run_schemagraph_in_dir(dir.path(), &full)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[rstest]
fn test_cli_help(temp_dir: TempDir) {
    let output = run_schemagraph_in_dir(temp_dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Usage:"));
    for command in ["init-config", "search", "show", "confirm", "reject"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}

#[rstest]
fn test_cli_version(temp_dir: TempDir) {
    let output = run_schemagraph_in_dir(temp_dir.path(), &["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[rstest]
fn test_cli_no_args(temp_dir: TempDir) {
    let output = run_schemagraph_in_dir(temp_dir.path(), &[]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("--help"));
}

// ============================================================================
// Init Config Tests
// ============================================================================

#[rstest]
fn test_init_config_writes_file(temp_dir: TempDir) {
    let output = run_schemagraph_in_dir(
        temp_dir.path(),
        &[
            "init-config",
            "--base-url",
            "https://docs.example.com/api",
            "-p",
            "warehouse",
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let config = std::fs::read_to_string(temp_dir.path().join("schemagraph.yaml")).unwrap();
    assert!(config.contains("https://docs.example.com/api"));
    assert!(config.contains("warehouse"));
    assert!(stdout(&output).contains("Project: warehouse"));
}

#[rstest]
fn test_init_config_refuses_to_overwrite(temp_dir: TempDir) {
    let first = run_schemagraph_in_dir(temp_dir.path(), &["init-config", "--quiet"]);
    assert!(first.status.success());
    assert!(stdout(&first).is_empty());

    let second = run_schemagraph_in_dir(temp_dir.path(), &["init-config"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("already exists"));

    let forced = run_schemagraph_in_dir(temp_dir.path(), &["init-config", "--force", "-q"]);
    assert!(forced.status.success());
}

// ============================================================================
// Search Tests
// ============================================================================

#[rstest]
fn test_search_lists_matches(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["search", "orders"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("sales.orders"));
    assert!(stdout.contains("archive.legacy_orders"));
    assert!(!stdout.contains("hr.employees"));
}

#[rstest]
fn test_search_without_matches(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["search", "invoices"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("No matching objects"));
}

#[rstest]
fn test_search_json(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["--json", "search", "--limit", "2"]);

    assert!(output.status.success());
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 2);
    assert_eq!(results[0]["objectId"], 42);
}

// ============================================================================
// Show Tests
// ============================================================================

#[rstest]
fn test_show_text(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["show", "42"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Neighborhood of 42 (LR)"));
    assert!(stdout.contains("Objects (3):"));
    assert!(stdout.contains("* sales.orders"));
    assert!(stdout.contains("SUGGESTED (82%)"));
    assert!(stdout.contains("[lfk-1]"));
}

#[rstest]
fn test_show_hops_and_direction(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["show", "42", "--hops", "1", "-d", "tb"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Neighborhood of 42 (TB)"));
    assert!(stdout.contains("Objects (2):"));
    assert!(!stdout.contains("lfk-1"));
}

#[rstest]
fn test_show_marks_cycles(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["show", "20"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("(cycle)  [fk-employees-manager]"));
}

#[rstest]
fn test_show_json(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["show", "42", "--json"]);

    assert!(output.status.success());
    let scene: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(scene["focus"], 42);
    assert_eq!(scene["direction"], "LR");
    assert_eq!(scene["nodes"].as_array().unwrap().len(), 3);
    let edge = scene["edges"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"] == "lfk-1")
        .unwrap();
    assert_eq!(edge["label"], "SUGGESTED (82%)");
}

#[rstest]
fn test_show_reads_config_defaults(temp_dir: TempDir) {
    std::fs::write(
        temp_dir.path().join("schemagraph.yaml"),
        "base-url: http://localhost:8080/api\nproject-id: warehouse\ndefault-hops: 1\ndefault-direction: TB\n",
    )
    .unwrap();

    let output = run_offline(&temp_dir, &["show", "42"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Neighborhood of 42 (TB)"));
    assert!(stdout.contains("Objects (2):"));
}

#[rstest]
fn test_show_unknown_object_fails(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["show", "1234"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("1234"));
}

#[rstest]
#[case::zero("0")]
#[case::negative("-5")]
#[case::name("orders")]
fn test_show_rejects_invalid_focus(temp_dir: TempDir, #[case] focus: &str) {
    let output = run_offline(&temp_dir, &["show", "--", focus]);

    assert!(!output.status.success());
}

// ============================================================================
// Review Tests
// ============================================================================

#[rstest]
fn test_confirm(temp_dir: TempDir) {
    let output = run_offline(
        &temp_dir,
        &["confirm", "lfk-1", "--focus", "42", "-n", "codes line up"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("lfk-1 is now CONFIRMED"));
    assert!(!stdout.contains("schemagraph confirm"));
}

#[rstest]
fn test_reject_points_to_confirm(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["reject", "lfk-1", "--focus", "42"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("lfk-1 is now REJECTED"));
    assert!(stdout.contains("schemagraph confirm lfk-1"));
    assert!(!stdout.contains("seconds"));
}

#[rstest]
fn test_reject_json(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["--json", "reject", "lfk-1", "--focus", "42"]);

    assert!(output.status.success());
    let update: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(update["id"], "lfk-1");
    assert_eq!(update["status"], "REJECTED");
    assert!(update.get("undoWindowSecs").is_none());
}

#[rstest]
fn test_physical_relationship_cannot_be_confirmed(temp_dir: TempDir) {
    let output = run_offline(
        &temp_dir,
        &["confirm", "fk-orders-customers", "--focus", "42"],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("fk-orders-customers"));
}

#[rstest]
fn test_relationship_outside_neighborhood(temp_dir: TempDir) {
    let output = run_offline(&temp_dir, &["confirm", "lfk-1", "--focus", "20"]);

    assert!(!output.status.success());
}
