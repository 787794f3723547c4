//! CLI Integration Tests
//!
//! Tests the `analysis` binary directly using assert_cmd.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CONFIG: &str = r#"
name: Pipeline
category: Country
tables:
  - { key: COMP, info_area: FI, index: 0 }
fields:
  - { key: Revenue, column: 0 }
  - { key: Country, column: 1 }
  - { key: Share, column: 2, percent: true }
values:
  - { key: Net, label: Net revenue, formula: "JS[(r) => r * 0.8](N[Revenue])" }
columns:
  - { field: Revenue }
  - { field: Share, aggregation: avg }
  - { table: COMP }
  - { value: Net }
"#;

const ROWS: &str = r#"
- { values: [100, DE, 10], records: [FI.1] }
- { values: [50, AT, 30], records: [FI.2] }
- { values: [150, DE, 20], records: [FI.3] }
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn analysis() -> Command {
    Command::cargo_bin("analysis").unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    analysis()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMMANDS"))
        .stdout(predicate::str::contains("JS[script]"));
}

#[test]
fn test_cli_version() {
    analysis()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("analysis"));
}

#[test]
fn test_report_help() {
    analysis()
        .args(["report", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-steps"));
}

// ═══════════════════════════════════════════════════════════════════════════
// VALIDATE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_validate_valid_config() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "analysis.yaml", CONFIG);

    analysis()
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("All value formulas are valid"))
        .stdout(predicate::str::contains("Net revenue"));
}

#[test]
fn test_validate_reports_broken_formula() {
    let dir = TempDir::new().unwrap();
    let broken = CONFIG.replace("N[Revenue])", "N[Revenue)");
    let config = write(&dir, "analysis.yaml", &broken);

    analysis()
        .arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("value 'Net'"));
}

#[test]
fn test_validate_unknown_column() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "analysis.yaml",
        "name: Bad\ncolumns:\n  - { field: Missing }\n",
    );

    analysis()
        .arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field 'Missing'"));
}

#[test]
fn test_validate_missing_file() {
    analysis()
        .args(["validate", "does-not-exist.yaml"])
        .assert()
        .failure();
}

// ═══════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_report_table() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "analysis.yaml", CONFIG);
    let rows = write(&dir, "rows.yaml", ROWS);

    analysis()
        .arg("report")
        .arg(&config)
        .arg(&rows)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline"))
        .stdout(predicate::str::contains("250.00"))
        .stdout(predicate::str::contains("15.00%"))
        .stdout(predicate::str::contains("240.00"))
        .stdout(predicate::str::contains("Total"));
}

#[test]
fn test_report_json() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "analysis.yaml", CONFIG);
    let rows = write(&dir, "rows.yaml", ROWS);

    let output = analysis()
        .arg("report")
        .arg(&config)
        .arg(&rows)
        .args(["--json", "--report-mode"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["rows"], 3);
    assert_eq!(json["categories"][1]["key"], "DE");
    assert_eq!(json["categories"][1]["values"][0]["display"], "250.00");
    // report mode renders percentages without a suffix
    assert_eq!(json["total"]["values"][1]["display"], "20.00");
    assert_eq!(json["total"]["values"][2]["display"], "3");
}

#[test]
fn test_report_invalid_rows() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "analysis.yaml", CONFIG);
    let rows = write(&dir, "rows.yaml", "- { values: [[1, 2]] }\n");

    analysis()
        .arg("report")
        .arg(&config)
        .arg(&rows)
        .assert()
        .failure();
}

// ═══════════════════════════════════════════════════════════════════════════
// AGGREGATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_aggregations_lists_selectable_types() {
    analysis()
        .arg("aggregations")
        .assert()
        .success()
        .stdout(predicate::str::contains("avg"))
        .stdout(predicate::str::contains("static"))
        .stdout(predicate::str::contains("Maximum"));
}
