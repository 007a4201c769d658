mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;
use serde_json::Value as JsonValue;

const PROJECTS_CSV: &str = "\
Project ID,Change,Budget Forecast
P2,B,10
P1,A,abc
P1,,7
";

#[test]
fn clean_applies_every_step_and_writes_outputs() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("projects.csv", PROJECTS_CSV);
    let names = workspace.write("names.json", r#"{"project_id": "PID"}"#);
    let dtypes = workspace.write("dtypes.json", r#"{"budget_forecast": "float"}"#);
    let output = workspace.path().join("clean.csv");
    let report = workspace.path().join("errors.json");

    Command::cargo_bin("caproj")
        .expect("binary exists")
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--lint-names",
            "--rename-map",
            names.to_str().unwrap(),
            "--dtype-map",
            dtypes.to_str().unwrap(),
            "--coerce",
            "--drop-missing",
            "change",
            "--key",
            "key=PID,change",
            "--sort",
            "PID",
            "--errors-report",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();

    let written = fs::read_to_string(&output).expect("read output");
    assert_eq!(
        written,
        "PID,change,budget_forecast,key\nP1,A,,P1_A\nP2,B,10.0,P2_B\n"
    );

    let report: JsonValue =
        serde_json::from_str(&fs::read_to_string(&report).expect("read report")).expect("json");
    assert_eq!(report["budget_forecast"]["1"], "abc");
}

#[test]
fn clean_logs_conversion_summary_to_stderr() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("projects.csv", "PID,cost\n1,x\n2,3\n");
    let dtypes = workspace.write("dtypes.json", r#"{"cost": "integer", "PID": "nope"}"#);

    Command::cargo_bin("caproj")
        .expect("binary exists")
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "--dtype-map",
            dtypes.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(contains("'cost' dtype conversion to 'integer' encountered 1 errors: {0: 'x'}"))
        .stderr(contains("'PID' dtype conversion to 'nope' encountered 1 errors: 'nope' dtype is not a valid input"));
}

#[test]
fn clean_fails_on_unknown_dtype_column() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("projects.csv", "PID,cost\n1,2\n");
    let dtypes = workspace.write("dtypes.json", r#"{"missing": "integer"}"#);
    let output = workspace.path().join("clean.csv");

    Command::cargo_bin("caproj")
        .expect("binary exists")
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--dtype-map",
            dtypes.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("column 'missing' does not exist"));
    assert!(!output.exists());
}

#[test]
fn clean_rejects_unsupported_extension() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("projects.xlsx", "PID\n1\n");

    Command::cargo_bin("caproj")
        .expect("binary exists")
        .args(["clean", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("projects.xlsx"));
}
