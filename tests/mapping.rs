mod common;

use std::path::Path;

use caproj::mapping::{ColumnMapping, read_json_mapping, resolve_mapping};
use common::{TestWorkspace, capture_logs, joined, logged};
use log::Level;

fn sample_mapping() -> ColumnMapping {
    [("a", "1"), ("b", "2")].into_iter().collect()
}

#[test]
fn read_json_mapping_returns_file_contents() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("foo.json", r#"{"a": 1, "b": 2}"#);
    assert_eq!(read_json_mapping(&path), Some(sample_mapping()));
}

#[test]
fn read_json_mapping_warns_when_path_is_missing() {
    let (mapping, events) = capture_logs(|| read_json_mapping(Path::new("nonexistent path")));
    assert_eq!(mapping, None);
    assert!(logged(&events, Level::Warn, "No data loaded"));
    assert!(events.iter().all(|event| event.target == "caproj::mapping"));
}

#[test]
fn read_json_mapping_warns_on_malformed_json() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("broken.json", "{\"a\": ");
    let (mapping, events) = capture_logs(|| read_json_mapping(&path));
    assert_eq!(mapping, None);
    assert!(logged(&events, Level::Warn, "not a flat JSON object"));
}

#[test]
fn resolve_returns_direct_mapping_and_logs_context() {
    let direct = sample_mapping();
    let (resolved, events) = capture_logs(|| resolve_mapping(Some(&direct), None, "test"));
    assert_eq!(resolved, Some(direct));
    assert!(logged(&events, Level::Info, "test mapped using direct mapping"));
}

#[test]
fn resolve_direct_mapping_wins_over_file() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("other.json", r#"{"x": "y"}"#);
    let direct = sample_mapping();
    let (resolved, events) =
        capture_logs(|| resolve_mapping(Some(&direct), Some(path.as_path()), "test"));
    assert_eq!(resolved, Some(direct));
    assert!(!joined(&events).contains("other.json"));
}

#[test]
fn resolve_reads_file_and_logs_path() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("foo.json", r#"{"a": 1, "b": 2}"#);
    let (resolved, events) = capture_logs(|| resolve_mapping(None, Some(path.as_path()), "test"));
    assert_eq!(resolved, Some(sample_mapping()));
    let expected = format!("test mapped using {}", path.display());
    assert!(logged(&events, Level::Info, &expected));
}

#[test]
fn resolve_missing_file_is_soft_failure() {
    let (resolved, events) =
        capture_logs(|| resolve_mapping(None, Some(Path::new("nonexistent path")), "test"));
    assert_eq!(resolved, None);
    assert!(logged(&events, Level::Warn, "does not exist"));
    assert!(logged(&events, Level::Warn, "JSON failed to load"));
    assert!(joined(&events).contains("test"));
}

#[test]
fn resolve_empty_file_reports_failed_load() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.json", "{}");
    let (resolved, events) = capture_logs(|| resolve_mapping(None, Some(path.as_path()), "test"));
    assert_eq!(resolved, None);
    assert!(logged(&events, Level::Warn, "failed to load"));
    assert!(logged(&events, Level::Warn, "Nothing changed"));
}

#[test]
fn resolve_without_inputs_warns() {
    let (resolved, events) = capture_logs(|| resolve_mapping(None, None, "test"));
    assert_eq!(resolved, None);
    assert!(logged(
        &events,
        Level::Warn,
        "Neither a direct mapping nor a mapping file was specified for test"
    ));
}

#[test]
fn saved_mapping_reloads_in_order() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("dtypes.json");
    let mapping: ColumnMapping = [("z", "integer"), ("a", "string")].into_iter().collect();
    mapping.save(&path).expect("save mapping");
    let reloaded = read_json_mapping(&path).expect("reload mapping");
    assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["z", "a"]);
}
