//! Error handling tests

use crm_analysis::config::{load_config, parse_config, parse_rows};
use crm_analysis::core::script::CompiledScript;
use crm_analysis::core::Analysis;
use crm_analysis::AnalysisError;
use std::path::Path;

#[test]
fn test_missing_file_is_io_error() {
    let err = load_config(Path::new("no/such/analysis.yaml")).unwrap_err();
    assert!(matches!(err, AnalysisError::Io(_)));
    assert!(err.to_string().starts_with("IO error"));
}

#[test]
fn test_malformed_yaml_is_yaml_error() {
    let err = parse_config("name: [unclosed").unwrap_err();
    assert!(matches!(err, AnalysisError::Yaml(_)));
}

#[test]
fn test_empty_name_is_config_error() {
    let err = parse_config("name: '  '\n").unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
    assert_eq!(
        err.to_string(),
        "Configuration error: analysis name must not be empty"
    );
}

#[test]
fn test_duplicate_keys_are_config_errors() {
    let config = parse_config(
        "name: Dup\nfields:\n  - { key: A, column: 0 }\n  - { key: A, column: 1 }\n",
    )
    .unwrap();
    let err = Analysis::new(&config).unwrap_err();
    assert!(err.to_string().contains("duplicate field key 'A'"));
}

#[test]
fn test_column_needs_exactly_one_source() {
    let config = parse_config(
        "name: Cols\nfields:\n  - { key: A, column: 0 }\ntables:\n  - { key: T, info_area: FI, index: 0 }\ncolumns:\n  - { field: A, table: T }\n",
    )
    .unwrap();
    let err = Analysis::new(&config).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
}

#[test]
fn test_unknown_category_is_config_error() {
    let config = parse_config("name: Cat\ncategory: Nowhere\n").unwrap();
    let err = Analysis::new(&config).unwrap_err();
    assert!(err.to_string().contains("unknown category field 'Nowhere'"));
}

#[test]
fn test_script_error_converts() {
    let script_error = CompiledScript::compile("(a) =>").unwrap_err();
    let err: AnalysisError = script_error.into();
    assert!(matches!(err, AnalysisError::Script(_)));
    assert!(err.to_string().starts_with("Script error"));
}

#[test]
fn test_non_scalar_row_value_is_rejected() {
    let err = parse_rows("- { values: [{ nested: 1 }] }\n").unwrap_err();
    assert!(matches!(err, AnalysisError::Yaml(_)));
}
