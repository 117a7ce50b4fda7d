//! Application config loading

use quarry_cli::AppConfig;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::Builder;

fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn test_file_values_override_defaults() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "sources_path: /etc/quarry/sources.yaml").unwrap();
    writeln!(file, "log_json: true").unwrap();

    let config = AppConfig::build(Some(file.path()), env(&[])).unwrap();

    assert_eq!(config.sources_path, PathBuf::from("/etc/quarry/sources.yaml"));
    assert!(config.log_json);
    // Untouched keys keep their defaults
    assert_eq!(config.chart_output_dir, PathBuf::from("./output/charts"));
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_environment_overrides_file() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "log_level: warn").unwrap();

    let config = AppConfig::build(
        Some(file.path()),
        env(&[
            ("QUARRY_LOG_LEVEL", "debug"),
            ("QUARRY_CHART_OUTPUT_DIR", "/tmp/charts"),
            ("QUARRY_LOG_JSON", "true"),
        ]),
    )
    .unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.chart_output_dir, PathBuf::from("/tmp/charts"));
    assert!(config.log_json);
}

#[test]
fn test_unrelated_variables_ignored() {
    let config = AppConfig::build(None, env(&[("OTHER_LOG_LEVEL", "trace")])).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_explicit_missing_file_is_error() {
    let result = AppConfig::build(Some(std::path::Path::new("/nonexistent/quarry.yaml")), env(&[]));
    assert!(result.is_err());
}
