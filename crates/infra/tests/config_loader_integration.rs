//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use stockade_domain::LogFormat;
use stockade_infra::config;
use tempfile::NamedTempFile;

fn write_with_extension(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_toml_file() {
    let path = write_with_extension(
        r#"
        [database]
        path = "/tmp/stockade-integration.db"
        pool_size = 4

        [vendor]
        base_url = "http://vendor.internal:9000"
        timeout_secs = 1.5

        [breaker]
        failure_threshold = 3
        recovery_time_secs = 30.0

        [retry]
        attempts = 5
        budget_secs = 2.0

        [logging]
        level = "debug"
        format = "json"
        "#,
        "toml",
    );

    let config = config::load_from_file(Some(path.clone())).expect("TOML config should load");

    assert_eq!(config.database.path, "/tmp/stockade-integration.db");
    assert_eq!(config.database.pool_size, 4);
    assert_eq!(config.vendor.base_url, "http://vendor.internal:9000");
    assert!((config.vendor.timeout_secs - 1.5).abs() < f64::EPSILON);
    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.retry.attempts, 5);
    assert_eq!(config.retry.budget_secs, Some(2.0));
    assert_eq!(config.logging.format, LogFormat::Json);

    // Unspecified sections keep their defaults
    assert_eq!(config.cache, stockade_domain::CacheConfig::default());
    assert_eq!(config.breaker.half_open_success_threshold, 2);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_json_file() {
    let path = write_with_extension(
        r#"{
            "vendor": { "name": "acme", "pool_max_idle": 4 },
            "cache": { "ttl_secs": 60, "max_capacity": 500 }
        }"#,
        "json",
    );

    let config = config::load_from_file(Some(path.clone())).expect("JSON config should load");

    assert_eq!(config.vendor.name, "acme");
    assert_eq!(config.vendor.pool_max_idle, 4);
    assert_eq!(config.cache.ttl_secs, 60);
    assert_eq!(config.cache.max_capacity, 500);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_file_is_a_config_error() {
    let result = config::load_from_file(Some("/nonexistent/stockade.toml".into()));
    let err = result.expect_err("missing file should fail");
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_malformed_toml_is_rejected() {
    let path = write_with_extension("[database\npath = ", "toml");

    let err = config::load_from_file(Some(path.clone())).expect_err("malformed TOML should fail");
    assert!(err.to_string().contains("Invalid TOML format"));

    std::fs::remove_file(path).ok();
}
