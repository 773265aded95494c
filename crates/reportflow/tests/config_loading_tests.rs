//! Table-driven tests for configuration loading and validation.

mod common;

use common::{ConfigBuilder, TestHarness};
use reportflow::config::{load_config, load_config_from_str, MarkerStoreKind};
use reportflow::records::ReportStatus;
use reportflow::Pipeline;

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config JSON content to test.
    config_json: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "analysis": { "program": "python3", "args": ["llm_service.py"] }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/srv/uploads",
            "database_path": "/srv/data/reportflow.db",
            "worker_count": 8,
            "watcher": {
                "stability_window_ms": 1000,
                "stability_poll_ms": 100,
                "poll_interval_ms": 500,
                "recursive": false,
                "include": ["*.pdf", "*.jpg", "*.png"],
                "exclude": ["*.tmp"]
            },
            "analysis": {
                "program": "python3",
                "args": ["-u", "llm_service.py"],
                "timeout_secs": 600,
                "working_directory": "/opt/engine",
                "env": { "CUDA_VISIBLE_DEVICES": "0" }
            },
            "markers": { "store": "sidecar" },
            "reports": { "file_location_prefix": "/uploads", "initial_status": "In Progress" },
            "logging": { "level": "reportflow=debug,info", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_null_database_path",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "database_path": null,
            "analysis": { "program": "python3" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "invalid_version",
        config_json: r#"{
            "version": "2.0",
            "incoming_directory": "/uploads",
            "analysis": { "program": "python3" }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "missing_analysis",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads"
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_top_level_key",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "analysis": { "program": "python3" },
            "output_directory": "/out"
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_initial_status",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "analysis": { "program": "python3" },
            "reports": { "initial_status": "Archived" }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "blank_program",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "analysis": { "program": " " }
        }"#,
        should_succeed: false,
        expected_error: Some("analysis.program must not be empty"),
    },
    ConfigTestCase {
        name: "zero_timeout",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "analysis": { "program": "python3", "timeout_secs": 0 }
        }"#,
        should_succeed: false,
        expected_error: Some("timeout_secs must be positive"),
    },
    ConfigTestCase {
        name: "invalid_exclude_glob",
        config_json: r#"{
            "version": "1.0",
            "incoming_directory": "/uploads",
            "watcher": { "exclude": ["[unclosed"] },
            "analysis": { "program": "python3" }
        }"#,
        should_succeed: false,
        expected_error: Some("Invalid glob pattern"),
    },
    ConfigTestCase {
        name: "malformed_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_config_defaults_applied() {
    let config = load_config_from_str(
        r#"{ "version": "1.0", "incoming_directory": "/uploads", "analysis": { "program": "python3" } }"#,
    )
    .unwrap();

    assert!(config.worker_count >= 1);
    assert!(!config.watcher.recursive);
    assert!(config.watcher.include.is_empty());
    assert_eq!(config.markers.store, MarkerStoreKind::Sidecar);
    assert_eq!(config.reports.file_location_prefix, "/uploads");
    assert_eq!(config.reports.initial_status, ReportStatus::Completed);
}

#[test]
fn test_builder_config_written_to_disk() {
    let harness = TestHarness::new();
    let builder = ConfigBuilder::new(&harness.incoming_dir)
        .marker_store("database")
        .initial_status("Pending");
    let path = harness.base().join("config.json");
    std::fs::write(&path, builder.to_json()).unwrap();

    let config = load_config(&path).unwrap();

    assert_eq!(config.markers.store, MarkerStoreKind::Database);
    assert_eq!(config.reports.initial_status, ReportStatus::Pending);
    assert_eq!(config.worker_count, 1);

    let pipeline = Pipeline::from_config(&config, harness.db.clone()).unwrap();
    assert_eq!(pipeline.config().initial_status, ReportStatus::Pending);
    assert_eq!(pipeline.config().incoming_directory, harness.incoming_dir);
}
