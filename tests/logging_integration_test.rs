//! Integration tests for logging functionality
//!
//! The global subscriber can only be installed once per process, so a
//! single test covers initialization end to end.

use ltcf_bridge::config::LoggingConfig;
use ltcf_bridge::logging::init_logging;
use ltcf_bridge::logging::structured::LOG_FILE_NAME;
use ltcf_bridge::{log_file_outcome, log_file_start};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_path, "/var/log/ltcf-bridge");
}

#[test]
fn test_json_file_logging() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    // events below are emitted from this test crate, not `ltcf_bridge`
    std::env::set_var("RUST_LOG", "info");
    let guard = init_logging("info", &config).unwrap();
    assert!(guard.has_file_output());
    assert!(log_path.exists());

    log_file_start!("queued/assessment-001.txt");
    log_file_outcome!("queued/assessment-001.txt", "PASS", Duration::from_millis(42));

    // a second subscriber cannot be installed
    assert!(init_logging("info", &config).is_err());

    drop(guard);

    let contents = std::fs::read_to_string(log_path.join(LOG_FILE_NAME)).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let outcome = events
        .iter()
        .find(|e| e["fields"]["message"] == "File processed")
        .expect("outcome event in the log file");
    assert_eq!(outcome["fields"]["file"], "queued/assessment-001.txt");
    assert_eq!(outcome["fields"]["status"], "PASS");
    assert_eq!(outcome["fields"]["duration_ms"], 42);
}
