//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables hold `ENV_MUTEX` so they
//! do not interfere with each other.

use ltcf_bridge::config::{load_config, OutcomeTarget};
use ltcf_bridge::core::builder::SentinelPolicy;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("LTCF_APPLICATION_LOG_LEVEL");
    std::env::remove_var("LTCF_APPLICATION_DRY_RUN");
    std::env::remove_var("LTCF_DIRECTORIES_QUEUED");
    std::env::remove_var("LTCF_MAPPING_SENTINEL_POLICY");
    std::env::remove_var("LTCF_PROCESSING_PARALLEL_FILES");
    std::env::remove_var("LTCF_OUTCOMES_TARGET");
    std::env::remove_var("TEST_LTCF_CLIENT_SECRET");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

const MINIMAL: &str = r#"
[directories]
queued = "/srv/ltcf/queued"
processed = "/srv/ltcf/processed"
errored = "/srv/ltcf/errored"

[submission]
base_url = "https://fhir.example.org/api"
"#;

#[test]
fn test_load_complete_config() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let toml_content = r#"
[application]
log_level = "debug"
dry_run = false

[directories]
queued = "/srv/ltcf/queued"
processed = "/srv/ltcf/processed"
errored = "/srv/ltcf/errored"
output = "/srv/ltcf/xml"
extension = "dat"

[mapping]
questionnaire_url = "https://example.org/Questionnaire/ltcf"
health_card_system = "https://example.org/NamingSystem/hcn"
sentinel_policy = "data_absent_reason"
strict_update_ids = true

[submission]
base_url = "https://fhir.example.org/api"
bundle_path = "/Bundle"
timeout_seconds = 45
tls_verify = true

[submission.retry]
max_retries = 5
initial_delay_ms = 200
max_delay_ms = 5000
backoff_multiplier = 3.0

[submission.auth]
token_url = "https://auth.example.org/oauth2/token"
client_id = "ltcf-bridge"
client_secret = "${TEST_LTCF_CLIENT_SECRET}"
scope = "system/*.write"

[processing]
parallel_files = 8
shutdown_timeout_secs = 10

[outcomes]
target = "jsonl"
jsonl_path = "/srv/ltcf/outcomes.jsonl"

[logging]
local_enabled = false
local_path = "/tmp/ltcf"
local_rotation = "hourly"
"#;

    std::env::set_var("TEST_LTCF_CLIENT_SECRET", "from-env");
    let temp_file = write_config(toml_content);
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    let config = result.expect("complete configuration should load");
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.directories.extension, "dat");
    assert_eq!(config.directories.output.as_deref(), Some("/srv/ltcf/xml"));
    assert_eq!(config.mapping.sentinel_policy, SentinelPolicy::DataAbsentReason);
    assert!(config.mapping.strict_update_ids);
    assert_eq!(
        config.submission.endpoint(),
        "https://fhir.example.org/api/Bundle"
    );
    assert_eq!(config.submission.retry.max_retries, 5);

    let auth = config.submission.auth.expect("auth section");
    assert_eq!(auth.client_id, "ltcf-bridge");
    assert_eq!(auth.client_secret.expose_secret().as_str(), "from-env");
    assert_eq!(auth.scope.as_deref(), Some("system/*.write"));

    assert_eq!(config.processing.parallel_files, 8);
    assert_eq!(config.outcomes.target, OutcomeTarget::Jsonl);
    assert!(!config.logging.local_enabled);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let temp_file = write_config(MINIMAL);
    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert!(!config.application.dry_run);
    assert_eq!(config.directories.extension, "txt");
    assert_eq!(config.mapping.sentinel_policy, SentinelPolicy::Omit);
    assert!(config.mapping.questionnaire_url.is_none());
    assert_eq!(config.processing.parallel_files, 4);
    assert_eq!(config.outcomes.target, OutcomeTarget::None);
    assert!(config.submission.auth.is_none());
}

#[test]
fn test_env_overrides_take_precedence() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("LTCF_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("LTCF_DIRECTORIES_QUEUED", "/override/queued");
    std::env::set_var("LTCF_MAPPING_SENTINEL_POLICY", "data_absent_reason");
    std::env::set_var("LTCF_PROCESSING_PARALLEL_FILES", "2");

    let temp_file = write_config(MINIMAL);
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.directories.queued, "/override/queued");
    assert_eq!(config.mapping.sentinel_policy, SentinelPolicy::DataAbsentReason);
    assert_eq!(config.processing.parallel_files, 2);
}

#[test]
fn test_invalid_env_override_is_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("LTCF_OUTCOMES_TARGET", "cosmos");
    let temp_file = write_config(MINIMAL);
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("LTCF_OUTCOMES_TARGET"));
}

#[test]
fn test_missing_substitution_variable_is_reported() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let toml_content = format!(
        "{MINIMAL}\n[submission.auth]\ntoken_url = \"https://auth.example.org/token\"\nclient_id = \"x\"\nclient_secret = \"${{TEST_LTCF_CLIENT_SECRET}}\"\n"
    );
    let temp_file = write_config(&toml_content);
    let err = load_config(temp_file.path()).unwrap_err();

    assert!(err.to_string().contains("TEST_LTCF_CLIENT_SECRET"));
}

#[test]
fn test_validation_rejects_shared_directories() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let toml_content = MINIMAL.replace("/srv/ltcf/processed", "/srv/ltcf/queued");
    let temp_file = write_config(&toml_content);
    let err = load_config(temp_file.path()).unwrap_err();

    assert!(err.to_string().contains("directories.queued"));
}

#[test]
fn test_validation_rejects_postgres_target_without_section() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let toml_content = format!("{MINIMAL}\n[outcomes]\ntarget = \"postgresql\"\n");
    let temp_file = write_config(&toml_content);
    let err = load_config(temp_file.path()).unwrap_err();

    assert!(err.to_string().contains("outcomes.postgresql"));
}

#[test]
fn test_dry_run_skips_submission_validation() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let toml_content = MINIMAL.replace("https://fhir.example.org/api", "not-a-url");
    let temp_file = write_config(&toml_content);
    assert!(load_config(temp_file.path()).is_err());

    std::env::set_var("LTCF_APPLICATION_DRY_RUN", "true");
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    assert!(result.unwrap().application.dry_run);
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/ltcf.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
