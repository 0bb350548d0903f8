//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{LtcfConfig, OutcomeTarget};
use crate::core::builder::SentinelPolicy;
use crate::domain::errors::BridgeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "ltcf.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "LTCF";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`LtcfConfig`]
/// 4. Applies environment variable overrides (`LTCF_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns a `Configuration` error if the file cannot be read or parsed,
/// a referenced environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use ltcf_bridge::config::load_config;
///
/// let config = load_config("ltcf.toml").expect("Failed to load config");
/// println!("Queue: {}", config.directories.queued);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<LtcfConfig> {
    let config = parse_config(path)?;
    config.validate().map_err(|e| {
        BridgeError::Configuration(format!("Configuration validation failed: {e}"))
    })?;
    Ok(config)
}

/// Loads configuration without validating it
///
/// Used by callers that adjust the configuration (for example a
/// `--dry-run` flag) before validating.
pub fn parse_config(path: impl AsRef<Path>) -> Result<LtcfConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BridgeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: LtcfConfig = toml::from_str(&contents)
        .map_err(|e| BridgeError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BridgeError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let substituted = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        lines.push(substituted.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(BridgeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}_{key}")).ok()
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            BridgeError::Configuration(format!(
                "Environment variable {ENV_PREFIX}_{key} has an invalid value '{raw}'"
            ))
        }),
    }
}

/// Applies environment variable overrides using the `LTCF_*` prefix
///
/// Variables follow the pattern `LTCF_<SECTION>_<KEY>`, for example
/// `LTCF_SUBMISSION_BASE_URL` or `LTCF_PROCESSING_PARALLEL_FILES`.
fn apply_env_overrides(config: &mut LtcfConfig) -> Result<()> {
    // Application
    if let Some(val) = env("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parsed("APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }

    // Directories
    if let Some(val) = env("DIRECTORIES_QUEUED") {
        config.directories.queued = val;
    }
    if let Some(val) = env("DIRECTORIES_PROCESSED") {
        config.directories.processed = val;
    }
    if let Some(val) = env("DIRECTORIES_ERRORED") {
        config.directories.errored = val;
    }
    if let Some(val) = env("DIRECTORIES_OUTPUT") {
        config.directories.output = Some(val);
    }

    // Mapping
    if let Some(val) = env("MAPPING_QUESTIONNAIRE_URL") {
        config.mapping.questionnaire_url = Some(val);
    }
    if let Some(val) = env("MAPPING_HEALTH_CARD_SYSTEM") {
        config.mapping.health_card_system = Some(val);
    }
    if let Some(val) = env("MAPPING_SENTINEL_POLICY") {
        config.mapping.sentinel_policy = match val.trim().to_ascii_lowercase().as_str() {
            "omit" => SentinelPolicy::Omit,
            "data_absent_reason" => SentinelPolicy::DataAbsentReason,
            other => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid {ENV_PREFIX}_MAPPING_SENTINEL_POLICY '{other}'. Must be one of: omit, data_absent_reason"
                )))
            }
        };
    }
    if let Some(val) = env_parsed("MAPPING_STRICT_UPDATE_IDS")? {
        config.mapping.strict_update_ids = val;
    }
    if let Some(val) = env("MAPPING_CATALOG_PATH") {
        config.mapping.catalog_path = Some(val);
    }

    // Submission
    if let Some(val) = env("SUBMISSION_BASE_URL") {
        config.submission.base_url = val;
    }
    if let Some(val) = env("SUBMISSION_BUNDLE_PATH") {
        config.submission.bundle_path = val;
    }
    if let Some(val) = env_parsed("SUBMISSION_TIMEOUT_SECONDS")? {
        config.submission.timeout_seconds = val;
    }
    if let Some(val) = env_parsed("SUBMISSION_TLS_VERIFY")? {
        config.submission.tls_verify = val;
    }
    if let Some(val) = env_parsed("SUBMISSION_RETRY_MAX_RETRIES")? {
        config.submission.retry.max_retries = val;
    }
    if let Some(auth) = config.submission.auth.as_mut() {
        if let Some(val) = env("SUBMISSION_AUTH_CLIENT_ID") {
            auth.client_id = val;
        }
        if let Some(val) = env("SUBMISSION_AUTH_CLIENT_SECRET") {
            auth.client_secret = super::secret_string(val);
        }
    }

    // Processing
    if let Some(val) = env_parsed("PROCESSING_PARALLEL_FILES")? {
        config.processing.parallel_files = val;
    }
    if let Some(val) = env_parsed("PROCESSING_SHUTDOWN_TIMEOUT_SECS")? {
        config.processing.shutdown_timeout_secs = val;
    }

    // Outcomes
    if let Some(val) = env("OUTCOMES_TARGET") {
        config.outcomes.target = match val.trim().to_ascii_lowercase().as_str() {
            "none" => OutcomeTarget::None,
            "jsonl" => OutcomeTarget::Jsonl,
            "postgresql" => OutcomeTarget::PostgreSQL,
            other => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid {ENV_PREFIX}_OUTCOMES_TARGET '{other}'. Must be one of: none, jsonl, postgresql"
                )))
            }
        };
    }
    if let Some(val) = env("OUTCOMES_JSONL_PATH") {
        config.outcomes.jsonl_path = val;
    }
    if let Some(pg) = config.outcomes.postgresql.as_mut() {
        if let Some(val) = env("OUTCOMES_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = super::secret_string(val);
        }
        if let Some(val) = env_parsed("OUTCOMES_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
    }

    // Logging
    if let Some(val) = env_parsed("LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env("LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
