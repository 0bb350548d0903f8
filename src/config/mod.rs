//! Configuration management for LTCF Bridge.
//!
//! # Overview
//!
//! LTCF Bridge uses a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `LTCF_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation of every section
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level and dry-run flag
//! - [`DirectoriesConfig`] - queue, processed and errored roots
//! - [`MappingConfig`] - catalog overrides and sentinel policy
//! - [`SubmissionConfig`] - submission API, retry and OAuth2 credentials
//! - [`ProcessingConfig`] - concurrency and shutdown timeout
//! - [`OutcomesConfig`] - where submission outcomes are recorded
//! - [`LoggingConfig`] - local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [directories]
//! queued = "/srv/ltcf/queued"
//! processed = "/srv/ltcf/processed"
//! errored = "/srv/ltcf/errored"
//!
//! [mapping]
//! sentinel_policy = "omit"
//!
//! [submission]
//! base_url = "https://fhir.example.org/api"
//!
//! [submission.auth]
//! token_url = "https://auth.example.org/oauth2/token"
//! client_id = "ltcf-bridge"
//! client_secret = "${LTCF_CLIENT_SECRET}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApplicationConfig, AuthConfig, DirectoriesConfig, LoggingConfig, LtcfConfig, MappingConfig,
    OutcomeTarget, OutcomesConfig, PostgreSQLConfig, ProcessingConfig, RetryConfig,
    SubmissionConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
