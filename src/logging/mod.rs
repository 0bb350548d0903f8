//! Logging and observability
//!
//! Structured logging through `tracing`: console output for operators and
//! an optional JSON file with rotation. The macros below keep the field
//! names of per-file events consistent across the processor and the CLI.

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of processing for one flat file
///
/// ```no_run
/// use ltcf_bridge::log_file_start;
///
/// log_file_start!("queued/assessment-001.txt");
/// ```
#[macro_export]
macro_rules! log_file_start {
    ($file:expr) => {
        tracing::info!(file = %$file, "Processing file");
    };
}

/// Log the PASS/FAIL outcome of one flat file
///
/// ```no_run
/// use ltcf_bridge::log_file_outcome;
/// use std::time::Duration;
///
/// log_file_outcome!("queued/assessment-001.txt", "PASS", Duration::from_millis(120));
/// ```
#[macro_export]
macro_rules! log_file_outcome {
    ($file:expr, $status:expr, $duration:expr) => {
        tracing::info!(
            file = %$file,
            status = %$status,
            duration_ms = $duration.as_millis() as u64,
            "File processed"
        );
    };
}

/// Log an error with context
///
/// ```no_run
/// use ltcf_bridge::domain::BridgeError;
/// use ltcf_bridge::log_error_with_context;
///
/// let error = BridgeError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
