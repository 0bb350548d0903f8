//! Domain error types
//!
//! This module defines the error hierarchy for LTCF Bridge.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main LTCF Bridge error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input handed to the transformation engine
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Mapping/transformation errors
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Flat-file parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Submission API errors
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// File routing errors
    #[error("Routing error: {0}")]
    Routing(String),

    /// Outcome recording (downstream database) errors
    #[error("Outcome recording error: {0}")]
    Outcome(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised while mapping a parsed record onto the output tree
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// A present value could not be coerced to its declared kind
    #[error("Field '{field}' value '{value}' is not a valid {kind}")]
    InvalidValue {
        field: String,
        kind: String,
        value: String,
    },

    /// A catalog target path could not be parsed
    #[error("Invalid target path: {0}")]
    InvalidPath(String),

    /// A resource type outside Patient/Encounter/QuestionnaireResponse
    #[error("Unsupported resource type: {0}")]
    UnsupportedResource(String),

    /// UPDATE requested without an existing identifier (strict mode)
    #[error("Operation UPDATE requested for {resource} without an existing identifier")]
    MissingIdentifier { resource: String },
}

/// Flat-file tokenizer errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The file contained no fields at all
    #[error("Flat file contains no fields")]
    Empty,

    /// A section header that is not ADMIN/PATIENT/ENCOUNTER/SECTION x
    #[error("Unknown section header '{header}' at line {line}")]
    UnknownSection { line: usize, header: String },

    /// A KEY=VALUE line before the first section header
    #[error("Field '{key}' at line {line} appears before any section header")]
    FieldOutsideSection { line: usize, key: String },

    /// A line that is neither a header, a comment nor KEY=VALUE
    #[error("Malformed line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },
}

/// Submission API errors
///
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Failed to connect to the submission API
    #[error("Failed to connect to submission API: {0}")]
    ConnectionFailed(String),

    /// OAuth token acquisition failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API rejected the bundle
    #[error("Bundle rejected: {status} - {body}")]
    Rejected { status: u16, body: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Unparseable response
    #[error("Invalid response from submission API: {0}")]
    InvalidResponse(String),
}

impl SubmissionError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmissionError::ConnectionFailed(_) | SubmissionError::Timeout(_) => true,
            SubmissionError::Rejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_mapping_error_conversion() {
        let mapping_err = MappingError::UnsupportedResource("Observation".to_string());
        let err: BridgeError = mapping_err.into();
        assert!(matches!(err, BridgeError::Mapping(_)));
        assert!(err.to_string().contains("Observation"));
    }

    #[test]
    fn test_invalid_value_names_field() {
        let err = MappingError::InvalidValue {
            field: "A3".to_string(),
            kind: "date".to_string(),
            value: "1950-13-45".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Field 'A3' value '1950-13-45' is not a valid date"
        );
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: BridgeError = ParseError::Empty.into();
        assert!(matches!(err, BridgeError::Parse(ParseError::Empty)));
    }

    #[test]
    fn test_submission_error_retryable() {
        assert!(SubmissionError::ConnectionFailed("reset".to_string()).is_retryable());
        assert!(SubmissionError::Rejected {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!SubmissionError::Rejected {
            status: 422,
            body: "invalid".to_string()
        }
        .is_retryable());
        assert!(!SubmissionError::AuthenticationFailed("denied".to_string()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: BridgeError = toml_err.into();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_bridge_error_implements_std_error() {
        let err = BridgeError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
