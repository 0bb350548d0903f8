//! Submission of serialized bundles
//!
//! The [`Submitter`] trait is the seam between the file processor and the
//! submission API. [`HttpSubmitter`] posts to the real endpoint with OAuth2
//! client credentials; [`DryRunSubmitter`] accepts everything and is used
//! by `--dry-run` and the `convert` command.

pub mod auth;
pub mod client;

pub use auth::TokenManager;
pub use client::HttpSubmitter;

use crate::domain::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Content type of submitted documents
pub const FHIR_XML: &str = "application/fhir+xml";

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResponse {
    /// HTTP status returned by the API (0 for dry runs)
    pub status: u16,

    /// Response body, usually the transaction-response bundle
    pub body: String,

    /// Number of attempts it took
    pub attempts: usize,
}

/// Accepts a fully serialized XML bundle
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submits one document
    ///
    /// # Errors
    ///
    /// Returns a `Submission` error when the document is rejected or the API
    /// cannot be reached after all retries.
    async fn submit(&self, xml: String) -> Result<SubmissionResponse>;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;
}

/// Submitter that never contacts the API
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSubmitter;

#[async_trait]
impl Submitter for DryRunSubmitter {
    async fn submit(&self, xml: String) -> Result<SubmissionResponse> {
        tracing::info!(bytes = xml.len(), "Dry run: bundle not submitted");
        Ok(SubmissionResponse {
            status: 0,
            body: String::new(),
            attempts: 0,
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
