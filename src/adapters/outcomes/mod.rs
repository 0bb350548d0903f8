//! Submission outcome recording
//!
//! After a file is submitted (or fails) its [`Outcome`] is handed to an
//! [`OutcomeRecorder`]. The outcome carries the resource identities chosen
//! during assembly, including generated ones, so downstream systems can
//! map their records to the submitted resources.

pub mod jsonl;
pub mod postgres;

pub use jsonl::JsonlOutcomeRecorder;
pub use postgres::{IdentityUpdate, PostgresOutcomeRecorder};

use crate::config::{OutcomeTarget, OutcomesConfig};
use crate::core::bundle::ResourceIdentities;
use crate::domain::{AdminMetadata, BridgeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Final status of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Pass,
    Fail,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Pass => "PASS",
            OutcomeStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one processed file
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Source file name
    pub file: String,
    pub status: OutcomeStatus,
    pub fiscal: Option<String>,
    pub quarter: Option<String>,
    pub submitter_id: Option<String>,

    /// Bundle identifier, when assembly succeeded
    pub bundle_id: Option<String>,

    /// Resource identities, empty when assembly failed
    pub identities: ResourceIdentities,

    /// SHA-256 of the submitted XML document
    pub document_sha256: Option<String>,

    /// Version of the field catalog used for the mapping
    pub catalog_version: String,

    /// HTTP status of the submission response
    pub http_status: Option<u16>,

    pub error: Option<String>,
    pub dry_run: bool,

    /// Where the source file was moved to
    pub routed_to: Option<String>,

    pub recorded_at: DateTime<Utc>,
}

impl Outcome {
    /// Starts an outcome for a file; fields are filled in as processing advances
    pub fn new(file: impl Into<String>, catalog_version: impl Into<String>, dry_run: bool) -> Self {
        Self {
            file: file.into(),
            status: OutcomeStatus::Fail,
            fiscal: None,
            quarter: None,
            submitter_id: None,
            bundle_id: None,
            identities: ResourceIdentities::default(),
            document_sha256: None,
            catalog_version: catalog_version.into(),
            http_status: None,
            error: None,
            dry_run,
            routed_to: None,
            recorded_at: Utc::now(),
        }
    }

    /// Copies the routing and submitter keys from the admin metadata
    pub fn with_admin(mut self, admin: &AdminMetadata) -> Self {
        self.set_admin(admin);
        self
    }

    pub fn set_admin(&mut self, admin: &AdminMetadata) {
        self.fiscal = admin.fiscal.clone();
        self.quarter = admin.quarter.clone();
        self.submitter_id = admin.submitter_id.clone();
    }

    pub fn is_pass(&self) -> bool {
        self.status == OutcomeStatus::Pass
    }
}

/// Hex SHA-256 of a serialized document
pub fn document_digest(xml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(xml.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Receives the outcome of every processed file
#[async_trait]
pub trait OutcomeRecorder: Send + Sync {
    /// Records one outcome
    ///
    /// # Errors
    ///
    /// Returns an `Outcome` error when the record cannot be stored. The
    /// source file has already been routed by then.
    async fn record(&self, outcome: &Outcome) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Recorder for `target = "none"`: outcomes are only logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyRecorder;

#[async_trait]
impl OutcomeRecorder for LogOnlyRecorder {
    async fn record(&self, outcome: &Outcome) -> Result<()> {
        tracing::debug!(
            file = %outcome.file,
            status = %outcome.status,
            bundle_id = ?outcome.bundle_id,
            "Outcome not persisted"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Creates the recorder selected by the configuration
///
/// # Errors
///
/// Fails when the PostgreSQL pool cannot be created or its schema cannot be
/// applied, or when the JSONL directory cannot be created.
pub async fn create_recorder(config: &OutcomesConfig) -> Result<Arc<dyn OutcomeRecorder>> {
    match config.target {
        OutcomeTarget::None => Ok(Arc::new(LogOnlyRecorder)),
        OutcomeTarget::Jsonl => {
            tracing::info!(path = %config.jsonl_path, "Recording outcomes to JSONL");
            Ok(Arc::new(JsonlOutcomeRecorder::new(&config.jsonl_path).await?))
        }
        OutcomeTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                BridgeError::Configuration(
                    "outcomes.postgresql configuration is required when target = 'postgresql'"
                        .to_string(),
                )
            })?;
            tracing::info!("Recording outcomes to PostgreSQL");
            let recorder = PostgresOutcomeRecorder::connect(pg_config.clone()).await?;
            recorder.ensure_schema().await?;
            Ok(Arc::new(recorder))
        }
    }
}
