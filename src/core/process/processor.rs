//! Processing of a single flat file
//!
//! Stages: parse, admin metadata, assembly, serialization, optional archive
//! copy, submission, routing and outcome recording. A failure in any stage
//! up to submission makes the file FAIL; routing and recording failures are
//! reported but do not change the status of a submitted file.

use super::summary::{FailureStage, FileFailure, FileReport};
use crate::adapters::flatfile;
use crate::adapters::outcomes::{document_digest, Outcome, OutcomeRecorder, OutcomeStatus};
use crate::adapters::routing::{Destination, FileRouter};
use crate::adapters::submission::Submitter;
use crate::core::bundle::{AssembledBundle, AssemblyOptions, BundleAssembler};
use crate::core::catalog::FieldCatalog;
use crate::core::serialize::to_xml;
use crate::domain::admin::keys;
use crate::domain::{
    AdminMetadata, BridgeError, IdSource, ParsedRecord, RandomIdSource, Result, SubmissionError,
};
use crate::{log_error_with_context, log_file_outcome, log_file_start};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A record turned into its serialized bundle
#[derive(Debug, Clone)]
pub struct Rendered {
    pub assembled: AssembledBundle,
    pub xml: String,
}

/// Assembles and serializes one parsed record
///
/// Pure apart from the identifier source; used by the file processor and
/// the `convert` command.
pub fn render(
    catalog: &FieldCatalog,
    options: AssemblyOptions,
    record: &ParsedRecord,
    admin: &AdminMetadata,
    ids: &mut dyn IdSource,
) -> Result<Rendered> {
    let assembled = BundleAssembler::new(catalog, options).assemble(record, admin, ids)?;
    let xml = to_xml(&assembled.bundle)?;
    Ok(Rendered { assembled, xml })
}

/// Routing keys read straight from the admin group
///
/// Used when the admin metadata itself is invalid, so an errored file still
/// lands under its fiscal year and quarter.
fn routing_keys(record: &ParsedRecord) -> AdminMetadata {
    AdminMetadata {
        fiscal: record.admin.value(keys::FISCAL).map(str::to_string),
        quarter: record.admin.value(keys::QUARTER).map(str::to_string),
        submitter_id: record.admin.value(keys::SUBMITTER_ID).map(str::to_string),
        ..AdminMetadata::default()
    }
}

/// Name a file is reported under
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Per-run processor settings
#[derive(Debug, Clone, Default)]
pub struct ProcessorSettings {
    /// Build bundles without submitting or moving files
    pub dry_run: bool,

    /// Directory receiving a copy of every serialized bundle
    pub output_dir: Option<PathBuf>,

    pub assembly: AssemblyOptions,
}

/// Processes one file end to end
pub struct FileProcessor {
    catalog: Arc<FieldCatalog>,
    submitter: Arc<dyn Submitter>,
    router: FileRouter,
    recorder: Arc<dyn OutcomeRecorder>,
    settings: ProcessorSettings,
}

impl FileProcessor {
    pub fn new(
        catalog: Arc<FieldCatalog>,
        submitter: Arc<dyn Submitter>,
        router: FileRouter,
        recorder: Arc<dyn OutcomeRecorder>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            catalog,
            submitter,
            router,
            recorder,
            settings,
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Processes `path`; never fails, every problem ends up in the report
    pub async fn process(&self, path: &Path) -> FileReport {
        let started = Instant::now();
        let file = file_label(path);
        log_file_start!(file);

        let mut outcome = Outcome::new(
            file.clone(),
            self.catalog.version.clone(),
            self.settings.dry_run,
        );
        let mut routing: Option<AdminMetadata> = None;
        let mut failures = Vec::new();

        match self.submit_file(path, &mut outcome, &mut routing).await {
            Ok(()) => outcome.status = OutcomeStatus::Pass,
            Err(e) => {
                log_error_with_context!(e, "File failed");
                outcome.status = OutcomeStatus::Fail;
                outcome.error = Some(e.to_string());
                failures.push(FileFailure {
                    file: file.clone(),
                    stage: FailureStage::of(&e),
                    message: e.to_string(),
                });
            }
        }

        if self.settings.dry_run {
            tracing::debug!(file = %file, "Dry run: source file left in place");
        } else {
            let destination = if outcome.is_pass() {
                Destination::Processed
            } else {
                Destination::Errored
            };
            match self.router.route(path, destination, routing.as_ref()).await {
                Ok(target) => outcome.routed_to = Some(target.display().to_string()),
                Err(e) => {
                    log_error_with_context!(e, "Failed to route source file");
                    if outcome.error.is_none() {
                        outcome.error = Some(e.to_string());
                    }
                    failures.push(FileFailure {
                        file: file.clone(),
                        stage: FailureStage::Routing,
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome.recorded_at = Utc::now();
        if let Err(e) = self.recorder.record(&outcome).await {
            log_error_with_context!(e, "Failed to record outcome");
            failures.push(FileFailure {
                file: file.clone(),
                stage: FailureStage::Outcome,
                message: e.to_string(),
            });
        }

        let duration = started.elapsed();
        log_file_outcome!(file, outcome.status, duration);

        FileReport {
            file,
            status: outcome.status,
            duration,
            failures,
        }
    }

    /// Everything up to and including submission
    async fn submit_file(
        &self,
        path: &Path,
        outcome: &mut Outcome,
        routing: &mut Option<AdminMetadata>,
    ) -> Result<()> {
        let record = flatfile::parse_file(path).await?;

        let keys = routing_keys(&record);
        outcome.set_admin(&keys);
        *routing = Some(keys);

        let admin = AdminMetadata::from_record(&record)?;
        let mut ids = RandomIdSource;
        let rendered = render(
            &self.catalog,
            self.settings.assembly,
            &record,
            &admin,
            &mut ids,
        )?;

        outcome.bundle_id = Some(rendered.assembled.bundle.id.to_string());
        outcome.identities = rendered.assembled.identities.clone();
        outcome.document_sha256 = Some(document_digest(&rendered.xml));
        tracing::debug!(
            file = %outcome.file,
            entries = rendered.assembled.bundle.entries.len(),
            fields_mapped = rendered.assembled.fields_mapped,
            pruned = rendered.assembled.pruned.removed,
            "Bundle assembled"
        );

        if let Some(dir) = &self.settings.output_dir {
            self.archive(dir, path, &rendered.xml).await?;
        }

        let response = match self.submitter.submit(rendered.xml).await {
            Ok(response) => response,
            Err(e) => {
                if let BridgeError::Submission(SubmissionError::Rejected { status, .. }) = &e {
                    outcome.http_status = Some(*status);
                }
                return Err(e);
            }
        };
        if response.status != 0 {
            outcome.http_status = Some(response.status);
        }
        tracing::info!(
            file = %outcome.file,
            submitter = self.submitter.name(),
            status = response.status,
            attempts = response.attempts,
            "Bundle accepted"
        );
        Ok(())
    }

    /// Writes `<stem>.xml` into the archive directory
    async fn archive(&self, dir: &Path, source: &Path, xml: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            BridgeError::Io(format!(
                "Failed to create output directory {}: {e}",
                dir.display()
            ))
        })?;
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        let target = dir.join(format!("{stem}.xml"));
        tokio::fs::write(&target, xml).await.map_err(|e| {
            BridgeError::Io(format!("Failed to write {}: {e}", target.display()))
        })?;
        tracing::debug!(path = %target.display(), "Bundle archived");
        Ok(target)
    }
}
