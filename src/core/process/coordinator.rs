//! Queue coordinator - runs every queued file through the processor
//!
//! Files are taken in name order and processed with bounded concurrency.
//! A shutdown request stops new files from starting; files already in
//! flight get `shutdown_timeout_secs` to finish before they are abandoned
//! and left in the queue.

use super::processor::{FileProcessor, ProcessorSettings};
use super::summary::ProcessSummary;
use crate::adapters::outcomes::create_recorder;
use crate::adapters::routing::FileRouter;
use crate::adapters::submission::{DryRunSubmitter, HttpSubmitter, Submitter};
use crate::config::{LtcfConfig, MappingConfig};
use crate::core::bundle::AssemblyOptions;
use crate::core::catalog::{assessment, patient, FieldCatalog};
use crate::domain::{BridgeError, ResourceType, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::Sleep;
use tracing::Instrument;

/// Builds the field catalog for a mapping configuration
///
/// Starts from the external catalog file when one is configured, otherwise
/// from the built-in tables, then applies the configured URIs.
pub fn load_catalog(mapping: &MappingConfig) -> Result<FieldCatalog> {
    let mut catalog = match &mapping.catalog_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading field catalog");
            FieldCatalog::from_toml_file(path)?
        }
        None => FieldCatalog::standard()?,
    };

    if let Some(url) = &mapping.questionnaire_url {
        let changed = catalog.override_constant(
            ResourceType::QuestionnaireResponse,
            assessment::QUESTIONNAIRE_TARGET,
            url,
        )?;
        tracing::debug!(url = %url, changed, "Questionnaire URL overridden");
    }
    if let Some(system) = &mapping.health_card_system {
        let changed = catalog.override_constant(
            ResourceType::Patient,
            patient::HEALTH_CARD_SYSTEM_TARGET,
            system,
        )?;
        tracing::debug!(system = %system, changed, "Health card system overridden");
    }
    tracing::debug!(
        version = %catalog.version,
        rules = catalog.rule_count(),
        "Field catalog ready"
    );
    Ok(catalog)
}

/// Queued files with the configured extension, in name order
///
/// An empty extension accepts every file.
pub async fn scan_queue(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        BridgeError::Io(format!("Failed to read queue directory {}: {e}", dir.display()))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let matches = extension.is_empty()
            || path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(extension));
        if matches {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Resolves once the deadline passes; never resolves without one
async fn until(deadline: Option<&mut Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Runs the queue
pub struct BatchCoordinator {
    processor: Arc<FileProcessor>,
    queued: PathBuf,
    extension: String,
    parallel_files: usize,
    shutdown_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BatchCoordinator {
    /// Wires catalog, submitter, router and recorder from the configuration
    ///
    /// # Errors
    ///
    /// Fails when the catalog cannot be loaded, the HTTP client cannot be
    /// built or the outcome store is unreachable.
    pub async fn from_config(config: &LtcfConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let catalog = Arc::new(load_catalog(&config.mapping)?);

        let dry_run = config.application.dry_run;
        let submitter: Arc<dyn Submitter> = if dry_run {
            Arc::new(DryRunSubmitter)
        } else {
            Arc::new(HttpSubmitter::new(&config.submission)?)
        };
        let recorder = create_recorder(&config.outcomes).await?;
        let router = FileRouter::new(&config.directories.processed, &config.directories.errored);

        tracing::info!(
            submitter = submitter.name(),
            recorder = recorder.name(),
            catalog = %catalog.version,
            dry_run,
            "Processing pipeline ready"
        );

        let settings = ProcessorSettings {
            dry_run,
            output_dir: config.directories.output.as_ref().map(PathBuf::from),
            assembly: AssemblyOptions {
                sentinel_policy: config.mapping.sentinel_policy,
                strict_update_ids: config.mapping.strict_update_ids,
            },
        };
        let processor = FileProcessor::new(catalog, submitter, router, recorder, settings);

        Ok(Self::new(
            processor,
            &config.directories.queued,
            &config.directories.extension,
            config.processing.parallel_files,
            Duration::from_secs(config.processing.shutdown_timeout_secs),
            shutdown,
        ))
    }

    pub fn new(
        processor: FileProcessor,
        queued: impl Into<PathBuf>,
        extension: &str,
        parallel_files: usize,
        shutdown_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            queued: queued.into(),
            extension: extension.to_string(),
            parallel_files: parallel_files.max(1),
            shutdown_timeout,
            shutdown,
        }
    }

    /// Processes every file currently in the queue
    pub async fn run(&self) -> Result<ProcessSummary> {
        let started = Instant::now();
        let files = scan_queue(&self.queued, &self.extension).await?;
        let mut summary = ProcessSummary::new(files.len());

        if files.is_empty() {
            tracing::info!(queue = %self.queued.display(), "Queue is empty");
            return Ok(summary.with_duration(started.elapsed()));
        }
        tracing::info!(
            queue = %self.queued.display(),
            files = files.len(),
            parallel_files = self.parallel_files,
            "Starting queue run"
        );

        let mut results = stream::iter(files)
            .map(|path| {
                let processor = Arc::clone(&self.processor);
                let shutdown = self.shutdown.clone();
                async move {
                    if *shutdown.borrow() {
                        return None;
                    }
                    let span = tracing::info_span!("file", path = %path.display());
                    Some(processor.process(&path).instrument(span).await)
                }
            })
            .buffer_unordered(self.parallel_files);

        let mut shutdown = self.shutdown.clone();
        let mut watching = true;
        let mut deadline: Option<Pin<Box<Sleep>>> = None;
        if *shutdown.borrow() {
            summary.interrupted = true;
            deadline = Some(Box::pin(tokio::time::sleep(self.shutdown_timeout)));
        }

        loop {
            tokio::select! {
                next = results.next() => match next {
                    Some(Some(report)) => summary.add_report(report),
                    Some(None) => summary.skipped += 1,
                    None => break,
                },
                changed = shutdown.changed(), if watching && deadline.is_none() => {
                    if changed.is_err() {
                        watching = false;
                    } else if *shutdown.borrow() {
                        tracing::warn!(
                            timeout_secs = self.shutdown_timeout.as_secs(),
                            "Shutdown requested; finishing files in flight"
                        );
                        summary.interrupted = true;
                        deadline = Some(Box::pin(tokio::time::sleep(self.shutdown_timeout)));
                    }
                },
                _ = until(deadline.as_mut()) => {
                    tracing::error!("Shutdown timeout reached; abandoning files in flight");
                    summary.timed_out = true;
                    break;
                }
            }
        }

        summary.skipped = summary.total_files - summary.completed();
        let summary = summary.with_duration(started.elapsed());
        summary.log_summary();
        Ok(summary)
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("queued", &self.queued)
            .field("extension", &self.extension)
            .field("parallel_files", &self.parallel_files)
            .finish()
    }
}
