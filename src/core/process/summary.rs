//! Queue run summary and reporting

use crate::adapters::outcomes::OutcomeStatus;
use crate::domain::BridgeError;
use std::time::Duration;

/// Stage at which a file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Flat-file tokenizer
    Parse,
    /// Admin metadata or value validation
    Validation,
    /// Mapping engine or XML serialization
    Mapping,
    /// Submission API
    Submission,
    /// Moving the source file
    Routing,
    /// Outcome recording
    Outcome,
    /// File system or anything else
    Other,
}

impl FailureStage {
    /// Classifies an error by the stage that raised it
    pub fn of(error: &BridgeError) -> Self {
        match error {
            BridgeError::Parse(_) => FailureStage::Parse,
            BridgeError::Validation(_) | BridgeError::InvalidInput(_) => FailureStage::Validation,
            BridgeError::Mapping(_) | BridgeError::Serialization(_) => FailureStage::Mapping,
            BridgeError::Submission(_) => FailureStage::Submission,
            BridgeError::Routing(_) => FailureStage::Routing,
            BridgeError::Outcome(_) => FailureStage::Outcome,
            BridgeError::Configuration(_) | BridgeError::Io(_) | BridgeError::Other(_) => {
                FailureStage::Other
            }
        }
    }
}

/// One failure with the file it belongs to
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file: String,
    pub stage: FailureStage,
    pub message: String,
}

/// What happened to one file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: String,
    pub status: OutcomeStatus,
    pub duration: Duration,

    /// Failures in order of occurrence; a PASS file may still carry routing
    /// or recording failures
    pub failures: Vec<FileFailure>,
}

/// Summary of one queue run
#[derive(Debug, Clone, Default)]
pub struct ProcessSummary {
    /// Files found in the queue
    pub total_files: usize,

    /// Files submitted (or built, in a dry run) successfully
    pub passed: usize,

    /// Files routed to the error bucket
    pub failed: usize,

    /// Files not started because of a shutdown request
    pub skipped: usize,

    /// Whether a shutdown request interrupted the run
    pub interrupted: bool,

    /// Whether in-flight files were abandoned after the shutdown timeout
    pub timed_out: bool,

    pub duration: Duration,
    pub failures: Vec<FileFailure>,
}

impl ProcessSummary {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Adds the report of one file
    pub fn add_report(&mut self, report: FileReport) {
        match report.status {
            OutcomeStatus::Pass => self.passed += 1,
            OutcomeStatus::Fail => self.failed += 1,
        }
        self.failures.extend(report.failures);
    }

    /// Files that finished, either way
    pub fn completed(&self) -> usize {
        self.passed + self.failed
    }

    /// True when every file passed and nothing went wrong afterwards
    pub fn is_successful(&self) -> bool {
        self.failed == 0 && self.failures.is_empty() && !self.interrupted
    }

    /// Share of completed files that passed, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.completed() == 0 {
            return 100.0;
        }
        (self.passed as f64 / self.completed() as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            total_files = self.total_files,
            passed = self.passed,
            failed = self.failed,
            skipped = self.skipped,
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Queue processed"
        );

        for failure in &self.failures {
            tracing::warn!(
                file = %failure.file,
                stage = ?failure.stage,
                message = %failure.message,
                "File failure"
            );
        }
    }
}
