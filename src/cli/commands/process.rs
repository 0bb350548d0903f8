//! Process command implementation
//!
//! This module implements the `process` command, which runs every queued
//! flat file through the mapping engine and the submission API.

use crate::config::parse_config;
use crate::core::process::{scan_queue, BatchCoordinator, ProcessSummary};
use clap::Args;
use std::path::Path;
use tokio::sync::watch;

/// Failures printed before the list is cut short
const MAX_LISTED_FAILURES: usize = 10;

/// Arguments for the process command
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - build bundles without submitting or moving files
    #[arg(long)]
    pub dry_run: bool,

    /// Override the queue directory
    #[arg(long, value_name = "DIR")]
    pub queued: Option<String>,
}

impl ProcessArgs {
    /// Execute the process command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting process command");

        let mut config = match parse_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(queued) = &self.queued {
            tracing::info!(queued = %queued, "Overriding queue directory from CLI");
            config.directories.queued = queued.clone();
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let dry_run = config.application.dry_run;
        if dry_run {
            tracing::info!("Dry run mode enabled - nothing will be submitted or moved");
            println!("DRY RUN MODE - bundles are built but not submitted; files stay queued");
            println!();
        }

        if !self.yes && !dry_run {
            let directories = &config.directories;
            let queued = scan_queue(Path::new(&directories.queued), &directories.extension)
                .await
                .map(|files| files.len().to_string())
                .unwrap_or_else(|_| "unreadable".to_string());
            println!("Processing Configuration:");
            println!("  Queue: {} ({queued} files)", config.directories.queued);
            println!("  Processed: {}", config.directories.processed);
            println!("  Errored: {}", config.directories.errored);
            println!("  Endpoint: {}", config.submission.endpoint());
            println!("  Parallel files: {}", config.processing.parallel_files);
            println!();
            print!("Proceed with submission? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Processing cancelled.");
                return Ok(0);
            }
        }

        tracing::info!("Creating batch coordinator");
        let coordinator = match BatchCoordinator::from_config(&config, shutdown_signal).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create batch coordinator");
                eprintln!("Failed to initialize processing: {e}");
                return Ok(4);
            }
        };

        let summary = match coordinator.run().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Processing failed");
                eprintln!("Processing failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);
        Ok(exit_code(&summary))
    }
}

/// Exit code for a finished run
pub fn exit_code(summary: &ProcessSummary) -> i32 {
    if summary.interrupted {
        130
    } else if summary.is_successful() {
        0
    } else {
        1
    }
}

fn print_summary(summary: &ProcessSummary) {
    println!();
    println!("Processing Summary:");
    println!("  Files: {}", summary.total_files);
    println!("  Passed: {}", summary.passed);
    println!("  Failed: {}", summary.failed);
    if summary.skipped > 0 {
        println!("  Skipped: {}", summary.skipped);
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());
    println!();

    if !summary.failures.is_empty() {
        println!("Failures:");
        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("  - {} [{:?}]: {}", failure.file, failure.stage, failure.message);
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "  ... and {} more",
                summary.failures.len() - MAX_LISTED_FAILURES
            );
        }
        println!();
    }

    if summary.interrupted {
        println!("Processing interrupted. Unprocessed files remain in the queue.");
        if summary.timed_out {
            println!("Files still in flight at the shutdown timeout were abandoned.");
        }
    } else if summary.is_successful() {
        println!("Processing completed successfully!");
    } else {
        println!("Processing completed with failures");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let mut summary = ProcessSummary::new(2);
        summary.passed = 2;
        assert_eq!(exit_code(&summary), 0);

        summary.failed = 1;
        assert_eq!(exit_code(&summary), 1);

        summary.interrupted = true;
        assert_eq!(exit_code(&summary), 130);
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let args = ProcessArgs {
            yes: true,
            dry_run: true,
            queued: None,
        };
        let (_tx, rx) = watch::channel(false);
        let code = args.execute("/nonexistent/ltcf.toml", rx).await.unwrap();
        assert_eq!(code, 2);
    }
}
