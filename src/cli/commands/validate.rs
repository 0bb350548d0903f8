//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the LTCF Bridge configuration file and the field catalog it selects.

use crate::config::{load_config, OutcomeTarget};
use crate::core::process::load_catalog;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("Configuration is valid");
                c
            }
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let catalog = match load_catalog(&config.mapping) {
            Ok(c) => c,
            Err(e) => {
                println!("Field catalog is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Queue: {}", config.directories.queued);
        println!("  Processed: {}", config.directories.processed);
        println!("  Errored: {}", config.directories.errored);
        println!(
            "  Field Catalog: {} ({} rules)",
            catalog.version,
            catalog.rule_count()
        );
        println!("  Sentinel Policy: {:?}", config.mapping.sentinel_policy);
        println!("  Endpoint: {}", config.submission.endpoint());
        println!(
            "  Authentication: {}",
            config
                .submission
                .auth
                .as_ref()
                .map(|a| format!("client credentials ({})", a.client_id))
                .unwrap_or_else(|| "none".to_string())
        );
        println!("  Parallel Files: {}", config.processing.parallel_files);

        match config.outcomes.target {
            OutcomeTarget::None => println!("  Outcomes: logged only"),
            OutcomeTarget::Jsonl => println!("  Outcomes: {}", config.outcomes.jsonl_path),
            OutcomeTarget::PostgreSQL => {
                if let Some(pg_config) = &config.outcomes.postgresql {
                    println!(
                        "  Outcomes: PostgreSQL {}",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_str()
                            .split('@')
                            .next_back()
                            .unwrap_or("***")
                    );
                }
            }
        }
        println!();
        Ok(0)
    }
}
