//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for LTCF Bridge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// LTCF Bridge - interRAI LTCF flat files to FHIR transaction bundles
#[derive(Parser, Debug)]
#[command(name = "ltcf-bridge")]
#[command(version, about, long_about = None)]
#[command(author = "LTCF Bridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ltcf.toml", env = "LTCF_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LTCF_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every file in the queue directory
    Process(commands::process::ProcessArgs),

    /// Convert one flat file to XML without submitting or routing it
    Convert(commands::convert::ConvertArgs),

    /// Write the field catalog as TOML
    Catalog(commands::catalog::CatalogArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
