// LTCF Bridge - interRAI LTCF flat files to FHIR transaction bundles
// Copyright (c) 2025 LTCF Bridge Contributors
// Licensed under the MIT License

//! # LTCF Bridge - interRAI LTCF to FHIR
//!
//! LTCF Bridge converts interRAI Long-Term Care Facility assessment flat
//! files into FHIR XML transaction bundles and submits them to a
//! submission API.
//!
//! ## Overview
//!
//! Each flat file describes one assessment: administrative metadata,
//! patient demographics, encounter details and the assessment sections.
//! The mapping engine turns it into a bundle of up to three resources:
//!
//! - **Encounter** - admission and stay details
//! - **QuestionnaireResponse** - the assessment answers
//! - **Patient** - demographics and identifiers
//!
//! Every source field is described by one rule of the
//! [`FieldCatalog`](core::catalog::FieldCatalog); a single tree builder
//! interprets the catalog, absent fields produce no output and empty
//! branches are pruned before serialization.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Mapping engine and file processing
//! - [`adapters`] - Flat-file parser, submission, routing and outcomes
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ltcf_bridge::config::load_config;
//! use ltcf_bridge::core::process::BatchCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("ltcf.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let coordinator = BatchCoordinator::from_config(&config, shutdown_rx).await?;
//!     let summary = coordinator.run().await?;
//!
//!     println!("Passed {} of {} files", summary.passed, summary.total_files);
//!     Ok(())
//! }
//! ```
//!
//! ## Reproducible Output
//!
//! Identifier generation is threaded through the engine as an
//! [`IdSource`](domain::IdSource), so tests and the `convert
//! --sequential-ids` command produce byte-identical documents:
//!
//! ```rust
//! use ltcf_bridge::adapters::flatfile;
//! use ltcf_bridge::core::bundle::{AssemblyOptions, BundleAssembler};
//! use ltcf_bridge::core::catalog::FieldCatalog;
//! use ltcf_bridge::domain::{AdminMetadata, ResourceType, SequentialIdSource};
//!
//! # fn example() -> ltcf_bridge::domain::Result<()> {
//! let record = flatfile::parse_str("[ADMIN]\nPatOper=USE\nPatID=p-1\n[SECTION C]\nC1=1\n")?;
//! let admin = AdminMetadata::from_record(&record)?;
//! let catalog = FieldCatalog::standard()?;
//!
//! let assembled = BundleAssembler::new(&catalog, AssemblyOptions::default())
//!     .assemble(&record, &admin, &mut SequentialIdSource::default())?;
//! assert!(assembled.bundle.entry(ResourceType::Patient).is_none());
//! assert_eq!(
//!     assembled.identities.get(ResourceType::Patient).map(|i| i.reference.as_str()),
//!     Some("Patient/p-1")
//! );
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
