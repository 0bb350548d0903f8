//! Core business logic for LTCF Bridge.
//!
//! The mapping engine turns a [`ParsedRecord`](crate::domain::ParsedRecord)
//! into a FHIR transaction bundle without doing any I/O; [`process`] wires
//! it to the file system and the submission API.
//!
//! # Modules
//!
//! - [`tree`] - generic output tree and target paths
//! - [`catalog`] - data-driven field catalog (one rule per source field)
//! - [`builder`] - conditional tree builder interpreting the catalog
//! - [`prune`] - removal of empty branches
//! - [`bundle`] - entry/request wrapping and bundle assembly
//! - [`serialize`] - XML serialization
//! - [`process`] - per-file processing and the queue coordinator
//!
//! # Example
//!
//! ```rust
//! use ltcf_bridge::adapters::flatfile;
//! use ltcf_bridge::core::bundle::AssemblyOptions;
//! use ltcf_bridge::core::catalog::FieldCatalog;
//! use ltcf_bridge::core::process::render;
//! use ltcf_bridge::domain::{AdminMetadata, SequentialIdSource};
//!
//! # fn example() -> ltcf_bridge::domain::Result<()> {
//! let record = flatfile::parse_str("[PATIENT]\nA3=1950-01-01\n")?;
//! let admin = AdminMetadata::from_record(&record)?;
//! let catalog = FieldCatalog::standard()?;
//!
//! let mut ids = SequentialIdSource::default();
//! let rendered = render(&catalog, AssemblyOptions::default(), &record, &admin, &mut ids)?;
//! assert!(rendered.xml.starts_with("<?xml"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod builder;
pub mod bundle;
pub mod catalog;
pub mod process;
pub mod prune;
pub mod serialize;
pub mod tree;
