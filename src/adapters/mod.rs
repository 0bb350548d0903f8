//! External collaborators of the mapping engine.
//!
//! - [`flatfile`] - tokenizer turning a flat file into a `ParsedRecord`
//! - [`submission`] - submits serialized bundles to the submission API
//! - [`routing`] - moves source files into processed/errored buckets
//! - [`outcomes`] - records PASS/FAIL outcomes and resource identifiers
//!
//! # Design Pattern
//!
//! Submission and outcome recording sit behind async traits
//! ([`submission::Submitter`], [`outcomes::OutcomeRecorder`]) so the file
//! processor can be driven by dry-run and in-memory implementations in
//! tests. The engine in [`crate::core`] performs no I/O at all.

pub mod flatfile;
pub mod outcomes;
pub mod routing;
pub mod submission;
