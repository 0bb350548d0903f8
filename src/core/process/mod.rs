//! File processing: one file at a time ([`processor`]) and the whole queue
//! ([`coordinator`]).

pub mod coordinator;
pub mod processor;
pub mod summary;

pub use coordinator::{load_catalog, scan_queue, BatchCoordinator};
pub use processor::{render, FileProcessor, ProcessorSettings, Rendered};
pub use summary::{FailureStage, FileFailure, FileReport, ProcessSummary};
