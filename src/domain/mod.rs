//! Domain models and types for LTCF Bridge.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Parsed input** ([`ParsedRecord`], [`FieldMap`])
//! - **Admin metadata** ([`AdminMetadata`], [`Operation`])
//! - **Resource identity** ([`ResourceType`], [`ResourceId`], [`IdSource`])
//! - **Error types** ([`BridgeError`], [`MappingError`], [`ParseError`], [`SubmissionError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, BridgeError>`]:
//!
//! ```rust
//! use ltcf_bridge::domain::{Operation, Result};
//!
//! fn example() -> Result<()> {
//!     let op: Operation = "update".parse()?;
//!     assert_eq!(op, Operation::Update);
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod errors;
pub mod ids;
pub mod record;
pub mod resource;
pub mod result;

// Re-export commonly used types for convenience
pub use admin::{AdminMetadata, ResourceControl};
pub use errors::{BridgeError, MappingError, ParseError, SubmissionError};
pub use ids::{IdSource, RandomIdSource, ResourceId, SequentialIdSource};
pub use record::{FieldMap, ParsedRecord};
pub use resource::{Operation, ResourceType};
pub use result::Result;
