//! Constraint-based validation of structured news documents
//!
//! A document is a tree of blocks; a constraint set is a declarative
//! schema describing which document types are permitted, which block
//! shapes may appear where, and what values every attribute and data key
//! may hold. This crate compiles one or more constraint sets into a
//! [`Validator`] that reports violations as a flat list of results, and
//! that can optionally [prune](Validator::prune) a document down to a
//! conforming subset.
//!
//! ```
//! use docvet_core::Document;
//! use docvet_validator::{ConstraintSet, ValidationOptions, Validator};
//!
//! # fn main() -> docvet_core::Result<()> {
//! let schema = ConstraintSet::from_json(
//!     br#"{
//!         "name": "example",
//!         "documents": [
//!             {
//!                 "declares": "example/article",
//!                 "content": [
//!                     {
//!                         "declares": {"type": "example/text"},
//!                         "data": {"text": {}}
//!                     }
//!                 ]
//!             }
//!         ]
//!     }"#,
//! )?;
//!
//! let validator = Validator::new(vec![schema])?;
//!
//! let document: Document = serde_json::from_str(
//!     r#"{
//!         "uuid": "8f9fbc56-3fcd-45a9-a152-0f1e1c47ca15",
//!         "type": "example/article",
//!         "content": [
//!             {"type": "example/text", "data": {"text": "Hello"}}
//!         ]
//!     }"#,
//! )
//! .expect("decode document");
//!
//! let results = validator.validate_document(&document, ValidationOptions::new())?;
//! assert!(results.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod block_constraint;
pub mod collection;
pub mod colour;
pub mod deprecation;
pub mod document_constraint;
pub mod enums;
pub mod html;
pub mod pattern;
pub mod result;
pub mod schema;
pub mod string_constraint;
pub mod validation;

mod prune;
mod wkt;

pub use block_constraint::{BlockConstraint, BlockDefinition, BlockSignature, Match};
pub use collection::DefaultValueCollector;
pub use colour::ColourFormat;
pub use deprecation::{
    Deprecation, DeprecationContext, DeprecationDecision, DeprecationHandlerFn,
};
pub use document_constraint::DocumentConstraint;
pub use enums::{Enum, EnumConstraint};
pub use html::{HtmlElement, HtmlPolicy};
pub use pattern::{GlobList, Regexp};
pub use result::{
    EntityRef, RefType, ValidationResult, ValueAnnotation, ValueCollector, ValueDiscarder,
};
pub use schema::ConstraintSet;
pub use string_constraint::{ConstraintMap, StringConstraint, StringFormat};
pub use validation::{ValidationOptions, Validator};
