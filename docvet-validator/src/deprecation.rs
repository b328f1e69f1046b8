//! Deprecation declarations and the handler contract
//!
//! Constraints can mark document types, blocks, attributes and enum values
//! as deprecated. What a deprecation means for a given document is decided
//! by the caller through a handler: the validator reports each encountered
//! deprecation and the handler decides whether to enforce it as a
//! validation error.

use docvet_core::{Block, Document, DocvetError};
use serde::{Deserialize, Serialize};

use crate::result::EntityRef;

/// A deprecation declared in a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deprecation {
    /// Machine-readable label identifying the deprecation
    pub label: String,
    /// Human-readable documentation
    #[serde(default)]
    pub doc: String,
}

/// Where a deprecation was encountered.
#[derive(Debug, Clone, Default)]
pub struct DeprecationContext<'a> {
    /// The deprecated entity. Empty for document deprecations.
    pub entity: Option<EntityRef>,
    /// The block, unless this is a document or document attribute
    /// deprecation.
    pub block: Option<&'a Block>,
    /// The value, if this was a value deprecation.
    pub value: Option<&'a str>,
}

/// How the validator should treat an encountered deprecation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationDecision {
    /// Treat the deprecation as a validation error
    pub enforce: bool,
    /// Message to use for the validation result; the deprecation's own
    /// documentation is used when empty.
    pub message: String,
}

/// Handler invoked for every deprecation encountered during validation.
///
/// A returned error aborts the validation call.
pub type DeprecationHandlerFn = dyn Fn(&Document, &Deprecation, &DeprecationContext<'_>) -> Result<DeprecationDecision, DocvetError>
    + Send
    + Sync;
