//! Constraint sets: the on-the-wire schema unit

use docvet_core::{BlockKind, DocvetError, Result};
use serde::{Deserialize, Serialize};

use crate::block_constraint::BlockDefinition;
use crate::document_constraint::DocumentConstraint;
use crate::enums::Enum;
use crate::html::HtmlPolicy;

/// A named collection of document constraints, reusable block
/// definitions, enums and HTML policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintSet {
    /// Schema format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    /// JSON schema reference for editors
    #[serde(rename = "$schema", default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    /// Name of the constraint set
    pub name: String,

    /// Document constraints, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentConstraint>,

    /// Reusable link constraints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BlockDefinition>,

    /// Reusable meta block constraints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<BlockDefinition>,

    /// Reusable content block constraints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<BlockDefinition>,

    /// Enum declarations and extensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<Enum>,

    /// HTML policies
    #[serde(rename = "htmlPolicies", default, skip_serializing_if = "Vec::is_empty")]
    pub html_policies: Vec<HtmlPolicy>,
}

impl ConstraintSet {
    /// Decode a constraint set from JSON, rejecting unknown fields.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed or unrecognized input.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let set = serde_json::from_slice(data)?;

        Ok(set)
    }

    /// The block definitions of the given kind.
    #[must_use]
    pub fn definitions(&self, kind: BlockKind) -> &[BlockDefinition] {
        match kind {
            BlockKind::Link => &self.links,
            BlockKind::Meta => &self.meta,
            BlockKind::Content => &self.content,
        }
    }

    /// Validate the shape of the constraint set.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid definition.
    pub fn validate(&self) -> Result<()> {
        for kind in BlockKind::ALL {
            for (i, definition) in self.definitions(kind).iter().enumerate() {
                if definition.id.is_empty() {
                    return Err(DocvetError::invalid_set(
                        &self.name,
                        format!("{kind} block definition {} must have an ID", i + 1),
                    ));
                }
            }
        }

        Ok(())
    }
}
