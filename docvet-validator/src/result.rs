//! Validation results, entity references and value collection

use docvet_core::{Block, BlockKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::string_constraint::StringConstraint;

/// The kind of entity a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefType {
    /// A block in one of the three child sequences
    #[serde(rename = "block")]
    Block,
    /// A document or block attribute
    #[serde(rename = "attribute")]
    Attribute,
    /// A key in a block's data map
    #[serde(rename = "data attribute")]
    Data,
    /// A legacy document property
    #[serde(rename = "property")]
    Property,
    /// A parameter of a legacy document property
    #[serde(rename = "parameter")]
    Parameter,
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefType::Block => write!(f, "block"),
            RefType::Attribute => write!(f, "attribute"),
            RefType::Data => write!(f, "data attribute"),
            RefType::Property => write!(f, "property"),
            RefType::Parameter => write!(f, "parameter"),
        }
    }
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// A reference to a position in a document.
///
/// Validation results and value annotations carry a sequence of these,
/// innermost entity first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// What the reference points at
    #[serde(rename = "refType")]
    pub ref_type: RefType,

    /// The child sequence, for block references
    #[serde(rename = "kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,

    /// Position in the child sequence, for block references
    #[serde(default, skip_serializing_if = "is_zero")]
    pub index: usize,

    /// Attribute or data key name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The type of the referenced block
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub ref_block_type: String,

    /// The rel of the referenced block
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rel: String,
}

impl EntityRef {
    /// Reference an attribute by name.
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            ref_type: RefType::Attribute,
            kind: None,
            index: 0,
            name: name.into(),
            ref_block_type: String::new(),
            rel: String::new(),
        }
    }

    /// Reference a data key by name.
    #[must_use]
    pub fn data(name: impl Into<String>) -> Self {
        Self {
            ref_type: RefType::Data,
            kind: None,
            index: 0,
            name: name.into(),
            ref_block_type: String::new(),
            rel: String::new(),
        }
    }

    /// Reference a block by position.
    #[must_use]
    pub fn block(kind: BlockKind, index: usize, block: &Block) -> Self {
        Self {
            ref_type: RefType::Block,
            kind: Some(kind),
            index,
            name: String::new(),
            ref_block_type: block.block_type.clone(),
            rel: block.rel.clone(),
        }
    }

    fn type_desc(&self) -> String {
        match (self.ref_block_type.is_empty(), self.rel.is_empty()) {
            (true, true) => String::new(),
            (false, false) => format!("{}({})", self.rel, self.ref_block_type),
            (false, true) => format!("({})", self.ref_block_type),
            (true, false) => self.rel.clone(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ref_type == RefType::Block {
            let kind = self.kind.unwrap_or_default();
            let desc = self.type_desc();

            if desc.is_empty() {
                return write!(f, "{} {}", kind.description(1), self.index + 1);
            }

            return write!(f, "{} {} {desc}", kind.description(1), self.index + 1);
        }

        write!(f, "{} {:?}", self.ref_type, self.name)
    }
}

/// A single validation finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Path to the entity the finding concerns, innermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity: Vec<EntityRef>,

    /// Human-readable description of the violation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// True when the finding comes from an enforced deprecation
    #[serde(
        rename = "enforcedDeprecation",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub enforced_deprecation: bool,
}

impl ValidationResult {
    /// Create a result without an entity path.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            entity: Vec::new(),
            error: message.into(),
            enforced_deprecation: false,
        }
    }

    /// Create a result anchored at an entity.
    #[must_use]
    pub fn entity_error(entity: EntityRef, message: impl Into<String>) -> Self {
        Self {
            entity: vec![entity],
            error: message.into(),
            enforced_deprecation: false,
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entity.is_empty() {
            return f.write_str(&self.error);
        }

        let path = self
            .entity
            .iter()
            .map(EntityRef::to_string)
            .collect::<Vec<_>>()
            .join(" of ");

        write!(f, "{path}: {}", self.error)
    }
}

/// A captured value with its path and the constraint it was checked
/// against. Emitted for every validated value so that callers can build
/// downstream indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueAnnotation {
    /// Path to the value, innermost entity first
    #[serde(rename = "ref")]
    pub refs: Vec<EntityRef>,

    /// The constraint the value was validated against
    #[serde(default)]
    pub constraint: StringConstraint,

    /// The value itself
    #[serde(default)]
    pub value: String,
}

/// Sink for value annotations emitted during validation.
pub trait ValueCollector: Send + Sync {
    /// Capture one annotation.
    fn collect_value(&self, annotation: ValueAnnotation);

    /// Return a collector that prepends the given entity to the path of
    /// every annotation collected through it.
    fn with(&self, entity: EntityRef) -> Arc<dyn ValueCollector>;
}

/// A collector that drops every annotation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueDiscarder;

impl ValueCollector for ValueDiscarder {
    fn collect_value(&self, _annotation: ValueAnnotation) {}

    fn with(&self, _entity: EntityRef) -> Arc<dyn ValueCollector> {
        Arc::new(ValueDiscarder)
    }
}
