//! The document model
//!
//! A document is a root carrying a small set of string attributes and
//! three ordered block sequences. Blocks carry a closed set of string
//! attributes, a string-to-string data map, and the same three sequences,
//! recursively. All values are strings; there is no type coercion at the
//! model level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kinds of child block sequences a document or block can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Relations to other resources
    Link,
    /// Data about the document or block itself
    Meta,
    /// The payload of the document or block
    Content,
}

impl BlockKind {
    /// All block kinds in the fixed traversal order.
    pub const ALL: [BlockKind; 3] = [BlockKind::Link, BlockKind::Meta, BlockKind::Content];

    /// The pluralised English name of the block kind.
    #[must_use]
    pub fn description(self, n: usize) -> &'static str {
        match (self, n) {
            (BlockKind::Link, 1) => "link",
            (BlockKind::Link, _) => "links",
            (BlockKind::Meta, 1) => "meta block",
            (BlockKind::Meta, _) => "meta blocks",
            (BlockKind::Content, 1) => "content block",
            (BlockKind::Content, _) => "content blocks",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Link => write!(f, "link"),
            BlockKind::Meta => write!(f, "meta"),
            BlockKind::Content => write!(f, "content"),
        }
    }
}

impl Default for BlockKind {
    fn default() -> Self {
        BlockKind::Link
    }
}

/// A structured document: root attributes plus three block sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// Document identity
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    /// Document type, e.g. "core/article"
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub doc_type: String,

    /// Canonical URI of the document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    /// Web-addressable location, if any
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// RFC 5646 language tag
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,

    /// Relations to other resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Block>,

    /// Data about the document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<Block>,

    /// Document payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Block>,
}

/// A block in a document tree.
///
/// The attribute set is closed and identical at every nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    /// Identifier within the parent scope
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Globally unique identity, if any
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    /// Block type
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub block_type: String,

    /// Canonical URI of the referenced resource
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    /// Web-addressable location
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// Relationship to the parent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rel: String,

    /// Symbolic name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Scalar value payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    /// Content type of the referenced resource
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contenttype: String,

    /// Role the block plays for the parent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,

    /// Sensitivity marker
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sensitivity: String,

    /// Free-form string data. An empty map is treated as absent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    /// Relations to other resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Block>,

    /// Data about the block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<Block>,

    /// Block payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Block>,
}

/// Every block attribute that participates in declared-attribute
/// bookkeeping. The `id` attribute is deliberately absent; identifiers are
/// never flagged as undeclared.
pub const ALL_BLOCK_ATTRIBUTES: [&str; 11] = [
    "uuid",
    "type",
    "uri",
    "url",
    "title",
    "rel",
    "name",
    "value",
    "contenttype",
    "role",
    "sensitivity",
];

impl Document {
    /// Get the child blocks of the given kind.
    #[must_use]
    pub fn blocks(&self, kind: BlockKind) -> &[Block] {
        match kind {
            BlockKind::Link => &self.links,
            BlockKind::Meta => &self.meta,
            BlockKind::Content => &self.content,
        }
    }

    /// Get the child block sequence of the given kind for mutation.
    pub fn blocks_mut(&mut self, kind: BlockKind) -> &mut Vec<Block> {
        match kind {
            BlockKind::Link => &mut self.links,
            BlockKind::Meta => &mut self.meta,
            BlockKind::Content => &mut self.content,
        }
    }

    /// Look up a document attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "uuid" => Some(&self.uuid),
            "type" => Some(&self.doc_type),
            "uri" => Some(&self.uri),
            "url" => Some(&self.url),
            "title" => Some(&self.title),
            "language" => Some(&self.language),
            _ => None,
        }
    }

    /// Look up a document attribute that can be used in match predicates.
    #[must_use]
    pub fn match_attribute(&self, name: &str) -> Option<&str> {
        if name == "type" {
            Some(&self.doc_type)
        } else {
            None
        }
    }

    /// Set a document attribute by name, returning false for unknown names.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();

        match name {
            "uuid" => self.uuid = value,
            "type" => self.doc_type = value,
            "uri" => self.uri = value,
            "url" => self.url = value,
            "title" => self.title = value,
            "language" => self.language = value,
            _ => return false,
        }

        true
    }
}

impl Block {
    /// Get the child blocks of the given kind.
    #[must_use]
    pub fn blocks(&self, kind: BlockKind) -> &[Block] {
        match kind {
            BlockKind::Link => &self.links,
            BlockKind::Meta => &self.meta,
            BlockKind::Content => &self.content,
        }
    }

    /// Get the child block sequence of the given kind for mutation.
    pub fn blocks_mut(&mut self, kind: BlockKind) -> &mut Vec<Block> {
        match kind {
            BlockKind::Link => &mut self.links,
            BlockKind::Meta => &mut self.meta,
            BlockKind::Content => &mut self.content,
        }
    }

    /// Look up a block attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "uuid" => Some(&self.uuid),
            "type" => Some(&self.block_type),
            "uri" => Some(&self.uri),
            "url" => Some(&self.url),
            "title" => Some(&self.title),
            "rel" => Some(&self.rel),
            "name" => Some(&self.name),
            "value" => Some(&self.value),
            "contenttype" => Some(&self.contenttype),
            "role" => Some(&self.role),
            "sensitivity" => Some(&self.sensitivity),
            _ => None,
        }
    }

    /// Look up a block attribute that can be used in match predicates.
    ///
    /// Identity attributes (`id`, `uuid`) and the free-form `title` are not
    /// matchable.
    #[must_use]
    pub fn match_attribute(&self, name: &str) -> Option<&str> {
        match name {
            "type" => Some(&self.block_type),
            "uri" => Some(&self.uri),
            "url" => Some(&self.url),
            "rel" => Some(&self.rel),
            "name" => Some(&self.name),
            "value" => Some(&self.value),
            "contenttype" => Some(&self.contenttype),
            "role" => Some(&self.role),
            "sensitivity" => Some(&self.sensitivity),
            _ => None,
        }
    }

    /// Set a block attribute by name, returning false for unknown names.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();

        match name {
            "id" => self.id = value,
            "uuid" => self.uuid = value,
            "type" => self.block_type = value,
            "uri" => self.uri = value,
            "url" => self.url = value,
            "title" => self.title = value,
            "rel" => self.rel = value,
            "name" => self.name = value,
            "value" => self.value = value,
            "contenttype" => self.contenttype = value,
            "role" => self.role = value,
            "sensitivity" => self.sensitivity = value,
            _ => return false,
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_roundtrip() {
        let doc = Document {
            uuid: "8f9fbc56-3fcd-45a9-a152-0f1e1c47ca15".to_string(),
            doc_type: "core/article".to_string(),
            title: "A headline".to_string(),
            content: vec![Block {
                block_type: "core/text".to_string(),
                data: [("text".to_string(), "Hello".to_string())].into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let encoded = serde_json::to_string(&doc).expect("encode");
        let decoded: Document = serde_json::from_str(&encoded).expect("decode");

        assert_eq!(doc, decoded);
    }

    #[test]
    fn test_empty_fields_omitted() {
        let doc = Document {
            doc_type: "core/article".to_string(),
            ..Default::default()
        };

        let encoded = serde_json::to_value(&doc).expect("encode");

        assert_eq!(
            encoded,
            serde_json::json!({"type": "core/article"}),
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let res = serde_json::from_str::<Document>(r#"{"type": "x", "bogus": true}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_block_attribute_access() {
        let mut block = Block {
            block_type: "core/text".to_string(),
            role: "heading".to_string(),
            ..Default::default()
        };

        assert_eq!(block.attribute("type"), Some("core/text"));
        assert_eq!(block.attribute("role"), Some("heading"));
        assert_eq!(block.attribute("nonexistent"), None);

        assert_eq!(block.match_attribute("uuid"), None);
        assert_eq!(block.match_attribute("title"), None);
        assert_eq!(block.match_attribute("rel"), Some(""));

        assert!(block.set_attribute("role", ""));
        assert_eq!(block.role, "");
        assert!(!block.set_attribute("bogus", "x"));
    }

    #[test]
    fn test_kind_description() {
        assert_eq!(BlockKind::Link.description(1), "link");
        assert_eq!(BlockKind::Meta.description(2), "meta blocks");
        assert_eq!(BlockKind::Content.description(1), "content block");
    }
}
