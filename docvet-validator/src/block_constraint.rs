//! Block constraints and block matching

use docvet_core::{Block, BlockKind};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::deprecation::Deprecation;
use crate::string_constraint::{ConstraintMap, StringConstraint};

/// The signature of a block declaration: the subset of `{type, rel, role}`
/// that identifies the declared block shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockSignature {
    /// Block type
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub block_type: String,

    /// Block rel
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rel: String,

    /// Block role
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
}

impl BlockSignature {
    /// Express the signature as a constraint map of const-constraints, for
    /// match-gating payloads attached to block references.
    #[must_use]
    pub fn as_constraint(&self) -> ConstraintMap {
        let mut map = ConstraintMap::default();

        if !self.block_type.is_empty() {
            map.0.insert(
                "type".to_string(),
                StringConstraint::constant(&self.block_type),
            );
        }

        if !self.rel.is_empty() {
            map.0
                .insert("rel".to_string(), StringConstraint::constant(&self.rel));
        }

        if !self.role.is_empty() {
            map.0
                .insert("role".to_string(), StringConstraint::constant(&self.role));
        }

        map
    }
}

/// A named, reusable block constraint in a constraint set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDefinition {
    /// The name block references resolve against
    pub id: String,

    /// The constraint itself
    pub block: BlockConstraint,
}

/// A specification for a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockConstraint {
    /// Inline a globally defined block constraint
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub ref_: String,

    /// Declare a new block shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declares: Option<BlockSignature>,

    /// Name of the constraint, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Description of the constraint, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Attribute predicates a block must satisfy to match
    #[serde(rename = "match", default, skip_serializing_if = "ConstraintMap::is_empty")]
    pub match_: ConstraintMap,

    /// Exactly this many matching blocks must be present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// At most this many matching blocks may be present
    #[serde(rename = "maxCount", default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,

    /// At least this many matching blocks must be present
    #[serde(rename = "minCount", default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<usize>,

    /// Constraints for nested links
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BlockConstraint>,

    /// Constraints for nested meta blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<BlockConstraint>,

    /// Constraints for nested content blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<BlockConstraint>,

    /// Constraints on block attributes
    #[serde(default, skip_serializing_if = "ConstraintMap::is_empty")]
    pub attributes: ConstraintMap,

    /// Constraints on the block data map
    #[serde(default, skip_serializing_if = "ConstraintMap::is_empty")]
    pub data: ConstraintMap,

    /// The block shape is deprecated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

/// If and how a block or document matches a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The constraint does not apply
    None,
    /// The constraint applies without introducing a new shape
    Matches,
    /// The constraint applies and declares the shape
    Declaration,
}

impl BlockConstraint {
    /// True when the constraint doesn't affect anything. Noop constraints
    /// left over after reference resolution are erased.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.ref_.is_empty()
            && self.declares.is_none()
            && self.count.is_none()
            && self.max_count.is_none()
            && self.min_count.is_none()
            && self.links.is_empty()
            && self.meta.is_empty()
            && self.content.is_empty()
            && self.attributes.is_empty()
            && self.data.is_empty()
            && self.deprecated.is_none()
    }

    /// The nested constraints of the given kind.
    #[must_use]
    pub fn block_constraints(&self, kind: BlockKind) -> &[BlockConstraint] {
        match kind {
            BlockKind::Link => &self.links,
            BlockKind::Meta => &self.meta,
            BlockKind::Content => &self.content,
        }
    }

    pub(crate) fn block_constraints_mut(&mut self, kind: BlockKind) -> &mut Vec<BlockConstraint> {
        match kind {
            BlockKind::Link => &mut self.links,
            BlockKind::Meta => &mut self.meta,
            BlockKind::Content => &mut self.content,
        }
    }

    /// Check if the given block matches the constraint, returning the
    /// names of the attributes that were compared.
    #[must_use]
    pub fn matches(&self, block: &Block) -> (Match, Vec<&str>) {
        let (mode, mut attributes) = self.declares(block);

        if mode == Match::None {
            return (Match::None, Vec::new());
        }

        for (key, check) in self.match_.iter() {
            let value = block.match_attribute(key);
            let exists = value.is_some();

            let mut check = check.clone();

            // Optional attributes are empty strings.
            check.allow_empty = check.allow_empty || check.optional;

            if check
                .validate(value.unwrap_or_default(), exists, None)
                .is_err()
            {
                return (Match::None, Vec::new());
            }

            attributes.push(key);
        }

        (mode, attributes)
    }

    fn declares(&self, block: &Block) -> (Match, Vec<&str>) {
        let Some(signature) = &self.declares else {
            return (Match::Matches, Vec::new());
        };

        let mut attributes = Vec::new();

        if !signature.block_type.is_empty() {
            if block.block_type != signature.block_type {
                return (Match::None, Vec::new());
            }

            attributes.push("type");
        }

        if !signature.rel.is_empty() {
            if block.rel != signature.rel {
                return (Match::None, Vec::new());
            }

            attributes.push("rel");
        }

        if !signature.role.is_empty() {
            if block.role != signature.role {
                return (Match::None, Vec::new());
            }

            attributes.push("role");
        }

        (Match::Declaration, attributes)
    }

    /// A human readable description of the count constraint.
    #[must_use]
    pub fn describe_count_constraint(&self, kind: BlockKind) -> String {
        let mut s = String::from("there must be ");

        match (self.count, self.min_count, self.max_count) {
            (Some(count), _, _) => {
                let _ = write!(s, "{count} {}", kind.description(count));
            }
            (None, Some(min), Some(max)) => {
                let _ = write!(s, "between {min} and {max} {}", kind.description(max));
            }
            (None, None, Some(max)) => {
                let _ = write!(s, "less than {max} {}", kind.description(max));
            }
            (None, Some(min), None) => {
                let _ = write!(s, "{min} or more {}", kind.description(2));
            }
            (None, None, None) => {}
        }

        if !self.match_.is_empty() {
            let _ = write!(s, " where {}", self.match_.requirements());
        }

        if let Some(signature) = &self.declares {
            let mut parts = Vec::new();

            if !signature.block_type.is_empty() {
                parts.push(format!("type is {:?}", signature.block_type));
            }

            if !signature.rel.is_empty() {
                parts.push(format!("rel is {:?}", signature.rel));
            }

            if !signature.role.is_empty() {
                parts.push(format!("role is {:?}", signature.role));
            }

            if !parts.is_empty() {
                let _ = write!(s, " where {}", parts.join(" and "));
            }
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_block() -> Block {
        Block {
            block_type: "core/text".to_string(),
            role: "heading".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_declaration_match() {
        let constraint = BlockConstraint {
            declares: Some(BlockSignature {
                block_type: "core/text".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (mode, attributes) = constraint.matches(&text_block());
        assert_eq!(mode, Match::Declaration);
        assert_eq!(attributes, vec!["type"]);

        let other = Block {
            block_type: "core/image".to_string(),
            ..Default::default()
        };

        let (mode, _) = constraint.matches(&other);
        assert_eq!(mode, Match::None);
    }

    #[test]
    fn test_match_predicates() {
        let constraint = BlockConstraint {
            match_: ConstraintMap::from([("role", StringConstraint::constant("heading"))]),
            attributes: ConstraintMap::from([("title", StringConstraint::default())]),
            ..Default::default()
        };

        let (mode, attributes) = constraint.matches(&text_block());
        assert_eq!(mode, Match::Matches);
        assert_eq!(attributes, vec!["role"]);

        let body = Block {
            block_type: "core/text".to_string(),
            role: "body".to_string(),
            ..Default::default()
        };

        let (mode, _) = constraint.matches(&body);
        assert_eq!(mode, Match::None);
    }

    #[test]
    fn test_declaration_with_match() {
        let constraint = BlockConstraint {
            declares: Some(BlockSignature {
                block_type: "core/text".to_string(),
                ..Default::default()
            }),
            match_: ConstraintMap::from([(
                "role",
                StringConstraint {
                    enum_values: vec!["heading".to_string(), "body".to_string()],
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };

        let (mode, attributes) = constraint.matches(&text_block());
        assert_eq!(mode, Match::Declaration);
        assert_eq!(attributes, vec!["type", "role"]);
    }

    #[test]
    fn test_optional_match_attributes_allow_empty() {
        let constraint = BlockConstraint {
            match_: ConstraintMap::from([(
                "role",
                StringConstraint {
                    optional: true,
                    enum_values: vec!["heading".to_string()],
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };

        let empty_role = Block {
            block_type: "core/text".to_string(),
            ..Default::default()
        };

        let (mode, _) = constraint.matches(&empty_role);
        assert_eq!(mode, Match::Matches);
    }

    #[test]
    fn test_is_noop() {
        assert!(BlockConstraint::default().is_noop());

        let with_count = BlockConstraint {
            count: Some(1),
            ..Default::default()
        };
        assert!(!with_count.is_noop());

        let with_data = BlockConstraint {
            data: ConstraintMap::from([("text", StringConstraint::default())]),
            ..Default::default()
        };
        assert!(!with_data.is_noop());
    }

    #[test]
    fn test_describe_count_constraint() {
        let exact = BlockConstraint {
            count: Some(1),
            ..Default::default()
        };
        assert_eq!(
            exact.describe_count_constraint(BlockKind::Meta),
            "there must be 1 meta block"
        );

        let between = BlockConstraint {
            min_count: Some(1),
            max_count: Some(3),
            ..Default::default()
        };
        assert_eq!(
            between.describe_count_constraint(BlockKind::Content),
            "there must be between 1 and 3 content blocks"
        );

        let at_least = BlockConstraint {
            min_count: Some(2),
            declares: Some(BlockSignature {
                block_type: "core/text".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            at_least.describe_count_constraint(BlockKind::Content),
            "there must be 2 or more content blocks where type is \"core/text\""
        );

        let with_match = BlockConstraint {
            max_count: Some(1),
            match_: ConstraintMap::from([("rel", StringConstraint::constant("subject"))]),
            ..Default::default()
        };
        assert_eq!(
            with_match.describe_count_constraint(BlockKind::Link),
            "there must be less than 1 link where rel is \"subject\""
        );
    }

    #[test]
    fn test_signature_as_constraint() {
        let signature = BlockSignature {
            block_type: "core/image".to_string(),
            rel: "image".to_string(),
            ..Default::default()
        };

        let map = signature.as_constraint();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("type"),
            Some(&StringConstraint::constant("core/image"))
        );
        assert_eq!(map.get("rel"), Some(&StringConstraint::constant("image")));
    }
}
