//! Document constraints

use docvet_core::{BlockKind, Document};
use serde::{Deserialize, Serialize};

use crate::block_constraint::{BlockConstraint, Match};
use crate::deprecation::Deprecation;
use crate::result::{EntityRef, ValueAnnotation, ValueCollector};
use crate::string_constraint::{ConstraintMap, ValueContext};

/// A set of constraints for a document. Either declares a document type,
/// or matches a document declared elsewhere to extend its constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentConstraint {
    /// Name of the constraint, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Description of the constraint, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Declare a document type
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub declares: String,

    /// Extend documents that match these attribute predicates
    #[serde(rename = "match", default, skip_serializing_if = "ConstraintMap::is_empty")]
    pub match_: ConstraintMap,

    /// Constraints for document links
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BlockConstraint>,

    /// Constraints for document meta blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<BlockConstraint>,

    /// Constraints for document content blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<BlockConstraint>,

    /// Constraints on document attributes
    #[serde(default, skip_serializing_if = "ConstraintMap::is_empty")]
    pub attributes: ConstraintMap,

    /// The document type is deprecated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

impl DocumentConstraint {
    /// The block constraints of the given kind.
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

    /// Check if the given document matches the constraint.
    pub(crate) fn matches(
        &self,
        document: &Document,
        ctx: &ValueContext<'_>,
        collector: &dyn ValueCollector,
    ) -> Match {
        if !self.declares.is_empty() {
            if document.doc_type == self.declares {
                return Match::Declaration;
            }

            return Match::None;
        }

        for (key, check) in self.match_.iter() {
            let Some(value) = document.match_attribute(key) else {
                return Match::None;
            };

            if check.validate(value, true, Some(ctx)).is_err() {
                return Match::None;
            }

            collector.collect_value(ValueAnnotation {
                refs: vec![EntityRef::attribute(key)],
                value: value.to_string(),
                ..Default::default()
            });
        }

        Match::Matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ValueDiscarder;
    use crate::string_constraint::StringConstraint;

    fn context_less() -> (
        Box<dyn Fn(&str, &str) -> Result<(), String>>,
        Box<dyn Fn(&str, &str) -> Result<Option<Deprecation>, String>>,
    ) {
        (
            Box::new(|_, _| Ok(())),
            Box::new(|_, _| Ok(None)),
        )
    }

    #[test]
    fn test_declaration() {
        let constraint = DocumentConstraint {
            declares: "core/article".to_string(),
            ..Default::default()
        };

        let (html, enums) = context_less();
        let ctx = ValueContext {
            html: html.as_ref(),
            enums: enums.as_ref(),
        };

        let doc = Document {
            doc_type: "core/article".to_string(),
            ..Default::default()
        };

        assert_eq!(constraint.matches(&doc, &ctx, &ValueDiscarder), Match::Declaration);

        let other = Document {
            doc_type: "core/planning".to_string(),
            ..Default::default()
        };

        assert_eq!(constraint.matches(&other, &ctx, &ValueDiscarder), Match::None);
    }

    #[test]
    fn test_match_extension() {
        let constraint = DocumentConstraint {
            match_: ConstraintMap::from([("type", StringConstraint::constant("core/article"))]),
            ..Default::default()
        };

        let (html, enums) = context_less();
        let ctx = ValueContext {
            html: html.as_ref(),
            enums: enums.as_ref(),
        };

        let doc = Document {
            doc_type: "core/article".to_string(),
            ..Default::default()
        };

        assert_eq!(constraint.matches(&doc, &ctx, &ValueDiscarder), Match::Matches);

        // Only the type attribute participates in document matching.
        let by_title = DocumentConstraint {
            match_: ConstraintMap::from([("title", StringConstraint::default())]),
            ..Default::default()
        };

        assert_eq!(by_title.matches(&doc, &ctx, &ValueDiscarder), Match::None);
    }
}
