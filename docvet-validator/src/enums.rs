//! Declared enums and enum extensions
//!
//! Enums are registered in two phases: declarations and extensions are
//! collected while constraint sets are loaded, then resolved into merged
//! value tables. A value can contribute constraints from several sets; a
//! single forbidden contribution outlaws the value, and the first
//! contributed deprecation is the one reported.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::deprecation::Deprecation;

/// An enum declaration or extension in a constraint set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Enum {
    /// Declare a named value set
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub declare: String,

    /// Extend a value set declared elsewhere
    #[serde(rename = "match", default, skip_serializing_if = "String::is_empty")]
    pub match_: String,

    /// Name of the enum, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Description of the enum, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// The declared or extending values
    pub values: IndexMap<String, EnumConstraint>,
}

/// Constraints on a single enum value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumConstraint {
    /// The value is no longer allowed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forbidden: bool,

    /// The value is deprecated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

#[derive(Debug, Default)]
struct MergedEnum {
    values: IndexMap<String, Vec<EnumConstraint>>,
    allowed: Vec<String>,
}

fn allowed_values(merged: &MergedEnum) -> Vec<String> {
    let mut vals = Vec::new();

    for (value, constraints) in &merged.values {
        if constraints.iter().any(|c| c.forbidden) {
            continue;
        }

        if constraints.iter().any(|c| c.deprecated.is_some()) {
            vals.push(format!("{value:?} (deprecated)"));
        } else {
            vals.push(format!("{value:?}"));
        }
    }

    vals
}

/// The registered and merged enums of a compiled validator.
#[derive(Debug, Default)]
pub(crate) struct EnumSet {
    extensions: Vec<Enum>,
    enums: IndexMap<String, MergedEnum>,
}

impl EnumSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Collect a declaration or extension.
    pub(crate) fn register(&mut self, e: Enum) -> Result<(), String> {
        if !e.declare.is_empty() && !e.match_.is_empty() {
            return Err(format!(
                "the enum {:?} cannot both declare and match an enum",
                e.declare
            ));
        }

        if e.declare.is_empty() && e.match_.is_empty() {
            return Err("an enum must declare or match an existing enum".to_string());
        }

        if !e.match_.is_empty() {
            self.extensions.push(e);

            return Ok(());
        }

        if self.enums.contains_key(&e.declare) {
            return Err(format!("the enum {:?} has already been declared", e.declare));
        }

        let mut merged = MergedEnum::default();

        for (value, constraint) in e.values {
            merged.values.insert(value, vec![constraint]);
        }

        self.enums.insert(e.declare, merged);

        Ok(())
    }

    /// Merge all extensions into their declarations and build the allowed
    /// value presentations.
    pub(crate) fn resolve(&mut self) -> Result<(), String> {
        for extension in self.extensions.drain(..) {
            let merged = self.enums.get_mut(&extension.match_).ok_or_else(|| {
                format!(
                    "the enum {:?} hasn't been declared and cannot be matched",
                    extension.match_
                )
            })?;

            for (value, constraint) in extension.values {
                merged.values.entry(value).or_default().push(constraint);
            }
        }

        for merged in self.enums.values_mut() {
            merged.allowed = allowed_values(merged);
        }

        Ok(())
    }

    /// Check a value against a declared enum.
    ///
    /// Returns the first contributed deprecation, if any.
    pub(crate) fn valid_value(
        &self,
        enum_name: &str,
        value: &str,
    ) -> Result<Option<&Deprecation>, String> {
        let merged = self
            .enums
            .get(enum_name)
            .ok_or_else(|| format!("unknown enum {enum_name:?}"))?;

        let constraints = merged.values.get(value).ok_or_else(|| {
            format!("must be one of: {}", merged.allowed.join(", "))
        })?;

        let mut deprecation = None;

        for constraint in constraints {
            if deprecation.is_none() {
                deprecation = constraint.deprecated.as_ref();
            }

            if constraint.forbidden {
                return Err(format!("{value:?} is no longer allowed"));
            }
        }

        Ok(deprecation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn declare(name: &str, values: &[(&str, EnumConstraint)]) -> Enum {
        Enum {
            declare: name.to_string(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Default::default()
        }
    }

    fn extend(name: &str, values: &[(&str, EnumConstraint)]) -> Enum {
        Enum {
            match_: name.to_string(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_declare_and_lookup() {
        let mut set = EnumSet::new();

        set.register(declare(
            "status",
            &[
                ("draft", EnumConstraint::default()),
                ("usable", EnumConstraint::default()),
            ],
        ))
        .expect("register");

        set.resolve().expect("resolve");

        assert!(set.valid_value("status", "draft").expect("valid").is_none());

        let err = set.valid_value("status", "done").expect_err("unknown value");
        assert_eq!(err, "must be one of: \"draft\", \"usable\"");

        let err = set.valid_value("missing", "x").expect_err("unknown enum");
        assert_eq!(err, "unknown enum \"missing\"");
    }

    #[test]
    fn test_redeclaration_rejected() {
        let mut set = EnumSet::new();

        set.register(declare("status", &[])).expect("first");

        let err = set.register(declare("status", &[])).expect_err("duplicate");
        assert_eq!(err, "the enum \"status\" has already been declared");
    }

    #[test]
    fn test_declare_and_match_conflict() {
        let mut set = EnumSet::new();

        let e = Enum {
            declare: "a".to_string(),
            match_: "b".to_string(),
            ..Default::default()
        };

        assert!(set.register(e).is_err());
        assert!(set.register(Enum::default()).is_err());
    }

    #[test]
    fn test_extension_of_undeclared_enum() {
        let mut set = EnumSet::new();

        set.register(extend("status", &[("x", EnumConstraint::default())]))
            .expect("extensions are collected");

        let err = set.resolve().expect_err("nothing to extend");
        assert_eq!(
            err,
            "the enum \"status\" hasn't been declared and cannot be matched"
        );
    }

    #[test]
    fn test_forbidden_and_deprecated_merge() {
        let mut set = EnumSet::new();

        set.register(declare(
            "status",
            &[
                ("draft", EnumConstraint::default()),
                ("old", EnumConstraint::default()),
                ("gone", EnumConstraint::default()),
            ],
        ))
        .expect("declare");

        set.register(extend(
            "status",
            &[
                (
                    "old",
                    EnumConstraint {
                        deprecated: Some(Deprecation {
                            label: "old-status".to_string(),
                            doc: "use draft instead".to_string(),
                        }),
                        ..Default::default()
                    },
                ),
                (
                    "gone",
                    EnumConstraint {
                        forbidden: true,
                        ..Default::default()
                    },
                ),
            ],
        ))
        .expect("extend");

        set.resolve().expect("resolve");

        let depr = set
            .valid_value("status", "old")
            .expect("deprecated value is still valid")
            .expect("deprecation returned");
        assert_eq!(depr.label, "old-status");

        let err = set.valid_value("status", "gone").expect_err("forbidden");
        assert_eq!(err, "\"gone\" is no longer allowed");

        let err = set.valid_value("status", "nope").expect_err("unknown");
        assert_eq!(
            err,
            "must be one of: \"draft\", \"old\" (deprecated)"
        );
    }
}
