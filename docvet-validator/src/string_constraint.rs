//! String value constraints
//!
//! A string constraint is the per-value unit of a schema: it can pin a
//! value to a constant, an enum, a pattern or glob list, a timestamp
//! layout, or one of the typed formats. Constraints compose additively; a
//! value must pass every rule the constraint carries.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::colour::{validate_colour, ColourFormat};
use crate::deprecation::Deprecation;
use crate::pattern::{GlobList, Regexp};
use crate::wkt::validate_wkt;

/// Typed formats a string value can be required to have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFormat {
    /// No format requirement
    #[default]
    #[serde(rename = "")]
    None,
    /// An RFC3339 timestamp
    #[serde(rename = "RFC3339")]
    Rfc3339,
    /// An integer
    #[serde(rename = "int")]
    Int,
    /// A floating point number
    #[serde(rename = "float")]
    Float,
    /// A boolean
    #[serde(rename = "bool")]
    Bool,
    /// HTML checked against a policy
    #[serde(rename = "html")]
    Html,
    /// A UUID
    #[serde(rename = "uuid")]
    Uuid,
    /// A WKT geometry
    #[serde(rename = "wkt")]
    Wkt,
}

impl StringFormat {
    /// True for the no-format default.
    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == StringFormat::None
    }

    /// Describe the format for requirement sentences.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            StringFormat::Rfc3339 => "a RFC3339 timestamp",
            StringFormat::Int => "an integer value",
            StringFormat::Float => "a float value",
            StringFormat::Bool => "a boolean",
            StringFormat::Html => "a html string",
            StringFormat::Uuid => "a uuid",
            StringFormat::Wkt => "a WKT geometry",
            StringFormat::None => "",
        }
    }
}

/// Callbacks that connect a string constraint to the compiled validator
/// state it cannot carry itself: HTML policies and declared enums.
pub struct ValueContext<'a> {
    pub(crate) html: &'a dyn Fn(&str, &str) -> Result<(), String>,
    pub(crate) enums: &'a dyn Fn(&str, &str) -> Result<Option<Deprecation>, String>,
}

/// A constraint on one string value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringConstraint {
    /// Name of the constraint, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Description of the constraint, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// The value does not have to be present
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,

    /// An empty value always passes
    #[serde(rename = "allowEmpty", default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_empty: bool,

    /// The value must equal this constant
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_value: Option<String>,

    /// The value must be one of these
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// The value must be valid for the named declared enum
    #[serde(rename = "enumReference", default, skip_serializing_if = "String::is_empty")]
    pub enum_ref: String,

    /// The value must match this regular expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Regexp>,

    /// The value must match at least one of these glob patterns
    #[serde(default, skip_serializing_if = "GlobList::is_empty")]
    pub glob: GlobList,

    /// The value must have this typed format
    #[serde(default, skip_serializing_if = "StringFormat::is_none")]
    pub format: StringFormat,

    /// The value must parse as a timestamp with this layout
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time: String,

    /// Geometry spec for the `wkt` format
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub geometry: String,

    /// The value must be a colour in one of these notations; an empty
    /// list accepts rgb and rgba
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<Vec<ColourFormat>>,

    /// HTML policy for the `html` format; "default" when unset
    #[serde(rename = "htmlPolicy", default, skip_serializing_if = "String::is_empty")]
    pub html_policy: String,

    /// The value is deprecated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,

    /// Labels on the value for downstream processing; not a constraint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Hints for downstream processing; not a constraint
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, Vec<String>>,
}

impl StringConstraint {
    /// A constraint that requires the value to equal a constant.
    #[must_use]
    pub fn constant(value: impl Into<String>) -> Self {
        Self {
            const_value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Validate a value against the constraint.
    ///
    /// Returns the deprecation captured from an enum reference lookup, if
    /// any; it flows back to the caller even when later rules pass.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first rule the
    /// value failed.
    pub fn validate(
        &self,
        value: &str,
        exists: bool,
        ctx: Option<&ValueContext<'_>>,
    ) -> Result<Option<Deprecation>, String> {
        if !exists {
            if self.optional {
                return Ok(None);
            }

            return Err("required value".to_string());
        }

        if self.allow_empty && value.is_empty() {
            return Ok(None);
        }

        if let Some(want) = &self.const_value {
            if value != want {
                return Err(format!("must be {want:?}"));
            }
        }

        if !self.enum_values.is_empty() && !self.enum_values.iter().any(|v| v == value) {
            return Err(format!("must be one of: {}", self.enum_values.join(", ")));
        }

        let mut deprecation = None;

        if !self.enum_ref.is_empty() {
            let Some(ctx) = ctx else {
                return Err("enum validation is not available in this context".to_string());
            };

            deprecation = (ctx.enums)(&self.enum_ref, value)?;
        }

        if !self.glob.match_or_empty(value) {
            return Err(format!(
                "must match one of the glob patterns: {}",
                self.glob
            ));
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                return Err(format!("{value:?} must match {:?}", pattern.as_str()));
            }
        }

        if !self.time.is_empty() {
            parse_time_layout(&self.time, value)?;
        }

        if let Some(formats) = &self.colour {
            validate_colour(value, formats)?;
        }

        match self.format {
            StringFormat::None => {}
            StringFormat::Rfc3339 => {
                DateTime::parse_from_rfc3339(value)
                    .map_err(|err| format!("invalid RFC3339 value: {err}"))?;
            }
            StringFormat::Int => {
                value
                    .parse::<i64>()
                    .map_err(|_| "invalid integer value".to_string())?;
            }
            StringFormat::Float => {
                value
                    .parse::<f64>()
                    .map_err(|_| "invalid float value".to_string())?;
            }
            StringFormat::Bool => {
                parse_bool(value)?;
            }
            StringFormat::Html => {
                let Some(ctx) = ctx else {
                    return Err("html validation is not available in this context".to_string());
                };

                (ctx.html)(&self.html_policy, value)?;

                // HTML values are allowed to be empty; skip the final
                // emptiness check.
                return Ok(deprecation);
            }
            StringFormat::Uuid => {
                Uuid::parse_str(value).map_err(|_| "invalid uuid value".to_string())?;
            }
            StringFormat::Wkt => {
                validate_wkt(&self.geometry, value)
                    .map_err(|err| format!("WKT validation: {err}"))?;
            }
        }

        if !self.allow_empty && value.is_empty() {
            return Err("cannot be empty".to_string());
        }

        Ok(deprecation)
    }

    /// Describe the requirement as an English sentence fragment.
    #[must_use]
    pub fn requirement(&self) -> String {
        let mut reqs = Vec::new();

        if let Some(want) = &self.const_value {
            reqs.push(format!("is {want:?}"));
        }

        if !self.enum_values.is_empty() {
            reqs.push(format!("is one of: {}", self.enum_values.join(", ")));
        }

        if let Some(pattern) = &self.pattern {
            reqs.push(format!("matches regexp: {}", pattern.as_str()));
        }

        if !self.glob.is_empty() {
            reqs.push(format!("matches one of the glob patterns: {}", self.glob));
        }

        if !self.time.is_empty() {
            reqs.push(format!("is a timestamp in the format: {}", self.time));
        }

        if !self.format.is_none() {
            reqs.push(format!("is {}", self.format.describe()));
        }

        reqs.join(" and ")
    }
}

/// Parse a boolean the same way schema authors write them: `1`, `t`,
/// `true`, `True`, `TRUE` and the matching negative spellings.
fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err("invalid boolean value".to_string()),
    }
}

fn parse_time_layout(layout: &str, value: &str) -> Result<(), String> {
    if DateTime::parse_from_str(value, layout).is_ok()
        || NaiveDate::parse_from_str(value, layout).is_ok()
        || NaiveTime::parse_from_str(value, layout).is_ok()
    {
        return Ok(());
    }

    NaiveDateTime::parse_from_str(value, layout)
        .map(|_| ())
        .map_err(|err| format!("invalid timestamp: {err}"))
}

/// An ordered map from attribute or data key name to string constraint.
///
/// Key order is canonical: decoding sorts keys, and iteration and
/// serialization follow that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintMap(pub BTreeMap<String, StringConstraint>);

impl ConstraintMap {
    /// True when no constraints are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of declared keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Look up the constraint for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StringConstraint> {
        self.0.get(key)
    }

    /// Iterate the constraints in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StringConstraint)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Describe all requirements as one English sentence fragment.
    #[must_use]
    pub fn requirements(&self) -> String {
        self.iter()
            .map(|(k, c)| format!("{k} {}", c.requirement()))
            .collect::<Vec<_>>()
            .join("; and ")
    }
}

impl<const N: usize> From<[(&str, StringConstraint); N]> for ConstraintMap {
    fn from(entries: [(&str, StringConstraint); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn required() -> StringConstraint {
        StringConstraint::default()
    }

    #[test]
    fn test_presence() {
        let err = required().validate("", false, None).expect_err("missing");
        assert_eq!(err, "required value");

        let optional = StringConstraint {
            optional: true,
            ..Default::default()
        };
        assert!(optional.validate("", false, None).is_ok());

        let err = required().validate("", true, None).expect_err("empty");
        assert_eq!(err, "cannot be empty");

        let allow_empty = StringConstraint {
            allow_empty: true,
            ..Default::default()
        };
        assert!(allow_empty.validate("", true, None).is_ok());
    }

    #[test]
    fn test_const_and_enum() {
        let c = StringConstraint::constant("core/article");
        assert!(c.validate("core/article", true, None).is_ok());
        assert_eq!(
            c.validate("core/text", true, None).expect_err("mismatch"),
            "must be \"core/article\""
        );

        let e = StringConstraint {
            enum_values: vec!["draft".to_string(), "usable".to_string()],
            ..Default::default()
        };
        assert!(e.validate("draft", true, None).is_ok());
        assert_eq!(
            e.validate("done", true, None).expect_err("not a member"),
            "must be one of: draft, usable"
        );
    }

    #[test]
    fn test_pattern_and_glob() {
        let c: StringConstraint =
            serde_json::from_str(r#"{"pattern": "^[a-z]{2}(-[a-zA-Z]{2})?$"}"#).expect("decode");
        assert!(c.validate("sv-SE", true, None).is_ok());
        assert!(c.validate("Swedish", true, None).is_err());

        let c: StringConstraint =
            serde_json::from_str(r#"{"glob": ["https://**"]}"#).expect("decode");
        assert!(c.validate("https://example.com/a", true, None).is_ok());

        let err = c
            .validate("gopher://example.com", true, None)
            .expect_err("scheme not allowed");
        assert_eq!(err, "must match one of the glob patterns: https://**");
    }

    #[test]
    fn test_formats() {
        let int = StringConstraint {
            format: StringFormat::Int,
            ..Default::default()
        };
        assert!(int.validate("42", true, None).is_ok());
        assert!(int.validate("-42", true, None).is_ok());
        assert_eq!(
            int.validate("4.2", true, None).expect_err("float"),
            "invalid integer value"
        );

        let float = StringConstraint {
            format: StringFormat::Float,
            ..Default::default()
        };
        assert!(float.validate("4.2", true, None).is_ok());
        assert!(float.validate("x", true, None).is_err());

        let boolean = StringConstraint {
            format: StringFormat::Bool,
            ..Default::default()
        };
        assert!(boolean.validate("true", true, None).is_ok());
        assert!(boolean.validate("1", true, None).is_ok());
        assert!(boolean.validate("yes", true, None).is_err());

        let uuid = StringConstraint {
            format: StringFormat::Uuid,
            ..Default::default()
        };
        assert!(uuid
            .validate("8f9fbc56-3fcd-45a9-a152-0f1e1c47ca15", true, None)
            .is_ok());
        assert!(uuid.validate("not-a-uuid", true, None).is_err());

        let ts = StringConstraint {
            format: StringFormat::Rfc3339,
            ..Default::default()
        };
        assert!(ts.validate("2024-03-01T10:30:00Z", true, None).is_ok());
        assert!(ts.validate("2024-03-01", true, None).is_err());
    }

    #[test]
    fn test_time_layout() {
        let c = StringConstraint {
            time: "%Y-%m-%d".to_string(),
            ..Default::default()
        };
        assert!(c.validate("2024-03-01", true, None).is_ok());
        assert!(c.validate("01/03/2024", true, None).is_err());
    }

    #[test]
    fn test_colour() {
        let c: StringConstraint =
            serde_json::from_str(r#"{"colour": ["hex"]}"#).expect("decode");
        assert!(c.validate("#aabbcc", true, None).is_ok());
        assert!(c.validate("rgb(1,2,3)", true, None).is_err());

        let c: StringConstraint = serde_json::from_str(r#"{"colour": []}"#).expect("decode");
        assert!(c.validate("rgb(1,2,3)", true, None).is_ok());
    }

    #[test]
    fn test_wkt_format() {
        let c = StringConstraint {
            format: StringFormat::Wkt,
            geometry: "point".to_string(),
            ..Default::default()
        };
        assert!(c.validate("POINT (16 57)", true, None).is_ok());

        let err = c
            .validate("LINESTRING (1 1, 2 2)", true, None)
            .expect_err("not a point");
        assert_eq!(err, "WKT validation: geometry is not a point");
    }

    #[test]
    fn test_enum_ref_without_context() {
        let c = StringConstraint {
            enum_ref: "status".to_string(),
            ..Default::default()
        };

        assert!(c.validate("draft", true, None).is_err());
    }

    #[test]
    fn test_requirement_sentence() {
        let c: StringConstraint = serde_json::from_str(
            r#"{"enum": ["a", "b"], "format": "int"}"#,
        )
        .expect("decode");

        assert_eq!(c.requirement(), "is one of: a, b and is an integer value");
    }

    #[test]
    fn test_constraint_map_canonical_order() {
        let m: ConstraintMap =
            serde_json::from_str(r#"{"b": {}, "a": {"optional": true}}"#).expect("decode");

        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<StringConstraint>(r#"{"bogus": 1}"#).is_err());
    }
}
