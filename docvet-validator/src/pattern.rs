//! Compiled pattern wrappers for string constraints
//!
//! Regular expressions and glob lists are compiled once at schema decode
//! time and shared read-only between validation calls. Both wrappers
//! serialize back to their source text so that constraint sets round-trip.

use glob::Pattern;
use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A compiled regular expression that remembers its source pattern.
#[derive(Debug, Clone)]
pub struct Regexp {
    regex: Regex,
}

impl Regexp {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns the underlying compile error for invalid patterns.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Check the value against the pattern.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// The source pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for Regexp {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Regexp {}

impl Serialize for Regexp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Regexp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;

        Regexp::new(&pattern)
            .map_err(|err| D::Error::custom(format!("invalid pattern {pattern:?}: {err}")))
    }
}

/// An ordered list of compiled glob patterns.
#[derive(Debug, Clone, Default)]
pub struct GlobList(Vec<Pattern>);

impl GlobList {
    /// True when the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the list is empty or any pattern matches the value.
    #[must_use]
    pub fn match_or_empty(&self, value: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|p| p.matches(value))
    }
}

impl fmt::Display for GlobList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }

            f.write_str(p.as_str())?;
        }

        Ok(())
    }
}

impl PartialEq for GlobList {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.as_str() == b.as_str())
    }
}

impl Eq for GlobList {}

impl Serialize for GlobList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(Pattern::as_str))
    }
}

impl<'de> Deserialize<'de> for GlobList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sources = Vec::<String>::deserialize(deserializer)?;
        let mut patterns = Vec::with_capacity(sources.len());

        for source in sources {
            let pattern = Pattern::new(&source)
                .map_err(|err| D::Error::custom(format!("invalid glob {source:?}: {err}")))?;

            patterns.push(pattern);
        }

        Ok(Self(patterns))
    }
}
