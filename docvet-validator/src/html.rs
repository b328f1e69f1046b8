//! HTML policies
//!
//! A policy is an allow-list of elements and their attributes. Policies
//! can build on each other: `uses` bases a policy on another one, and
//! `extends` adds elements or attributes to another policy. Both are
//! limited to a single level of indirection, and neither may override an
//! attribute that the base already declares.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::string_constraint::ConstraintMap;

/// Constraints for one HTML element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlElement {
    /// Allowed attributes and their value constraints
    #[serde(default, skip_serializing_if = "ConstraintMap::is_empty")]
    pub attributes: ConstraintMap,
}

/// An allow-list of HTML elements and their attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlPolicy {
    /// How the policy is referred to in error messages; the name when
    /// there is one, a source-qualified fallback otherwise.
    #[serde(skip)]
    ref_name: String,

    /// Name other constraints use to select the policy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Description of the policy, for documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Base the policy on another policy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uses: String,

    /// Add the declared elements to another policy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extends: String,

    /// The declared elements
    pub elements: IndexMap<String, HtmlElement>,
}

impl HtmlPolicy {
    /// Check that a value only contains elements, attributes and entities
    /// that the policy allows.
    ///
    /// # Errors
    ///
    /// Returns a message with a 1-based line and character offset for the
    /// first violation.
    pub fn check(&self, value: &str) -> Result<(), String> {
        let mut reader = Reader::from_str(value);

        // End tags are matched against our own tag stack instead.
        reader.check_end_names(false);

        let mut tag_stack: Vec<String> = Vec::new();
        let mut line = 1;
        let mut character = 0;
        let mut last_pos = 0;

        loop {
            let event = match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => event,
                Err(err) => {
                    return Err(format!(
                        "invalid html after line {line} char {character}: parsing error: {err}"
                    ));
                }
            };

            if let Err(err) = self.handle_event(&event, &mut tag_stack) {
                return Err(format!(
                    "invalid html after line {line} char {character}: {err}"
                ));
            }

            // Track the position of the token that comes next.
            let pos = reader.buffer_position().min(value.len());
            let raw = &value.as_bytes()[last_pos..pos];

            match raw.iter().rposition(|&b| b == b'\n') {
                Some(last_nl) => {
                    line += raw.iter().filter(|&&b| b == b'\n').count();
                    character = raw.len() - last_nl;
                }
                None => character += raw.len(),
            }

            last_pos = pos;
        }

        if let Some(first) = tag_stack.first() {
            return Err(format!("unclosed tag <{first}>"));
        }

        Ok(())
    }

    fn handle_event(&self, event: &Event<'_>, tag_stack: &mut Vec<String>) -> Result<(), String> {
        match event {
            Event::Start(e) => {
                let name = self.check_tag(e)?;

                tag_stack.push(name);
            }
            Event::Empty(e) => {
                self.check_tag(e)?;
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();

                if tag_stack.last().map(String::as_str) != Some(name.as_str()) {
                    return Err(format!("unexpected end tag </{name}>"));
                }

                tag_stack.pop();
            }
            Event::Text(e) => {
                let data: &[u8] = e;

                check_entities(data)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn check_tag(&self, e: &BytesStart<'_>) -> Result<String, String> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();

        let spec = self
            .elements
            .get(&name)
            .ok_or_else(|| format!("unsupported tag <{name}>"))?;

        let mut seen: Vec<String> = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(|err| format!("parsing error: {err}"))?;

            let attr_name = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();

            if spec.attributes.is_empty() {
                return Err(format!("no attributes allowed for <{name}>"));
            }

            let constraint = spec
                .attributes
                .get(&attr_name)
                .ok_or_else(|| format!("unsupported <{name}> attribute {attr_name:?}"))?;

            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };

            constraint
                .validate(&value, true, None)
                .map_err(|err| format!("<{name}> attribute {attr_name:?}: {err}"))?;

            seen.push(attr_name);
        }

        for (attr_name, constraint) in spec.attributes.iter() {
            let present = seen.iter().any(|s| s == attr_name);

            if !present && !constraint.optional && !constraint.allow_empty {
                return Err(format!(
                    "missing required <{name}> attribute {attr_name:?}"
                ));
            }
        }

        Ok(name)
    }
}

/// Scan character data for `&` and validate every entity reference.
fn check_entities(data: &[u8]) -> Result<(), String> {
    let mut i = 0;

    while i < data.len() {
        if data[i] != b'&' {
            i += 1;

            continue;
        }

        let consumed =
            validate_entity(&data[i..]).map_err(|err| format!("invalid html entity: {err}"))?;

        i += consumed + 1;
    }

    Ok(())
}

/// Validate one entity reference starting at `&` and return the offset of
/// the terminating `;`.
fn validate_entity(data: &[u8]) -> Result<usize, String> {
    let end = data
        .iter()
        .take(34)
        .position(|&b| b == b';')
        .ok_or_else(|| "unterminated entity".to_string())?;

    let body = &data[1..end];

    if body.is_empty() {
        return Err("empty entity".to_string());
    }

    if body[0] == b'#' {
        let code = &body[1..];

        let value = if code.first().is_some_and(|b| matches!(b, b'x' | b'X')) {
            u32::from_str_radix(&String::from_utf8_lossy(&code[1..]), 16)
        } else {
            String::from_utf8_lossy(code).parse::<u32>()
        };

        return match value.ok().and_then(char::from_u32) {
            Some(_) => Ok(end),
            None => Err(format!(
                "invalid numeric character reference {:?}",
                String::from_utf8_lossy(body)
            )),
        };
    }

    let name = String::from_utf8_lossy(body);

    if is_known_entity(&name) {
        return Ok(end);
    }

    Err(format!("unknown entity {name:?}"))
}

#[rustfmt::skip]
fn is_known_entity(name: &str) -> bool {
    matches!(
        name,
        // XML predefined
        "amp" | "lt" | "gt" | "quot" | "apos"
        // Spacing and punctuation
        | "nbsp" | "ensp" | "emsp" | "thinsp" | "shy" | "ndash" | "mdash"
        | "horbar" | "lsquo" | "rsquo" | "sbquo" | "ldquo" | "rdquo" | "bdquo"
        | "lsaquo" | "rsaquo" | "laquo" | "raquo" | "hellip" | "prime" | "Prime"
        | "bull" | "middot" | "dagger" | "Dagger" | "sect" | "para" | "permil"
        | "iexcl" | "iquest" | "brvbar" | "uml" | "macr" | "acute" | "cedil"
        // Currency and signs
        | "cent" | "pound" | "curren" | "yen" | "euro" | "copy" | "reg"
        | "trade" | "deg" | "plusmn" | "sup1" | "sup2" | "sup3" | "frac14"
        | "frac12" | "frac34" | "micro" | "times" | "divide" | "minus"
        | "lowast" | "infin" | "ne" | "le" | "ge" | "asymp" | "equiv"
        | "larr" | "uarr" | "rarr" | "darr" | "harr"
        // Latin letters with diacritics
        | "Agrave" | "Aacute" | "Acirc" | "Atilde" | "Auml" | "Aring" | "AElig"
        | "Ccedil" | "Egrave" | "Eacute" | "Ecirc" | "Euml" | "Igrave"
        | "Iacute" | "Icirc" | "Iuml" | "ETH" | "Ntilde" | "Ograve" | "Oacute"
        | "Ocirc" | "Otilde" | "Ouml" | "Oslash" | "Ugrave" | "Uacute"
        | "Ucirc" | "Uuml" | "Yacute" | "THORN" | "szlig" | "agrave"
        | "aacute" | "acirc" | "atilde" | "auml" | "aring" | "aelig"
        | "ccedil" | "egrave" | "eacute" | "ecirc" | "euml" | "igrave"
        | "iacute" | "icirc" | "iuml" | "eth" | "ntilde" | "ograve" | "oacute"
        | "ocirc" | "otilde" | "ouml" | "oslash" | "ugrave" | "uacute"
        | "ucirc" | "uuml" | "yacute" | "thorn" | "yuml" | "OElig" | "oelig"
        | "Scaron" | "scaron" | "Yuml" | "fnof" | "ordf" | "ordm"
    )
}

/// A set of declared HTML policies, collected from constraint sets and
/// then resolved.
#[derive(Debug, Default)]
pub(crate) struct HtmlPolicySet {
    named_policies: HashMap<String, HtmlPolicy>,
    extensions: Vec<HtmlPolicy>,
}

impl HtmlPolicySet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add the policies of one constraint set.
    pub(crate) fn add(
        &mut self,
        source: &str,
        policies: impl IntoIterator<Item = HtmlPolicy>,
    ) -> Result<(), String> {
        for (i, mut policy) in policies.into_iter().enumerate() {
            policy.ref_name = if policy.name.is_empty() {
                format!("{source} policy {}", i + 1)
            } else {
                policy.name.clone()
            };

            let mut cased = IndexMap::with_capacity(policy.elements.len());

            for (name, element) in policy.elements {
                cased.insert(name.to_lowercase(), element);
            }

            policy.elements = cased;

            if !policy.uses.is_empty() && policy.name.is_empty() {
                return Err(
                    "a html policy must have a name to be able to use another policy".to_string(),
                );
            }

            if !policy.extends.is_empty() {
                self.extensions.push(policy.clone());
            }

            if !policy.name.is_empty() {
                if self.named_policies.contains_key(&policy.name) {
                    return Err(format!("html policy {:?} redeclared", policy.name));
                }

                self.named_policies.insert(policy.name.clone(), policy);
            }
        }

        Ok(())
    }

    /// Apply all extensions and usages and return the finished policies.
    pub(crate) fn resolve(mut self) -> Result<HashMap<String, HtmlPolicy>, String> {
        for policy in std::mem::take(&mut self.extensions) {
            let extending = self.named_policies.get_mut(&policy.extends).ok_or_else(|| {
                format!(
                    "the html policy {:?} cannot be extended, because it doesn't exist",
                    policy.extends
                )
            })?;

            if !extending.extends.is_empty() {
                return Err(format!(
                    "only one level of 'extends' is allowed, {:?} attempted to extend {:?}, which extends {:?}",
                    policy.ref_name, policy.extends, extending.extends
                ));
            }

            extend_policy(extending, &policy)?;
        }

        let users: Vec<String> = self
            .named_policies
            .iter()
            .filter(|(_, p)| !p.uses.is_empty())
            .map(|(name, _)| name.clone())
            .collect();

        for name in users {
            let uses = self.named_policies[&name].uses.clone();

            let source = self
                .named_policies
                .get(&uses)
                .ok_or_else(|| {
                    format!("the policy {name:?} could not use {uses:?}: it doesn't exist")
                })?
                .clone();

            if !source.uses.is_empty() {
                return Err(format!(
                    "only one level of 'uses' references is allowed, {name:?} attempted to use {uses:?}, which uses {:?}",
                    source.uses
                ));
            }

            let policy = self
                .named_policies
                .get_mut(&name)
                .expect("the policy was just looked up");

            extend_policy(policy, &source)
                .map_err(|err| format!("the policy {name:?} could not use {uses:?}: {err}"))?;
        }

        Ok(self.named_policies)
    }
}

fn extend_policy(extending: &mut HtmlPolicy, addition: &HtmlPolicy) -> Result<(), String> {
    for (element_name, element) in &addition.elements {
        let current = extending.elements.entry(element_name.clone()).or_default();

        for (attr_name, constraint) in element.attributes.iter() {
            if current.attributes.get(attr_name).is_some() {
                return Err(format!(
                    "attribute {:?} of <{}> in the policy {:?} was redeclared",
                    attr_name, element_name, addition.extends
                ));
            }

            current
                .attributes
                .0
                .insert(attr_name.to_string(), constraint.clone());
        }
    }

    Ok(())
}
