//! Colour value validation
//!
//! Supports hex codes (`#rrggbb`), `rgb(r,g,b)` and `rgba(r,g,b,a)`
//! notations. Which notations a constraint accepts is declared in the
//! schema; when none are named, rgb and rgba are accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A colour notation a string constraint can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColourFormat {
    /// `#rrggbb`
    Hex,
    /// `rgb(r,g,b)`
    Rgb,
    /// `rgba(r,g,b,alpha)`
    Rgba,
}

impl fmt::Display for ColourFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColourFormat::Hex => write!(f, "hex"),
            ColourFormat::Rgb => write!(f, "rgb"),
            ColourFormat::Rgba => write!(f, "rgba"),
        }
    }
}

const DEFAULT_FORMATS: [ColourFormat; 2] = [ColourFormat::Rgb, ColourFormat::Rgba];

const HEX_COLOUR_LENGTH: usize = 6;

const COLOUR_COMPONENTS: [&str; 4] = ["r", "g", "b", "alpha"];

pub(crate) fn validate_colour(value: &str, formats: &[ColourFormat]) -> Result<(), String> {
    let formats = if formats.is_empty() {
        &DEFAULT_FORMATS[..]
    } else {
        formats
    };

    // Longest prefix first, so that rgba() isn't taken for rgb().
    let detected = if let Some(code) = value.strip_prefix('#') {
        Some((ColourFormat::Hex, code))
    } else if let Some(code) = value.strip_prefix("rgba") {
        Some((ColourFormat::Rgba, code))
    } else if let Some(code) = value.strip_prefix("rgb") {
        Some((ColourFormat::Rgb, code))
    } else {
        None
    };

    let (format, code) = match detected {
        Some((format, code)) if formats.contains(&format) => (format, code),
        _ => {
            if formats.len() == 1 {
                return Err(format!(
                    "expected a colour in the format \"{}\"",
                    formats[0]
                ));
            }

            let quoted = formats
                .iter()
                .map(|f| format!("\"{f}\""))
                .collect::<Vec<_>>()
                .join(", ");

            return Err(format!(
                "expected a colour in one of the formats {quoted}"
            ));
        }
    };

    match format {
        ColourFormat::Hex => parse_hex(code),
        ColourFormat::Rgb | ColourFormat::Rgba => parse_rgba(format, code),
    }
}

fn parse_hex(code: &str) -> Result<(), String> {
    if code.len() != HEX_COLOUR_LENGTH {
        return Err(format!(
            "code length: expected {HEX_COLOUR_LENGTH} characters, got {}",
            code.len()
        ));
    }

    if !code.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("invalid hex code".to_string());
    }

    Ok(())
}

fn parse_rgba(format: ColourFormat, code: &str) -> Result<(), String> {
    let rest = code
        .strip_prefix('(')
        .ok_or_else(|| "missing starting '('".to_string())?;

    let rest = rest
        .strip_suffix(')')
        .ok_or_else(|| "missing closing ')'".to_string())?;

    let components: Vec<&str> = rest.split(',').collect();

    match format {
        ColourFormat::Rgb => {
            if components.len() != 3 {
                return Err(format!(
                    "expected three components in a rgb() value, got {}",
                    components.len()
                ));
            }
        }
        ColourFormat::Rgba => {
            if components.len() != 4 {
                return Err(format!(
                    "expected four components in a rgba() value, got {}",
                    components.len()
                ));
            }

            let alpha: f64 = components[3]
                .trim()
                .parse()
                .map_err(|err| format!("invalid alpha value: {err}"))?;

            if !(0.0..=1.0).contains(&alpha) {
                return Err(format!("{:?} out of range", COLOUR_COMPONENTS[3]));
            }
        }
        ColourFormat::Hex => unreachable!("hex codes are not parsed as rgb components"),
    }

    for (i, component) in components.iter().take(3).enumerate() {
        let n: i64 = component
            .trim()
            .parse()
            .map_err(|err| format!("invalid {:?} value: {err}", COLOUR_COMPONENTS[i]))?;

        if !(0..=255).contains(&n) {
            return Err(format!("{:?} out of range", COLOUR_COMPONENTS[i]));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert!(validate_colour("#ffaa00", &[ColourFormat::Hex]).is_ok());
        assert!(validate_colour("#ffaa0", &[ColourFormat::Hex]).is_err());
        assert!(validate_colour("#zzaa00", &[ColourFormat::Hex]).is_err());
    }

    #[test]
    fn test_rgb() {
        assert!(validate_colour("rgb(0, 128, 255)", &[ColourFormat::Rgb]).is_ok());
        assert!(validate_colour("rgb(0, 128)", &[ColourFormat::Rgb]).is_err());
        assert!(validate_colour("rgb(0, 128, 256)", &[ColourFormat::Rgb]).is_err());
        assert!(validate_colour("rgb(0, 128, -1)", &[ColourFormat::Rgb]).is_err());
    }

    #[test]
    fn test_rgba() {
        assert!(validate_colour("rgba(0, 128, 255, 0.5)", &[ColourFormat::Rgba]).is_ok());
        assert!(validate_colour("rgba(0, 128, 255, 1.5)", &[ColourFormat::Rgba]).is_err());
        assert!(validate_colour("rgba(0, 128, 255)", &[ColourFormat::Rgba]).is_err());
    }

    #[test]
    fn test_default_formats_exclude_hex() {
        assert!(validate_colour("rgb(1, 2, 3)", &[]).is_ok());

        let err = validate_colour("#ffaa00", &[]).expect_err("hex not allowed by default");
        assert!(err.contains("one of the formats"), "got: {err}");
    }

    #[test]
    fn test_single_format_message() {
        let err = validate_colour("rgb(1, 2, 3)", &[ColourFormat::Hex])
            .expect_err("only hex allowed");
        assert_eq!(err, "expected a colour in the format \"hex\"");
    }
}
