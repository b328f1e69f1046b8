//! Well-Known Text geometry validation
//!
//! Checks that a value is syntactically valid WKT and that it matches the
//! geometry spec of the constraint. A spec is `<geometry>[-<coord>]`, e.g.
//! `point`, `polygon-z` or `multipoint-zm`; an empty geometry accepts any
//! well-formed WKT value.

use std::fmt;

/// Coordinate arity of a WKT geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordType {
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl CoordType {
    fn dims(self) -> usize {
        match self {
            CoordType::Xy => 2,
            CoordType::Xyz | CoordType::Xym => 3,
            CoordType::Xyzm => 4,
        }
    }

    fn from_spec(spec: &str) -> Option<Self> {
        match spec {
            "" => Some(CoordType::Xy),
            "z" => Some(CoordType::Xyz),
            "m" => Some(CoordType::Xym),
            "zm" => Some(CoordType::Xyzm),
            _ => None,
        }
    }
}

impl fmt::Display for CoordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordType::Xy => write!(f, ""),
            CoordType::Xyz => write!(f, "z"),
            CoordType::Xym => write!(f, "m"),
            CoordType::Xyzm => write!(f, "zm"),
        }
    }
}

const GEOMETRY_TYPES: [&str; 7] = [
    "point",
    "multipoint",
    "linestring",
    "multilinestring",
    "polygon",
    "multipolygon",
    "circularstring",
];

pub(crate) fn validate_wkt(spec: &str, value: &str) -> Result<(), String> {
    let parsed = Parser::new(value)
        .parse()
        .map_err(|err| format!("failed to parse: {err}"))?;

    let (geometry, coord_spec) = match spec.split_once('-') {
        Some((g, c)) => (g, c),
        None => (spec, ""),
    };

    let want_coord = CoordType::from_spec(coord_spec)
        .ok_or_else(|| format!("unknown coordinate type {coord_spec:?}"))?;

    // An empty geometry spec accepts any well-formed value.
    if geometry.is_empty() {
        return Ok(());
    }

    if !GEOMETRY_TYPES.contains(&geometry) {
        return Err(format!("unknown geometry type {geometry:?}"));
    }

    if parsed.geometry != geometry {
        return Err(format!("geometry is not a {geometry}"));
    }

    if parsed.coord != want_coord {
        return Err(coord_mismatch(coord_spec, parsed.coord));
    }

    Ok(())
}

fn coord_mismatch(want: &str, got: CoordType) -> String {
    if want.is_empty() {
        return format!(
            "unexpected coordinate type {:?} where none was expected",
            got.to_string()
        );
    }

    if got == CoordType::Xy {
        return format!("missing coordinate type where {want:?} was expected");
    }

    format!(
        "unexpected coordinate type {:?} where {want:?} was expected",
        got.to_string()
    )
}

struct ParsedGeometry {
    geometry: &'static str,
    coord: CoordType,
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<ParsedGeometry, String> {
        self.skip_ws();

        let keyword = self.ident();

        let geometry = GEOMETRY_TYPES
            .iter()
            .find(|g| **g == keyword)
            .copied()
            .ok_or_else(|| format!("unknown geometry type {keyword:?}"))?;

        self.skip_ws();

        let mut coord = CoordType::Xy;
        let mut empty = false;

        if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            match self.ident().as_str() {
                "z" => coord = CoordType::Xyz,
                "m" => coord = CoordType::Xym,
                "zm" => coord = CoordType::Xyzm,
                "empty" => empty = true,
                other => return Err(format!("unexpected token {other:?}")),
            }

            self.skip_ws();
        }

        if !empty && self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            match self.ident().as_str() {
                "empty" => empty = true,
                other => return Err(format!("unexpected token {other:?}")),
            }

            self.skip_ws();
        }

        if !empty {
            let dims = coord.dims();

            match geometry {
                "point" => self.group(|p| p.tuple(dims))?,
                "linestring" | "circularstring" => self.tuple_list(dims)?,
                "multipoint" => self.group(|p| {
                    p.comma_separated(|p| {
                        if p.peek() == Some(b'(') {
                            p.group(|p| p.tuple(dims))
                        } else {
                            p.tuple(dims)
                        }
                    })
                })?,
                "polygon" | "multilinestring" => {
                    self.group(|p| p.comma_separated(|p| p.tuple_list(dims)))?;
                }
                "multipolygon" => self.group(|p| {
                    p.comma_separated(|p| p.group(|p| p.comma_separated(|p| p.tuple_list(dims))))
                })?,
                _ => unreachable!("keyword was checked against the known geometry types"),
            }
        }

        self.skip_ws();

        if self.pos != self.input.len() {
            return Err("trailing characters after geometry".to_string());
        }

        Ok(ParsedGeometry { geometry, coord })
    }

    fn tuple_list(&mut self, dims: usize) -> Result<(), String> {
        self.group(|p| p.comma_separated(|p| p.tuple(dims)))
    }

    fn group<F>(&mut self, body: F) -> Result<(), String>
    where
        F: FnOnce(&mut Self) -> Result<(), String>,
    {
        self.skip_ws();
        self.expect(b'(')?;

        body(self)?;

        self.skip_ws();
        self.expect(b')')
    }

    fn comma_separated<F>(&mut self, mut item: F) -> Result<(), String>
    where
        F: FnMut(&mut Self) -> Result<(), String>,
    {
        loop {
            item(self)?;
            self.skip_ws();

            if !self.eat(b',') {
                return Ok(());
            }
        }
    }

    /// Read whitespace-separated numbers up to the next `,` or `)` and
    /// check the count against the coordinate arity.
    fn tuple(&mut self, dims: usize) -> Result<(), String> {
        let mut count = 0;

        loop {
            self.skip_ws();

            match self.peek() {
                Some(b',') | Some(b')') | None => break,
                _ => {
                    self.number()?;
                    count += 1;
                }
            }
        }

        if count != dims {
            return Err(format!("expected {dims} coordinates, got {count}"));
        }

        Ok(())
    }

    fn number(&mut self) -> Result<(), String> {
        let start = self.pos;

        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }

        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }

        if self.eat(b'.') {
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;

            if matches!(self.peek(), Some(b'-') | Some(b'+')) {
                self.pos += 1;
            }

            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| "invalid number".to_string())?;

        text.parse::<f64>()
            .map_err(|_| format!("invalid number {text:?}"))?;

        Ok(())
    }

    fn ident(&mut self) -> String {
        let start = self.pos;

        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }

        String::from_utf8_lossy(&self.input[start..self.pos]).to_lowercase()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;

            return true;
        }

        false
    }

    fn expect(&mut self, b: u8) -> Result<(), String> {
        if self.eat(b) {
            return Ok(());
        }

        Err(format!("expected {:?}", char::from(b)))
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }
}
