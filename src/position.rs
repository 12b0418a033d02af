use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq)]
/// A position in signed decimal degrees
pub struct Position {
    /// Latitude, negative south of the equator
    pub latitude: f64,
    /// Longitude, negative west of Greenwich
    pub longitude: f64,
}

/// Decode the position embedded in a sentence header.
///
/// The header carries two `DDMM.SSH` tokens separated by a control byte,
/// e.g. `=5324.08N\x0132.20W`. Each token reads as degrees, minutes, seconds
/// and hemisphere; the two digits after the decimal point are whole seconds.
pub fn decode_position(encoded: &str) -> Result<Position, DecodeError> {
    lazy_static! {
        static ref RE: Regex =
            Regex::new(r"[0-9]{4}\.[0-9]{2}[A-Z]").expect("Failed to compile regex");
    }
    let flattened = escape_unprintable(encoded).replace(r"\x", "");
    let mut tokens = RE.find_iter(&flattened).map(|m| m.as_str());
    match (tokens.next(), tokens.next()) {
        (Some(lat), Some(lon)) => Ok(Position {
            latitude: parse_dms(lat)?,
            longitude: parse_dms(lon)?,
        }),
        _ => Err(DecodeError::MalformedPosition(format!(
            "expected two position tokens in {encoded:?}"
        ))),
    }
}

fn parse_dms(token: &str) -> Result<f64, DecodeError> {
    let field = |range: Range<usize>, name: &str| {
        token
            .get(range)
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| DecodeError::MalformedPosition(format!("{name} in {token:?}")))
    };
    let deg = field(0..2, "degrees")?;
    let min = field(2..4, "minutes")?;
    let sec = field(5..7, "seconds")?;
    let value = deg + min / 60.0 + sec / 3600.0;
    match token.get(7..) {
        Some("N") | Some("E") => Ok(value),
        Some("S") | Some("W") => Ok(-value),
        _ => Err(DecodeError::MalformedPosition(format!(
            "hemisphere in {token:?}"
        ))),
    }
}

/// Render unprintable characters as backslash escapes (`\x01`, `\t`, ...),
/// leaving printable ASCII untouched.
fn escape_unprintable(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '\t' => out.push_str(r"\t"),
            '\n' => out.push_str(r"\n"),
            '\r' => out.push_str(r"\r"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x100 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if (c as u32) < 0x10000 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }
    out
}
