//! CSS color literals to canonical RGBA.
//!
//! Hex forms (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`), `rgb()`/`rgba()` with
//! comma or space separated channels and `transparent` are parsed directly.
//! Named colors are looked up through `csscolorparser`. Browsers report
//! computed colors as `rgb()`/`rgba()`, so both sides of a comparison land in
//! the same [`Rgba`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::result::{ProbeError, ProbeResult};

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha, 255 = opaque
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Create a color
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse any supported CSS color literal
    pub fn parse(input: &str) -> ProbeResult<Self> {
        let invalid = || ProbeError::InvalidColor {
            input: input.to_string(),
        };
        let text = input.trim().to_ascii_lowercase();
        if text.is_empty() {
            return Err(invalid());
        }
        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(invalid);
        }
        if text == "transparent" {
            return Ok(Self::TRANSPARENT);
        }
        if let Some(args) = functional_args(&text) {
            return parse_rgb_args(args).ok_or_else(invalid);
        }
        let named: csscolorparser::Color = text.parse().map_err(|_| invalid())?;
        let [r, g, b, a] = named.to_rgba8();
        Ok(Self::new(r, g, b, a))
    }

    /// Lowercase `#rrggbb`, or `#rrggbbaa` when not opaque
    #[must_use]
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Rgba {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digits: Vec<u8> = hex.bytes().map(hex_digit).collect::<Option<_>>()?;
    let short = |i: usize| digits[i] * 17;
    let long = |i: usize| digits[i * 2] * 16 + digits[i * 2 + 1];
    match digits.len() {
        3 => Some(Rgba::opaque(short(0), short(1), short(2))),
        4 => Some(Rgba::new(short(0), short(1), short(2), short(3))),
        6 => Some(Rgba::opaque(long(0), long(1), long(2))),
        8 => Some(Rgba::new(long(0), long(1), long(2), long(3))),
        _ => None,
    }
}

/// Contents between the parentheses of `rgb(...)` or `rgba(...)`
fn functional_args(text: &str) -> Option<&str> {
    let rest = text
        .strip_prefix("rgba")
        .or_else(|| text.strip_prefix("rgb"))?;
    rest.trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_rgb_args(args: &str) -> Option<Rgba> {
    // `r, g, b, a` | `r g b / a` | `r g b`
    let (channels, alpha) = match args.split_once('/') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (args, None),
    };
    let mut parts: Vec<&str> = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    let alpha = match (alpha, parts.len()) {
        (Some(a), 3) => Some(a),
        (None, 4) => parts.pop(),
        (None, 3) => None,
        _ => return None,
    };
    let r = parse_channel(parts[0])?;
    let g = parse_channel(parts[1])?;
    let b = parse_channel(parts[2])?;
    let a = match alpha {
        Some(a) => parse_alpha(a)?,
        None => 255,
    };
    Some(Rgba::new(r, g, b, a))
}

fn parse_channel(part: &str) -> Option<u8> {
    let value = if let Some(pct) = part.strip_suffix('%') {
        pct.parse::<f64>().ok()? * 255.0 / 100.0
    } else {
        part.parse::<f64>().ok()?
    };
    value.is_finite().then(|| value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(part: &str) -> Option<u8> {
    let fraction = if let Some(pct) = part.strip_suffix('%') {
        pct.parse::<f64>().ok()? / 100.0
    } else {
        part.parse::<f64>().ok()?
    };
    fraction
        .is_finite()
        .then(|| (fraction.clamp(0.0, 1.0) * 255.0).round() as u8)
}
