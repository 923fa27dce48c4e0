//! Colours and the breakpoint → palette mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An sRGB colour with alpha. Serialized as `#rrggbb` (opaque) or
/// `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Reserved no-data fill: white, fully transparent.
    pub const NO_DATA: Color = Color { r: 255, g: 255, b: 255, a: 0 };
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn parse_hex(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Color::parse_hex(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// Seven-step yellow → red ramp, light to dark.
pub fn default_palette() -> Vec<Color> {
    vec![
        Color::rgb(0xff, 0xff, 0xb2),
        Color::rgb(0xfe, 0xd9, 0x76),
        Color::rgb(0xfe, 0xb2, 0x4c),
        Color::rgb(0xfd, 0x8d, 0x3c),
        Color::rgb(0xfc, 0x4e, 0x2a),
        Color::rgb(0xe3, 0x1a, 0x1c),
        Color::rgb(0xb1, 0x00, 0x26),
    ]
}

// ── Value → class → palette ──────────────────────────────────────────────────

/// Class of `value` given ascending lower-edge `breakpoints`.
/// `None` for no-risk values (≤ 0, non-finite) or when there are no classes.
pub fn class_index(value: f64, breakpoints: &[f64]) -> Option<usize> {
    if breakpoints.is_empty() || !value.is_finite() || value <= 0.0 {
        return None;
    }
    let above = breakpoints.partition_point(|&b| b <= value);
    Some(above.saturating_sub(1))
}

/// Spread `class_count` classes over a palette of `palette_len` colours so
/// the top class always lands on the darkest colour.
pub fn palette_index(class: usize, class_count: usize, palette_len: usize) -> usize {
    if palette_len == 0 {
        return 0;
    }
    let last = palette_len - 1;
    if class_count <= 1 {
        return last;
    }
    let scaled = class.min(class_count - 1) as f64 * last as f64 / (class_count - 1) as f64;
    (scaled.round() as usize).min(last)
}

/// Colour for `value`; the reserved [`Color::NO_DATA`] when the value has no
/// risk, there are no breakpoints, or the palette is empty.
pub fn color_for(value: f64, breakpoints: &[f64], palette: &[Color]) -> Color {
    ColorScale::with_no_data(breakpoints.to_vec(), palette.to_vec(), Color::NO_DATA).color_for(value)
}

/// Breakpoints paired with a palette; built once per metric batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    breakpoints: Vec<f64>,
    palette: Vec<Color>,
    no_data: Color,
}

impl ColorScale {
    pub fn new(breakpoints: Vec<f64>, palette: Vec<Color>) -> Self {
        Self::with_no_data(breakpoints, palette, Color::NO_DATA)
    }

    pub fn with_no_data(breakpoints: Vec<f64>, palette: Vec<Color>, no_data: Color) -> Self {
        Self { breakpoints, palette, no_data }
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn no_data(&self) -> Color {
        self.no_data
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty() || self.palette.is_empty()
    }

    /// Palette colour of class `class`.
    pub fn class_color(&self, class: usize) -> Color {
        if self.palette.is_empty() {
            return self.no_data;
        }
        let idx = palette_index(class, self.breakpoints.len(), self.palette.len());
        self.palette[idx]
    }

    pub fn color_for(&self, value: f64) -> Color {
        if self.palette.is_empty() {
            return self.no_data;
        }
        match class_index(value, &self.breakpoints) {
            Some(class) => self.class_color(class),
            None => self.no_data,
        }
    }
}
