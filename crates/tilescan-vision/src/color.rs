use std::{fmt, str::FromStr};

use image::Rgb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid color '{input}': expected #rrggbb")]
pub struct ParseColorError {
    pub input: String,
}

/// 8-bit sRGB color.
///
/// Serializes as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses a `#rrggbb` (or `rrggbb`) hex string.
    pub fn from_hex(hex: &str) -> Result<Self, ParseColorError> {
        let err = || ParseColorError {
            input: hex.to_owned(),
        };
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| err());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Euclidean distance in RGB space.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        let d = |a: u8, b: u8| f32::from(a) - f32::from(b);
        let (dr, dg, db) = (d(self.r, other.r), d(self.g, other.g), d(self.b, other.b));
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Composites `over` on top of `self` with the given opacity.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn blend(self, over: Self, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        let mix = |base: u8, top: u8| {
            (f32::from(base) * (1.0 - alpha) + f32::from(top) * alpha)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Self::rgb(mix(self.r, over.r), mix(self.g, over.g), mix(self.b, over.b))
    }
}

impl From<Rgb<u8>> for Color {
    fn from(Rgb([r, g, b]): Rgb<u8>) -> Self {
        Self::rgb(r, g, b)
    }
}

impl From<Color> for Rgb<u8> {
    fn from(color: Color) -> Self {
        Rgb([color.r, color.g, color.b])
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Color::from_hex("#eee4da").unwrap(), Color::rgb(238, 228, 218));
        assert_eq!(Color::from_hex("BBADA0").unwrap(), Color::rgb(187, 173, 160));
        assert!(Color::from_hex("#eee4d").is_err());
        assert!(Color::from_hex("#gggggg").is_err());
        assert_eq!(Color::rgb(1, 2, 255).to_hex(), "#0102ff");
    }

    #[test]
    fn test_distance() {
        let a = Color::rgb(0, 0, 0);
        assert!((a.distance(Color::rgb(3, 4, 0)) - 5.0).abs() < 1e-6);
        assert!(a.distance(a).abs() < f32::EPSILON);
    }

    #[test]
    fn test_blend() {
        let base = Color::rgb(100, 100, 100);
        let over = Color::rgb(200, 0, 100);
        assert_eq!(base.blend(over, 0.0), base);
        assert_eq!(base.blend(over, 1.0), over);
        assert_eq!(base.blend(over, 0.5), Color::rgb(150, 50, 100));
    }

    #[test]
    fn test_serde_hex_string() {
        let color = Color::rgb(0xed, 0xc2, 0x2e);
        let json = serde_json::to_string(&color).unwrap();
        assert_eq!(json, "\"#edc22e\"");
        assert_eq!(serde_json::from_str::<Color>(&json).unwrap(), color);
    }
}
