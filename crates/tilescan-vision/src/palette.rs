//! Reference colors for every tile value.
//!
//! The default palette is the one used by the canonical web version of the
//! game. Super tiles (4096 and up) are rendered in a single dark color by
//! that version; the default palette assigns them a distinguishable dark
//! ramp instead, which calibration data can override.

use serde::{Deserialize, Serialize};
use tilescan_engine::TileValue;

use crate::color::Color;

/// Board frame color (outer border and gutters between cells).
pub const FRAME_COLOR: Color = Color::rgb(0xbb, 0xad, 0xa0);

const CANONICAL_TILES: [(u32, Color); 18] = [
    (0, Color::rgb(0xcd, 0xc1, 0xb4)),
    (2, Color::rgb(0xee, 0xe4, 0xda)),
    (4, Color::rgb(0xed, 0xe0, 0xc8)),
    (8, Color::rgb(0xf2, 0xb1, 0x79)),
    (16, Color::rgb(0xf5, 0x95, 0x63)),
    (32, Color::rgb(0xf6, 0x7c, 0x5f)),
    (64, Color::rgb(0xf6, 0x5e, 0x3b)),
    (128, Color::rgb(0xed, 0xcf, 0x72)),
    (256, Color::rgb(0xed, 0xcc, 0x61)),
    (512, Color::rgb(0xed, 0xc8, 0x50)),
    (1024, Color::rgb(0xed, 0xc5, 0x3f)),
    (2048, Color::rgb(0xed, 0xc2, 0x2e)),
    (4096, Color::rgb(0x3c, 0x3a, 0x32)),
    (8192, Color::rgb(0x5a, 0x3a, 0x6e)),
    (16384, Color::rgb(0x2e, 0x5a, 0x6e)),
    (32768, Color::rgb(0x6e, 0x2e, 0x3a)),
    (65536, Color::rgb(0x2e, 0x6e, 0x3c)),
    (131_072, Color::rgb(0x1e, 0x1e, 0x1e)),
];

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum PaletteError {
    #[display("palette has no entry for the empty cell (value 0)")]
    MissingEmpty,
    #[display("palette lists tile value {value} more than once")]
    DuplicateValue { value: TileValue },
    #[display("tile values {first} and {second} share the reference color {color}")]
    DuplicateColor {
        first: TileValue,
        second: TileValue,
        color: Color,
    },
    #[display("tile value {value} uses the frame color {color}")]
    FrameColorReused { value: TileValue, color: Color },
}

/// One palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub value: TileValue,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaletteSpec {
    frame: Color,
    tiles: Vec<PaletteEntry>,
}

/// Ordered mapping from tile value to reference color.
///
/// Invariants (checked by [`CanonicalPalette::new`] and on deserialization):
///
/// - tile values are unique
/// - value `0` is present, mapped to the empty-cell background color
/// - reference colors are pairwise distinct and differ from the frame color
///
/// The palette is loaded once and never mutated afterwards.
///
/// # Example
///
/// ```
/// use tilescan_vision::{CanonicalPalette, Color};
///
/// let palette = CanonicalPalette::default();
/// let (value, distance) = palette.nearest(Color::rgb(0xee, 0xe4, 0xda));
/// assert_eq!(value.value(), 2);
/// assert_eq!(distance, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PaletteSpec", into = "PaletteSpec")]
pub struct CanonicalPalette {
    frame: Color,
    entries: Vec<PaletteEntry>,
}

impl Default for CanonicalPalette {
    fn default() -> Self {
        Self::canonical()
    }
}

impl CanonicalPalette {
    /// Palette of the canonical web version of the game.
    #[must_use]
    pub fn canonical() -> Self {
        let entries = CANONICAL_TILES
            .iter()
            .filter_map(|(value, color)| {
                Some(PaletteEntry {
                    value: TileValue::new(*value).ok()?,
                    color: *color,
                })
            })
            .collect();
        Self {
            frame: FRAME_COLOR,
            entries,
        }
    }

    pub fn new(frame: Color, entries: Vec<PaletteEntry>) -> Result<Self, PaletteError> {
        if !entries.iter().any(|e| e.value.is_empty()) {
            return Err(PaletteError::MissingEmpty);
        }
        for (i, a) in entries.iter().enumerate() {
            if a.color == frame {
                return Err(PaletteError::FrameColorReused {
                    value: a.value,
                    color: a.color,
                });
            }
            for b in &entries[i + 1..] {
                if a.value == b.value {
                    return Err(PaletteError::DuplicateValue { value: a.value });
                }
                if a.color == b.color {
                    return Err(PaletteError::DuplicateColor {
                        first: a.value,
                        second: b.value,
                        color: a.color,
                    });
                }
            }
        }
        Ok(Self { frame, entries })
    }

    #[must_use]
    pub fn frame(&self) -> Color {
        self.frame
    }

    /// Background color of an empty cell (the entry for value `0`).
    #[must_use]
    pub fn empty(&self) -> Color {
        self.color_of(TileValue::EMPTY).unwrap_or(self.frame)
    }

    #[must_use]
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    #[must_use]
    pub fn color_of(&self, value: TileValue) -> Option<Color> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.color)
    }

    /// Returns the entry closest to `color` and its distance.
    ///
    /// Ties resolve to the entry listed first.
    #[must_use]
    pub fn nearest(&self, color: Color) -> (TileValue, f32) {
        self.entries
            .iter()
            .map(|e| (e.value, e.color.distance(color)))
            .fold((TileValue::EMPTY, f32::INFINITY), |best, candidate| {
                if candidate.1 < best.1 { candidate } else { best }
            })
    }
}

impl TryFrom<PaletteSpec> for CanonicalPalette {
    type Error = PaletteError;

    fn try_from(spec: PaletteSpec) -> Result<Self, Self::Error> {
        Self::new(spec.frame, spec.tiles)
    }
}

impl From<CanonicalPalette> for PaletteSpec {
    fn from(palette: CanonicalPalette) -> Self {
        Self {
            frame: palette.frame,
            tiles: palette.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(value: u32) -> TileValue {
        TileValue::new(value).unwrap()
    }

    #[test]
    fn test_canonical_palette_is_valid() {
        let palette = CanonicalPalette::canonical();
        assert_eq!(palette.entries().len(), 18);
        let revalidated = CanonicalPalette::new(palette.frame(), palette.entries().to_vec());
        assert_eq!(revalidated, Ok(palette));
    }

    #[test]
    fn test_every_value_is_its_own_nearest() {
        let palette = CanonicalPalette::canonical();
        for entry in palette.entries() {
            let (value, distance) = palette.nearest(entry.color);
            assert_eq!(value, entry.value, "nearest of {}", entry.color);
            assert!(distance.abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_empty_maps_to_cell_background() {
        let palette = CanonicalPalette::canonical();
        assert_eq!(palette.empty(), Color::rgb(0xcd, 0xc1, 0xb4));
        assert_ne!(palette.empty(), palette.frame());
    }

    #[test]
    fn test_rejects_missing_empty() {
        let entries = vec![PaletteEntry {
            value: tile(2),
            color: Color::rgb(1, 2, 3),
        }];
        assert_eq!(
            CanonicalPalette::new(FRAME_COLOR, entries),
            Err(PaletteError::MissingEmpty)
        );
    }

    #[test]
    fn test_rejects_duplicates() {
        let empty = PaletteEntry {
            value: TileValue::EMPTY,
            color: Color::rgb(10, 10, 10),
        };
        let two = PaletteEntry {
            value: tile(2),
            color: Color::rgb(20, 20, 20),
        };
        let dup_value = PaletteEntry {
            value: tile(2),
            color: Color::rgb(30, 30, 30),
        };
        let dup_color = PaletteEntry {
            value: tile(4),
            color: Color::rgb(20, 20, 20),
        };
        assert_eq!(
            CanonicalPalette::new(FRAME_COLOR, vec![empty, two, dup_value]),
            Err(PaletteError::DuplicateValue { value: tile(2) })
        );
        assert!(matches!(
            CanonicalPalette::new(FRAME_COLOR, vec![empty, two, dup_color]),
            Err(PaletteError::DuplicateColor { .. })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r##"{"frame":"#bbada0","tiles":[{"value":2,"color":"#eee4da"}]}"##;
        assert!(serde_json::from_str::<CanonicalPalette>(json).is_err());

        let json = r##"{
            "frame": "#bbada0",
            "tiles": [{"value": 0, "color": "#cdc1b4"}, {"value": 2, "color": "#eee4da"}]
        }"##;
        let palette = serde_json::from_str::<CanonicalPalette>(json).unwrap();
        assert_eq!(palette.entries().len(), 2);
    }
}
