use image::RgbImage;
use serde::{Deserialize, Serialize};
use tilescan_engine::{BOARD_SIZE, TileValue};
use tracing::trace;

use crate::{BoardGeometry, ClassifierConfig, Color, PixelRect, palette::CanonicalPalette};

/// Outcome of classifying a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// The sample matched a palette entry within the threshold.
    Known { value: TileValue, confidence: f32 },
    /// No entry was close enough; `nearest` is the best guess.
    Ambiguous { nearest: TileValue, confidence: f32 },
}

impl Classification {
    #[must_use]
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Known { confidence, .. } | Self::Ambiguous { confidence, .. } => *confidence,
        }
    }

    /// The classified value, only when the match is within the threshold.
    #[must_use]
    pub fn value(&self) -> Option<TileValue> {
        match self {
            Self::Known { value, .. } => Some(*value),
            Self::Ambiguous { .. } => None,
        }
    }

    /// The classified value, or the nearest entry for ambiguous cells.
    #[must_use]
    pub fn best_guess(&self) -> TileValue {
        match self {
            Self::Known { value, .. } => *value,
            Self::Ambiguous { nearest, .. } => *nearest,
        }
    }
}

/// A classified cell together with the color it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellObservation {
    pub row: usize,
    pub col: usize,
    pub classification: Classification,
    /// Representative (median) color of the sampled patch.
    pub sample: Color,
    /// Distance from `sample` to the nearest palette entry, absent when the
    /// patch held no pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// Maps cell patches to palette entries.
///
/// The representative color of a patch is its per-channel median, which
/// ignores the digit glyph and anti-aliased edges as long as they cover
/// less than half of the patch.
#[derive(Debug, Clone)]
pub struct TileClassifier {
    palette: CanonicalPalette,
    config: ClassifierConfig,
}

impl TileClassifier {
    #[must_use]
    pub fn new(palette: CanonicalPalette, config: ClassifierConfig) -> Self {
        Self { palette, config }
    }

    #[must_use]
    pub fn palette(&self) -> &CanonicalPalette {
        &self.palette
    }

    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Confidence for a distance `distance` to the nearest palette entry.
    ///
    /// Equals 1.0 at distance 0, 0.5 at the match threshold, and decays
    /// towards 0 beyond it.
    #[must_use]
    pub fn confidence(&self, distance: f32) -> f32 {
        let threshold = self.config.match_threshold;
        let confidence = if distance <= threshold {
            1.0 - distance / (2.0 * threshold)
        } else {
            threshold / (2.0 * distance)
        };
        confidence.clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn classify_color(&self, color: Color) -> (Classification, f32) {
        let (value, distance) = self.palette.nearest(color);
        let confidence = self.confidence(distance);
        let classification = if distance <= self.config.match_threshold {
            Classification::Known { value, confidence }
        } else {
            Classification::Ambiguous {
                nearest: value,
                confidence,
            }
        };
        (classification, distance)
    }

    /// Central part of a cell's sample rectangle.
    #[must_use]
    pub fn patch_rect(&self, geometry: &BoardGeometry, row: usize, col: usize) -> PixelRect {
        let trim = (1.0 - self.config.patch_fraction.clamp(0.0, 1.0)) / 2.0;
        geometry.sample_rect(row, col).shrink(trim)
    }

    #[must_use]
    pub fn classify_cell(
        &self,
        image: &RgbImage,
        geometry: &BoardGeometry,
        row: usize,
        col: usize,
    ) -> CellObservation {
        let patch = self.patch_rect(geometry, row, col);
        let Some(sample) = median_color(image, patch) else {
            trace!(row, col, ?patch, "empty patch");
            return CellObservation {
                row,
                col,
                classification: Classification::Ambiguous {
                    nearest: TileValue::EMPTY,
                    confidence: 0.0,
                },
                sample: Color::rgb(0, 0, 0),
                distance: None,
            };
        };
        let (classification, distance) = self.classify_color(sample);
        trace!(row, col, %sample, distance, ?classification, "cell classified");
        CellObservation {
            row,
            col,
            classification,
            sample,
            distance: Some(distance),
        }
    }

    /// Classifies all 16 cells, returned in row-major order.
    #[must_use]
    pub fn classify_board(
        &self,
        image: &RgbImage,
        geometry: &BoardGeometry,
    ) -> Vec<CellObservation> {
        (0..BOARD_SIZE)
            .flat_map(|row| (0..BOARD_SIZE).map(move |col| (row, col)))
            .map(|(row, col)| self.classify_cell(image, geometry, row, col))
            .collect()
    }
}

/// Per-channel median of the pixels of `rect` that lie inside `image`.
fn median_color(image: &RgbImage, rect: PixelRect) -> Option<Color> {
    let right = rect.right().min(image.width());
    let bottom = rect.bottom().min(image.height());
    let mut histograms = [[0_u32; 256]; 3];
    let mut count = 0_u32;
    for y in rect.y..bottom {
        for x in rect.x..right {
            let px = image.get_pixel(x, y);
            for (histogram, channel) in histograms.iter_mut().zip(px.0) {
                histogram[usize::from(channel)] += 1;
            }
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let median = |histogram: &[u32; 256]| {
        let target = count.div_ceil(2);
        let mut seen = 0;
        for (value, n) in (0..=u8::MAX).zip(histogram) {
            seen += n;
            if seen >= target {
                return value;
            }
        }
        u8::MAX
    };
    Some(Color::rgb(
        median(&histograms[0]),
        median(&histograms[1]),
        median(&histograms[2]),
    ))
}
