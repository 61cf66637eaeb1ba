//! Synthetic board captures in the canonical page style.
//!
//! Tiles are flat rectangles without digits, which the median sampling of
//! the classifier ignores anyway.

use image::{Rgb, RgbImage};
use rand::{Rng as _, SeedableRng as _};
use rand_distr::Normal;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tilescan_engine::{BOARD_SIZE, Board};

use crate::{Color, OverlaySignature, PixelRect, palette::CanonicalPalette};

/// Page background of the canonical web version.
pub const PAGE_BACKGROUND: Color = Color::rgb(0xfa, 0xf8, 0xef);

/// Pixel layout of a rendered board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLayout {
    pub tile_size: u32,
    /// Width of the frame between and around tiles.
    pub gutter: u32,
    /// Page background around the board.
    pub margin: u32,
}

impl Default for RenderLayout {
    fn default() -> Self {
        Self {
            tile_size: 48,
            gutter: 8,
            margin: 24,
        }
    }
}

impl RenderLayout {
    #[expect(clippy::cast_possible_truncation)]
    const CELLS: u32 = BOARD_SIZE as u32;

    #[must_use]
    pub const fn board_side(&self) -> u32 {
        Self::CELLS * self.tile_size + (Self::CELLS + 1) * self.gutter
    }

    #[must_use]
    pub const fn image_side(&self) -> u32 {
        self.board_side() + 2 * self.margin
    }

    #[must_use]
    pub const fn board_rect(&self) -> PixelRect {
        PixelRect::new(self.margin, self.margin, self.board_side(), self.board_side())
    }

    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn tile_rect(&self, row: usize, col: usize) -> PixelRect {
        let step = self.tile_size + self.gutter;
        PixelRect::new(
            self.margin + self.gutter + col as u32 * step,
            self.margin + self.gutter + row as u32 * step,
            self.tile_size,
            self.tile_size,
        )
    }
}

/// Paints boards with a palette.
///
/// # Example
///
/// ```
/// use tilescan_engine::Board;
/// use tilescan_vision::{BoardRenderer, PAGE_BACKGROUND};
///
/// let renderer = BoardRenderer::default();
/// let image = renderer.render(&Board::EMPTY);
/// assert_eq!(image.width(), renderer.layout().image_side());
/// assert_eq!(image.get_pixel(0, 0).0, [0xfa, 0xf8, 0xef]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BoardRenderer {
    palette: CanonicalPalette,
    layout: RenderLayout,
}

impl BoardRenderer {
    #[must_use]
    pub fn new(palette: CanonicalPalette, layout: RenderLayout) -> Self {
        Self { palette, layout }
    }

    #[must_use]
    pub fn with_margin(mut self, margin: u32) -> Self {
        self.layout.margin = margin;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &RenderLayout {
        &self.layout
    }

    #[must_use]
    pub fn palette(&self) -> &CanonicalPalette {
        &self.palette
    }

    #[must_use]
    pub fn render(&self, board: &Board) -> RgbImage {
        let side = self.layout.image_side();
        let mut image = RgbImage::from_pixel(side, side, PAGE_BACKGROUND.into());
        fill(&mut image, self.layout.board_rect(), self.palette.frame());
        for (row, col, tile) in board.cells() {
            let color = self
                .palette
                .color_of(tile)
                .unwrap_or_else(|| self.palette.empty());
            fill(&mut image, self.layout.tile_rect(row, col), color);
        }
        image
    }

    /// Renders `board` covered by a terminal overlay.
    #[must_use]
    pub fn render_with_overlay(&self, board: &Board, overlay: &OverlaySignature) -> RgbImage {
        let mut image = self.render(board);
        for (x, y) in self.layout.board_rect().pixels() {
            let px = image.get_pixel_mut(x, y);
            *px = overlay.tint(Color::from(*px)).into();
        }
        image
    }

    /// Shifts every channel of one tile by `delta`, saturating at 0 and 255.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn perturb_cell(&self, image: &mut RgbImage, row: usize, col: usize, delta: [i16; 3]) {
        for (x, y) in self.layout.tile_rect(row, col).pixels() {
            if let Some(px) = image.get_pixel_mut_checked(x, y) {
                for (channel, d) in px.0.iter_mut().zip(delta) {
                    *channel = (i16::from(*channel) + d).clamp(0, 255) as u8;
                }
            }
        }
    }

    /// Adds Gaussian noise with standard deviation `sigma` to `region`.
    ///
    /// The same seed produces the same noise.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn add_noise(image: &mut RgbImage, region: PixelRect, sigma: f32, seed: u64) {
        if sigma <= 0.0 {
            return;
        }
        let Ok(normal) = Normal::new(0.0_f32, sigma) else {
            return;
        };
        let mut rng = Pcg32::seed_from_u64(seed);
        for (x, y) in region.pixels() {
            if let Some(px) = image.get_pixel_mut_checked(x, y) {
                for channel in &mut px.0 {
                    let noisy = f32::from(*channel) + rng.sample(normal);
                    *channel = noisy.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

fn fill(image: &mut RgbImage, rect: PixelRect, color: Color) {
    let color = Rgb::from(color);
    for (x, y) in rect.pixels() {
        if let Some(px) = image.get_pixel_mut_checked(x, y) {
            *px = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BoardGeometry, ClassifierConfig, GeometryLocator, LocatorConfig, TileClassifier,
    };

    fn board() -> Board {
        Board::from_rows([[0, 2, 4, 8], [16, 32, 64, 128], [256, 512, 1024, 2048], [0, 0, 2, 4]])
            .unwrap()
    }

    #[test]
    fn test_layout_dimensions() {
        let layout = RenderLayout::default();
        assert_eq!(layout.board_side(), 232);
        assert_eq!(layout.image_side(), 280);
        assert_eq!(layout.tile_rect(0, 0), PixelRect::new(32, 32, 48, 48));
        assert_eq!(layout.tile_rect(3, 3).right(), 248);
    }

    #[test]
    fn test_tiles_use_palette_colors() {
        let renderer = BoardRenderer::default();
        let image = renderer.render(&board());
        let layout = renderer.layout();
        let corner = layout.tile_rect(2, 3);
        assert_eq!(
            Color::from(*image.get_pixel(corner.x + 5, corner.y + 5)),
            Color::rgb(0xed, 0xc2, 0x2e)
        );
        assert_eq!(
            Color::from(*image.get_pixel(layout.margin + 2, layout.margin + 2)),
            renderer.palette().frame()
        );
    }

    #[test]
    fn test_noise_is_reproducible() {
        let renderer = BoardRenderer::default();
        let rect = renderer.layout().board_rect();
        let mut a = renderer.render(&board());
        let mut b = a.clone();
        BoardRenderer::add_noise(&mut a, rect, 4.0, 9);
        BoardRenderer::add_noise(&mut b, rect, 4.0, 9);
        assert_eq!(a, b);
        let mut c = renderer.render(&board());
        BoardRenderer::add_noise(&mut c, rect, 4.0, 10);
        assert_ne!(a, c, "different seeds give different noise");
    }

    #[test]
    fn test_mild_noise_still_classifies() {
        let renderer = BoardRenderer::default();
        let mut image = renderer.render(&board());
        BoardRenderer::add_noise(&mut image, renderer.layout().board_rect(), 3.0, 1);

        let palette = CanonicalPalette::canonical();
        let geometry: BoardGeometry = GeometryLocator::new(&palette, LocatorConfig::default())
            .detect(&image)
            .unwrap();
        let classifier = TileClassifier::new(palette, ClassifierConfig::default());
        for cell in classifier.classify_board(&image, &geometry) {
            assert_eq!(
                cell.classification.value(),
                Some(board().get(cell.row, cell.col)),
                "cell ({}, {})",
                cell.row,
                cell.col
            );
        }
    }
}
