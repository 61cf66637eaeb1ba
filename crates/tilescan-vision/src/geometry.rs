use image::RgbImage;
use serde::{Deserialize, Serialize};
use tilescan_engine::BOARD_SIZE;
use tracing::{debug, trace, warn};

use crate::{Color, LocateError, LocatorConfig, palette::CanonicalPalette};

/// Pixel step used when spot-checking a cached rectangle.
const SPOT_CHECK_STRIDE: u32 = 2;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the last column.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the last row.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the rectangle lies inside a `width`×`height` image.
    #[must_use]
    pub const fn fits(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Trims `fraction` of the width and height from each side.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn shrink(&self, fraction: f32) -> Self {
        let fraction = f64::from(fraction.clamp(0.0, 0.5));
        let dx = (f64::from(self.width) * fraction).floor() as u32;
        let dy = (f64::from(self.height) * fraction).floor() as u32;
        Self {
            x: self.x + dx,
            y: self.y + dy,
            width: self.width.saturating_sub(2 * dx),
            height: self.height.saturating_sub(2 * dy),
        }
    }

    /// Iterates over every pixel coordinate, row-major.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + use<> {
        let Self {
            x,
            y,
            width,
            height,
        } = *self;
        (y..y + height).flat_map(move |py| (x..x + width).map(move |px| (px, py)))
    }
}

/// Location of the board inside a capture, and its 4×4 subdivision.
///
/// Cell edges are placed at `origin + i * side / 4`, so adjacent cells
/// differ in size by at most one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardGeometry {
    rect: PixelRect,
    cell_inset: f32,
}

impl BoardGeometry {
    #[must_use]
    pub fn new(rect: PixelRect, cell_inset: f32) -> Self {
        Self { rect, cell_inset }
    }

    #[must_use]
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    #[must_use]
    pub fn cell_inset(&self) -> f32 {
        self.cell_inset
    }

    #[expect(clippy::cast_possible_truncation)]
    fn edge(origin: u32, side: u32, index: usize) -> u32 {
        origin + (u64::from(side) * index as u64 / BOARD_SIZE as u64) as u32
    }

    #[must_use]
    pub fn column_edge(&self, index: usize) -> u32 {
        Self::edge(self.rect.x, self.rect.width, index)
    }

    #[must_use]
    pub fn row_edge(&self, index: usize) -> u32 {
        Self::edge(self.rect.y, self.rect.height, index)
    }

    /// Full rectangle of a cell, grid lines included.
    #[must_use]
    pub fn cell_rect(&self, row: usize, col: usize) -> PixelRect {
        let (x0, x1) = (self.column_edge(col), self.column_edge(col + 1));
        let (y0, y1) = (self.row_edge(row), self.row_edge(row + 1));
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Cell rectangle with the inset margin removed.
    #[must_use]
    pub fn sample_rect(&self, row: usize, col: usize) -> PixelRect {
        self.cell_rect(row, col).shrink(self.cell_inset)
    }

    /// X coordinates of the five vertical grid lines (outer borders included).
    #[must_use]
    pub fn vertical_lines(&self) -> [u32; BOARD_SIZE + 1] {
        Self::lines(self.rect.x, self.rect.width)
    }

    /// Y coordinates of the five horizontal grid lines (outer borders included).
    #[must_use]
    pub fn horizontal_lines(&self) -> [u32; BOARD_SIZE + 1] {
        Self::lines(self.rect.y, self.rect.height)
    }

    fn lines(origin: u32, side: u32) -> [u32; BOARD_SIZE + 1] {
        let mut lines = [0; BOARD_SIZE + 1];
        for (i, line) in lines.iter_mut().enumerate() {
            *line = Self::edge(origin, side, i);
        }
        lines[BOARD_SIZE] = (origin + side).saturating_sub(1).max(origin);
        lines
    }
}

/// Counters describing how the session cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Spot-checks that accepted the cached geometry.
    pub hits: u64,
    /// Locate calls that needed a full detection.
    pub misses: u64,
    /// Full detections run, successful or not.
    pub detections: u64,
    /// Failed re-detections answered with the cached geometry.
    pub stale_reuses: u64,
}

/// Session-scoped board geometry.
///
/// Owned by the caller and passed to [`GeometryLocator::locate`], which is
/// the only writer. The cached geometry is only dropped by
/// [`invalidate`](Self::invalidate) (after a resize, reload or reconnect),
/// never because a single frame failed to match.
#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    current: Option<BoardGeometry>,
    stats: CacheStats,
}

impl GeometryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<BoardGeometry> {
        self.current
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn invalidate(&mut self) {
        debug!("geometry cache invalidated");
        self.current = None;
    }

    fn store(&mut self, geometry: BoardGeometry) {
        self.current = Some(geometry);
    }
}

#[derive(Debug, Clone, Copy)]
struct Component {
    pixels: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Component {
    fn rect(&self) -> PixelRect {
        PixelRect::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        )
    }
}

/// Finds the board rectangle in a capture.
///
/// A pixel belongs to the board background when it is close to the frame
/// color or to the empty-cell color. The board is the largest 4-connected
/// background region whose bounding box has an acceptable size and aspect
/// ratio.
#[derive(Debug, Clone)]
pub struct GeometryLocator {
    frame: Color,
    empty: Color,
    config: LocatorConfig,
}

impl GeometryLocator {
    #[must_use]
    pub fn new(palette: &CanonicalPalette, config: LocatorConfig) -> Self {
        Self {
            frame: palette.frame(),
            empty: palette.empty(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    fn is_background(&self, color: Color) -> bool {
        let tolerance = self.config.background_tolerance;
        color.distance(self.frame) <= tolerance || color.distance(self.empty) <= tolerance
    }

    /// Returns the geometry from `cache`, re-detecting when the spot-check fails.
    ///
    /// A failed re-detection falls back to the cached geometry as long as it
    /// still fits the image; the cache keeps its entry either way.
    pub fn locate(
        &self,
        image: &RgbImage,
        cache: &mut GeometryCache,
    ) -> Result<BoardGeometry, LocateError> {
        let Some(cached) = cache.current() else {
            cache.stats.misses += 1;
            let geometry = self.detect_counted(image, cache)?;
            cache.store(geometry);
            return Ok(geometry);
        };

        let fits = cached.rect().fits(image.width(), image.height());
        if fits {
            let fraction = self.background_fraction(image, cached.rect());
            if fraction >= self.config.spot_check_min_fraction {
                trace!(fraction, "geometry spot-check passed");
                cache.stats.hits += 1;
                return Ok(cached);
            }
            debug!(fraction, "geometry spot-check failed, re-detecting");
        } else {
            debug!(
                width = image.width(),
                height = image.height(),
                "cached geometry no longer fits the image, re-detecting"
            );
        }

        cache.stats.misses += 1;
        match self.detect_counted(image, cache) {
            Ok(geometry) => {
                cache.store(geometry);
                Ok(geometry)
            }
            Err(err) if fits => {
                warn!(%err, "re-detection failed, reusing cached geometry");
                cache.stats.stale_reuses += 1;
                Ok(cached)
            }
            Err(err) => {
                warn!(%err, "re-detection failed and cached geometry does not fit");
                Err(err)
            }
        }
    }

    fn detect_counted(
        &self,
        image: &RgbImage,
        cache: &mut GeometryCache,
    ) -> Result<BoardGeometry, LocateError> {
        cache.stats.detections += 1;
        self.detect(image)
    }

    /// Full detection, ignoring any cache.
    pub fn detect(&self, image: &RgbImage) -> Result<BoardGeometry, LocateError> {
        let (width, height) = image.dimensions();
        let mask = image
            .pixels()
            .map(|px| self.is_background(Color::from(*px)))
            .collect::<Vec<_>>();

        let best = components(&mask, width, height)
            .into_iter()
            .filter(|component| self.acceptable(component.rect()))
            .max_by_key(|component| component.pixels);

        let Some(component) = best else {
            debug!(width, height, "no background region with board proportions");
            return Err(LocateError::GeometryNotFound { width, height });
        };
        let geometry = BoardGeometry::new(component.rect(), self.config.cell_inset);
        debug!(rect = ?geometry.rect(), pixels = component.pixels, "board located");
        Ok(geometry)
    }

    fn acceptable(&self, rect: PixelRect) -> bool {
        let min = self.config.min_board_side;
        if rect.width < min || rect.height < min {
            return false;
        }
        let aspect = f64::from(rect.width) / f64::from(rect.height);
        (aspect - 1.0).abs() <= f64::from(self.config.aspect_tolerance)
    }

    /// Fraction of (sampled) pixels inside `rect` that match the background.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn background_fraction(&self, image: &RgbImage, rect: PixelRect) -> f32 {
        if rect.is_empty() || !rect.fits(image.width(), image.height()) {
            return 0.0;
        }
        let mut total = 0_u32;
        let mut matched = 0_u32;
        for y in (rect.y..rect.bottom()).step_by(SPOT_CHECK_STRIDE as usize) {
            for x in (rect.x..rect.right()).step_by(SPOT_CHECK_STRIDE as usize) {
                total += 1;
                if self.is_background(Color::from(*image.get_pixel(x, y))) {
                    matched += 1;
                }
            }
        }
        matched as f32 / total as f32
    }
}

/// Labels 4-connected regions of `mask`.
fn components(mask: &[bool], width: u32, height: u32) -> Vec<Component> {
    let (w, h) = (width as usize, height as usize);
    let mut visited = vec![false; mask.len()];
    let mut stack = Vec::new();
    let mut found = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut component = Component {
            pixels: 0,
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
        };
        while let Some(index) = stack.pop() {
            let (x, y) = (index % w, index / w);
            component.pixels += 1;
            #[expect(clippy::cast_possible_truncation)]
            let (px, py) = (x as u32, y as u32);
            component.min_x = component.min_x.min(px);
            component.min_y = component.min_y.min(py);
            component.max_x = component.max_x.max(px);
            component.max_y = component.max_y.max(py);

            let mut visit = |next: usize| {
                if mask[next] && !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            };
            if x > 0 {
                visit(index - 1);
            }
            if x + 1 < w {
                visit(index + 1);
            }
            if y > 0 {
                visit(index - w);
            }
            if y + 1 < h {
                visit(index + w);
            }
        }
        found.push(component);
    }
    found
}
