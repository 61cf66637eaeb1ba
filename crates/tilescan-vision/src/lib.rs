//! Board vision for 2048: from a raw screenshot to a classified board.
//!
//! The pipeline runs in four stages, each in its own module:
//!
//! 1. [`GeometryLocator`] finds the board rectangle and caches it in a
//!    session-scoped [`GeometryCache`]
//! 2. [`TileClassifier`] maps every cell to a palette entry, with a
//!    confidence derived from color distance
//! 3. [`BoardAssembler`] builds a [`BoardSnapshot`] and recaptures frames
//!    while confidence stays below the configured floor
//! 4. [`GameStatusDetector`] recognizes the win and game-over overlays
//!
//! Everything is tuned by a single [`VisionConfig`], which is the
//! calibration artifact loaded at startup. [`BoardRenderer`] produces
//! synthetic boards with the canonical look, for tests and calibration.
//!
//! # Example
//!
//! ```
//! use tilescan_engine::Board;
//! use tilescan_vision::{BoardRenderer, GeometryCache, NoRecapture, NoPause, Vision, VisionConfig};
//!
//! let board = Board::from_rows([[2, 4, 0, 0], [0, 8, 0, 0], [0; 4], [0, 0, 0, 2048]]).unwrap();
//! let image = BoardRenderer::default().render(&board);
//!
//! let vision = Vision::new(VisionConfig::default());
//! let mut cache = GeometryCache::new();
//! let snapshot = vision
//!     .capture(&image, &mut cache, &mut NoRecapture, &mut NoPause)
//!     .unwrap();
//!
//! assert_eq!(snapshot.board(), &board);
//! assert!(snapshot.is_authoritative());
//! ```

use std::time::Duration;

use image::RgbImage;

pub use self::{
    assembler::*, classifier::*, color::*, config::*, geometry::*, palette::*, snapshot::*,
    status::*, synth::*,
};

mod assembler;
mod classifier;
mod color;
mod config;
mod geometry;
mod palette;
mod snapshot;
mod status;
mod synth;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum LocateError {
    #[display("no board found in {width}x{height} image")]
    GeometryNotFound { width: u32, height: u32 },
    #[display("board geometry has not been located in this session")]
    NotLocated,
}

#[derive(
    Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::IsVariant,
)]
pub enum CaptureError {
    #[display("capture cancelled")]
    Cancelled,
    #[display("capture failed: {message}")]
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("{field} = {value} is out of range [{min}, {max}]")]
pub struct ConfigError {
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// The full pipeline, built from one [`VisionConfig`].
#[derive(Debug, Clone)]
pub struct Vision {
    locator: GeometryLocator,
    assembler: BoardAssembler,
}

impl Vision {
    #[must_use]
    pub fn new(config: VisionConfig) -> Self {
        let VisionConfig {
            palette,
            locator,
            classifier,
            assembler,
            status,
        } = config;
        let locator = GeometryLocator::new(&palette, locator);
        let detector = GameStatusDetector::new(palette.frame(), status);
        let classifier = TileClassifier::new(palette, classifier);
        Self {
            locator,
            assembler: BoardAssembler::new(
                classifier,
                detector,
                assembler.retry_policy(),
                assembler.confidence_floor,
            ),
        }
    }

    #[must_use]
    pub fn locator(&self) -> &GeometryLocator {
        &self.locator
    }

    #[must_use]
    pub fn assembler(&self) -> &BoardAssembler {
        &self.assembler
    }

    /// Locates the board (through the session cache) and assembles a snapshot.
    pub fn capture<S, P>(
        &self,
        image: &RgbImage,
        cache: &mut GeometryCache,
        source: &mut S,
        pause: &mut P,
    ) -> Result<BoardSnapshot, LocateError>
    where
        S: FrameSource,
        P: Pause,
    {
        self.locator.locate(image, cache)?;
        self.assembler.assemble(image, cache, source, pause)
    }
}

/// A [`FrameSource`] that cannot recapture.
///
/// Useful for classifying a single saved screenshot: a low-confidence
/// frame immediately settles as not authoritative.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecapture;

impl FrameSource for NoRecapture {
    fn recapture(&mut self) -> Result<RgbImage, CaptureError> {
        Err(CaptureError::Cancelled)
    }

    fn is_exhausted(&self) -> bool {
        true
    }
}

/// A [`Pause`] that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl Pause for NoPause {
    fn pause(&mut self, _delay: Duration) {}
}
