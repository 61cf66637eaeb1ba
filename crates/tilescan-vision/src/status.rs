use image::RgbImage;
use serde::{Deserialize, Serialize};
use tilescan_engine::{BOARD_SIZE, Board};
use tracing::debug;

use crate::{BoardGeometry, Color, GameStatus, StatusConfig};

/// Number of probe points: four per grid line, five lines per axis.
pub const PROBE_COUNT: usize = 2 * (BOARD_SIZE + 1) * BOARD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    #[display("game_over")]
    GameOver,
    #[display("win")]
    Win,
}

impl From<TerminalStatus> for GameStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::GameOver => Self::GameOver,
            TerminalStatus::Win => Self::Win,
        }
    }
}

/// A semi-transparent layer drawn over the whole board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySignature {
    pub status: TerminalStatus,
    pub color: Color,
    pub alpha: f32,
}

impl OverlaySignature {
    /// Overlays of the canonical web version.
    #[must_use]
    pub fn canonical() -> [Self; 2] {
        [
            Self {
                status: TerminalStatus::GameOver,
                color: Color::rgb(0xee, 0xe4, 0xda),
                alpha: 0.73,
            },
            Self {
                status: TerminalStatus::Win,
                color: Color::rgb(0xed, 0xc2, 0x2e),
                alpha: 0.5,
            },
        ]
    }

    /// What a pixel of `base` color looks like under this overlay.
    #[must_use]
    pub fn tint(&self, base: Color) -> Color {
        base.blend(self.color, self.alpha)
    }
}

/// Result of overlay detection on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: GameStatus,
    /// Overlay with the highest probe fraction, if any probe matched.
    pub overlay: Option<TerminalStatus>,
    /// Fraction of probes matching `overlay`.
    pub overlay_fraction: f32,
    /// Whether the supplied matrix had no legal move.
    pub locked: bool,
}

impl StatusReport {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, GameStatus::GameOver | GameStatus::Win)
    }
}

/// Recognizes end-of-game overlays without reading their text.
///
/// The detector probes points on the grid lines between cells. Under an
/// overlay those points take the frame color tinted by the overlay, a color
/// no tile or frame pixel has. The tiles themselves are ignored, so the
/// result does not depend on tile classification.
#[derive(Debug, Clone)]
pub struct GameStatusDetector {
    frame: Color,
    config: StatusConfig,
}

impl GameStatusDetector {
    #[must_use]
    pub fn new(frame: Color, config: StatusConfig) -> Self {
        Self { frame, config }
    }

    #[must_use]
    pub fn config(&self) -> &StatusConfig {
        &self.config
    }

    /// Probe points, on each grid line at the middle of every cell it borders.
    #[must_use]
    pub fn probe_points(geometry: &BoardGeometry) -> Vec<(u32, u32)> {
        let mid = |start: u32, end: u32| start + (end - start) / 2;
        let mut points = Vec::with_capacity(PROBE_COUNT);
        for x in geometry.vertical_lines() {
            for row in 0..BOARD_SIZE {
                let y = mid(geometry.row_edge(row), geometry.row_edge(row + 1));
                points.push((x, y));
            }
        }
        for y in geometry.horizontal_lines() {
            for col in 0..BOARD_SIZE {
                let x = mid(geometry.column_edge(col), geometry.column_edge(col + 1));
                points.push((x, y));
            }
        }
        points
    }

    /// Fraction of probes matching each configured overlay.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn overlay_fractions(
        &self,
        image: &RgbImage,
        geometry: &BoardGeometry,
    ) -> Vec<(TerminalStatus, f32)> {
        let samples = Self::probe_points(geometry)
            .into_iter()
            .filter_map(|(x, y)| image.get_pixel_checked(x, y))
            .map(|px| Color::from(*px))
            .collect::<Vec<_>>();
        self.config
            .overlays
            .iter()
            .map(|overlay| {
                let expected = overlay.tint(self.frame);
                let matched = samples
                    .iter()
                    .filter(|sample| sample.distance(expected) <= self.config.probe_tolerance)
                    .count();
                (overlay.status, matched as f32 / PROBE_COUNT as f32)
            })
            .collect()
    }

    /// Determines the game status of a frame.
    ///
    /// `matrix` is the assembled board, if available. A locked board
    /// lowers the overlay fraction needed to report game over, but never
    /// establishes it alone.
    #[must_use]
    pub fn detect(
        &self,
        image: &RgbImage,
        geometry: &BoardGeometry,
        matrix: Option<&Board>,
    ) -> StatusReport {
        let locked = matrix.is_some_and(Board::is_locked);
        if !geometry.rect().fits(image.width(), image.height()) {
            debug!(rect = ?geometry.rect(), "geometry outside the image, status unknown");
            return StatusReport {
                status: GameStatus::Unknown,
                overlay: None,
                overlay_fraction: 0.0,
                locked,
            };
        }

        let fractions = self.overlay_fractions(image, geometry);
        let strongest = fractions
            .iter()
            .copied()
            .filter(|(_, fraction)| *fraction > 0.0)
            .fold(None, |best: Option<(TerminalStatus, f32)>, candidate| match best {
                Some(best) if best.1 >= candidate.1 => Some(best),
                _ => Some(candidate),
            });
        let game_over_fraction = fractions
            .iter()
            .filter(|(status, _)| *status == TerminalStatus::GameOver)
            .map(|(_, fraction)| *fraction)
            .fold(0.0_f32, f32::max);

        let status = match strongest {
            Some((overlay, fraction)) if fraction >= self.config.overlay_min_fraction => {
                overlay.into()
            }
            _ if locked && game_over_fraction >= self.config.overlay_weak_fraction => {
                debug!(game_over_fraction, "weak overlay on a locked board");
                GameStatus::GameOver
            }
            _ => {
                if locked {
                    debug!("board has no legal move but no overlay is visible yet");
                }
                GameStatus::Active
            }
        };
        debug!(%status, ?strongest, locked, "status detected");
        StatusReport {
            status,
            overlay: strongest.map(|(overlay, _)| overlay),
            overlay_fraction: strongest.map_or(0.0, |(_, fraction)| fraction),
            locked,
        }
    }
}
