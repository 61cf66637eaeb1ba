use std::path::PathBuf;

use anyhow::Context;
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::Serialize;
use tilescan_engine::{Board, Direction, RawBoard, TileSpawner};
use tilescan_vision::{BoardRenderer, PixelRect, RenderLayout, TerminalStatus};
use tracing::info;

use super::calibration::Calibration;
use crate::util::Output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OverlayKind {
    GameOver,
    Win,
}

impl From<OverlayKind> for TerminalStatus {
    fn from(kind: OverlayKind) -> Self {
        match kind {
            OverlayKind::GameOver => TerminalStatus::GameOver,
            OverlayKind::Win => TerminalStatus::Win,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SynthesizeArg {
    /// PNG file to write
    image: PathBuf,
    /// Board as JSON rows, e.g. `[[2,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,4]]`
    #[arg(long)]
    board: Option<String>,
    /// Random moves played from a fresh game when no board is given
    #[arg(long, default_value_t = 30)]
    moves: usize,
    /// Seed for the random game and the noise
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Cover the board with a terminal overlay
    #[arg(long, value_enum)]
    overlay: Option<OverlayKind>,
    /// Standard deviation of per-channel Gaussian noise
    #[arg(long, default_value_t = 0.0)]
    noise: f32,
    /// Tile side in pixels
    #[arg(long, default_value_t = 48)]
    tile_size: u32,
    /// Calibration file (JSON) providing the palette and overlays
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path for the board description
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct SynthesizeReport {
    image: PathBuf,
    board: Board,
    layout: RenderLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    overlay: Option<TerminalStatus>,
}

pub(crate) fn run(arg: &SynthesizeArg) -> anyhow::Result<()> {
    let SynthesizeArg {
        image,
        board,
        moves,
        seed,
        overlay,
        noise,
        tile_size,
        config,
        output,
    } = arg;

    let calibration = Calibration::load(config.as_deref())?;
    let board = match board {
        Some(rows) => {
            let rows: RawBoard = serde_json::from_str(rows).context("Failed to parse --board")?;
            Board::from_rows(rows).context("Invalid --board")?
        }
        None => random_board(*moves, *seed),
    };

    let layout = RenderLayout {
        tile_size: *tile_size,
        gutter: (*tile_size / 6).max(1),
        margin: *tile_size / 2,
    };
    let renderer = BoardRenderer::new(calibration.vision.palette.clone(), layout);
    let overlay = overlay.map(TerminalStatus::from);
    let mut frame = match overlay {
        Some(status) => {
            let signature = calibration
                .vision
                .status
                .overlays
                .iter()
                .find(|signature| signature.status == status)
                .with_context(|| format!("No {status} overlay in the calibration"))?;
            renderer.render_with_overlay(&board, signature)
        }
        None => renderer.render(&board),
    };
    if *noise > 0.0 {
        let (width, height) = frame.dimensions();
        BoardRenderer::add_noise(
            &mut frame,
            PixelRect::new(0, 0, width, height),
            *noise,
            *seed,
        );
    }
    frame
        .save(image)
        .with_context(|| format!("Failed to write image: {}", image.display()))?;
    info!(path = %image.display(), "synthetic board written");

    Output::save_json(
        &SynthesizeReport {
            image: image.clone(),
            board,
            layout,
            overlay,
        },
        output.clone(),
    )
}

/// Plays `moves` uniformly random effective moves from a fresh game.
fn random_board(moves: usize, seed: u64) -> Board {
    let mut spawner = TileSpawner::with_seed(seed);
    let mut rng = Pcg32::seed_from_u64(seed.wrapping_add(1));
    let mut board = spawner.start_board();
    for _ in 0..moves {
        if !board.has_legal_move() {
            break;
        }
        loop {
            let dir = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
            if let Some(next) = spawner.play(&board, dir) {
                board = next;
                break;
            }
        }
    }
    board
}
