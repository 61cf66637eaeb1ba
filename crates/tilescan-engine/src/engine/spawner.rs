use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::core::{Board, Direction, TileValue};

/// Probability that a spawned tile is a 4 rather than a 2.
pub const FOUR_PROBABILITY: f64 = 0.1;

/// Values a freshly spawned tile can take.
pub const SPAWN_VALUES: [u32; 2] = [2, 4];

/// A tile placed on an empty cell after an effective move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnedTile {
    pub row: usize,
    pub col: usize,
    pub value: TileValue,
}

/// Places the random tile that follows every effective move.
///
/// Uses a PCG generator so that a seed reproduces the same sequence of
/// spawns, which keeps generated boards and tests deterministic.
///
/// # Example
///
/// ```
/// use tilescan_engine::{Board, Direction, TileSpawner};
///
/// let mut spawner = TileSpawner::with_seed(7);
/// let start = spawner.start_board();
/// assert_eq!(start.count_empty(), 14);
///
/// let mut again = TileSpawner::with_seed(7);
/// assert_eq!(again.start_board(), start);
/// ```
#[derive(Debug, Clone)]
pub struct TileSpawner {
    rng: Pcg32,
}

impl Default for TileSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSpawner {
    /// Creates a spawner with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Places a 2 (90%) or 4 (10%) on a uniformly chosen empty cell.
    ///
    /// Returns `None` if the board has no empty cell.
    pub fn spawn(&mut self, board: &mut Board) -> Option<SpawnedTile> {
        let empty = board.empty_cells().collect::<Vec<_>>();
        if empty.is_empty() {
            return None;
        }
        let (row, col) = empty[self.rng.random_range(0..empty.len())];
        let exponent = if self.rng.random_bool(FOUR_PROBABILITY) {
            2
        } else {
            1
        };
        let value = TileValue::from_exponent(exponent)?;
        board.set(row, col, value);
        Some(SpawnedTile { row, col, value })
    }

    /// Returns an empty board with the two opening tiles placed.
    pub fn start_board(&mut self) -> Board {
        let mut board = Board::EMPTY;
        self.spawn(&mut board);
        self.spawn(&mut board);
        board
    }

    /// Plays a full move: slide, then spawn if the slide changed the board.
    ///
    /// Returns `None` when the move has no effect.
    pub fn play(&mut self, board: &Board, dir: Direction) -> Option<Board> {
        let outcome = board.shift(dir);
        if !outcome.moved() {
            return None;
        }
        let mut next = *outcome.board();
        self.spawn(&mut next);
        Some(next)
    }
}
