//! 2048 rules used to reason about observed boards.
//!
//! - [`TileValue`] - a single cell value (0 for empty, or a power of two)
//! - [`Board`] - a 4×4 grid of tile values
//! - [`Direction`] - one of the four slide directions
//! - [`SlideOutcome`] - result of sliding a board, including every merge
//! - [`TileSpawner`] - seeded random tile placement
//!
//! # Example
//!
//! ```
//! use tilescan_engine::{Board, Direction};
//!
//! let board = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let outcome = board.shift(Direction::Left);
//!
//! assert!(outcome.moved());
//! assert_eq!(outcome.score(), 4);
//! assert_eq!(outcome.board().get(0, 0).value(), 4);
//! ```

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid tile value {value}: expected 0 or a power of two between 2 and 131072")]
pub struct InvalidTileValue {
    pub value: u32,
}
