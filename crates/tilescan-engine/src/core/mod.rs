pub use self::{board::*, direction::*, tile::*};

pub(crate) mod board;
pub(crate) mod direction;
pub(crate) mod tile;

/// Number of rows and columns on the board.
pub const BOARD_SIZE: usize = 4;

/// Number of cells on the board.
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;
