use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InvalidTileValue;

use super::{BOARD_SIZE, direction::Direction, tile::TileValue};

/// Raw nested-array form of a board, row-major.
pub type RawBoard = [[u32; BOARD_SIZE]; BOARD_SIZE];

/// One line of the board read in slide order (front = target edge).
pub type Line = [TileValue; BOARD_SIZE];

/// A 4×4 2048 board.
///
/// Dimensions are fixed by the type, so a board can never be partially
/// filled: every cell holds a [`TileValue`], with [`TileValue::EMPTY`]
/// marking empty cells.
///
/// Serializes as a nested array of numbers (`[[2, 4, 0, 0], ...]`).
///
/// # Example
///
/// ```
/// use tilescan_engine::Board;
///
/// let board = Board::from_rows([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
/// assert_eq!(board.count_empty(), 14);
/// assert_eq!(board.tile_sum(), 6);
/// assert!(board.has_legal_move());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: [[TileValue; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub const EMPTY: Self = Self {
        cells: [[TileValue::EMPTY; BOARD_SIZE]; BOARD_SIZE],
    };

    #[must_use]
    pub const fn from_tiles(cells: [[TileValue; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    /// Builds a board from numeric values, validating every cell.
    pub fn from_rows(rows: RawBoard) -> Result<Self, InvalidTileValue> {
        let mut board = Self::EMPTY;
        for (row, values) in rows.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                board.cells[row][col] = TileValue::new(*value)?;
            }
        }
        Ok(board)
    }

    #[must_use]
    pub fn to_rows(&self) -> RawBoard {
        self.cells.map(|row| row.map(TileValue::value))
    }

    #[must_use]
    pub const fn get(&self, row: usize, col: usize) -> TileValue {
        self.cells[row][col]
    }

    pub const fn set(&mut self, row: usize, col: usize, tile: TileValue) {
        self.cells[row][col] = tile;
    }

    #[must_use]
    pub const fn tiles(&self) -> &[[TileValue; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    /// Iterates over `(row, col, tile)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, TileValue)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, tiles)| {
            tiles
                .iter()
                .enumerate()
                .map(move |(col, tile)| (row, col, *tile))
        })
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells()
            .filter(|(_, _, tile)| tile.is_empty())
            .map(|(row, col, _)| (row, col))
    }

    #[must_use]
    pub fn count_empty(&self) -> usize {
        self.empty_cells().count()
    }

    /// Sum of all tile values.
    #[must_use]
    pub fn tile_sum(&self) -> u64 {
        self.cells()
            .map(|(_, _, tile)| u64::from(tile.value()))
            .sum()
    }

    #[must_use]
    pub fn highest_tile(&self) -> TileValue {
        self.cells()
            .map(|(_, _, tile)| tile)
            .max()
            .unwrap_or(TileValue::EMPTY)
    }

    /// Reads line `index` in slide order for `dir`.
    #[must_use]
    pub fn line(&self, dir: Direction, index: usize) -> Line {
        std::array::from_fn(|position| {
            let (row, col) = dir.cell(index, position);
            self.cells[row][col]
        })
    }

    /// Writes line `index` in slide order for `dir`.
    pub fn set_line(&mut self, dir: Direction, index: usize, line: Line) {
        for (position, tile) in line.into_iter().enumerate() {
            let (row, col) = dir.cell(index, position);
            self.cells[row][col] = tile;
        }
    }

    /// Returns `true` if any slide would change the board.
    ///
    /// A move exists when there is an empty cell or two orthogonally
    /// adjacent cells hold the same value.
    #[must_use]
    pub fn has_legal_move(&self) -> bool {
        if self.count_empty() > 0 {
            return true;
        }
        self.cells().any(|(row, col, tile)| {
            let right = col + 1 < BOARD_SIZE && self.cells[row][col + 1] == tile;
            let down = row + 1 < BOARD_SIZE && self.cells[row + 1][col] == tile;
            right || down
        })
    }

    /// Returns `true` when the board is full and no merge is possible.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        !self.has_legal_move()
    }
}

impl Serialize for Board {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_rows().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rows = RawBoard::deserialize(deserializer)?;
        Self::from_rows(rows).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<RawBoard> for Board {
    type Error = InvalidTileValue;

    fn try_from(rows: RawBoard) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for (j, tile) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                if tile.is_empty() {
                    write!(f, "{:>6}", ".")?;
                } else {
                    write!(f, "{:>6}", tile.value())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: RawBoard) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn test_from_rows_round_trips_values() {
        let rows = [[2, 4, 8, 16], [0, 0, 0, 0], [32, 0, 64, 0], [0, 131_072, 0, 2]];
        assert_eq!(board(rows).to_rows(), rows);
    }

    #[test]
    fn test_from_rows_rejects_invalid_cell() {
        let err = Board::from_rows([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap_err();
        assert_eq!(err.value, 3);
    }

    #[test]
    fn test_line_orders() {
        let b = board([[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]]);
        let values = |line: Line| line.map(TileValue::value);
        assert_eq!(values(b.line(Direction::Left, 0)), [2, 4, 8, 16]);
        assert_eq!(values(b.line(Direction::Right, 0)), [16, 8, 4, 2]);
        assert_eq!(values(b.line(Direction::Up, 1)), [4, 0, 0, 0]);
        assert_eq!(values(b.line(Direction::Down, 1)), [0, 0, 0, 4]);
    }

    #[test]
    fn test_set_line_inverse_of_line() {
        let b = board([[2, 4, 8, 16], [32, 64, 128, 256], [0; 4], [2, 0, 2, 0]]);
        for dir in Direction::ALL {
            let mut copy = Board::EMPTY;
            for index in 0..BOARD_SIZE {
                copy.set_line(dir, index, b.line(dir, index));
            }
            assert_eq!(copy, b, "set_line should invert line for {dir}");
        }
    }

    #[test]
    fn test_legal_moves() {
        assert!(Board::EMPTY.has_legal_move());

        let locked = board([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert!(locked.is_locked());

        let mergeable_vertically = board([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [2, 8, 16, 32],
        ]);
        assert!(mergeable_vertically.has_legal_move());
    }

    #[test]
    fn test_sum_and_highest() {
        let b = board([[2, 4, 0, 0], [0, 0, 2048, 0], [0; 4], [0; 4]]);
        assert_eq!(b.tile_sum(), 2054);
        assert_eq!(b.highest_tile().value(), 2048);
        assert_eq!(Board::EMPTY.highest_tile(), TileValue::EMPTY);
    }

    #[test]
    fn test_serde_nested_array() {
        let b = board([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[[2,4,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]]");
        assert_eq!(serde_json::from_str::<Board>(&json).unwrap(), b);
        let invalid = "[[5,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]]";
        assert!(serde_json::from_str::<Board>(invalid).is_err());
    }
}
