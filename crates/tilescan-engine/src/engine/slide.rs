use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::core::{BOARD_SIZE, Board, Direction, Line, TileValue};

/// Maximum merges in one move: two per line.
pub const MAX_MERGES: usize = BOARD_SIZE * BOARD_SIZE / 2;

/// A merge event produced by a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merge {
    /// Row of the cell holding the merged tile after the slide.
    pub row: usize,
    /// Column of the cell holding the merged tile after the slide.
    pub col: usize,
    /// Value of the merged tile (twice the value of each source tile).
    pub value: TileValue,
}

/// Result of sliding a board in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideOutcome {
    direction: Direction,
    board: Board,
    merges: ArrayVec<Merge, MAX_MERGES>,
    moved: bool,
}

impl SlideOutcome {
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Returns `true` if the slide changed the board.
    #[must_use]
    pub fn moved(&self) -> bool {
        self.moved
    }

    /// Score earned by this slide (sum of merged tile values).
    #[must_use]
    pub fn score(&self) -> u64 {
        self.merges
            .iter()
            .map(|merge| u64::from(merge.value.value()))
            .sum()
    }
}

impl Board {
    /// Slides and merges every line towards `dir`, without spawning a tile.
    #[must_use]
    pub fn shift(&self, dir: Direction) -> SlideOutcome {
        let mut board = *self;
        let mut merges = ArrayVec::new();
        for index in 0..BOARD_SIZE {
            let (line, merged_at) = slide_line(self.line(dir, index));
            board.set_line(dir, index, line);
            for position in merged_at {
                let (row, col) = dir.cell(index, position);
                merges.push(Merge {
                    row,
                    col,
                    value: line[position],
                });
            }
        }
        SlideOutcome {
            direction: dir,
            moved: board != *self,
            board,
            merges,
        }
    }
}

/// Slides a single line towards position 0.
///
/// Returns the new line and the positions holding freshly merged tiles.
fn slide_line(line: Line) -> (Line, ArrayVec<usize, 2>) {
    let mut out = [TileValue::EMPTY; BOARD_SIZE];
    let mut merged_at = ArrayVec::new();
    let mut len = 0;
    let mut last_merged = false;
    for tile in line.into_iter().filter(|tile| !tile.is_empty()) {
        if len > 0
            && !last_merged
            && out[len - 1] == tile
            && let Some(merged) = tile.merged()
        {
            out[len - 1] = merged;
            merged_at.push(len - 1);
            last_merged = true;
            continue;
        }
        out[len] = tile;
        len += 1;
        last_merged = false;
    }
    (out, merged_at)
}
