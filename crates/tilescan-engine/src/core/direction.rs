use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::BOARD_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown direction '{input}': expected left, right, up or down")]
pub struct ParseDirectionError {
    pub input: String,
}

/// Direction tiles slide towards.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[display("left")]
    Left,
    #[display("right")]
    Right,
    #[display("up")]
    Up,
    #[display("down")]
    Down,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Up, Self::Down];

    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Maps a position along a line to board coordinates `(row, col)`.
    ///
    /// Line `index` is the row (horizontal moves) or column (vertical moves).
    /// Position `0` is the edge tiles slide towards.
    #[must_use]
    pub const fn cell(self, index: usize, position: usize) -> (usize, usize) {
        let far = BOARD_SIZE - 1 - position;
        match self {
            Self::Left => (index, position),
            Self::Right => (index, far),
            Self::Up => (position, index),
            Self::Down => (far, index),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|dir| dir.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseDirectionError {
                input: s.to_owned(),
            })
    }
}
