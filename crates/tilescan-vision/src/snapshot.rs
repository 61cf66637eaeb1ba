use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tilescan_engine::Board;

use crate::CellObservation;

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
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[display("active")]
    Active,
    #[display("game_over")]
    GameOver,
    #[display("win")]
    Win,
    /// The frame could not be read with enough confidence.
    #[display("unknown")]
    Unknown,
}

/// One assembled observation of the board.
///
/// The matrix is always a full 4×4 board. When the frame could not be read
/// reliably the matrix still holds the best guess of every cell, `status`
/// is [`GameStatus::Unknown`] and the snapshot is not authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    board: Board,
    cells: Vec<CellObservation>,
    confidence: f32,
    status: GameStatus,
    authoritative: bool,
    recaptures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    captured_score: Option<u64>,
    timestamp: DateTime<Utc>,
}

impl BoardSnapshot {
    #[must_use]
    pub fn new(
        cells: Vec<CellObservation>,
        status: GameStatus,
        authoritative: bool,
        recaptures: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let board = matrix_of(&cells);
        let confidence = overall_confidence(&cells);
        Self {
            board,
            cells,
            confidence,
            status,
            authoritative,
            recaptures,
            captured_score: None,
            timestamp,
        }
    }

    /// Attaches a score read separately from the page.
    #[must_use]
    pub fn with_captured_score(mut self, score: u64) -> Self {
        self.captured_score = Some(score);
        self
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Per-cell observations, row-major.
    #[must_use]
    pub fn cells(&self) -> &[CellObservation] {
        &self.cells
    }

    /// Minimum confidence over all cells.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[must_use]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Number of recaptured frames read before this snapshot settled.
    #[must_use]
    pub fn recaptures(&self) -> usize {
        self.recaptures
    }

    #[must_use]
    pub fn captured_score(&self) -> Option<u64> {
        self.captured_score
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of cells whose classification is ambiguous.
    #[must_use]
    pub fn ambiguous_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.classification.is_ambiguous())
            .count()
    }
}

/// Board holding the best guess of every observed cell.
#[must_use]
pub fn matrix_of(cells: &[CellObservation]) -> Board {
    let mut board = Board::EMPTY;
    for cell in cells {
        board.set(cell.row, cell.col, cell.classification.best_guess());
    }
    board
}

/// Minimum cell confidence; 0 for an empty set of cells.
#[must_use]
pub fn overall_confidence(cells: &[CellObservation]) -> f32 {
    cells
        .iter()
        .map(|cell| cell.classification.confidence())
        .reduce(f32::min)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use tilescan_engine::TileValue;

    use super::*;
    use crate::{Classification, Color};

    fn cell(row: usize, col: usize, classification: Classification) -> CellObservation {
        CellObservation {
            row,
            col,
            classification,
            sample: Color::rgb(0, 0, 0),
            distance: Some(0.0),
        }
    }

    #[test]
    fn test_confidence_is_minimum() {
        let two = TileValue::new(2).unwrap();
        let cells = vec![
            cell(
                0,
                0,
                Classification::Known {
                    value: two,
                    confidence: 0.9,
                },
            ),
            cell(
                0,
                1,
                Classification::Ambiguous {
                    nearest: two,
                    confidence: 0.2,
                },
            ),
            cell(
                0,
                2,
                Classification::Known {
                    value: two,
                    confidence: 1.0,
                },
            ),
        ];
        let snapshot = BoardSnapshot::new(
            cells,
            GameStatus::Unknown,
            false,
            3,
            DateTime::<Utc>::UNIX_EPOCH,
        );
        assert!((snapshot.confidence() - 0.2).abs() < f32::EPSILON);
        assert_eq!(snapshot.ambiguous_cells(), 1);
        assert_eq!(snapshot.board().get(0, 1), two, "ambiguous cells keep their best guess");
        assert!(overall_confidence(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_serialized_snapshot_round_trips() {
        let four = TileValue::new(4).unwrap();
        let cells = vec![cell(
            1,
            1,
            Classification::Known {
                value: four,
                confidence: 1.0,
            },
        )];
        let snapshot =
            BoardSnapshot::new(cells, GameStatus::Active, true, 0, DateTime::<Utc>::UNIX_EPOCH)
                .with_captured_score(128);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""status":"active""#), "{json}");
        assert!(json.contains(r#""kind":"known""#), "{json}");
        let back: BoardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_empty_patch_cell_round_trips() {
        let empty = CellObservation {
            distance: None,
            ..cell(
                2,
                3,
                Classification::Ambiguous {
                    nearest: TileValue::EMPTY,
                    confidence: 0.0,
                },
            )
        };
        let snapshot = BoardSnapshot::new(
            vec![empty],
            GameStatus::Unknown,
            false,
            0,
            DateTime::<Utc>::UNIX_EPOCH,
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("distance"), "{json}");
        let back: BoardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
