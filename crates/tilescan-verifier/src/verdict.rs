use serde::{Deserialize, Serialize};
use tilescan_engine::{Direction, SpawnedTile};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// The board did not change.
    #[display("no_op")]
    NoOp,
    /// One slide, merge and spawn explains the change.
    #[display("valid")]
    Valid,
    /// No single legal move explains the change; the pair is likely misread.
    #[display("inconsistent")]
    Inconsistent,
}

/// How the board changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveVerdict {
    pub kind: VerdictKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Sum of the tiles created by merges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned: Option<SpawnedTile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MoveVerdict {
    #[must_use]
    pub fn no_op() -> Self {
        Self {
            kind: VerdictKind::NoOp,
            direction: None,
            score_delta: None,
            spawned: None,
            reason: None,
        }
    }

    #[must_use]
    pub fn valid(direction: Direction, score_delta: u64, spawned: Option<SpawnedTile>) -> Self {
        Self {
            kind: VerdictKind::Valid,
            direction: Some(direction),
            score_delta: Some(score_delta),
            spawned,
            reason: None,
        }
    }

    #[must_use]
    pub fn inconsistent(direction: Option<Direction>, reason: String) -> Self {
        Self {
            kind: VerdictKind::Inconsistent,
            direction,
            score_delta: None,
            spawned: None,
            reason: Some(reason),
        }
    }
}
