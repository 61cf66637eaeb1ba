//! Checks whether an attempted move had an effect, and whether the observed
//! change is one the game could have produced.
//!
//! [`MoveEffectVerifier`] compares two [`BoardSnapshot`]s taken before and
//! after a move and returns a [`MoveVerdict`]:
//!
//! - [`VerdictKind::NoOp`] - the boards are identical (the move hit a wall)
//! - [`VerdictKind::Valid`] - one slide, its merges, and at most one spawned
//!   tile explain the change
//! - [`VerdictKind::Inconsistent`] - nothing explains it, so at least one of
//!   the snapshots was misread and the pair should be discarded
//!
//! Snapshots that are not authoritative are refused with
//! [`VerifyError::InputDegraded`].
//!
//! [`BoardSnapshot`]: tilescan_vision::BoardSnapshot

use serde::{Deserialize, Serialize};
use tilescan_engine::{SPAWN_VALUES, TileValue};
use tilescan_vision::GameStatus;

pub use self::{verdict::*, verifier::*};

mod verdict;
mod verifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SnapshotRole {
    #[display("before")]
    Before,
    #[display("after")]
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display)]
pub enum DegradedReason {
    #[display("status is {_0}")]
    NotActive(GameStatus),
    #[display("snapshot is not authoritative")]
    NotAuthoritative,
    #[display("confidence {confidence} is below {floor}")]
    LowConfidence { confidence: f32, floor: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
pub enum VerifyError {
    #[display("{role} snapshot cannot be compared: {reason}")]
    InputDegraded {
        role: SnapshotRole,
        reason: DegradedReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Minimum overall confidence of both snapshots.
    pub confidence_floor: f32,
    /// Values a newly spawned tile may take.
    pub spawn_values: Vec<TileValue>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            spawn_values: SPAWN_VALUES
                .iter()
                .filter_map(|value| TileValue::new(*value).ok())
                .collect(),
        }
    }
}
