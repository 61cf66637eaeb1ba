use tilescan_engine::{Board, Direction, SpawnedTile};
use tilescan_vision::{BoardSnapshot, GameStatus};
use tracing::debug;

use crate::{DegradedReason, MoveVerdict, SnapshotRole, VerifierConfig, VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Explanation {
    direction: Direction,
    score_delta: u64,
    spawned: Option<SpawnedTile>,
}

/// Compares snapshots taken around a move.
///
/// # Example
///
/// ```
/// use tilescan_engine::{Board, Direction};
/// use tilescan_verifier::{MoveEffectVerifier, VerdictKind};
///
/// let verifier = MoveEffectVerifier::default();
/// let before = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
/// let after = Board::from_rows([[4, 0, 0, 0], [0; 4], [0, 0, 2, 0], [0; 4]]).unwrap();
///
/// let verdict = verifier.verify_boards(&before, &after, Some(Direction::Left));
/// assert_eq!(verdict.kind, VerdictKind::Valid);
/// assert_eq!(verdict.score_delta, Some(4));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MoveEffectVerifier {
    config: VerifierConfig,
}

impl MoveEffectVerifier {
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verifies the transition between two snapshots.
    ///
    /// With `claimed` set, only that direction is considered; otherwise the
    /// first direction (in `Left`, `Right`, `Up`, `Down` order) that explains
    /// the change is reported.
    pub fn verify(
        &self,
        before: &BoardSnapshot,
        after: &BoardSnapshot,
        claimed: Option<Direction>,
    ) -> Result<MoveVerdict, VerifyError> {
        self.check_input(SnapshotRole::Before, before)?;
        self.check_input(SnapshotRole::After, after)?;
        Ok(self.verify_boards(before.board(), after.board(), claimed))
    }

    fn check_input(&self, role: SnapshotRole, snapshot: &BoardSnapshot) -> Result<(), VerifyError> {
        let reason = if snapshot.status() != GameStatus::Active {
            DegradedReason::NotActive(snapshot.status())
        } else if !snapshot.is_authoritative() {
            DegradedReason::NotAuthoritative
        } else if snapshot.confidence() < self.config.confidence_floor {
            DegradedReason::LowConfidence {
                confidence: snapshot.confidence(),
                floor: self.config.confidence_floor,
            }
        } else {
            return Ok(());
        };
        debug!(%role, %reason, "refusing degraded snapshot");
        Err(VerifyError::InputDegraded { role, reason })
    }

    /// Verifies the transition between two boards, without input checks.
    #[must_use]
    pub fn verify_boards(
        &self,
        before: &Board,
        after: &Board,
        claimed: Option<Direction>,
    ) -> MoveVerdict {
        if before == after {
            debug!("boards are identical");
            return MoveVerdict::no_op();
        }

        let candidates = match claimed {
            Some(dir) => vec![dir],
            None => Direction::ALL.to_vec(),
        };
        let mut reasons = Vec::with_capacity(candidates.len());
        for dir in candidates {
            match self.explain(before, after, dir) {
                Ok(found) => {
                    debug!(
                        direction = %found.direction,
                        score_delta = found.score_delta,
                        "transition explained"
                    );
                    return MoveVerdict::valid(found.direction, found.score_delta, found.spawned);
                }
                Err(reason) => reasons.push(reason),
            }
        }

        let reason = if claimed.is_some() {
            reasons.join("; ")
        } else {
            format!("no single move explains the change ({})", reasons.join("; "))
        };
        debug!(%reason, "inconsistent transition");
        MoveVerdict::inconsistent(claimed, reason)
    }

    fn explain(
        &self,
        before: &Board,
        after: &Board,
        dir: Direction,
    ) -> Result<Explanation, String> {
        let outcome = before.shift(dir);
        if !outcome.moved() {
            return Err(format!("{dir} does not change the previous board"));
        }

        let mut spawned = None;
        for (row, col, expected) in outcome.board().cells() {
            let observed = after.get(row, col);
            if observed == expected {
                continue;
            }
            if !expected.is_empty() {
                return Err(format!(
                    "{dir}: cell ({row}, {col}) should be {expected}, observed {observed}"
                ));
            }
            if spawned.is_some() {
                return Err(format!("{dir}: more than one new tile appeared"));
            }
            if !self.config.spawn_values.contains(&observed) {
                return Err(format!(
                    "{dir}: new tile {observed} at ({row}, {col}) cannot be spawned"
                ));
            }
            spawned = Some(SpawnedTile {
                row,
                col,
                value: observed,
            });
        }

        let spawn = spawned.map_or(0, |tile| u64::from(tile.value.value()));
        if before.tile_sum() + spawn != after.tile_sum() {
            return Err(format!(
                "{dir}: tile sum {} does not match {} plus the spawned {spawn}",
                after.tile_sum(),
                before.tile_sum()
            ));
        }

        Ok(Explanation {
            direction: dir,
            score_delta: outcome.score(),
            spawned,
        })
    }
}
