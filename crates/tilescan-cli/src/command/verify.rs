use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tilescan_engine::Direction;
use tilescan_verifier::{MoveEffectVerifier, MoveVerdict};
use tilescan_vision::{BoardSnapshot, GeometryCache, NoPause, NoRecapture, Vision};

use super::{calibration::Calibration, classify::ClassifyReport};
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct VerifyArg {
    /// Capture taken before the move: an image, or a JSON report from `classify`
    before: PathBuf,
    /// Capture taken after the move: an image, or a JSON report from `classify`
    after: PathBuf,
    /// Direction of the attempted move; inferred when omitted
    #[arg(long)]
    direction: Option<Direction>,
    /// Calibration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct VerifyReport {
    before: BoardSnapshot,
    after: BoardSnapshot,
    verdict: MoveVerdict,
}

pub(crate) fn run(arg: &VerifyArg) -> anyhow::Result<()> {
    let VerifyArg {
        before,
        after,
        direction,
        config,
        output,
    } = arg;

    let calibration = Calibration::load(config.as_deref())?;
    let vision = Vision::new(calibration.vision);
    let verifier = MoveEffectVerifier::new(calibration.verifier);
    let mut cache = GeometryCache::new();

    let before = load_snapshot(&vision, &mut cache, before)?;
    let after = load_snapshot(&vision, &mut cache, after)?;
    let verdict = verifier
        .verify(&before, &after, *direction)
        .context("Snapshots cannot be compared")?;

    Output::save_json(
        &VerifyReport {
            before,
            after,
            verdict,
        },
        output.clone(),
    )
}

fn load_snapshot(
    vision: &Vision,
    cache: &mut GeometryCache,
    path: &Path,
) -> anyhow::Result<BoardSnapshot> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let report: ClassifyReport = util::read_json_file("classify report", path)?;
        return Ok(report.snapshot);
    }
    let frame = util::read_image(path)?;
    let snapshot = vision
        .capture(&frame, cache, &mut NoRecapture, &mut NoPause)
        .with_context(|| format!("Failed to classify {}", path.display()))?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use tilescan_engine::{Board, RawBoard};
    use tilescan_vision::{BoardRenderer, VisionConfig};

    use super::*;

    fn board(rows: RawBoard) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn test_snapshot_from_image_or_report() {
        let dir = tempfile::tempdir().unwrap();
        let before = board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let image = dir.path().join("before.png");
        BoardRenderer::default().render(&before).save(&image).unwrap();
        let vision = Vision::new(VisionConfig::default());

        let mut session = GeometryCache::new();
        let frame = util::read_image(&image).unwrap();
        let geometry = vision.locator().locate(&frame, &mut session).unwrap();
        let report = dir.path().join("before.JSON");
        Output::save_json(
            &ClassifyReport {
                geometry,
                snapshot: vision.assembler().assemble_frame(&frame, &geometry),
                cache: session.stats(),
            },
            Some(report.clone()),
        )
        .unwrap();

        let mut cache = GeometryCache::new();
        let from_image = load_snapshot(&vision, &mut cache, &image).unwrap();
        let from_report = load_snapshot(&vision, &mut cache, &report).unwrap();
        assert_eq!(from_image.board(), &before);
        assert_eq!(from_report.board(), &before);
        assert_eq!(cache.stats().detections, 1, "only the image is located");

        let not_json = dir.path().join("notes.json");
        std::fs::write(&not_json, "not json").unwrap();
        assert!(load_snapshot(&vision, &mut cache, &not_json).is_err());
    }

    #[test]
    fn test_run_reports_valid_move() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = BoardRenderer::default();
        let before = dir.path().join("before.png");
        let after = dir.path().join("after.png");
        renderer
            .render(&board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]))
            .save(&before)
            .unwrap();
        renderer
            .render(&board([[4, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 2]]))
            .save(&after)
            .unwrap();
        let output = dir.path().join("verdict.json");

        run(&VerifyArg {
            before,
            after,
            direction: None,
            config: None,
            output: Some(output.clone()),
        })
        .unwrap();

        let report: serde_json::Value = util::read_json_file("verify report", &output).unwrap();
        assert_eq!(report["verdict"]["kind"], "valid");
        assert_eq!(report["verdict"]["direction"], "left");
        assert_eq!(report["verdict"]["score_delta"], 4);
    }
}
