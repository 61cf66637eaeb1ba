use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tilescan_vision::{
    BoardGeometry, BoardSnapshot, CacheStats, GeometryCache, NoPause, ThreadSleep, Vision,
};
use tracing::info;

use super::calibration::Calibration;
use crate::util::{self, FileFrames, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ClassifyArg {
    /// Screenshot to classify
    image: PathBuf,
    /// Screenshot served for each recapture, in order
    #[arg(long = "recapture")]
    recaptures: Vec<PathBuf>,
    /// Calibration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Score read from the page, attached to the snapshot
    #[arg(long)]
    score: Option<u64>,
    /// Wait the configured delay before each recapture
    #[arg(long, default_value_t = false)]
    realtime: bool,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Output of `classify`, also accepted as input by `verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ClassifyReport {
    pub geometry: BoardGeometry,
    pub snapshot: BoardSnapshot,
    pub cache: CacheStats,
}

pub(crate) fn run(arg: &ClassifyArg) -> anyhow::Result<()> {
    let ClassifyArg {
        image,
        recaptures,
        config,
        score,
        realtime,
        output,
    } = arg;

    let calibration = Calibration::load(config.as_deref())?;
    let vision = Vision::new(calibration.vision);
    let frame = util::read_image(image)?;
    let mut cache = GeometryCache::new();
    let mut source = FileFrames::new(recaptures.iter().cloned());

    let snapshot = if *realtime {
        vision.capture(&frame, &mut cache, &mut source, &mut ThreadSleep)?
    } else {
        vision.capture(&frame, &mut cache, &mut source, &mut NoPause)?
    };
    let snapshot = match score {
        Some(score) => snapshot.with_captured_score(*score),
        None => snapshot,
    };
    info!(
        status = %snapshot.status(),
        confidence = snapshot.confidence(),
        authoritative = snapshot.is_authoritative(),
        "classified {}",
        image.display()
    );

    let Some(geometry) = cache.current() else {
        anyhow::bail!("Board geometry was not retained for {}", image.display());
    };
    let report = ClassifyReport {
        geometry,
        snapshot,
        cache: cache.stats(),
    };
    Output::save_json(&report, output.clone())
}
