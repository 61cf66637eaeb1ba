use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};
use tilescan_verifier::VerifierConfig;
use tilescan_vision::VisionConfig;

use crate::util::{self, Output};

/// Calibration artifact read by every command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Calibration {
    pub vision: VisionConfig,
    pub verifier: VerifierConfig,
}

impl Calibration {
    /// Load and validate a calibration file, or the defaults without one.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let calibration: Self = match path {
            Some(path) => util::read_json_file("calibration", path)?,
            None => Self::default(),
        };
        calibration
            .vision
            .validate()
            .context("Invalid vision calibration")?;
        let floor = calibration.verifier.confidence_floor;
        ensure!(
            (0.0..=1.0).contains(&floor),
            "Invalid verifier calibration: confidence_floor = {floor} is out of range [0, 1]"
        );
        Ok(calibration)
    }
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CalibrationArg {
    /// Calibration file to validate and print with defaults filled in
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &CalibrationArg) -> anyhow::Result<()> {
    let CalibrationArg { config, output } = arg;
    let calibration = Calibration::load(config.as_deref())?;
    Output::save_json(&calibration, output.clone())
}
