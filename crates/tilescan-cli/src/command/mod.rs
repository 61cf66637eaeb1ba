use clap::{ArgAction, Parser, Subcommand};

use self::{
    calibration::CalibrationArg, classify::ClassifyArg, synthesize::SynthesizeArg,
    verify::VerifyArg,
};
use crate::util;

mod calibration;
mod classify;
mod synthesize;
mod verify;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Classify a screenshot into a board snapshot
    Classify(#[clap(flatten)] ClassifyArg),
    /// Check whether a move changed the board, from two captures
    Verify(#[clap(flatten)] VerifyArg),
    /// Render a synthetic board screenshot
    Synthesize(#[clap(flatten)] SynthesizeArg),
    /// Print the default or effective calibration
    Calibration(#[clap(flatten)] CalibrationArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    util::init_logging(args.verbose);
    match args.mode {
        Mode::Classify(arg) => classify::run(&arg)?,
        Mode::Verify(arg) => verify::run(&arg)?,
        Mode::Synthesize(arg) => synthesize::run(&arg)?,
        Mode::Calibration(arg) => calibration::run(&arg)?,
    }
    Ok(())
}
