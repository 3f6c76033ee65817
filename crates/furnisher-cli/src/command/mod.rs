use clap::{Parser, Subcommand};

use self::{
    check_data::CheckDataArg, evaluate::EvaluateArg, init_checkpoint::InitCheckpointArg,
    predict::PredictArg, rasterize::RasterizeArg, record_fixtures::RecordFixturesArg,
};

mod check_data;
mod evaluate;
mod init_checkpoint;
mod predict;
mod rasterize;
mod record_fixtures;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Verify the source against its manifest and report split sizes
    CheckData(#[clap(flatten)] CheckDataArg),
    /// Rasterize every scored room into a dataset archive
    Rasterize(#[clap(flatten)] RasterizeArg),
    /// Write a freshly initialized checkpoint with training-split statistics
    InitCheckpoint(#[clap(flatten)] InitCheckpointArg),
    /// Score one room described in a JSON file
    Predict(#[clap(flatten)] PredictArg),
    /// Evaluate a checkpoint on one split of the archive
    Evaluate(#[clap(flatten)] EvaluateArg),
    /// Record a checkpoint's scores into the golden fixture file
    RecordFixtures(#[clap(flatten)] RecordFixturesArg),
}

pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CommandArgs::parse();
    match args.mode {
        Mode::CheckData(arg) => check_data::run(&arg)?,
        Mode::Rasterize(arg) => rasterize::run(&arg)?,
        Mode::InitCheckpoint(arg) => init_checkpoint::run(&arg)?,
        Mode::Predict(arg) => predict::run(&arg)?,
        Mode::Evaluate(arg) => evaluate::run(&arg)?,
        Mode::RecordFixtures(arg) => record_fixtures::run(&arg)?,
    }
    Ok(())
}
