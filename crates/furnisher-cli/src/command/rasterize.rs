use std::path::PathBuf;

use anyhow::Context;
use furnisher_dataset::{DatasetArchive, IntegrityMode};

use crate::util::SourceArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RasterizeArg {
    #[clap(flatten)]
    source: SourceArg,
    /// Output archive path
    #[arg(long, default_value = "data/rooms.msgpack.zst")]
    output: PathBuf,
}

pub(crate) fn run(arg: &RasterizeArg) -> anyhow::Result<()> {
    let data = arg.source.load(IntegrityMode::Verify)?;
    let archive = DatasetArchive::build(data.rooms());
    archive
        .save(&arg.output)
        .with_context(|| format!("Failed to save archive: {}", arg.output.display()))?;
    println!(
        "wrote {} rooms from {} apartments to {}",
        archive.len(),
        data.apartments.len(),
        arg.output.display()
    );
    Ok(())
}
