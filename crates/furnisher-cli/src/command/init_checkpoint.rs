use std::path::PathBuf;

use anyhow::Context;
use burn::prelude::Backend;
use chrono::Utc;
use furnisher_dataset::{DatasetArchive, IntegrityMode, Split};
use furnisher_model::{
    ArchitectureRegistry, CheckpointMeta, DefaultBackend, build_network, save_checkpoint,
};

use crate::util::SourceArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InitCheckpointArg {
    #[clap(flatten)]
    source: SourceArg,
    /// Dataset archive produced by `rasterize`
    #[arg(long, default_value = "data/rooms.msgpack.zst")]
    archive: PathBuf,
    /// Built-in architecture name
    #[arg(long, default_value = "cnn-v3")]
    arch: String,
    /// Checkpoint name; defaults to the architecture name
    #[arg(long)]
    name: Option<String>,
    /// Directory holding checkpoint bundles
    #[arg(long, default_value = "models")]
    artifact_dir: PathBuf,
    /// Seed of the weight initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

pub(crate) fn run(arg: &InitCheckpointArg) -> anyhow::Result<()> {
    let registry = ArchitectureRegistry::builtin();
    let Some(spec) = registry.get(&arg.arch) else {
        let names = registry.names().collect::<Vec<_>>().join(", ");
        anyhow::bail!("Unknown architecture '{}'; expected one of: {names}", arg.arch);
    };

    let data = arg.source.load(IntegrityMode::Verify)?;
    let assignment = arg.source.split(&data)?;
    let archive = DatasetArchive::open(&arg.archive)
        .with_context(|| format!("Failed to open archive: {}", arg.archive.display()))?;
    let train = archive.subset(&assignment, Split::Train)?;
    anyhow::ensure!(!train.is_empty(), "Training split of the archive is empty");

    let spec = spec
        .clone()
        .with_normalization(train.normalization(&spec.features));
    for (feature, z) in &spec.normalization {
        log::info!("{feature}: mean={:.4} std={:.4}", z.mean, z.std);
    }

    DefaultBackend::seed(arg.seed);
    let device = Default::default();
    let network = build_network::<DefaultBackend>(&spec, &device)
        .with_context(|| format!("Invalid architecture '{}'", arg.arch))?;

    let name = arg.name.clone().unwrap_or_else(|| arg.arch.clone());
    let dir = arg.artifact_dir.join(&name);
    let meta = CheckpointMeta {
        name,
        trained_at: Utc::now(),
        spec,
    };
    save_checkpoint(&dir, &meta, network)
        .with_context(|| format!("Failed to save checkpoint: {}", dir.display()))?;
    println!(
        "wrote '{}' ({}, {} training rows) to {}",
        meta.name,
        meta.spec,
        train.len(),
        dir.display()
    );
    Ok(())
}
