//! Self-describing checkpoint bundles.
//!
//! A checkpoint is a directory holding `checkpoint.json` (name, training
//! timestamp and the full [`ModelSpec`]) next to `weights.bin`. The spec is
//! enough to rebuild the network before the weights are loaded into it.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use burn::{
    module::Module,
    prelude::Backend,
    record::{BinFileRecorder, FullPrecisionSettings},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    network::{RoomNet, build_network},
    spec::{ModelSpec, ModelSpecError},
};

pub const META_FILE: &str = "checkpoint.json";
pub const WEIGHTS_FILE: &str = "weights.bin";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CheckpointError {
    #[display("no checkpoint at {}", path.display())]
    NotFound { path: PathBuf },
    #[display("failed to read {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("failed to write {}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[display("checkpoint {} has an unusable spec", path.display())]
    Spec {
        path: PathBuf,
        source: ModelSpecError,
    },
    #[display("failed to store weights {}: {reason}", path.display())]
    Weights { path: PathBuf, reason: String },
}

/// Contents of `checkpoint.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub name: String,
    pub trained_at: DateTime<Utc>,
    pub spec: ModelSpec,
}

/// Bundle directory for `path`, which may also name the metadata file itself.
#[must_use]
pub fn bundle_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if path.file_name().is_some_and(|n| n == META_FILE) => parent,
        _ => path,
    }
}

/// Resolves symlinks and `..` components of a bundle directory.
pub fn canonical_dir(dir: &Path) -> Result<PathBuf, CheckpointError> {
    fs::canonicalize(dir).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            CheckpointError::NotFound {
                path: dir.to_path_buf(),
            }
        } else {
            CheckpointError::Read {
                path: dir.to_path_buf(),
                source,
            }
        }
    })
}

pub fn read_meta(dir: &Path) -> Result<CheckpointMeta, CheckpointError> {
    let path = dir.join(META_FILE);
    let text = fs::read_to_string(&path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            CheckpointError::NotFound {
                path: dir.to_path_buf(),
            }
        } else {
            CheckpointError::Read {
                path: path.clone(),
                source,
            }
        }
    })?;
    serde_json::from_str(&text).map_err(|source| CheckpointError::Parse { path, source })
}

/// Writes `network` and its metadata into `dir`, creating it if needed.
pub fn save_checkpoint<B: Backend>(
    dir: &Path,
    meta: &CheckpointMeta,
    network: RoomNet<B>,
) -> Result<(), CheckpointError> {
    let write_err = |path: PathBuf| move |source| CheckpointError::Write { path, source };
    fs::create_dir_all(dir).map_err(write_err(dir.to_path_buf()))?;

    let meta_path = dir.join(META_FILE);
    let mut json = serde_json::to_string_pretty(meta).map_err(|source| CheckpointError::Parse {
        path: meta_path.clone(),
        source,
    })?;
    json.push('\n');
    fs::write(&meta_path, json).map_err(write_err(meta_path.clone()))?;

    let weights = dir.join(WEIGHTS_FILE);
    network
        .save_file(weights.clone(), &BinFileRecorder::<FullPrecisionSettings>::new())
        .map_err(|e| CheckpointError::Weights {
            path: weights,
            reason: e.to_string(),
        })?;
    log::info!("saved checkpoint '{}' to {}", meta.name, dir.display());
    Ok(())
}

/// Rebuilds the network from the bundled spec and loads its weights.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(RoomNet<B>, CheckpointMeta), CheckpointError> {
    let dir = bundle_dir(path);
    let meta = read_meta(dir)?;
    let network = build_network::<B>(&meta.spec, device).map_err(|source| CheckpointError::Spec {
        path: dir.to_path_buf(),
        source,
    })?;
    let weights = dir.join(WEIGHTS_FILE);
    if !weights.is_file() {
        return Err(CheckpointError::NotFound { path: weights });
    }
    let network = network
        .load_file(weights.clone(), &BinFileRecorder::<FullPrecisionSettings>::new(), device)
        .map_err(|e| CheckpointError::Weights {
            path: weights,
            reason: e.to_string(),
        })?;
    log::debug!("loaded checkpoint '{}' ({})", meta.name, meta.spec);
    Ok((network, meta))
}

/// Most recently trained checkpoint under `artifact_dir`.
///
/// Ties on `trained_at` go to the greater name. Subdirectories without a
/// readable `checkpoint.json` are skipped with a warning; a missing
/// `artifact_dir` yields `None`.
pub fn latest_checkpoint(artifact_dir: &Path) -> Result<Option<PathBuf>, CheckpointError> {
    let entries = match fs::read_dir(artifact_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CheckpointError::Read {
                path: artifact_dir.to_path_buf(),
                source,
            });
        }
    };

    let mut latest: Option<(CheckpointMeta, PathBuf)> = None;
    for entry in entries {
        let dir = entry
            .map_err(|source| CheckpointError::Read {
                path: artifact_dir.to_path_buf(),
                source,
            })?
            .path();
        if !dir.join(META_FILE).is_file() {
            continue;
        }
        let meta = match read_meta(&dir) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("skipping {}: {e}", dir.display());
                continue;
            }
        };
        let newer = latest.as_ref().is_none_or(|(best, _)| {
            (meta.trained_at, &meta.name) > (best.trained_at, &best.name)
        });
        if newer {
            latest = Some((meta, dir));
        }
    }
    Ok(latest.map(|(_, dir)| dir))
}
