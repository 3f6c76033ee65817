//! Content-hash gate in front of every dataset load.
//!
//! The first load of a source records its SHA-256 in a small JSON manifest.
//! Every later load recomputes the hash and refuses to continue when it no
//! longer matches, until an operator explicitly accepts the new content with
//! [`IntegrityMode::Update`]. The manifest is the only state the gate keeps;
//! the source itself is never copied.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum IntegrityError {
    #[display(
        "data integrity mismatch for {}: manifest records sha256 {expected}, source has {actual}; \
         if the source was changed on purpose, re-run with --update to accept it",
        path.display()
    )]
    DataIntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[display("failed to read manifest {}", path.display())]
    ReadManifest { path: PathBuf, source: io::Error },
    #[display("failed to parse manifest {}", path.display())]
    ParseManifest {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("failed to write manifest {}", path.display())]
    WriteManifest { path: PathBuf, source: io::Error },
}

/// Snapshot of an accepted source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataManifest {
    pub source: String,
    pub sha256: String,
    /// Number of apartments (source lines).
    pub rows: usize,
    pub active_rooms: usize,
    pub snapshot_date: NaiveDate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityMode {
    /// Refuse to load when the hash differs from the manifest.
    #[default]
    Verify,
    /// Accept the current content and rewrite the manifest.
    Update,
}

/// Result of checking a hash against the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No manifest existed yet.
    FirstUse,
    /// The hash matches the recorded manifest.
    Matched(DataManifest),
    /// The operator accepted new content.
    Updated { previous: Option<DataManifest> },
}

impl Verdict {
    /// Whether the manifest has to be (re)written after loading.
    #[must_use]
    pub fn needs_write(&self) -> bool {
        !matches!(self, Self::Matched(_))
    }
}

/// Hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct IntegrityGate {
    manifest_path: PathBuf,
    mode: IntegrityMode,
}

impl IntegrityGate {
    #[must_use]
    pub fn new<P>(manifest_path: P, mode: IntegrityMode) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            manifest_path: manifest_path.into(),
            mode,
        }
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn read_manifest(&self) -> Result<Option<DataManifest>, IntegrityError> {
        let path = &self.manifest_path;
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(IntegrityError::ReadManifest {
                    path: path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| IntegrityError::ParseManifest {
                path: path.clone(),
                source,
            })
    }

    /// Checks the hash of `source` content against the manifest.
    pub fn check(&self, source: &Path, sha256: &str) -> Result<Verdict, IntegrityError> {
        let previous = self.read_manifest()?;
        match (self.mode, previous) {
            (IntegrityMode::Update, previous) => {
                log::info!("accepting {} with sha256 {sha256}", source.display());
                Ok(Verdict::Updated { previous })
            }
            (IntegrityMode::Verify, None) => {
                log::info!(
                    "no manifest at {}, recording sha256 of {}",
                    self.manifest_path.display(),
                    source.display()
                );
                Ok(Verdict::FirstUse)
            }
            (IntegrityMode::Verify, Some(manifest)) if manifest.sha256 == sha256 => {
                log::debug!("sha256 of {} matches manifest", source.display());
                Ok(Verdict::Matched(manifest))
            }
            (IntegrityMode::Verify, Some(manifest)) => Err(IntegrityError::DataIntegrityMismatch {
                path: source.to_path_buf(),
                expected: manifest.sha256,
                actual: sha256.to_owned(),
            }),
        }
    }

    pub fn write_manifest(&self, manifest: &DataManifest) -> Result<(), IntegrityError> {
        let path = &self.manifest_path;
        let write = || -> io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut json = serde_json::to_string_pretty(manifest).map_err(io::Error::other)?;
            json.push('\n');
            fs::write(path, json)
        };
        write().map_err(|source| IntegrityError::WriteManifest {
            path: path.clone(),
            source,
        })
    }
}

impl DataManifest {
    /// A manifest dated today (UTC).
    #[must_use]
    pub fn today(source: &Path, sha256: String, rows: usize, active_rooms: usize) -> Self {
        Self {
            source: source.display().to_string(),
            sha256,
            rows,
            active_rooms,
            snapshot_date: Utc::now().date_naive(),
        }
    }
}
