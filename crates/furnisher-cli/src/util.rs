use std::{
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use furnisher_dataset::{
    IntegrityGate, IntegrityMode, SourceData, SplitAssignment, SplitConfig, load_source,
};
use furnisher_model::{EngineConfig, InferenceEngine};

/// Writes `value` as pretty-printed JSON followed by a newline.
pub fn write_json_file<T>(file_kind: &str, path: &Path, value: &T) -> anyhow::Result<()>
where
    T: serde::Serialize + ?Sized,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create {file_kind} file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {file_kind} file: {}", path.display()))?;
    writeln!(writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("Failed to flush {file_kind} file: {}", path.display()))
}

pub fn read_json_file<T>(file_kind: &str, path: &Path) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} file: {}", path.display()))
}

/// Location of the apartment source and its integrity manifest.
#[derive(Debug, Clone, clap::Args)]
pub struct SourceArg {
    /// JSON-lines apartment source
    #[arg(long, default_value = "data/apartments.jsonl")]
    pub source: PathBuf,
    /// Integrity manifest recording the accepted source hash
    #[arg(long, default_value = "data/manifest.json")]
    pub manifest: PathBuf,
    /// Seed of the train/val/test split
    #[arg(long, default_value_t = SplitConfig::default().seed)]
    pub split_seed: u64,
}

impl SourceArg {
    pub fn load(&self, mode: IntegrityMode) -> anyhow::Result<SourceData> {
        let gate = IntegrityGate::new(&self.manifest, mode);
        load_source(&self.source, &gate)
            .with_context(|| format!("Failed to load source: {}", self.source.display()))
    }

    pub fn split(&self, data: &SourceData) -> anyhow::Result<SplitAssignment> {
        let config = SplitConfig {
            seed: self.split_seed,
            ..SplitConfig::default()
        };
        SplitAssignment::from_apartments(&data.apartments, &config)
            .context("Failed to split apartments")
    }
}

/// Checkpoint selection shared by the inference commands.
#[derive(Debug, Clone, clap::Args)]
pub struct ModelArg {
    /// Checkpoint directory; defaults to the most recent one in the artifact directory
    #[arg(long)]
    pub model: Option<PathBuf>,
    /// Directory holding checkpoint bundles
    #[arg(long, default_value = "models")]
    pub artifact_dir: PathBuf,
}

impl ModelArg {
    pub fn engine(&self) -> InferenceEngine {
        InferenceEngine::new(EngineConfig {
            artifact_dir: self.artifact_dir.clone(),
            ..EngineConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_json_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.json");
        let report = BTreeMap::from([("mae", 4.5), ("rmse", 6.25)]);
        write_json_file("report", &path, &report).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        let read: BTreeMap<String, f64> = read_json_file("report", &path).unwrap();
        assert_eq!(read["rmse"], 6.25);
    }

    #[test]
    fn test_json_file_errors_name_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("room.json");
        let err = read_json_file::<serde_json::Value>("room", &missing).unwrap_err();
        assert!(err.to_string().contains("room.json"));

        std::fs::write(&missing, "{not json").unwrap();
        let err = read_json_file::<serde_json::Value>("room", &missing).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse room file"));

        let err = write_json_file("report", &tmp.path().join("no/such/dir.json"), &1).unwrap_err();
        assert!(err.to_string().contains("Failed to create report file"));
    }
}
