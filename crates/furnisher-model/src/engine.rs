//! Single entry point for room scoring.

use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use burn::prelude::Backend;
use burn_ndarray::NdArray;
use furnisher_geometry::{
    ApartmentType, GeometryError, GeometryFeatures, Point, Polygon, RoomGeometry, RoomType,
    UnknownCategory,
};
use furnisher_raster::{RasterImage, rasterize};

use crate::{
    cache::ModelCache,
    checkpoint::{
        CheckpointError, CheckpointMeta, bundle_dir, canonical_dir, latest_checkpoint,
        load_checkpoint,
    },
    network::RoomNet,
    spec::{CategoricalInput, assemble_tabular},
};

/// Backend used when the engine is not given one explicitly.
pub type DefaultBackend = NdArray<f32>;

pub const MIN_SCORE: f32 = 0.0;
pub const MAX_SCORE: f32 = 100.0;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PredictError {
    #[display("invalid geometry")]
    InvalidGeometry { source: GeometryError },
    #[display("unknown category")]
    UnknownCategory { source: UnknownCategory },
    #[display(
        "no model found; either pass a checkpoint path, set {env_var}, or place a checkpoint \
         directory (checkpoint.json + weights.bin) under {}",
        artifact_dir.display()
    )]
    NoModelFound {
        env_var: String,
        artifact_dir: PathBuf,
    },
    #[display("failed to load model")]
    Checkpoint { source: CheckpointError },
    #[display("model output is not a number")]
    NotANumber,
}

impl From<GeometryError> for PredictError {
    fn from(source: GeometryError) -> Self {
        Self::InvalidGeometry { source }
    }
}

impl From<UnknownCategory> for PredictError {
    fn from(source: UnknownCategory) -> Self {
        Self::UnknownCategory { source }
    }
}

impl From<CheckpointError> for PredictError {
    fn from(source: CheckpointError) -> Self {
        Self::Checkpoint { source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory searched for the most recent checkpoint.
    pub artifact_dir: PathBuf,
    /// Environment variable that overrides the checkpoint path.
    pub env_var: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            env_var: "FURNISHER_MODEL_PATH".to_owned(),
        }
    }
}

/// A loaded checkpoint.
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub network: RoomNet<B>,
    pub meta: CheckpointMeta,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Score clamped into `[0, 100]`.
    pub score: f32,
    /// Unbounded network output.
    pub raw: f32,
}

/// One room to score.
#[derive(Debug, Clone, Copy)]
pub struct RoomQuery<'a> {
    /// Closed ring in meters.
    pub polygon: &'a [Point],
    pub door: Point,
    pub room_type: &'a str,
    /// Defaults to [`ApartmentType::default`] when absent.
    pub apartment_type: Option<&'a str>,
}

impl RoomQuery<'_> {
    fn validate(&self) -> Result<(RoomGeometry, CategoricalInput), PredictError> {
        let room_type = self.room_type.parse::<RoomType>()?;
        let apartment_type = self
            .apartment_type
            .map(str::parse::<ApartmentType>)
            .transpose()?
            .unwrap_or_default();
        let polygon = Polygon::new(self.polygon.to_vec())?;
        let geometry = RoomGeometry::new(polygon, self.door)?;
        Ok((
            geometry,
            CategoricalInput {
                room_type,
                apartment_type,
            },
        ))
    }
}

/// Scores rooms with lazily loaded, cached checkpoints.
#[derive(Debug)]
pub struct InferenceEngine<B: Backend = DefaultBackend> {
    config: EngineConfig,
    device: B::Device,
    cache: ModelCache<LoadedModel<B>>,
}

impl InferenceEngine<DefaultBackend> {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_device(config, Default::default())
    }
}

impl Default for InferenceEngine<DefaultBackend> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<B: Backend> InferenceEngine<B> {
    #[must_use]
    pub fn with_device(config: EngineConfig, device: B::Device) -> Self {
        Self {
            config,
            device,
            cache: ModelCache::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Checkpoint to use: explicit path, then the environment override, then
    /// the most recent bundle in the artifact directory.
    ///
    /// The returned directory is canonical, so every spelling of the same
    /// bundle shares one cache entry.
    pub fn resolve(&self, model_path: Option<&Path>) -> Result<PathBuf, PredictError> {
        let dir = if let Some(path) = model_path {
            bundle_dir(path).to_path_buf()
        } else if let Some(path) = env::var_os(&self.config.env_var).filter(|p| !p.is_empty()) {
            log::debug!("using checkpoint from {}", self.config.env_var);
            bundle_dir(Path::new(&path)).to_path_buf()
        } else {
            latest_checkpoint(&self.config.artifact_dir)?.ok_or_else(|| {
                PredictError::NoModelFound {
                    env_var: self.config.env_var.clone(),
                    artifact_dir: self.config.artifact_dir.clone(),
                }
            })?
        };
        Ok(canonical_dir(&dir)?)
    }

    /// Loads (or fetches from the cache) the checkpoint at `model_path`.
    pub fn load(&self, model_path: Option<&Path>) -> Result<Arc<LoadedModel<B>>, PredictError> {
        let path = self.resolve(model_path)?;
        self.cache.get_or_try_load(&path, || {
            let (network, meta) = load_checkpoint(&path, &self.device)?;
            log::info!("loaded model '{}' from {}", meta.name, path.display());
            Ok(LoadedModel { network, meta })
        })
    }

    /// Scores a room, returning both the clamped score and the raw output.
    ///
    /// Inputs are validated before any checkpoint is touched.
    pub fn predict(
        &self,
        query: &RoomQuery<'_>,
        model_path: Option<&Path>,
    ) -> Result<Prediction, PredictError> {
        let (geometry, categories) = query.validate()?;
        let model = self.load(model_path)?;
        let image = rasterize(&geometry);
        self.predict_prepared(&model, &image, categories, &GeometryFeatures::new(&geometry))
    }

    /// Scores an already rasterized room with a loaded model.
    pub fn predict_prepared(
        &self,
        model: &LoadedModel<B>,
        image: &RasterImage,
        categories: CategoricalInput,
        features: &GeometryFeatures,
    ) -> Result<Prediction, PredictError> {
        let tabular = assemble_tabular(&model.meta.spec, features);
        let output = model
            .network
            .forward_one(image, categories, tabular, &self.device);
        let raw = output
            .into_data()
            .to_vec::<f32>()
            .ok()
            .and_then(|v| v.first().copied())
            .filter(|v| !v.is_nan())
            .ok_or(PredictError::NotANumber)?;
        Ok(Prediction {
            score: raw.clamp(MIN_SCORE, MAX_SCORE),
            raw,
        })
    }

    /// Predicted score in `[0, 100]`.
    pub fn predict_score(
        &self,
        polygon: &[Point],
        door: Point,
        room_type: &str,
        apartment_type: Option<&str>,
        model_path: Option<&Path>,
    ) -> Result<f32, PredictError> {
        let query = RoomQuery {
            polygon,
            door,
            room_type,
            apartment_type,
        };
        self.predict(&query, model_path).map(|p| p.score)
    }

    /// Forgets the model cached for `model_path`; the next call reloads it.
    pub fn invalidate(&self, model_path: &Path) -> bool {
        canonical_dir(bundle_dir(model_path)).is_ok_and(|dir| self.cache.invalidate(&dir))
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use burn::nn::Initializer;
    use chrono::Utc;

    use super::*;
    use crate::{
        checkpoint::save_checkpoint,
        network::build_network_with,
        spec::{ArchitectureRegistry, ModelSpec},
        testing::normalization,
    };

    fn write_checkpoint(dir: &Path, arch: &str, init: &Initializer) {
        let spec = ArchitectureRegistry::builtin()
            .get(arch)
            .unwrap()
            .clone()
            .with_normalization(normalization());
        let device = Default::default();
        let net = build_network_with::<DefaultBackend>(&spec, init, &device).unwrap();
        let meta = CheckpointMeta {
            name: arch.to_owned(),
            trained_at: Utc::now(),
            spec,
        };
        save_checkpoint(dir, &meta, net).unwrap();
    }

    fn engine(artifact_dir: &Path) -> InferenceEngine {
        InferenceEngine::new(EngineConfig {
            artifact_dir: artifact_dir.to_path_buf(),
            env_var: "FURNISHER_TEST_UNSET_MODEL_PATH".to_owned(),
        })
    }

    fn rectangle() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
            Point::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_no_model_found() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(&tmp.path().join("models"));
        let err = engine
            .predict_score(&rectangle(), Point::new(2.0, 0.0), "Bedroom", None, None)
            .unwrap_err();
        assert!(matches!(err, PredictError::NoModelFound { .. }));
        let message = err.to_string();
        assert!(message.contains("FURNISHER_TEST_UNSET_MODEL_PATH"));
        assert!(message.contains("models"));
    }

    #[test]
    fn test_input_errors_precede_model_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(tmp.path());
        let door = Point::new(2.0, 0.0);

        let err = engine
            .predict_score(&rectangle(), door, "Garage", None, None)
            .unwrap_err();
        assert!(matches!(err, PredictError::UnknownCategory { .. }));

        let err = engine
            .predict_score(&rectangle(), door, "Bedroom", Some("Castle"), None)
            .unwrap_err();
        assert!(matches!(err, PredictError::UnknownCategory { .. }));

        let err = engine
            .predict_score(&rectangle(), Point::new(2.0, 1.0), "Bedroom", None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PredictError::InvalidGeometry {
                source: GeometryError::DoorOffBoundary { .. }
            }
        ));

        let ring = rectangle();
        let open = &ring[..4];
        let err = engine
            .predict_score(open, door, "Bedroom", None, None)
            .unwrap_err();
        assert!(matches!(err, PredictError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_output_is_clamped() {
        let tmp = tempfile::tempdir().unwrap();
        let high = tmp.path().join("high");
        let low = tmp.path().join("low");
        let zero = tmp.path().join("zero");
        write_checkpoint(&high, "cnn-v1", &Initializer::Constant { value: 1.0 });
        write_checkpoint(&low, "cnn-v3", &Initializer::Constant { value: -1.0 });
        write_checkpoint(&zero, "cnn-v2", &Initializer::Zeros);

        let engine = engine(tmp.path());
        let polygon = rectangle();
        let query = RoomQuery {
            polygon: &polygon,
            door: Point::new(2.0, 0.0),
            room_type: "Kitchen",
            apartment_type: Some("3-Bedroom"),
        };

        let p = engine.predict(&query, Some(high.as_path())).unwrap();
        assert!(p.raw > MAX_SCORE);
        assert_eq!(p.score, MAX_SCORE);

        let p = engine.predict(&query, Some(low.as_path())).unwrap();
        assert!(p.raw <= -1.0);
        assert_eq!(p.score, MIN_SCORE);

        let p = engine.predict(&query, Some(zero.as_path())).unwrap();
        assert_eq!(p, Prediction { score: 0.0, raw: 0.0 });
    }

    #[test]
    fn test_cache_and_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        write_checkpoint(&first, "cnn-v1", &Initializer::Zeros);
        let engine = engine(tmp.path());
        let polygon = rectangle();
        let door = Point::new(2.0, 0.0);

        assert_eq!(engine.cached_len(), 0);
        engine
            .predict_score(&polygon, door, "Bedroom", None, None)
            .unwrap();
        assert_eq!(engine.cached_len(), 1);
        engine
            .predict_score(&polygon, door, "Kitchen", None, Some(first.as_path()))
            .unwrap();
        assert_eq!(engine.cached_len(), 1);
        engine
            .predict_score(&polygon, door, "WC", None, Some(first.join("checkpoint.json").as_path()))
            .unwrap();
        assert_eq!(engine.cached_len(), 1);

        assert!(engine.invalidate(&first));
        assert_eq!(engine.cached_len(), 0);
        engine
            .predict_score(&polygon, door, "Bedroom", None, Some(first.as_path()))
            .unwrap();
        assert_eq!(engine.cached_len(), 1);
        engine.clear();
        assert_eq!(engine.cached_len(), 0);
    }

    #[test]
    fn test_path_spellings_share_one_cache_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("zeros");
        write_checkpoint(&dir, "cnn-v1", &Initializer::Zeros);
        let engine = engine(tmp.path());
        let detour = tmp.path().join("zeros").join("..").join("zeros");

        engine.load(Some(dir.as_path())).unwrap();
        engine.load(Some(detour.as_path())).unwrap();
        engine.load(Some(detour.join("checkpoint.json").as_path())).unwrap();
        assert_eq!(engine.cached_len(), 1);
        assert_eq!(
            engine.resolve(Some(detour.as_path())).unwrap(),
            engine.resolve(Some(dir.as_path())).unwrap()
        );

        assert!(engine.invalidate(&detour));
        assert_eq!(engine.cached_len(), 0);
        assert!(!engine.invalidate(&tmp.path().join("missing")));

        let err = engine.load(Some(tmp.path().join("missing").as_path())).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Checkpoint {
                source: CheckpointError::NotFound { .. }
            }
        ));
    }

    #[test]
    fn test_predict_score_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("v4");
        write_checkpoint(&dir, "cnn-v4", &Initializer::KaimingUniform {
            gain: 1.0,
            fan_out_only: false,
        });
        let engine = engine(tmp.path());
        let l_shape = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 4.0),
            Point::new(0.0, 4.0),
            Point::new(0.0, 0.0),
        ];
        let door = Point::new(1.0, 4.0);
        let a = engine
            .predict(
                &RoomQuery {
                    polygon: &l_shape,
                    door,
                    room_type: "Living room",
                    apartment_type: None,
                },
                Some(dir.as_path()),
            )
            .unwrap();
        engine.clear();
        let b = engine
            .predict(
                &RoomQuery {
                    polygon: &l_shape,
                    door,
                    room_type: "Living room",
                    apartment_type: Some("2-Bedroom"),
                },
                Some(dir.as_path()),
            )
            .unwrap();
        assert_eq!(a.raw.to_bits(), b.raw.to_bits());
        assert!((MIN_SCORE..=MAX_SCORE).contains(&a.score));
    }

    #[test]
    fn test_missing_normalization_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("bad");
        std::fs::create_dir_all(&dir).unwrap();
        let meta = CheckpointMeta {
            name: "bad".to_owned(),
            trained_at: Utc::now(),
            spec: ModelSpec::default(),
        };
        std::fs::write(
            dir.join("checkpoint.json"),
            serde_json::to_string(&meta).unwrap(),
        )
        .unwrap();
        let err = engine(tmp.path())
            .predict_score(&rectangle(), Point::new(2.0, 0.0), "WC", None, Some(dir.as_path()))
            .unwrap_err();
        assert!(matches!(
            err,
            PredictError::Checkpoint {
                source: CheckpointError::Spec { .. }
            }
        ));
    }
}
