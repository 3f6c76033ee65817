//! Configuration-driven room scoring network and inference engine.
//!
//! A checkpoint bundles trained weights with a [`ModelSpec`]; the model spec alone
//! determines the network topology, so the same code path serves every model
//! version. [`InferenceEngine`] is the entry point used by the CLI and by
//! external callers:
//!
//! 1. resolve a checkpoint (explicit path, environment override, latest
//!    bundle in the artifact directory)
//! 2. load it once and cache it by path
//! 3. validate the room, rasterize it and assemble the tabular inputs in the
//!    order the model spec records
//! 4. run the network and clamp the result into `[0, 100]`

pub use self::{
    cache::ModelCache,
    checkpoint::{
        CheckpointError, CheckpointMeta, bundle_dir, latest_checkpoint, load_checkpoint,
        read_meta, save_checkpoint,
    },
    engine::{
        DefaultBackend, EngineConfig, InferenceEngine, LoadedModel, MAX_SCORE, MIN_SCORE,
        PredictError, Prediction, RoomQuery,
    },
    fixtures::{FixtureError, FixtureRoom, GOLDEN_TOLERANCE, read_fixtures, write_fixtures},
    network::{RoomNet, build_network, build_network_with},
    spec::{ArchitectureRegistry, CategoricalInput, ModelSpec, ModelSpecError, assemble_tabular},
};

pub use burn::nn::Initializer;

pub mod cache;
pub mod checkpoint;
pub mod engine;
pub mod fixtures;
pub mod network;
pub mod spec;

#[cfg(test)]
mod testing;
