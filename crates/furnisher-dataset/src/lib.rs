//! Dataset plumbing for the furnisher surrogate.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. [`source::load_source`] reads the JSON-lines source once, passes its
//!    SHA-256 through the [`integrity::IntegrityGate`] and parses apartments.
//! 2. [`split::SplitAssignment`] partitions apartments into train, val and
//!    test, stratified by apartment type.
//! 3. [`archive::DatasetArchive`] rasterizes the scored rooms into
//!    index-aligned columns and computes training-split normalization.

pub use self::{archive::*, integrity::*, source::*, split::*};

pub mod archive;
pub mod integrity;
pub mod source;
pub mod split;
