//! Scalar features derived from room geometry.

use serde::{Deserialize, Serialize};

use crate::{GeometryError, Point, RoomGeometry};

/// Scalar description of a room's shape and door placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryFeatures {
    /// Floor area in square meters.
    pub area: f64,
    /// Longer bounding-box side divided by the shorter one; always `>= 1`.
    pub aspect_ratio: f64,
    /// Number of unique vertices (the closing point is not counted).
    pub n_vertices: usize,
    /// Door position relative to the bounding box, in `[0, 1]`.
    pub door_rel_x: f64,
    pub door_rel_y: f64,
}

impl GeometryFeatures {
    #[must_use]
    pub fn new(geometry: &RoomGeometry) -> Self {
        let polygon = geometry.polygon();
        let bbox = polygon.bounding_box();
        let (width, height) = (bbox.width(), bbox.height());
        let aspect_ratio = if width >= height {
            width / height
        } else {
            height / width
        };
        let door = geometry.door();
        Self {
            area: polygon.area(),
            aspect_ratio,
            n_vertices: polygon.vertex_count(),
            door_rel_x: ((door.x - bbox.min.x) / width).clamp(0.0, 1.0),
            door_rel_y: ((door.y - bbox.min.y) / height).clamp(0.0, 1.0),
        }
    }

    /// Validates a raw closed ring and door, then computes the features.
    pub fn compute(ring: Vec<Point>, door: Point) -> Result<Self, GeometryError> {
        Ok(Self::new(&RoomGeometry::from_ring(ring, door)?))
    }

    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn get(&self, feature: TabularFeature) -> f64 {
        match feature {
            TabularFeature::Area => self.area,
            TabularFeature::AspectRatio => self.aspect_ratio,
            TabularFeature::NVertices => self.n_vertices as f64,
            TabularFeature::DoorRelX => self.door_rel_x,
            TabularFeature::DoorRelY => self.door_rel_y,
        }
    }
}

/// A scalar input of the tabular branch.
///
/// The serialized names are stable and recorded in model checkpoints.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum TabularFeature {
    #[display("area")]
    Area,
    #[display("aspect_ratio")]
    AspectRatio,
    #[display("n_vertices")]
    NVertices,
    #[display("door_rel_x")]
    DoorRelX,
    #[display("door_rel_y")]
    DoorRelY,
}

impl TabularFeature {
    pub const ALL: [Self; 5] = [
        Self::Area,
        Self::AspectRatio,
        Self::NVertices,
        Self::DoorRelX,
        Self::DoorRelY,
    ];

    /// Whether the feature is z-scored before entering the network.
    ///
    /// Door positions are already bounded to `[0, 1]` and are fed as-is.
    #[must_use]
    pub const fn is_standardized(self) -> bool {
        !matches!(self, Self::DoorRelX | Self::DoorRelY)
    }
}
