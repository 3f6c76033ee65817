//! Room geometry primitives for the furnisher surrogate.
//!
//! Every scored unit is a [`Room`]: an axis-aligned, closed polygon in meters,
//! a door point on one of its walls, and the room/apartment categories. This
//! crate validates that geometry once, at construction time, so downstream
//! code (rasterization, feature assembly, inference) can rely on the
//! invariants without re-checking them:
//!
//! - the ring is closed and has 4, 6 or 8 unique vertices
//! - every edge is axis-aligned and edges alternate between horizontal and vertical
//! - no two non-adjacent edges touch or cross
//! - the door lies within [`DOOR_TOLERANCE`] meters of an edge
//!
//! # Modules
//!
//! - [`polygon`]: validated closed rings and their bounding boxes
//! - [`features`]: scalar features derived from a room ([`GeometryFeatures`])
//! - [`category`]: the closed room-type and apartment-type enumerations
//! - [`room`]: rooms, apartments and apartment identifiers
//! - [`baseline`]: the flat feature vector consumed by the tabular baseline model
//!
//! # Example
//!
//! ```
//! use furnisher_geometry::{GeometryFeatures, Point, Polygon, RoomGeometry};
//!
//! let polygon = Polygon::new(vec![
//!     Point::new(0.0, 0.0),
//!     Point::new(4.0, 0.0),
//!     Point::new(4.0, 3.0),
//!     Point::new(0.0, 3.0),
//!     Point::new(0.0, 0.0),
//! ])?;
//! let room = RoomGeometry::new(polygon, Point::new(2.0, 0.0))?;
//! let features = GeometryFeatures::new(&room);
//! assert!((features.area - 12.0).abs() < 1e-9);
//! assert!((features.aspect_ratio - 4.0 / 3.0).abs() < 1e-9);
//! # Ok::<(), furnisher_geometry::GeometryError>(())
//! ```

pub use self::{category::*, features::*, polygon::*, room::*};

pub mod baseline;
pub mod category;
pub mod features;
pub mod polygon;
pub mod room;

/// Maximum distance (meters) between the door point and the nearest wall.
pub const DOOR_TOLERANCE: f64 = 1e-3;

/// Maximum distance (meters) between the first and last point of a closed ring.
pub const CLOSURE_TOLERANCE: f64 = 1e-6;

/// Maximum coordinate drift (meters) for an edge to still count as axis-aligned.
pub const AXIS_TOLERANCE: f64 = 1e-6;
