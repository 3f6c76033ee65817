//! Deterministic room rasterization.
//!
//! A room is rendered into a fixed [`IMG_SIZE`] × [`IMG_SIZE`] image with three
//! channels (see [`Channel`]). The longest bounding-box side is scaled to
//! [`FIT_SIZE`] pixels and the shape is centered, so absolute size is discarded
//! and only the shape survives; size re-enters the model through the area
//! feature.
//!
//! All geometric predicates are evaluated at pixel centers in coordinates
//! relative to the canvas center. This makes the rasterizer exactly
//! equivariant under the symmetries of the square: rasterizing a flipped or
//! rotated room yields the flipped or rotated image (see [`Dihedral`]).

pub use self::{augment::*, image::*, rasterize::*};

mod augment;
mod image;
mod rasterize;

/// Output image side length in pixels.
pub const IMG_SIZE: usize = 64;

/// Number of pixels the longest bounding-box side spans.
pub const FIT_SIZE: f64 = 60.0;

/// Standard deviation (pixels) of the door marker.
pub const DOOR_SIGMA: f64 = 2.0;
