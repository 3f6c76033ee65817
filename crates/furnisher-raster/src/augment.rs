use furnisher_geometry::{GeometryError, Point, Polygon, RoomGeometry};
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::{IMG_SIZE, RasterImage};

const LAST: usize = IMG_SIZE - 1;

/// An element of the symmetry group of the square.
///
/// Applied as: horizontal flip, then vertical flip, then `quarter_turns`
/// counter-clockwise rotations. The same transform acts on images and on
/// room geometry, and rasterization commutes with it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dihedral {
    pub flip_h: bool,
    pub flip_v: bool,
    pub quarter_turns: u8,
}

impl Dihedral {
    pub const IDENTITY: Self = Self {
        flip_h: false,
        flip_v: false,
        quarter_turns: 0,
    };

    #[must_use]
    pub const fn rotation(quarter_turns: u8) -> Self {
        Self {
            flip_h: false,
            flip_v: false,
            quarter_turns,
        }
    }

    #[must_use]
    pub fn apply_point(&self, p: Point) -> Point {
        let mut p = p;
        if self.flip_h {
            p = Point::new(-p.x, p.y);
        }
        if self.flip_v {
            p = Point::new(p.x, -p.y);
        }
        for _ in 0..self.quarter_turns % 4 {
            p = Point::new(-p.y, p.x);
        }
        p
    }

    /// Transforms a room; the result is re-validated.
    pub fn apply_geometry(&self, geometry: &RoomGeometry) -> Result<RoomGeometry, GeometryError> {
        let ring = geometry
            .polygon()
            .to_ring()
            .into_iter()
            .map(|p| self.apply_point(p))
            .collect();
        RoomGeometry::new(Polygon::new(ring)?, self.apply_point(geometry.door()))
    }

    #[must_use]
    pub fn apply_image(&self, image: &RasterImage) -> RasterImage {
        let mut out = image.clone();
        if self.flip_h {
            out = out.remap(|row, col| (row, LAST - col));
        }
        if self.flip_v {
            out = out.remap(|row, col| (LAST - row, col));
        }
        for _ in 0..self.quarter_turns % 4 {
            out = out.remap(|row, col| (col, LAST - row));
        }
        out
    }
}

/// Seedable sampler of random symmetries for training-time augmentation.
///
/// Each flip is taken with probability 0.5 and the rotation is uniform over
/// the four quarter turns.
#[derive(Debug, Clone)]
pub struct Augmenter {
    rng: Pcg32,
}

impl Augmenter {
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self) -> Dihedral {
        Dihedral {
            flip_h: self.rng.random_bool(0.5),
            flip_v: self.rng.random_bool(0.5),
            quarter_turns: self.rng.random_range(0..4),
        }
    }

    pub fn augment(&mut self, image: &RasterImage) -> RasterImage {
        self.sample().apply_image(image)
    }
}
