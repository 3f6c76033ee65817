use furnisher_geometry::{BoundingBox, Orientation, Point, RoomGeometry};

use crate::{Channel, DOOR_SIGMA, FIT_SIZE, IMG_SIZE, RasterImage};

#[expect(clippy::cast_precision_loss)]
const HALF: f64 = IMG_SIZE as f64 / 2.0;

/// Offset of pixel `index`'s center from the canvas center, along one axis.
#[expect(clippy::cast_precision_loss)]
fn pixel_center(index: usize) -> f64 {
    index as f64 + 0.5 - HALF
}

/// Maps room coordinates (meters, y up) to canvas coordinates (pixels, y
/// down) measured from the canvas center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasTransform {
    scale: f64,
    center: Point,
}

impl CanvasTransform {
    /// Fits the bounding box's longest side to [`FIT_SIZE`] pixels, centered.
    #[must_use]
    pub fn fit(bbox: &BoundingBox) -> Self {
        Self {
            scale: FIT_SIZE / bbox.longest_side(),
            center: bbox.center(),
        }
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// `(u, v)` offsets from the canvas center; `v` grows downwards.
    #[must_use]
    pub fn apply(&self, p: Point) -> (f64, f64) {
        (
            self.scale * (p.x - self.center.x),
            self.scale * (self.center.y - p.y),
        )
    }

    /// Absolute canvas position (column, row axis) of a point.
    #[must_use]
    pub fn to_pixel(&self, p: Point) -> (f64, f64) {
        let (u, v) = self.apply(p);
        (u + HALF, v + HALF)
    }
}

/// An axis-aligned edge on the canvas.
#[derive(Debug, Clone, Copy)]
struct CanvasEdge {
    orientation: Orientation,
    /// Coordinate across the edge (`v` for horizontal, `u` for vertical).
    at: f64,
    /// Extent along the edge.
    lo: f64,
    hi: f64,
    /// Whether the interior lies on the positive side of `at`.
    interior_positive: bool,
}

impl CanvasEdge {
    fn contains(&self, u: f64, v: f64) -> bool {
        let (across, along) = match self.orientation {
            Orientation::Horizontal => (v, u),
            Orientation::Vertical => (u, v),
        };
        across == self.at && self.lo <= along && along <= self.hi
    }
}

struct CanvasPolygon {
    edges: Vec<CanvasEdge>,
}

impl CanvasPolygon {
    fn new(geometry: &RoomGeometry, transform: &CanvasTransform) -> Self {
        let polygon = geometry.polygon();
        let points = polygon
            .vertices()
            .iter()
            .map(|&p| transform.apply(p))
            .collect::<Vec<_>>();
        let n = points.len();
        let signed_area = (0..n)
            .map(|i| {
                let (u0, v0) = points[i];
                let (u1, v1) = points[(i + 1) % n];
                u0 * v1 - u1 * v0
            })
            .sum::<f64>();
        let ccw = signed_area > 0.0;

        let edges = polygon
            .edges()
            .zip(0..n)
            .filter_map(|(edge, i)| {
                let (u0, v0) = points[i];
                let (u1, v1) = points[(i + 1) % n];
                // interior lies to the left of each edge of a counter-clockwise ring
                let edge = match edge.orientation()? {
                    Orientation::Horizontal => CanvasEdge {
                        orientation: Orientation::Horizontal,
                        at: (v0 + v1) / 2.0,
                        lo: u0.min(u1),
                        hi: u0.max(u1),
                        interior_positive: (u1 > u0) == ccw,
                    },
                    Orientation::Vertical => CanvasEdge {
                        orientation: Orientation::Vertical,
                        at: (u0 + u1) / 2.0,
                        lo: v0.min(v1),
                        hi: v0.max(v1),
                        interior_positive: (v1 < v0) == ccw,
                    },
                };
                Some(edge)
            })
            .collect();
        Self { edges }
    }

    fn on_boundary(&self, u: f64, v: f64) -> bool {
        self.edges.iter().any(|e| e.contains(u, v))
    }

    /// Even-odd test against a ray towards `+u`; exact for points off the boundary.
    fn inside(&self, u: f64, v: f64) -> bool {
        self.edges
            .iter()
            .filter(|e| e.orientation == Orientation::Vertical)
            .filter(|e| e.lo <= v && v < e.hi && u < e.at)
            .count()
            % 2
            == 1
    }

    fn covers(&self, u: f64, v: f64) -> bool {
        self.on_boundary(u, v) || self.inside(u, v)
    }
}

/// Renders a room into a three-channel image.
///
/// - mask: pixel centers inside or on the polygon
/// - boundary: for each wall, the row (or column) of pixels just inside it
/// - door: Gaussian of [`DOOR_SIGMA`] pixels around the door, scaled to `0..=255`
#[must_use]
pub fn rasterize(geometry: &RoomGeometry) -> RasterImage {
    let transform = CanvasTransform::fit(&geometry.polygon().bounding_box());
    let polygon = CanvasPolygon::new(geometry, &transform);
    let mut image = RasterImage::blank();

    for row in 0..IMG_SIZE {
        let v = pixel_center(row);
        for col in 0..IMG_SIZE {
            if polygon.covers(pixel_center(col), v) {
                image.set(Channel::Mask, row, col, 255);
            }
        }
    }

    for edge in &polygon.edges {
        draw_wall(&mut image, edge);
    }

    let (du, dv) = transform.apply(geometry.door());
    let denom = 2.0 * DOOR_SIGMA * DOOR_SIGMA;
    for row in 0..IMG_SIZE {
        let dy = pixel_center(row) - dv;
        for col in 0..IMG_SIZE {
            let dx = pixel_center(col) - du;
            let value = (-(dx * dx + dy * dy) / denom).exp() * 255.0;
            image.set(Channel::Door, row, col, to_byte(value));
        }
    }

    image
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

fn draw_wall(image: &mut RasterImage, edge: &CanvasEdge) {
    // first pixel line whose centers are on the interior side of (or on) the wall
    let line = if edge.interior_positive {
        (0..IMG_SIZE).find(|&i| pixel_center(i) >= edge.at)
    } else {
        (0..IMG_SIZE).rev().find(|&i| pixel_center(i) <= edge.at)
    };
    let Some(line) = line else {
        return;
    };
    for i in (0..IMG_SIZE).filter(|&i| (edge.lo..=edge.hi).contains(&pixel_center(i))) {
        let (row, col) = match edge.orientation {
            Orientation::Horizontal => (line, i),
            Orientation::Vertical => (i, line),
        };
        image.set(Channel::Boundary, row, col, 255);
    }
}

#[cfg(test)]
mod tests {
    use furnisher_geometry::{GeometryFeatures, Polygon};
    use proptest::prelude::*;

    use super::*;

    fn room(coords: &[(f64, f64)], door: (f64, f64)) -> RoomGeometry {
        let points = coords.iter().map(|&(x, y)| Point::new(x, y)).collect();
        RoomGeometry::new(Polygon::closing(points).unwrap(), Point::new(door.0, door.1)).unwrap()
    }

    fn rectangle(w: f64, h: f64, door: (f64, f64)) -> RoomGeometry {
        room(&[(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)], door)
    }

    #[test]
    fn test_square_fills_fit_box() {
        let image = rasterize(&rectangle(3.0, 3.0, (1.5, 0.0)));
        // pixel centers 2.5..=61.5 fall inside the 60px square spanning 2..62
        assert_eq!(image.occupied_bounds(Channel::Mask), Some((2, 61, 2, 61)));
        assert_eq!(image.count_nonzero(Channel::Mask), 60 * 60);
        assert_eq!(image.count_nonzero(Channel::Boundary), 4 * 60 - 4);
    }

    #[test]
    fn test_boundary_is_inside_mask() {
        let image = rasterize(&room(
            &[
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 2.0),
                (2.0, 2.0),
                (2.0, 3.0),
                (0.0, 3.0),
            ],
            (4.0, 1.0),
        ));
        let mask = image.channel(Channel::Mask);
        let boundary = image.channel(Channel::Boundary);
        assert!(
            boundary
                .iter()
                .zip(mask)
                .all(|(&b, &m)| b == 0 || m == 255)
        );
        assert!(image.count_nonzero(Channel::Boundary) > 0);
    }

    #[test]
    fn test_l_shape_notch_is_empty() {
        // 4 x 4 L-shape with the top-right 2 x 2 quadrant cut out
        let image = rasterize(&room(
            &[
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 2.0),
                (2.0, 2.0),
                (2.0, 4.0),
                (0.0, 4.0),
            ],
            (0.0, 1.0),
        ));
        // scale 15 px/m, canvas spans 2..62, notch covers rows 2..32, cols 32..62
        assert_eq!(image.get(Channel::Mask, 10, 50), 0);
        assert_eq!(image.get(Channel::Mask, 10, 10), 255);
        assert_eq!(image.get(Channel::Mask, 50, 50), 255);
        assert_eq!(image.count_nonzero(Channel::Mask), 60 * 60 - 30 * 30);
    }

    #[test]
    fn test_door_marker_peaks_at_door() {
        // door at canvas (32, 62): between pixel columns 31/32 on the bottom edge
        let image = rasterize(&rectangle(4.0, 4.0, (2.0, 0.0)));
        let peak = image.get(Channel::Door, 61, 31);
        assert_eq!(peak, image.get(Channel::Door, 61, 32));
        assert!(peak > 200);
        assert_eq!(image.get(Channel::Door, 0, 0), 0);
        let max = image.channel(Channel::Door).iter().copied().max().unwrap();
        assert_eq!(max, peak);
    }

    #[test]
    fn test_rasterize_is_deterministic() {
        let geometry = rectangle(3.52, 4.46, (0.0, 3.55));
        assert_eq!(rasterize(&geometry), rasterize(&geometry));
    }

    #[test]
    fn test_transform_centers_bounding_box() {
        let geometry = rectangle(2.0, 1.0, (1.0, 0.0));
        let transform = CanvasTransform::fit(&geometry.polygon().bounding_box());
        assert!((transform.scale() - 30.0).abs() < 1e-12);
        assert_eq!(transform.to_pixel(Point::new(0.0, 0.0)), (2.0, 47.0));
        assert_eq!(transform.to_pixel(Point::new(2.0, 1.0)), (62.0, 17.0));
    }

    proptest! {
        #[test]
        fn aspect_ratio_survives_rasterization(
            w in 1.0f64..8.0,
            h in 1.0f64..8.0,
            t in 0.0f64..1.0,
        ) {
            prop_assume!(w.max(h) / w.min(h) <= 4.0);
            let geometry = rectangle(w, h, (t * w, 0.0));
            let features = GeometryFeatures::new(&geometry);
            let image = rasterize(&geometry);
            let (r0, r1, c0, c1) = image.occupied_bounds(Channel::Mask).unwrap();
            #[expect(clippy::cast_precision_loss)]
            let (rows, cols) = ((r1 - r0 + 1) as f64, (c1 - c0 + 1) as f64);
            let measured = rows.max(cols) / rows.min(cols);
            let short_px = FIT_SIZE / features.aspect_ratio;
            prop_assert!((rows.max(cols) - FIT_SIZE).abs() <= 1.0);
            prop_assert!((measured - features.aspect_ratio).abs() <= features.aspect_ratio / (short_px - 1.0) + 1e-9);
        }
    }
}
