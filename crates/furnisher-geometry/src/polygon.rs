//! Validated room outlines.
//!
//! A [`Polygon`] is constructed from a closed ring of points and rejects any
//! outline the rest of the pipeline cannot handle. A [`RoomGeometry`] pairs a
//! polygon with a door point lying on one of its walls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AXIS_TOLERANCE, CLOSURE_TOLERANCE, DOOR_TOLERANCE};

/// Reasons a polygon or door position is rejected.
///
/// Every variant is an invalid-geometry condition. These are reported to the
/// immediate caller and never retried.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum GeometryError {
    #[display("polygon has a non-finite coordinate")]
    NonFinite,
    #[display("polygon is not closed (first vertex {first}, last vertex {last})")]
    NotClosed { first: Point, last: Point },
    #[display("polygon has {count} unique vertices, at least 4 are required")]
    TooFewVertices { count: usize },
    #[display("polygon has {count} unique vertices, expected 4, 6 or 8")]
    UnsupportedVertexCount { count: usize },
    #[display("edge {index} has zero length")]
    DegenerateEdge { index: usize },
    #[display("edge {index} is not axis-aligned")]
    NonAxisAlignedEdge { index: usize },
    #[display("edges {index} and {} are collinear", index + 1)]
    CollinearEdges { index: usize },
    #[display("edges {first} and {second} intersect")]
    SelfIntersecting { first: usize, second: usize },
    #[display("door {door} is {distance:.4} m away from the nearest wall")]
    DoorOffBoundary { door: Point, distance: f64 },
}

/// A point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for an empty input.
    #[must_use]
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        });
        Some(Self { min, max })
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    #[must_use]
    pub fn longest_side(&self) -> f64 {
        self.width().max(self.height())
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.min.x.max(other.min.x) <= self.max.x.min(other.max.x)
            && self.min.y.max(other.min.y) <= self.max.y.min(other.max.y)
    }
}

/// Direction of an axis-aligned edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A directed polygon edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub start: Point,
    pub end: Point,
}

impl Edge {
    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Orientation of the edge, or `None` if it is neither horizontal nor vertical.
    #[must_use]
    pub fn orientation(&self) -> Option<Orientation> {
        let dx = (self.end.x - self.start.x).abs();
        let dy = (self.end.y - self.start.y).abs();
        if dy <= AXIS_TOLERANCE && dx > AXIS_TOLERANCE {
            Some(Orientation::Horizontal)
        } else if dx <= AXIS_TOLERANCE && dy > AXIS_TOLERANCE {
            Some(Orientation::Vertical)
        } else {
            None
        }
    }

    /// Euclidean distance from `p` to the closest point of the segment.
    #[must_use]
    pub fn distance_to(&self, p: Point) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.start.distance(p);
        }
        let t = (((p.x - self.start.x) * dx + (p.y - self.start.y) * dy) / len_sq).clamp(0.0, 1.0);
        p.distance(Point::new(self.start.x + t * dx, self.start.y + t * dy))
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min: Point::new(self.start.x.min(self.end.x), self.start.y.min(self.end.y)),
            max: Point::new(self.start.x.max(self.end.x), self.start.y.max(self.end.y)),
        }
    }
}

/// A closed, simple, axis-aligned polygon with 4, 6 or 8 vertices.
///
/// Either winding is accepted. The closing vertex is not stored; use
/// [`Polygon::to_ring`] to get the closed representation back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Vertex counts of the supported shape families (rectangle, single cut, double cut).
    pub const SUPPORTED_VERTEX_COUNTS: [usize; 3] = [4, 6, 8];

    /// Validates a closed ring (first point equal to last point).
    pub fn new(ring: Vec<Point>) -> Result<Self, GeometryError> {
        if !ring.iter().all(|p| p.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        let (Some(&first), Some(&last)) = (ring.first(), ring.last()) else {
            return Err(GeometryError::TooFewVertices { count: 0 });
        };
        if ring.len() < 2 || first.distance(last) > CLOSURE_TOLERANCE {
            return Err(GeometryError::NotClosed { first, last });
        }

        let mut vertices = ring;
        vertices.pop();
        let count = vertices.len();
        if count < 4 {
            return Err(GeometryError::TooFewVertices { count });
        }
        if !Self::SUPPORTED_VERTEX_COUNTS.contains(&count) {
            return Err(GeometryError::UnsupportedVertexCount { count });
        }

        let polygon = Self { vertices };
        polygon.check_edges()?;
        polygon.check_simple()?;
        Ok(polygon)
    }

    /// Like [`Polygon::new`], but appends the first point when the ring is open.
    pub fn closing(mut points: Vec<Point>) -> Result<Self, GeometryError> {
        if let (Some(&first), Some(&last)) = (points.first(), points.last())
            && (points.len() == 1 || first.distance(last) > CLOSURE_TOLERANCE)
        {
            points.push(first);
        }
        Self::new(points)
    }

    fn check_edges(&self) -> Result<(), GeometryError> {
        let orientations = self
            .edges()
            .enumerate()
            .map(|(index, edge)| {
                if edge.length() <= AXIS_TOLERANCE {
                    return Err(GeometryError::DegenerateEdge { index });
                }
                edge.orientation()
                    .ok_or(GeometryError::NonAxisAlignedEdge { index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n = orientations.len();
        for index in 0..n {
            if orientations[index] == orientations[(index + 1) % n] {
                return Err(GeometryError::CollinearEdges { index });
            }
        }
        Ok(())
    }

    fn check_simple(&self) -> Result<(), GeometryError> {
        let boxes = self.edges().map(|e| e.bounding_box()).collect::<Vec<_>>();
        let n = boxes.len();
        for first in 0..n {
            for second in (first + 2)..n {
                if first == 0 && second == n - 1 {
                    continue;
                }
                // axis-aligned segments intersect iff their bounding boxes overlap
                if boxes[first].overlaps(&boxes[second]) {
                    return Err(GeometryError::SelfIntersecting { first, second });
                }
            }
        }
        Ok(())
    }

    /// Unique vertices, without the closing point.
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Closed ring with the first vertex repeated at the end.
    #[must_use]
    pub fn to_ring(&self) -> Vec<Point> {
        let mut ring = self.vertices.clone();
        ring.extend(self.vertices.first().copied());
        ring
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| Edge {
            start: self.vertices[i],
            end: self.vertices[(i + 1) % n],
        })
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        // a validated polygon always has vertices
        BoundingBox::from_points(self.vertices.iter().copied()).unwrap_or(BoundingBox {
            min: Point::default(),
            max: Point::default(),
        })
    }

    /// Shoelace sum: positive for counter-clockwise rings.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        self.edges()
            .map(|e| e.start.x * e.end.y - e.end.x * e.start.y)
            .sum::<f64>()
            / 2.0
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    #[must_use]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Distance from `p` to the nearest edge.
    #[must_use]
    pub fn distance_to_boundary(&self, p: Point) -> f64 {
        self.edges()
            .map(|e| e.distance_to(p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Even-odd containment test for points not on the boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        let mut inside = false;
        for e in self.edges() {
            let (a, b) = (e.start, e.end);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

impl TryFrom<Vec<Point>> for Polygon {
    type Error = GeometryError;

    fn try_from(ring: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(ring)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.to_ring()
    }
}

/// A validated polygon together with a door point on its boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRoomGeometry", into = "RawRoomGeometry")]
pub struct RoomGeometry {
    polygon: Polygon,
    door: Point,
}

#[derive(Serialize, Deserialize)]
struct RawRoomGeometry {
    polygon: Polygon,
    door: Point,
}

impl RoomGeometry {
    pub fn new(polygon: Polygon, door: Point) -> Result<Self, GeometryError> {
        if !door.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        let distance = polygon.distance_to_boundary(door);
        if distance > DOOR_TOLERANCE {
            return Err(GeometryError::DoorOffBoundary { door, distance });
        }
        Ok(Self { polygon, door })
    }

    /// Validates a raw ring and door in one step.
    pub fn from_ring(ring: Vec<Point>, door: Point) -> Result<Self, GeometryError> {
        Self::new(Polygon::new(ring)?, door)
    }

    #[must_use]
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    #[must_use]
    pub fn door(&self) -> Point {
        self.door
    }
}

impl TryFrom<RawRoomGeometry> for RoomGeometry {
    type Error = GeometryError;

    fn try_from(raw: RawRoomGeometry) -> Result<Self, Self::Error> {
        Self::new(raw.polygon, raw.door)
    }
}

impl From<RoomGeometry> for RawRoomGeometry {
    fn from(geometry: RoomGeometry) -> Self {
        Self {
            polygon: geometry.polygon,
            door: geometry.door,
        }
    }
}
