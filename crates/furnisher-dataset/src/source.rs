//! Loading apartments from the JSON-lines source.
//!
//! Each line is one apartment:
//!
//! ```json
//! {"seed": 17, "apt_type": "2-Bedroom", "rooms": [
//!   {"name": "Bedroom", "active": true, "points": [[0,0,0], ...], "door": [0,3.55,0], "score": 72.5}
//! ]}
//! ```
//!
//! z coordinates are dropped and inactive rooms are skipped. The source is
//! read once; the exact bytes that pass the integrity gate are the bytes that
//! are parsed.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use furnisher_geometry::{
    Apartment, ApartmentError, ApartmentId, ApartmentType, GeometryError, Point, Polygon, Room,
    RoomGeometry, RoomType, UnknownCategory,
};
use serde::Deserialize;

use crate::integrity::{DataManifest, IntegrityError, IntegrityGate, Verdict, sha256_hex};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SourceError {
    #[display("failed to read source {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("source rejected by integrity gate")]
    Integrity(IntegrityError),
    #[display("line {line}: invalid JSON")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[display("line {line}: invalid category label")]
    Category {
        line: usize,
        source: UnknownCategory,
    },
    #[display("line {line}: apartment {apartment}, {room_type} has invalid geometry")]
    Geometry {
        line: usize,
        apartment: ApartmentId,
        room_type: RoomType,
        source: GeometryError,
    },
    #[display("line {line}: coordinate needs at least two components")]
    ShortCoordinate { line: usize },
    #[display("line {line}: invalid apartment")]
    Apartment {
        line: usize,
        source: ApartmentError,
    },
}

impl From<IntegrityError> for SourceError {
    fn from(err: IntegrityError) -> Self {
        Self::Integrity(err)
    }
}

#[derive(Debug, Deserialize)]
struct RawApartment {
    seed: i64,
    apt_type: String,
    rooms: Vec<RawRoom>,
}

#[derive(Debug, Deserialize)]
struct RawRoom {
    name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    points: Vec<Vec<f64>>,
    #[serde(default)]
    door: Vec<f64>,
    score: Option<f32>,
}

fn planar(coords: &[f64], line: usize) -> Result<Point, SourceError> {
    match coords {
        [x, y, ..] => Ok(Point::new(*x, *y)),
        _ => Err(SourceError::ShortCoordinate { line }),
    }
}

fn parse_apartment(text: &str, line: usize) -> Result<Apartment, SourceError> {
    let raw: RawApartment =
        serde_json::from_str(text).map_err(|source| SourceError::Json { line, source })?;
    let id = ApartmentId(raw.seed);
    let apartment_type = raw
        .apt_type
        .parse::<ApartmentType>()
        .map_err(|source| SourceError::Category { line, source })?;

    let mut apartment = Apartment::new(id, apartment_type);
    for raw_room in raw.rooms.into_iter().filter(|r| r.active) {
        let room_type = raw_room
            .name
            .parse::<RoomType>()
            .map_err(|source| SourceError::Category { line, source })?;
        let Some(score) = raw_room.score else {
            log::warn!("line {line}: active {room_type} of apartment {id} has no score, skipping");
            continue;
        };
        let ring = raw_room
            .points
            .iter()
            .map(|p| planar(p, line))
            .collect::<Result<Vec<_>, _>>()?;
        let door = planar(&raw_room.door, line)?;
        let geometry = Polygon::new(ring)
            .and_then(|polygon| RoomGeometry::new(polygon, door))
            .map_err(|source| SourceError::Geometry {
                line,
                apartment: id,
                room_type,
                source,
            })?;
        apartment
            .add_room(Room {
                apartment: id,
                room_type,
                apartment_type: Some(apartment_type),
                geometry,
                score: Some(score),
            })
            .map_err(|source| SourceError::Apartment { line, source })?;
    }
    Ok(apartment)
}

/// Parses every non-blank line of `text` into an apartment.
pub fn parse_apartments(text: &str) -> Result<Vec<Apartment>, SourceError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| parse_apartment(l, i + 1))
        .collect()
}

/// Apartments loaded through the integrity gate.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub apartments: Vec<Apartment>,
    pub manifest: DataManifest,
}

impl SourceData {
    #[must_use]
    pub fn active_rooms(&self) -> usize {
        self.apartments.iter().map(|a| a.rooms().len()).sum()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.apartments.iter().flat_map(Apartment::rooms)
    }
}

/// Reads, verifies and parses the source.
///
/// The manifest is written on first use and after an explicit update; a
/// matching load leaves it untouched.
pub fn load_source(path: &Path, gate: &IntegrityGate) -> Result<SourceData, SourceError> {
    let bytes = fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let sha256 = sha256_hex(&bytes);
    let verdict = gate.check(path, &sha256)?;

    let text = String::from_utf8_lossy(&bytes);
    let apartments = parse_apartments(&text)?;
    let active_rooms = apartments.iter().map(|a| a.rooms().len()).sum();
    log::info!(
        "loaded {} apartments with {active_rooms} active rooms from {}",
        apartments.len(),
        path.display()
    );

    let manifest = match verdict {
        Verdict::Matched(manifest) => manifest,
        Verdict::FirstUse | Verdict::Updated { .. } => {
            let manifest = DataManifest::today(path, sha256, apartments.len(), active_rooms);
            gate.write_manifest(&manifest)?;
            log::info!("wrote manifest {}", gate.manifest_path().display());
            manifest
        }
    };

    Ok(SourceData {
        apartments,
        manifest,
    })
}
