//! Golden regression fixtures.
//!
//! Each fixture room records the score every named checkpoint produced for it
//! when the fixture was recorded. A checkpoint reproduces its fixtures when
//! every score is within [`GOLDEN_TOLERANCE`].

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use furnisher_geometry::Point;
use serde::{Deserialize, Serialize};

use crate::engine::RoomQuery;

pub const GOLDEN_TOLERANCE: f32 = 0.01;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum FixtureError {
    #[display("failed to read fixtures {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("failed to parse fixtures {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("failed to write fixtures {}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRoom {
    pub name: String,
    pub room_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment_type: Option<String>,
    /// Closed ring in meters.
    pub polygon: Vec<Point>,
    pub door: Point,
    /// Recorded score per checkpoint name.
    #[serde(default)]
    pub expected_scores: BTreeMap<String, f32>,
}

impl FixtureRoom {
    #[must_use]
    pub fn query(&self) -> RoomQuery<'_> {
        RoomQuery {
            polygon: &self.polygon,
            door: self.door,
            room_type: &self.room_type,
            apartment_type: self.apartment_type.as_deref(),
        }
    }
}

pub fn read_fixtures(path: &Path) -> Result<Vec<FixtureRoom>, FixtureError> {
    let text = fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_fixtures(path: &Path, rooms: &[FixtureRoom]) -> Result<(), FixtureError> {
    let write = || -> io::Result<()> {
        let mut json = serde_json::to_string_pretty(rooms).map_err(io::Error::other)?;
        json.push('\n');
        fs::write(path, json)
    };
    write().map_err(|source| FixtureError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_format() {
        let json = r#"[{
            "name": "bedroom",
            "room_type": "Bedroom",
            "polygon": [[0, 0], [3.52, 0], [3.52, 4.46], [0, 4.46], [0, 0]],
            "door": [0.0, 3.55],
            "expected_scores": {"cnn-v1": 71.25}
        }]"#;
        let rooms: Vec<FixtureRoom> = serde_json::from_str(json).unwrap();
        assert_eq!(rooms[0].polygon.len(), 5);
        assert_eq!(rooms[0].expected_scores["cnn-v1"], 71.25);
        let query = rooms[0].query();
        assert_eq!(query.apartment_type, None);
        assert_eq!(query.door, Point::new(0.0, 3.55));

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rooms.json");
        write_fixtures(&path, &rooms).unwrap();
        assert_eq!(read_fixtures(&path).unwrap(), rooms);
        assert!(!fs::read_to_string(&path).unwrap().contains("apartment_type"));
    }
}
