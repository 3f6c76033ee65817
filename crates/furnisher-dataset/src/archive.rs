//! Pre-rasterized dataset archive.
//!
//! All columns are index-aligned: row `i` of every column describes the same
//! room. The archive is stored as MessagePack compressed with zstd, and the
//! alignment is validated whenever an archive is built or opened.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::{self, Cursor},
    num::NonZero,
    path::{Path, PathBuf},
    thread,
};

use furnisher_geometry::{ApartmentId, ApartmentType, GeometryFeatures, Room, RoomType, TabularFeature};
use furnisher_raster::{RasterImage, rasterize};
use furnisher_stats::standardization::Standardization;
use serde::{Deserialize, Serialize};

use crate::split::{Split, SplitAssignment};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ArchiveError {
    #[display("failed to read archive {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("failed to write archive {}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[display("failed to encode archive")]
    Encode { source: rmp_serde::encode::Error },
    #[display("failed to decode archive")]
    Decode { source: rmp_serde::decode::Error },
    #[display("column '{column}' has {found} entries, expected {expected}")]
    Misaligned {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    #[display("column '{column}' row {row} holds out-of-range value {value}")]
    InvalidValue {
        column: &'static str,
        row: usize,
        value: u8,
    },
}

/// Column-oriented table of rasterized rooms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetArchive {
    /// `N × 3 × 64 × 64` bytes, channel-major per image.
    pub images: Vec<u8>,
    pub scores: Vec<f32>,
    pub room_type_idx: Vec<u8>,
    pub apartment_type_idx: Vec<u8>,
    pub area: Vec<f32>,
    pub door_rel_x: Vec<f32>,
    pub door_rel_y: Vec<f32>,
    pub aspect_ratio: Vec<f32>,
    pub n_vertices: Vec<u8>,
    pub apartment_seeds: Vec<i64>,
}

/// One row of a [`DatasetArchive`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRow {
    pub image: RasterImage,
    pub score: f32,
    pub room_type: RoomType,
    pub apartment_type: ApartmentType,
    pub features: GeometryFeatures,
    pub apartment: ApartmentId,
}

fn rasterize_parallel(rooms: &[&Room]) -> Vec<RasterImage> {
    let workers = thread::available_parallelism().map_or(1, NonZero::get);
    let chunk_size = rooms.len().div_ceil(workers).max(1);
    thread::scope(|s| {
        let handles = rooms
            .chunks(chunk_size)
            .map(|chunk| {
                s.spawn(move || {
                    chunk
                        .iter()
                        .map(|room| rasterize(&room.geometry))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

impl DatasetArchive {
    /// Rasterizes scored rooms, in order. Unscored rooms are skipped.
    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn build<'a, I>(rooms: I) -> Self
    where
        I: IntoIterator<Item = &'a Room>,
    {
        let rooms = rooms
            .into_iter()
            .filter(|r| r.score.is_some())
            .collect::<Vec<_>>();
        log::info!("rasterizing {} rooms", rooms.len());
        let images = rasterize_parallel(&rooms);

        let mut archive = Self {
            images: Vec::with_capacity(rooms.len() * RasterImage::LEN),
            ..Self::default()
        };
        for (room, image) in rooms.iter().zip(&images) {
            let features = room.features();
            archive.images.extend_from_slice(image.as_bytes());
            archive.scores.push(room.score.unwrap_or_default());
            archive.room_type_idx.push(room.room_type.index() as u8);
            archive
                .apartment_type_idx
                .push(room.apartment_type.unwrap_or_default().index() as u8);
            archive.area.push(features.area as f32);
            archive.door_rel_x.push(features.door_rel_x as f32);
            archive.door_rel_y.push(features.door_rel_y as f32);
            archive.aspect_ratio.push(features.aspect_ratio as f32);
            archive.n_vertices.push(features.n_vertices as u8);
            archive.apartment_seeds.push(room.apartment.0);
        }
        archive
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Checks that every column has one entry per row and categories are in range.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        let expected = self.len();
        let check = |column, found| {
            if found == expected {
                Ok(())
            } else {
                Err(ArchiveError::Misaligned {
                    column,
                    expected,
                    found,
                })
            }
        };
        check("room_type_idx", self.room_type_idx.len())?;
        check("apartment_type_idx", self.apartment_type_idx.len())?;
        check("area", self.area.len())?;
        check("door_rel_x", self.door_rel_x.len())?;
        check("door_rel_y", self.door_rel_y.len())?;
        check("aspect_ratio", self.aspect_ratio.len())?;
        check("n_vertices", self.n_vertices.len())?;
        check("apartment_seeds", self.apartment_seeds.len())?;
        if self.images.len() != expected * RasterImage::LEN {
            return Err(ArchiveError::Misaligned {
                column: "images",
                expected,
                found: self.images.len() / RasterImage::LEN,
            });
        }

        let in_range = |column, values: &[u8], len| {
            values
                .iter()
                .position(|&v| usize::from(v) >= len)
                .map_or(Ok(()), |row| {
                    Err(ArchiveError::InvalidValue {
                        column,
                        row,
                        value: values[row],
                    })
                })
        };
        in_range("room_type_idx", &self.room_type_idx, RoomType::LEN)?;
        in_range("apartment_type_idx", &self.apartment_type_idx, ApartmentType::LEN)?;
        Ok(())
    }

    #[must_use]
    pub fn image(&self, row: usize) -> Option<RasterImage> {
        let start = row.checked_mul(RasterImage::LEN)?;
        RasterImage::from_bytes(self.images.get(start..start + RasterImage::LEN)?)
    }

    #[must_use]
    pub fn row(&self, row: usize) -> Option<ArchiveRow> {
        Some(ArchiveRow {
            image: self.image(row)?,
            score: *self.scores.get(row)?,
            room_type: RoomType::from_index(usize::from(*self.room_type_idx.get(row)?))?,
            apartment_type: ApartmentType::from_index(usize::from(
                *self.apartment_type_idx.get(row)?,
            ))?,
            features: GeometryFeatures {
                area: f64::from(*self.area.get(row)?),
                aspect_ratio: f64::from(*self.aspect_ratio.get(row)?),
                n_vertices: usize::from(*self.n_vertices.get(row)?),
                door_rel_x: f64::from(*self.door_rel_x.get(row)?),
                door_rel_y: f64::from(*self.door_rel_y.get(row)?),
            },
            apartment: ApartmentId(*self.apartment_seeds.get(row)?),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ArchiveRow> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }

    /// Rows whose apartment belongs to `split`, in their original order.
    ///
    /// Fails on a misaligned archive.
    pub fn subset(
        &self,
        assignment: &SplitAssignment,
        split: Split,
    ) -> Result<Self, ArchiveError> {
        self.validate()?;
        let keep = self
            .apartment_seeds
            .iter()
            .enumerate()
            .filter(|&(_, &seed)| assignment.get(ApartmentId(seed)) == Some(split))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        Ok(self.select(&keep))
    }

    fn select(&self, rows: &[usize]) -> Self {
        fn pick<T: Copy>(column: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&i| column[i]).collect()
        }
        Self {
            images: rows
                .iter()
                .flat_map(|&i| &self.images[i * RasterImage::LEN..(i + 1) * RasterImage::LEN])
                .copied()
                .collect(),
            scores: pick(&self.scores, rows),
            room_type_idx: pick(&self.room_type_idx, rows),
            apartment_type_idx: pick(&self.apartment_type_idx, rows),
            area: pick(&self.area, rows),
            door_rel_x: pick(&self.door_rel_x, rows),
            door_rel_y: pick(&self.door_rel_y, rows),
            aspect_ratio: pick(&self.aspect_ratio, rows),
            n_vertices: pick(&self.n_vertices, rows),
            apartment_seeds: pick(&self.apartment_seeds, rows),
        }
    }

    /// Distinct apartment identifiers present in the archive.
    #[must_use]
    pub fn apartments(&self) -> BTreeSet<ApartmentId> {
        self.apartment_seeds.iter().copied().map(ApartmentId).collect()
    }

    /// Z-score parameters for the standardized features among `features`.
    ///
    /// Call this on the training subset only.
    #[must_use]
    pub fn normalization(
        &self,
        features: &[TabularFeature],
    ) -> BTreeMap<TabularFeature, Standardization> {
        features
            .iter()
            .filter(|f| f.is_standardized())
            .filter_map(|&feature| {
                let z = Standardization::fit(self.rows().map(|r| r.features.get(feature)))?;
                Some((feature, z))
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        self.validate()?;
        let packed = rmp_serde::to_vec_named(self).map_err(|source| ArchiveError::Encode { source })?;
        let write = || -> io::Result<()> {
            let compressed = zstd::encode_all(Cursor::new(packed), ZSTD_LEVEL)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, compressed)
        };
        write().map_err(|source| ArchiveError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("saved {} rows to {}", self.len(), path.display());
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let read = || -> io::Result<Vec<u8>> { zstd::decode_all(Cursor::new(fs::read(path)?)) };
        let packed = read().map_err(|source| ArchiveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let archive: Self =
            rmp_serde::from_slice(&packed).map_err(|source| ArchiveError::Decode { source })?;
        archive.validate()?;
        log::debug!("opened {} rows from {}", archive.len(), path.display());
        Ok(archive)
    }
}
