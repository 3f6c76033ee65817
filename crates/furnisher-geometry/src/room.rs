use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::{ApartmentType, GeometryFeatures, RoomGeometry, RoomType};

/// Stable apartment identifier ("seed"); the unit of dataset partitioning.
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
    derive_more::From,
)]
#[serde(transparent)]
pub struct ApartmentId(pub i64);

/// One scored room.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub apartment: ApartmentId,
    pub room_type: RoomType,
    pub apartment_type: Option<ApartmentType>,
    pub geometry: RoomGeometry,
    /// Ground-truth placement score in `[0, 100]`.
    pub score: Option<f32>,
}

impl Room {
    #[must_use]
    pub fn features(&self) -> GeometryFeatures {
        GeometryFeatures::new(&self.geometry)
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ApartmentError {
    #[display("apartment {apartment} already has a {room_type} room")]
    DuplicateRoomType {
        apartment: ApartmentId,
        room_type: RoomType,
    },
    #[display("room belongs to apartment {found}, not {apartment}")]
    ForeignRoom {
        apartment: ApartmentId,
        found: ApartmentId,
    },
}

/// An apartment and its rooms, kept in room-type order.
#[derive(Debug, Clone, PartialEq)]
pub struct Apartment {
    pub id: ApartmentId,
    pub apartment_type: ApartmentType,
    rooms: ArrayVec<Room, { RoomType::LEN }>,
}

impl Apartment {
    #[must_use]
    pub fn new(id: ApartmentId, apartment_type: ApartmentType) -> Self {
        Self {
            id,
            apartment_type,
            rooms: ArrayVec::new(),
        }
    }

    /// Inserts a room at its room-type position.
    ///
    /// There is at most one room per type, so capacity can never overflow.
    pub fn add_room(&mut self, room: Room) -> Result<(), ApartmentError> {
        if room.apartment != self.id {
            return Err(ApartmentError::ForeignRoom {
                apartment: self.id,
                found: room.apartment,
            });
        }
        match self
            .rooms
            .binary_search_by_key(&room.room_type, |r| r.room_type)
        {
            Ok(_) => Err(ApartmentError::DuplicateRoomType {
                apartment: self.id,
                room_type: room.room_type,
            }),
            Err(pos) => {
                self.rooms.insert(pos, room);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn into_rooms(self) -> impl Iterator<Item = Room> {
        self.rooms.into_iter()
    }
}
