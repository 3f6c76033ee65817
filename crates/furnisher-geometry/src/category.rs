//! Closed categorical enumerations.
//!
//! Both enumerations are fixed: their order defines the integer indices used
//! by embeddings and one-hot encodings, so variants must never be reordered.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Which enumeration a label was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum CategoryKind {
    #[display("room type")]
    RoomType,
    #[display("apartment type")]
    ApartmentType,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown {kind} '{label}'")]
pub struct UnknownCategory {
    pub kind: CategoryKind,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Bedroom,
    #[serde(rename = "Living room")]
    LivingRoom,
    Bathroom,
    #[serde(rename = "WC")]
    Wc,
    Kitchen,
    #[serde(rename = "Children 1")]
    Children1,
    #[serde(rename = "Children 2")]
    Children2,
    #[serde(rename = "Children 3")]
    Children3,
    #[serde(rename = "Children 4")]
    Children4,
}

impl RoomType {
    pub const LEN: usize = 9;

    pub const ALL: [Self; Self::LEN] = [
        Self::Bedroom,
        Self::LivingRoom,
        Self::Bathroom,
        Self::Wc,
        Self::Kitchen,
        Self::Children1,
        Self::Children2,
        Self::Children3,
        Self::Children4,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bedroom => "Bedroom",
            Self::LivingRoom => "Living room",
            Self::Bathroom => "Bathroom",
            Self::Wc => "WC",
            Self::Kitchen => "Kitchen",
            Self::Children1 => "Children 1",
            Self::Children2 => "Children 2",
            Self::Children3 => "Children 3",
            Self::Children4 => "Children 4",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RoomType {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.label() == s)
            .ok_or_else(|| UnknownCategory {
                kind: CategoryKind::RoomType,
                label: s.to_owned(),
            })
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ApartmentType {
    #[serde(rename = "Studio (bedroom)")]
    StudioBedroom,
    #[serde(rename = "Studio (living)")]
    StudioLiving,
    #[serde(rename = "1-Bedroom")]
    OneBedroom,
    /// The most common apartment type; used when a caller gives none.
    #[default]
    #[serde(rename = "2-Bedroom")]
    TwoBedroom,
    #[serde(rename = "3-Bedroom")]
    ThreeBedroom,
    #[serde(rename = "4-Bedroom")]
    FourBedroom,
    #[serde(rename = "5-Bedroom")]
    FiveBedroom,
}

impl ApartmentType {
    pub const LEN: usize = 7;

    pub const ALL: [Self; Self::LEN] = [
        Self::StudioBedroom,
        Self::StudioLiving,
        Self::OneBedroom,
        Self::TwoBedroom,
        Self::ThreeBedroom,
        Self::FourBedroom,
        Self::FiveBedroom,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StudioBedroom => "Studio (bedroom)",
            Self::StudioLiving => "Studio (living)",
            Self::OneBedroom => "1-Bedroom",
            Self::TwoBedroom => "2-Bedroom",
            Self::ThreeBedroom => "3-Bedroom",
            Self::FourBedroom => "4-Bedroom",
            Self::FiveBedroom => "5-Bedroom",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for ApartmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApartmentType {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.label() == s)
            .ok_or_else(|| UnknownCategory {
                kind: CategoryKind::ApartmentType,
                label: s.to_owned(),
            })
    }
}
