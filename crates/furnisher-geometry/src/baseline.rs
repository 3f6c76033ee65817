//! Flat feature vector for the gradient-boosted tabular baseline.
//!
//! Layout: the five numeric features, then a room-type one-hot, then an
//! apartment-type one-hot.

use crate::{ApartmentType, GeometryFeatures, RoomType, TabularFeature};

const NUMERIC: [TabularFeature; 5] = [
    TabularFeature::Area,
    TabularFeature::AspectRatio,
    TabularFeature::NVertices,
    TabularFeature::DoorRelX,
    TabularFeature::DoorRelY,
];

pub const BASELINE_LEN: usize = NUMERIC.len() + RoomType::LEN + ApartmentType::LEN;

/// Column names matching [`baseline_vector`].
#[must_use]
pub fn feature_names() -> Vec<String> {
    NUMERIC
        .iter()
        .map(ToString::to_string)
        .chain(RoomType::ALL.iter().map(|t| format!("room_{t}")))
        .chain(ApartmentType::ALL.iter().map(|t| format!("apt_{t}")))
        .collect()
}

#[must_use]
pub fn baseline_vector(
    features: &GeometryFeatures,
    room_type: RoomType,
    apartment_type: ApartmentType,
) -> [f64; BASELINE_LEN] {
    let mut out = [0.0; BASELINE_LEN];
    for (slot, feature) in out.iter_mut().zip(NUMERIC) {
        *slot = features.get(feature);
    }
    out[NUMERIC.len() + room_type.index()] = 1.0;
    out[NUMERIC.len() + RoomType::LEN + apartment_type.index()] = 1.0;
    out
}
