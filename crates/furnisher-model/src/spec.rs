//! Declarative network description carried inside every checkpoint.
//!
//! A [`ModelSpec`] records everything needed to rebuild a trained network:
//! the optional layers of each branch, the tabular inputs in order, the
//! embedding sizes and the normalization statistics frozen at training time.
//! Callers never branch on a model version; they hand the model spec to
//! [`build_network`](crate::build_network).

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use furnisher_geometry::{ApartmentType, GeometryFeatures, RoomType, TabularFeature};
use furnisher_stats::standardization::Standardization;
use serde::{Deserialize, Serialize};

/// Output width of the last convolution block.
pub const IMAGE_FEATURES: usize = 256;

/// Channel widths of the convolution blocks.
pub const CONV_CHANNELS: [usize; 4] = [32, 64, 128, 256];

/// Tabular layout of checkpoints that only record `n_tabular = 3`.
pub const LEGACY_FEATURES_3: [TabularFeature; 3] = [
    TabularFeature::Area,
    TabularFeature::DoorRelX,
    TabularFeature::DoorRelY,
];

/// Tabular layout of checkpoints that only record `n_tabular = 5`.
pub const LEGACY_FEATURES_5: [TabularFeature; 5] = [
    TabularFeature::Area,
    TabularFeature::DoorRelX,
    TabularFeature::DoorRelY,
    TabularFeature::NVertices,
    TabularFeature::AspectRatio,
];

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ModelSpecError {
    #[display("invalid model spec: unsupported n_tabular={n_tabular} without a feature list (expected 3 or 5)")]
    UnsupportedTabularCount { n_tabular: usize },
    #[display("invalid model spec: n_tabular={n_tabular} but {features} features are listed")]
    FeatureCountMismatch { n_tabular: usize, features: usize },
    #[display("invalid model spec: no tabular features")]
    NoFeatures,
    #[display("invalid model spec: feature '{feature}' is listed twice")]
    DuplicateFeature { feature: TabularFeature },
    #[display("invalid model spec: {field} must be positive")]
    ZeroWidth { field: &'static str },
    #[display("invalid model spec: dropout {dropout} is outside [0, 1)")]
    InvalidDropout { dropout: f64 },
    #[display(
        "invalid model spec: apartment embedding has {n_apt_types} rows but there are {} apartment types",
        ApartmentType::LEN
    )]
    TooFewApartmentTypes { n_apt_types: usize },
    #[display("invalid model spec: no normalization statistics for '{feature}'")]
    MissingNormalization { feature: TabularFeature },
    #[display("invalid model spec: normalization statistics for '{feature}' are not finite")]
    InvalidNormalization { feature: TabularFeature },
}

/// Architecture and preprocessing of one trained network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModelSpec")]
pub struct ModelSpec {
    /// Width of the linear projection after global pooling, if any.
    pub image_bottleneck: Option<usize>,
    /// Width of the linear projection of the tabular vector, if any.
    pub tabular_hidden: Option<usize>,
    /// Whether the raw tabular vector is also fed to the head.
    pub tabular_skip: bool,
    /// Scalar inputs, in the order the network expects them.
    pub features: Vec<TabularFeature>,
    pub embed_dim: usize,
    pub apt_embed_dim: Option<usize>,
    pub n_apt_types: usize,
    pub fc_hidden: usize,
    pub dropout: f64,
    /// Statistics for every standardized entry of `features`.
    pub normalization: BTreeMap<TabularFeature, Standardization>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            image_bottleneck: None,
            tabular_hidden: None,
            tabular_skip: false,
            features: LEGACY_FEATURES_3.to_vec(),
            embed_dim: 16,
            apt_embed_dim: None,
            n_apt_types: ApartmentType::LEN,
            fc_hidden: 128,
            dropout: 0.3,
            normalization: BTreeMap::new(),
        }
    }
}

impl ModelSpec {
    /// Returns a copy with the given statistics frozen in.
    #[must_use]
    pub fn with_normalization(
        mut self,
        normalization: BTreeMap<TabularFeature, Standardization>,
    ) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn validate(&self) -> Result<(), ModelSpecError> {
        if self.features.is_empty() {
            return Err(ModelSpecError::NoFeatures);
        }
        let mut seen = BTreeSet::new();
        for &feature in &self.features {
            if !seen.insert(feature) {
                return Err(ModelSpecError::DuplicateFeature { feature });
            }
        }

        let widths = [
            ("image_bottleneck", self.image_bottleneck.unwrap_or(1)),
            ("tabular_hidden", self.tabular_hidden.unwrap_or(1)),
            ("embed_dim", self.embed_dim),
            ("apt_embed_dim", self.apt_embed_dim.unwrap_or(1)),
            ("fc_hidden", self.fc_hidden),
        ];
        if let Some((field, _)) = widths.into_iter().find(|(_, w)| *w == 0) {
            return Err(ModelSpecError::ZeroWidth { field });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelSpecError::InvalidDropout {
                dropout: self.dropout,
            });
        }
        if self.apt_embed_dim.is_some() && self.n_apt_types < ApartmentType::LEN {
            return Err(ModelSpecError::TooFewApartmentTypes {
                n_apt_types: self.n_apt_types,
            });
        }

        for feature in self.standardized_features() {
            match self.normalization.get(&feature) {
                None => return Err(ModelSpecError::MissingNormalization { feature }),
                Some(z) if !z.is_valid() => {
                    return Err(ModelSpecError::InvalidNormalization { feature });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Entries of `features` that are z-scored before entering the network.
    pub fn standardized_features(&self) -> impl Iterator<Item = TabularFeature> + '_ {
        self.features.iter().copied().filter(|f| f.is_standardized())
    }

    #[must_use]
    pub fn has_apartment_embedding(&self) -> bool {
        self.apt_embed_dim.is_some()
    }

    #[must_use]
    pub fn image_dim(&self) -> usize {
        self.image_bottleneck.unwrap_or(IMAGE_FEATURES)
    }

    /// Width of the tabular vector before the optional projection.
    #[must_use]
    pub fn tabular_raw_dim(&self) -> usize {
        self.features.len() + self.embed_dim + self.apt_embed_dim.unwrap_or(0)
    }

    #[must_use]
    pub fn tabular_dim(&self) -> usize {
        self.tabular_hidden.unwrap_or_else(|| self.tabular_raw_dim())
    }

    /// Width of the head input.
    #[must_use]
    pub fn fusion_dim(&self) -> usize {
        let skip = if self.tabular_skip {
            self.tabular_raw_dim()
        } else {
            0
        };
        self.image_dim() + self.tabular_dim() + skip
    }
}

/// Scalar network inputs for one room, in the order recorded in `spec`.
///
/// Standardized features use the statistics stored in the model spec; the door
/// position is already in `[0, 1]` and passes through unchanged.
#[expect(clippy::cast_possible_truncation)]
#[must_use]
pub fn assemble_tabular(spec: &ModelSpec, features: &GeometryFeatures) -> Vec<f32> {
    spec.features
        .iter()
        .map(|&feature| {
            let value = features.get(feature);
            let value = if feature.is_standardized() {
                spec.normalization
                    .get(&feature)
                    .copied()
                    .unwrap_or_default()
                    .apply(value)
            } else {
                value
            };
            value as f32
        })
        .collect()
}

/// Categorical network inputs for one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoricalInput {
    pub room_type: RoomType,
    /// Ignored by specs without an apartment embedding.
    pub apartment_type: ApartmentType,
}

fn default_embed_dim() -> usize {
    ModelSpec::default().embed_dim
}

fn default_n_apt_types() -> usize {
    ApartmentType::LEN
}

fn default_fc_hidden() -> usize {
    ModelSpec::default().fc_hidden
}

fn default_dropout() -> f64 {
    ModelSpec::default().dropout
}

/// On-disk form of a spec, including the fields older checkpoints used.
#[derive(Debug, Deserialize)]
struct RawModelSpec {
    image_bottleneck: Option<usize>,
    tabular_hidden: Option<usize>,
    #[serde(default)]
    tabular_skip: bool,
    features: Option<Vec<TabularFeature>>,
    n_tabular: Option<usize>,
    #[serde(default = "default_embed_dim")]
    embed_dim: usize,
    apt_embed_dim: Option<usize>,
    #[serde(default = "default_n_apt_types")]
    n_apt_types: usize,
    #[serde(default = "default_fc_hidden")]
    fc_hidden: usize,
    #[serde(default = "default_dropout")]
    dropout: f64,
    #[serde(default)]
    normalization: BTreeMap<TabularFeature, Standardization>,
    area_mean: Option<f64>,
    area_std: Option<f64>,
    aspect_mean: Option<f64>,
    aspect_std: Option<f64>,
    n_verts_mean: Option<f64>,
    n_verts_std: Option<f64>,
}

impl TryFrom<RawModelSpec> for ModelSpec {
    type Error = ModelSpecError;

    fn try_from(raw: RawModelSpec) -> Result<Self, Self::Error> {
        let features = match (raw.features, raw.n_tabular) {
            (Some(features), Some(n_tabular)) if features.len() != n_tabular => {
                return Err(ModelSpecError::FeatureCountMismatch {
                    n_tabular,
                    features: features.len(),
                });
            }
            (Some(features), _) => features,
            (None, None | Some(3)) => LEGACY_FEATURES_3.to_vec(),
            (None, Some(5)) => LEGACY_FEATURES_5.to_vec(),
            (None, Some(n_tabular)) => {
                return Err(ModelSpecError::UnsupportedTabularCount { n_tabular });
            }
        };

        let mut normalization = raw.normalization;
        let flat = [
            (TabularFeature::Area, raw.area_mean, raw.area_std),
            (TabularFeature::AspectRatio, raw.aspect_mean, raw.aspect_std),
            (TabularFeature::NVertices, raw.n_verts_mean, raw.n_verts_std),
        ];
        for (feature, mean, std) in flat {
            if let (Some(mean), Some(std)) = (mean, std) {
                normalization
                    .entry(feature)
                    .or_insert(Standardization { mean, std });
            }
        }

        Ok(Self {
            image_bottleneck: raw.image_bottleneck,
            tabular_hidden: raw.tabular_hidden,
            tabular_skip: raw.tabular_skip,
            features,
            embed_dim: raw.embed_dim,
            apt_embed_dim: raw.apt_embed_dim,
            n_apt_types: raw.n_apt_types,
            fc_hidden: raw.fc_hidden,
            dropout: raw.dropout,
            normalization,
        })
    }
}

/// Named architecture templates.
///
/// Templates carry no normalization statistics; those are attached with
/// [`ModelSpec::with_normalization`] once the training split is known.
#[derive(Debug, Clone)]
pub struct ArchitectureRegistry {
    entries: BTreeMap<String, ModelSpec>,
}

impl ArchitectureRegistry {
    /// Registry holding the built-in `cnn-v1` to `cnn-v4` templates.
    #[must_use]
    pub fn builtin() -> Self {
        let v1 = ModelSpec::default();
        let v2 = ModelSpec {
            image_bottleneck: Some(64),
            tabular_hidden: Some(32),
            ..v1.clone()
        };
        let v3 = ModelSpec {
            tabular_skip: true,
            features: LEGACY_FEATURES_5.to_vec(),
            ..v2.clone()
        };
        let v4 = ModelSpec {
            apt_embed_dim: Some(4),
            ..v3.clone()
        };
        let mut registry = Self {
            entries: BTreeMap::new(),
        };
        for (name, spec) in [("cnn-v1", v1), ("cnn-v2", v2), ("cnn-v3", v3), ("cnn-v4", v4)] {
            registry.register(name, spec);
        }
        registry
    }

    /// Adds or replaces a template.
    pub fn register<S>(&mut self, name: S, spec: ModelSpec) -> Option<ModelSpec>
    where
        S: Into<String>,
    {
        self.entries.insert(name.into(), spec)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for ArchitectureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = self
            .features
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "image={} tabular={} skip={} features=[{features}] embed={} apt_embed={} fc={} dropout={}",
            self.image_dim(),
            self.tabular_dim(),
            self.tabular_skip,
            self.embed_dim,
            self.apt_embed_dim.unwrap_or(0),
            self.fc_hidden,
            self.dropout,
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::testing::normalization;

    #[test]
    fn test_dimensions() {
        let registry = ArchitectureRegistry::builtin();
        let v1 = registry.get("cnn-v1").unwrap();
        assert_eq!(v1.image_dim(), 256);
        assert_eq!(v1.tabular_raw_dim(), 19);
        assert_eq!(v1.fusion_dim(), 275);

        let v2 = registry.get("cnn-v2").unwrap();
        assert_eq!(v2.fusion_dim(), 96);

        let v3 = registry.get("cnn-v3").unwrap();
        assert_eq!(v3.tabular_raw_dim(), 21);
        assert_eq!(v3.fusion_dim(), 64 + 32 + 21);

        let v4 = registry.get("cnn-v4").unwrap();
        assert_eq!(v4.tabular_raw_dim(), 25);
        assert!(v4.has_apartment_embedding());
        assert_eq!(registry.names().count(), 4);
    }

    #[test]
    fn test_validate() {
        let spec = ModelSpec::default().with_normalization(normalization());
        assert_eq!(spec.validate(), Ok(()));

        assert_eq!(
            ModelSpec::default().validate(),
            Err(ModelSpecError::MissingNormalization {
                feature: TabularFeature::Area
            })
        );

        let zero = ModelSpec {
            image_bottleneck: Some(0),
            ..spec.clone()
        };
        assert_eq!(
            zero.validate(),
            Err(ModelSpecError::ZeroWidth {
                field: "image_bottleneck"
            })
        );

        let dup = ModelSpec {
            features: vec![TabularFeature::DoorRelX, TabularFeature::DoorRelX],
            ..spec.clone()
        };
        assert!(matches!(
            dup.validate(),
            Err(ModelSpecError::DuplicateFeature { .. })
        ));

        let dropout = ModelSpec {
            dropout: 1.0,
            ..spec.clone()
        };
        assert!(matches!(
            dropout.validate(),
            Err(ModelSpecError::InvalidDropout { .. })
        ));

        let apt = ModelSpec {
            apt_embed_dim: Some(4),
            n_apt_types: 3,
            ..spec.clone()
        };
        assert!(matches!(
            apt.validate(),
            Err(ModelSpecError::TooFewApartmentTypes { n_apt_types: 3 })
        ));

        let empty = ModelSpec {
            features: vec![],
            ..spec
        };
        assert_eq!(empty.validate(), Err(ModelSpecError::NoFeatures));
    }

    #[test]
    fn test_legacy_n_tabular() {
        let v1: ModelSpec = serde_json::from_str(
            r#"{"n_tabular": 3, "area_mean": 12.0, "area_std": 4.0}"#,
        )
        .unwrap();
        assert_eq!(v1.features, LEGACY_FEATURES_3);
        assert_eq!(
            v1.normalization[&TabularFeature::Area],
            Standardization { mean: 12.0, std: 4.0 }
        );
        assert_eq!(v1.embed_dim, 16);
        assert_eq!(v1.validate(), Ok(()));

        let v3: ModelSpec = serde_json::from_str(
            r#"{"n_tabular": 5, "image_bottleneck": 64, "tabular_hidden": 32, "tabular_skip": true,
                "area_mean": 12.0, "area_std": 4.0, "aspect_mean": 1.5, "aspect_std": 0.5,
                "n_verts_mean": 5.0, "n_verts_std": 1.0}"#,
        )
        .unwrap();
        assert_eq!(v3.features, LEGACY_FEATURES_5);
        let expected = ArchitectureRegistry::builtin()
            .get("cnn-v3")
            .unwrap()
            .clone()
            .with_normalization(normalization());
        assert_eq!(v3, expected);

        let err = serde_json::from_str::<ModelSpec>(r#"{"n_tabular": 4}"#).unwrap_err();
        assert!(err.to_string().contains("n_tabular=4"));

        let err = serde_json::from_str::<ModelSpec>(r#"{"n_tabular": 3, "features": ["area"]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("1 features"));
    }

    #[test]
    fn test_serde_keeps_feature_order() {
        let spec = ArchitectureRegistry::builtin()
            .get("cnn-v4")
            .unwrap()
            .clone()
            .with_normalization(normalization());
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json["features"],
            serde_json::json!(["area", "door_rel_x", "door_rel_y", "n_vertices", "aspect_ratio"])
        );
        assert_eq!(json["normalization"]["area"]["mean"], 12.0);
        let back: ModelSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_assemble_tabular() {
        let spec = ArchitectureRegistry::builtin()
            .get("cnn-v3")
            .unwrap()
            .clone()
            .with_normalization(normalization());
        let features = GeometryFeatures {
            area: 16.0,
            aspect_ratio: 2.0,
            n_vertices: 6,
            door_rel_x: 0.25,
            door_rel_y: 1.0,
        };
        let tabular = assemble_tabular(&spec, &features);
        assert_eq!(tabular.len(), 5);
        assert_abs_diff_eq!(tabular[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(tabular[1], 0.25);
        assert_abs_diff_eq!(tabular[2], 1.0);
        assert_abs_diff_eq!(tabular[3], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(tabular[4], 1.0, epsilon = 1e-6);

        let reordered = ModelSpec {
            features: vec![TabularFeature::DoorRelY, TabularFeature::Area],
            ..spec
        };
        let tabular = assemble_tabular(&reordered, &features);
        assert_abs_diff_eq!(tabular[0], 1.0);
        assert_abs_diff_eq!(tabular[1], 1.0, epsilon = 1e-6);
    }
}
