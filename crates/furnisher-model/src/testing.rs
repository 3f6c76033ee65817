use std::collections::BTreeMap;

use furnisher_geometry::TabularFeature;
use furnisher_stats::standardization::Standardization;

pub(crate) fn normalization() -> BTreeMap<TabularFeature, Standardization> {
    [
        (TabularFeature::Area, Standardization { mean: 12.0, std: 4.0 }),
        (TabularFeature::AspectRatio, Standardization { mean: 1.5, std: 0.5 }),
        (TabularFeature::NVertices, Standardization { mean: 5.0, std: 1.0 }),
    ]
    .into_iter()
    .collect()
}
