use serde::{Deserialize, Serialize};

use crate::descriptive::DescriptiveStats;

/// Added to the standard deviation so constant features do not divide by zero.
pub const STD_EPSILON: f64 = 1e-8;

/// Z-score parameters captured from a training sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    pub mean: f64,
    pub std: f64,
}

impl Standardization {
    /// Leaves values unchanged (up to [`STD_EPSILON`]).
    pub const IDENTITY: Self = Self {
        mean: 0.0,
        std: 1.0,
    };

    #[must_use]
    pub fn from_stats(stats: &DescriptiveStats) -> Self {
        Self {
            mean: stats.mean,
            std: stats.std_dev,
        }
    }

    /// Population mean and standard deviation of `values`; `None` when empty.
    #[must_use]
    pub fn fit<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        DescriptiveStats::new(values).map(|s| Self::from_stats(&s))
    }

    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / (self.std + STD_EPSILON)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.std.is_finite() && self.std >= 0.0
    }
}

impl Default for Standardization {
    fn default() -> Self {
        Self::IDENTITY
    }
}
