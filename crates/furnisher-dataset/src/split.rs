//! Apartment-level, stratified train/val/test partitioning.
//!
//! Rooms of one apartment are strongly correlated, so the partition unit is
//! the apartment: every room inherits its apartment's label and no apartment
//! can leak across partitions. Within each apartment-type stratum the
//! apartments are shuffled with a fixed seed and cut in two stages: first
//! train against the remainder, then the remainder into val and test.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use furnisher_geometry::{Apartment, ApartmentId, ApartmentType, Room};
use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Self; 3] = [Self::Train, Self::Val, Self::Test];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown split '{_0}' (expected train, val or test)")]
pub struct UnknownSplit(#[error(not(source))] pub String);

impl FromStr for Split {
    type Err = UnknownSplit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|split| split.name() == s)
            .ok_or_else(|| UnknownSplit(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SplitError {
    #[display("invalid split ratios {train}/{val}/{test}: each must be positive and they must sum to 1")]
    InvalidRatios { train: f64, val: f64, test: f64 },
    #[display(
        "stratum {apartment_type} has {size} apartments, which splits into \
         {train}/{val}/{test}; every partition must be non-empty"
    )]
    InsufficientStrataSize {
        apartment_type: ApartmentType,
        size: usize,
        train: usize,
        val: usize,
        test: usize,
    },
    #[display("apartment {id} appears more than once")]
    DuplicateApartment { id: ApartmentId },
    #[display("apartment {id} was assigned to more than one partition")]
    Leakage { id: ApartmentId },
    #[display("apartment {id} was not assigned to any partition")]
    Unassigned { id: ApartmentId },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    fn validate(&self) -> Result<(), SplitError> {
        let Self { train, val, test } = *self;
        let positive = [train, val, test].iter().all(|r| r.is_finite() && *r > 0.0);
        if positive && (train + val + test - 1.0).abs() <= 1e-6 {
            Ok(())
        } else {
            Err(SplitError::InvalidRatios { train, val, test })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    pub ratios: SplitRatios,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ratios: SplitRatios::default(),
            seed: 42,
        }
    }
}

/// Mapping from apartment to partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    labels: BTreeMap<ApartmentId, Split>,
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn round_share(count: usize, fraction: f64) -> usize {
    (count as f64 * fraction).round() as usize
}

impl SplitAssignment {
    /// Partitions `(apartment, type)` pairs.
    pub fn assign<I>(apartments: I, config: &SplitConfig) -> Result<Self, SplitError>
    where
        I: IntoIterator<Item = (ApartmentId, ApartmentType)>,
    {
        config.ratios.validate()?;
        let SplitRatios { val, test, .. } = config.ratios;

        let mut strata = BTreeMap::<ApartmentType, Vec<ApartmentId>>::new();
        let mut seen = BTreeSet::new();
        for (id, apartment_type) in apartments {
            if !seen.insert(id) {
                return Err(SplitError::DuplicateApartment { id });
            }
            strata.entry(apartment_type).or_default().push(id);
        }

        let mut rng = Pcg32::seed_from_u64(config.seed);
        let mut groups = BTreeMap::<Split, Vec<ApartmentId>>::new();
        for (apartment_type, mut ids) in strata {
            ids.sort_unstable();
            ids.shuffle(&mut rng);

            let size = ids.len();
            let rest = round_share(size, val + test).min(size);
            let n_val = round_share(rest, val / (val + test)).min(rest);
            let (n_train, n_test) = (size - rest, rest - n_val);
            if n_train == 0 || n_val == 0 || n_test == 0 {
                return Err(SplitError::InsufficientStrataSize {
                    apartment_type,
                    size,
                    train: n_train,
                    val: n_val,
                    test: n_test,
                });
            }
            log::debug!("stratum {apartment_type}: {n_train}/{n_val}/{n_test} of {size}");

            let (train_ids, rest_ids) = ids.split_at(n_train);
            let (val_ids, test_ids) = rest_ids.split_at(n_val);
            groups.entry(Split::Train).or_default().extend(train_ids);
            groups.entry(Split::Val).or_default().extend(val_ids);
            groups.entry(Split::Test).or_default().extend(test_ids);
        }

        let mut labels = BTreeMap::new();
        for (split, ids) in groups {
            for id in ids {
                if labels.insert(id, split).is_some() {
                    return Err(SplitError::Leakage { id });
                }
            }
        }
        let assignment = Self { labels };
        assignment.verify(seen)?;
        Ok(assignment)
    }

    pub fn from_apartments(
        apartments: &[Apartment],
        config: &SplitConfig,
    ) -> Result<Self, SplitError> {
        Self::assign(apartments.iter().map(|a| (a.id, a.apartment_type)), config)
    }

    /// Checks that exactly the given apartments are labelled.
    pub fn verify<I>(&self, expected: I) -> Result<(), SplitError>
    where
        I: IntoIterator<Item = ApartmentId>,
    {
        let expected = expected.into_iter().collect::<BTreeSet<_>>();
        if let Some(&id) = expected.iter().find(|id| !self.labels.contains_key(id)) {
            return Err(SplitError::Unassigned { id });
        }
        if let Some(&id) = self.labels.keys().find(|id| !expected.contains(id)) {
            return Err(SplitError::Leakage { id });
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: ApartmentId) -> Option<Split> {
        self.labels.get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn apartments(&self, split: Split) -> impl Iterator<Item = ApartmentId> + '_ {
        self.labels
            .iter()
            .filter(move |&(_, s)| *s == split)
            .map(|(&id, _)| id)
    }

    #[must_use]
    pub fn count(&self, split: Split) -> usize {
        self.apartments(split).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApartmentId, Split)> + '_ {
        self.labels.iter().map(|(&id, &s)| (id, s))
    }
}

/// Rooms grouped by the partition of their apartment; all three keys are present.
#[must_use]
pub fn rooms_by_split<'a>(
    apartments: &'a [Apartment],
    assignment: &SplitAssignment,
) -> BTreeMap<Split, Vec<&'a Room>> {
    let mut out = Split::ALL
        .into_iter()
        .map(|s| (s, Vec::new()))
        .collect::<BTreeMap<_, _>>();
    for apartment in apartments {
        let Some(split) = assignment.get(apartment.id) else {
            log::warn!("apartment {} has no split label, skipping", apartment.id);
            continue;
        };
        out.entry(split).or_default().extend(apartment.rooms());
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn population(per_type: &[(ApartmentType, i64)]) -> Vec<(ApartmentId, ApartmentType)> {
        let mut next = 0;
        let mut out = vec![];
        for &(t, n) in per_type {
            for _ in 0..n {
                out.push((ApartmentId(next), t));
                next += 1;
            }
        }
        out
    }

    #[test]
    fn test_default_proportions() {
        let apartments = population(&[
            (ApartmentType::OneBedroom, 100),
            (ApartmentType::TwoBedroom, 50),
            (ApartmentType::StudioLiving, 20),
        ]);
        let assignment = SplitAssignment::assign(apartments.clone(), &SplitConfig::default()).unwrap();
        assert_eq!(assignment.len(), 170);
        assert_eq!(assignment.count(Split::Train), 80 + 40 + 16);
        assert_eq!(assignment.count(Split::Val), 10 + 5 + 2);
        assert_eq!(assignment.count(Split::Test), 10 + 5 + 2);

        for t in [ApartmentType::OneBedroom, ApartmentType::TwoBedroom] {
            let in_type = apartments.iter().filter(|(_, at)| *at == t).map(|(id, _)| *id);
            let val = in_type.filter(|&id| assignment.get(id) == Some(Split::Val)).count();
            assert!(val > 0);
        }
    }

    #[test]
    fn test_assignment_is_deterministic_and_order_independent() {
        let apartments = population(&[(ApartmentType::OneBedroom, 40), (ApartmentType::ThreeBedroom, 30)]);
        let a = SplitAssignment::assign(apartments.clone(), &SplitConfig::default()).unwrap();
        let b = SplitAssignment::assign(apartments.iter().rev().copied(), &SplitConfig::default()).unwrap();
        assert_eq!(a, b);

        let other_seed = SplitConfig {
            seed: 7,
            ..SplitConfig::default()
        };
        let c = SplitAssignment::assign(apartments, &other_seed).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_small_stratum_is_rejected() {
        let apartments = population(&[(ApartmentType::OneBedroom, 40), (ApartmentType::FiveBedroom, 7)]);
        let err = SplitAssignment::assign(apartments, &SplitConfig::default()).unwrap_err();
        assert_eq!(
            err,
            SplitError::InsufficientStrataSize {
                apartment_type: ApartmentType::FiveBedroom,
                size: 7,
                train: 6,
                val: 1,
                test: 0,
            }
        );
    }

    #[test]
    fn test_invalid_ratios_and_duplicates() {
        let config = SplitConfig {
            ratios: SplitRatios {
                train: 0.8,
                val: 0.2,
                test: 0.0,
            },
            seed: 42,
        };
        assert!(matches!(
            SplitAssignment::assign(population(&[(ApartmentType::OneBedroom, 20)]), &config),
            Err(SplitError::InvalidRatios { .. })
        ));

        let mut apartments = population(&[(ApartmentType::OneBedroom, 20)]);
        apartments.push((ApartmentId(3), ApartmentType::TwoBedroom));
        assert_eq!(
            SplitAssignment::assign(apartments, &SplitConfig::default()).unwrap_err(),
            SplitError::DuplicateApartment { id: ApartmentId(3) }
        );
    }

    #[test]
    fn test_verify_detects_missing_and_extra() {
        let apartments = population(&[(ApartmentType::OneBedroom, 10)]);
        let assignment = SplitAssignment::assign(apartments.clone(), &SplitConfig::default()).unwrap();
        let ids = apartments.iter().map(|(id, _)| *id);
        assert!(assignment.verify(ids.clone()).is_ok());
        assert_eq!(
            assignment.verify(ids.clone().chain([ApartmentId(99)])),
            Err(SplitError::Unassigned { id: ApartmentId(99) })
        );
        assert_eq!(
            assignment.verify(ids.skip(1)),
            Err(SplitError::Leakage { id: ApartmentId(0) })
        );
    }

    #[test]
    fn test_split_names() {
        assert_eq!("val".parse::<Split>().unwrap(), Split::Val);
        assert!("validation".parse::<Split>().is_err());
        assert_eq!(serde_json::to_string(&Split::Test).unwrap(), "\"test\"");
    }

    /// Default ratios give every partition a member from 8 apartments up.
    const MIN_SPLITTABLE: usize = 8;

    fn strata_strategy() -> impl Strategy<Value = BTreeMap<ApartmentType, usize>> {
        proptest::collection::btree_map(
            prop::sample::select(ApartmentType::ALL.to_vec()),
            MIN_SPLITTABLE..60,
            1..=ApartmentType::ALL.len(),
        )
    }

    fn populate(
        strata: &BTreeMap<ApartmentType, usize>,
        base: i64,
    ) -> Vec<(ApartmentId, ApartmentType)> {
        let mut next = base;
        let mut out = vec![];
        for (&t, &n) in strata {
            for _ in 0..n {
                out.push((ApartmentId(next), t));
                next += 3;
            }
        }
        out
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn expected_counts(size: usize) -> (usize, usize, usize) {
        let rest = (size as f64 * 0.2).round() as usize;
        let val = (rest as f64 * 0.5).round() as usize;
        (size - rest, val, rest - val)
    }

    proptest! {
        #[test]
        fn partitions_are_disjoint_and_complete(
            strata in strata_strategy(),
            base in -1_000_000i64..1_000_000,
            seed in any::<u64>(),
        ) {
            let apartments = populate(&strata, base);
            let config = SplitConfig { seed, ..SplitConfig::default() };
            let assignment = SplitAssignment::assign(apartments.clone(), &config);
            prop_assert!(assignment.is_ok(), "{:?}", assignment);
            let assignment = assignment.unwrap();

            let parts = Split::ALL.map(|s| assignment.apartments(s).collect::<BTreeSet<_>>());
            for (i, a) in parts.iter().enumerate() {
                for b in &parts[i + 1..] {
                    prop_assert!(a.is_disjoint(b));
                }
            }
            let union = parts.iter().flatten().copied().collect::<BTreeSet<_>>();
            let all = apartments.iter().map(|(id, _)| *id).collect::<BTreeSet<_>>();
            prop_assert_eq!(union, all);
        }

        #[test]
        fn stratum_counts_follow_rounded_ratios(
            strata in strata_strategy(),
            seed in any::<u64>(),
        ) {
            let apartments = populate(&strata, 0);
            let config = SplitConfig { seed, ..SplitConfig::default() };
            let assignment = SplitAssignment::assign(apartments.clone(), &config).unwrap();
            for (&t, &size) in &strata {
                let count = |split: Split| {
                    apartments
                        .iter()
                        .filter(|&&(id, at)| at == t && assignment.get(id) == Some(split))
                        .count()
                };
                let (train, val, test) = expected_counts(size);
                prop_assert_eq!(
                    (count(Split::Train), count(Split::Val), count(Split::Test)),
                    (train, val, test),
                    "{} of size {}", t, size
                );
                prop_assert!(train > 0 && val > 0 && test > 0);
            }
        }

        #[test]
        fn same_seed_gives_same_assignment(
            strata in strata_strategy(),
            seed in any::<u64>(),
        ) {
            let apartments = populate(&strata, 0);
            let config = SplitConfig { seed, ..SplitConfig::default() };
            let a = SplitAssignment::assign(apartments.clone(), &config).unwrap();
            let b = SplitAssignment::assign(apartments.into_iter().rev(), &config).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
