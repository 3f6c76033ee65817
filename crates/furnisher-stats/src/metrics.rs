//! Evaluation metrics for score predictions.
//!
//! Besides the usual regression errors, predictions are also judged as a
//! pass/fail classifier: a room "passes" when its true score is above
//! [`TRUE_PASS_THRESHOLD`], and the model predicts a pass when its score is
//! above [`PRED_PASS_THRESHOLD`].

use std::collections::BTreeMap;

use serde::Serialize;

pub const TRUE_PASS_THRESHOLD: f64 = 0.0;
pub const PRED_PASS_THRESHOLD: f64 = 5.0;

/// Metrics over one set of `(truth, prediction)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Coefficient of determination; `0` when the truth has no variance.
    pub r2: f64,
    pub binary_accuracy: f64,
    pub binary_f1: f64,
    /// MAE restricted to rooms whose true score is zero.
    pub mae_on_zeros: Option<f64>,
    /// MAE restricted to rooms whose true score is positive.
    pub mae_on_nonzero: Option<f64>,
    /// MAE of always predicting the mean true score.
    pub naive_mae: f64,
    pub n_zeros: usize,
}

impl RegressionMetrics {
    /// Returns `None` for empty input.
    ///
    /// # Panics
    ///
    /// Panics if `truth` and `pred` differ in length.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn compute(truth: &[f64], pred: &[f64]) -> Option<Self> {
        assert_eq!(truth.len(), pred.len(), "truth and prediction lengths differ");
        if truth.is_empty() {
            return None;
        }
        let n = truth.len() as f64;
        let pairs = || truth.iter().copied().zip(pred.iter().copied());

        let mae = pairs().map(|(t, p)| (t - p).abs()).sum::<f64>() / n;
        let sse = pairs().map(|(t, p)| (t - p).powi(2)).sum::<f64>();
        let mean = truth.iter().sum::<f64>() / n;
        let sst = truth.iter().map(|t| (t - mean).powi(2)).sum::<f64>();
        let r2 = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
        let naive_mae = truth.iter().map(|t| (t - mean).abs()).sum::<f64>() / n;

        let mut confusion = Confusion::default();
        for (t, p) in pairs() {
            confusion.add(t > TRUE_PASS_THRESHOLD, p > PRED_PASS_THRESHOLD);
        }

        let conditional_mae = |keep: fn(f64) -> bool| {
            let errors = pairs()
                .filter(|&(t, _)| keep(t))
                .map(|(t, p)| (t - p).abs())
                .collect::<Vec<_>>();
            (!errors.is_empty()).then(|| errors.iter().sum::<f64>() / errors.len() as f64)
        };

        Some(Self {
            count: truth.len(),
            mae,
            rmse: (sse / n).sqrt(),
            r2,
            binary_accuracy: confusion.accuracy(),
            binary_f1: confusion.f1(),
            mae_on_zeros: conditional_mae(|t| t == 0.0),
            mae_on_nonzero: conditional_mae(|t| t > 0.0),
            naive_mae,
            n_zeros: truth.iter().filter(|&&t| t == 0.0).count(),
        })
    }

    /// Metrics per group of `(group, truth, prediction)` samples.
    #[must_use]
    pub fn grouped<K, I>(samples: I) -> BTreeMap<K, Self>
    where
        K: Ord,
        I: IntoIterator<Item = (K, f64, f64)>,
    {
        let mut groups = BTreeMap::<K, (Vec<f64>, Vec<f64>)>::new();
        for (key, t, p) in samples {
            let (truth, pred) = groups.entry(key).or_default();
            truth.push(t);
            pred.push(p);
        }
        groups
            .into_iter()
            .filter_map(|(key, (truth, pred))| Some((key, Self::compute(&truth, &pred)?)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Confusion {
    tp: usize,
    tn: usize,
    fp: usize,
    fn_: usize,
}

impl Confusion {
    fn add(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn accuracy(&self) -> f64 {
        let total = self.tp + self.tn + self.fp + self.fn_;
        if total == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / total as f64
    }

    #[expect(clippy::cast_precision_loss)]
    fn f1(&self) -> f64 {
        let denom = 2 * self.tp + self.fp + self.fn_;
        if denom == 0 {
            return 0.0;
        }
        (2 * self.tp) as f64 / denom as f64
    }
}
