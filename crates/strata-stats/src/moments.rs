//! Per-label second-moment accumulation.
//!
//! [`MomentAccumulator`] wraps a [`GroupAccumulator`] and additionally tracks the
//! sum of squared values for each label, which is enough to derive the
//! population variance and standard deviation of every group in one pass.
//!
//! # Numerical behavior
//!
//! Variance is computed with the direct formula `E[x²] − mean²`. For data with a
//! large magnitude relative to its spread this formula loses precision, and the
//! result may even come out slightly negative, in which case the standard
//! deviation is NaN. That outcome is surfaced to callers unchanged.

use std::{borrow::Borrow, collections::BTreeMap};

use crate::group::{GroupAccumulator, GroupSum};

/// Count, mean and dispersion of a single group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMoments {
    pub count: f64,
    pub mean: f64,
    /// Population variance (divides by `count`, not `count - 1`).
    pub variance: f64,
    pub std_dev: f64,
}

/// Incremental sum, count and sum-of-squares accumulator keyed by a group label.
///
/// # Examples
///
/// ```
/// use strata_stats::moments::MomentAccumulator;
///
/// let mut acc: MomentAccumulator = MomentAccumulator::new();
/// for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
///     acc.add(value, "g");
/// }
///
/// assert_eq!(acc.mean("g"), 3.0);
/// assert_eq!(acc.variance("g"), 2.0);
/// assert_eq!(acc.std_dev("g"), 2.0_f64.sqrt());
/// ```
#[derive(Debug, Clone)]
pub struct MomentAccumulator<K = String> {
    groups: GroupAccumulator<K>,
    sums_of_squares: BTreeMap<K, f64>,
}

impl<K> Default for MomentAccumulator<K> {
    fn default() -> Self {
        Self {
            groups: GroupAccumulator::default(),
            sums_of_squares: BTreeMap::new(),
        }
    }
}

impl<K> MomentAccumulator<K>
where
    K: Ord,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the group identified by `key`.
    ///
    /// NaN values are ignored.
    pub fn add<Q>(&mut self, value: f64, key: &Q)
    where
        K: Borrow<Q>,
        Q: Ord + ToOwned<Owned = K> + ?Sized,
    {
        if value.is_nan() {
            return;
        }
        self.groups.add(value, key);
        if let Some(sum_sq) = self.sums_of_squares.get_mut(key) {
            *sum_sq += value * value;
        } else {
            self.sums_of_squares.insert(key.to_owned(), value * value);
        }
    }

    /// The underlying sum/count accumulator.
    #[must_use]
    pub fn groups(&self) -> &GroupAccumulator<K> {
        &self.groups
    }

    pub fn mean<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.groups.mean(key)
    }

    pub fn count<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.groups.count(key)
    }

    /// Sum of squared values for `key` (zero when absent).
    pub fn sum_of_squares<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.sums_of_squares.get(key).copied().unwrap_or(0.0)
    }

    /// Population variance: `sum_of_squares / count - mean²`.
    pub fn variance<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let group = self.groups.get(key).copied().unwrap_or_default();
        population_variance(&group, self.sum_of_squares(key))
    }

    /// Square root of [`variance`](Self::variance); NaN if the variance is negative.
    pub fn std_dev<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.variance(key).sqrt()
    }

    /// Count, mean, variance and standard deviation of a group, or `None` if no
    /// value was ever accepted under `key`.
    pub fn summary<Q>(&self, key: &Q) -> Option<GroupMoments>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let group = self.groups.get(key)?;
        let variance = population_variance(group, self.sum_of_squares(key));
        Some(GroupMoments {
            count: group.count,
            mean: group.mean(),
            variance,
            std_dev: variance.sqrt(),
        })
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.groups.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group labels in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.keys()
    }

    /// Summaries of every group in ascending label order.
    pub fn summaries(&self) -> impl Iterator<Item = (&K, GroupMoments)> {
        self.groups.keys().filter_map(|key| {
            let summary = self.summary(key)?;
            Some((key, summary))
        })
    }
}

fn population_variance(group: &GroupSum, sum_of_squares: f64) -> f64 {
    let mean = group.mean();
    sum_of_squares / group.count - mean * mean
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom as _;

    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[expect(clippy::cast_precision_loss)]
    fn direct_mean_variance(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, variance)
    }

    #[test]
    fn test_matches_direct_formula() {
        let values = [3.5, -1.25, 8.0, 0.0, 2.75, 6.5, -4.0, 1.0];
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        for value in values {
            acc.add(value, "k");
        }

        let (mean, variance) = direct_mean_variance(&values);
        assert_close(acc.mean("k"), mean);
        assert_close(acc.variance("k"), variance);
        assert_close(acc.std_dev("k"), variance.sqrt());
    }

    #[test]
    fn test_population_variance_not_sample() {
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        for value in [2.0, 4.0, 6.0, 8.0] {
            acc.add(value, "k");
        }
        // 20 / 4, not 20 / 3
        assert_close(acc.variance("k"), 5.0);
    }

    #[test]
    fn test_nan_leaves_sums_untouched() {
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        acc.add(1.0, "a");
        acc.add(f64::NAN, "a");
        acc.add(3.0, "a");

        assert_eq!(acc.count("a"), 2.0);
        assert_eq!(acc.mean("a"), 2.0);
        assert_eq!(acc.sum_of_squares("a"), 10.0);
        assert_close(acc.variance("a"), 1.0);
    }

    #[test]
    fn test_single_value_has_zero_variance() {
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        acc.add(7.0, "only");
        assert_eq!(acc.variance("only"), 0.0);
        assert_eq!(acc.std_dev("only"), 0.0);
    }

    #[test]
    fn test_absent_group_is_nan() {
        let acc: MomentAccumulator = MomentAccumulator::new();
        assert!(acc.mean("x").is_nan());
        assert!(acc.variance("x").is_nan());
        assert!(acc.std_dev("x").is_nan());
        assert!(acc.summary("x").is_none());
    }

    #[test]
    fn test_summary_matches_accessors() {
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            acc.add(value, "g");
        }
        let summary = acc.summary("g").unwrap();
        assert_eq!(summary.count, 5.0);
        assert_close(summary.mean, 3.0);
        assert_close(summary.variance, 2.0);
        assert_close(summary.std_dev, 2.0_f64.sqrt());
    }

    #[test]
    fn test_summaries_in_label_order() {
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        acc.add(1.0, "b");
        acc.add(2.0, "a");
        acc.add(3.0, "c");
        let labels = acc
            .summaries()
            .map(|(label, _)| label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, ["a", "b", "c"]);
    }

    #[test]
    fn test_shuffled_input_gives_same_moments() {
        let mut values = (0..500)
            .map(|i| (f64::from(i) * 1.7).sin() * 50.0)
            .collect::<Vec<_>>();
        let (mean, variance) = direct_mean_variance(&values);

        values.shuffle(&mut rand::rng());
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        for value in &values {
            acc.add(*value, "k");
        }

        assert!((acc.mean("k") - mean).abs() < 1e-9);
        assert!((acc.variance("k") - variance).abs() < 1e-6);
    }

    #[test]
    fn test_cancellation_can_make_std_dev_nan() {
        // Values with a huge offset and tiny spread: E[x²] - mean² cancels badly.
        let mut acc: MomentAccumulator = MomentAccumulator::new();
        let base = 1.0e9;
        for offset in [0.1, 0.2, 0.3] {
            acc.add(base + offset, "k");
        }
        let variance = acc.variance("k");
        let expected_exact = 2.0 / 300.0;
        // The direct formula is far from the exact variance at this magnitude.
        assert!((variance - expected_exact).abs() > 1e-4);
        if variance < 0.0 {
            assert!(acc.std_dev("k").is_nan());
        }
    }
}
