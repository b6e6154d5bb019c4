//! Per-label Pearson correlation of two streamed variables.
//!
//! [`CorrelationAccumulator`] keeps the count, sums, sums of squares and sum of
//! cross products of each label's `(x, y)` pairs, and derives the population
//! correlation on demand. Pairs where either side is NaN are dropped.

use std::{borrow::Borrow, collections::BTreeMap};

/// Running sums of one group's `(x, y)` pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairSums {
    pub count: f64,
    pub sum_x: f64,
    pub sum_y: f64,
    pub sum_xx: f64,
    pub sum_yy: f64,
    pub sum_xy: f64,
}

impl PairSums {
    fn push(&mut self, x: f64, y: f64) {
        self.count += 1.0;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }

    /// Pearson correlation coefficient.
    ///
    /// NaN for an empty group. Zero when either variable has no spread.
    #[must_use]
    pub fn correlation(&self) -> f64 {
        let n = self.count;
        let mean_x = self.sum_x / n;
        let mean_y = self.sum_y / n;
        let var_x = self.sum_xx / n - mean_x * mean_x;
        let var_y = self.sum_yy / n - mean_y * mean_y;
        if var_x <= 0.0 || var_y <= 0.0 {
            return if n > 0.0 { 0.0 } else { f64::NAN };
        }
        let covariance = self.sum_xy / n - mean_x * mean_y;
        (covariance / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
    }
}

/// Incremental correlation accumulator keyed by a group label.
///
/// # Examples
///
/// ```
/// use strata_stats::correlation::CorrelationAccumulator;
///
/// let mut acc: CorrelationAccumulator = CorrelationAccumulator::new();
/// for x in [1.0, 2.0, 3.0] {
///     acc.add(x, 2.0 * x, "up");
///     acc.add(x, -x, "down");
/// }
/// assert!((acc.correlation("up") - 1.0).abs() < 1e-12);
/// assert!((acc.correlation("down") + 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct CorrelationAccumulator<K = String> {
    groups: BTreeMap<K, PairSums>,
}

impl<K> Default for CorrelationAccumulator<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K> CorrelationAccumulator<K>
where
    K: Ord,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the pair `(x, y)` to the group identified by `key`.
    pub fn add<Q>(&mut self, x: f64, y: f64, key: &Q)
    where
        K: Borrow<Q>,
        Q: Ord + ToOwned<Owned = K> + ?Sized,
    {
        if x.is_nan() || y.is_nan() {
            return;
        }
        if let Some(group) = self.groups.get_mut(key) {
            group.push(x, y);
        } else {
            let mut group = PairSums::default();
            group.push(x, y);
            self.groups.insert(key.to_owned(), group);
        }
    }

    /// Correlation within the group identified by `key`, NaN when absent.
    pub fn correlation<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.groups.get(key).copied().unwrap_or_default().correlation()
    }

    /// Number of distinct groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in ascending label order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &PairSums)> {
        self.groups.iter()
    }
}
