//! Per-label sum and count accumulation.
//!
//! [`GroupAccumulator`] is the foundation of every grouped statistic in this
//! crate. It keeps a running sum and count for each distinct label and derives
//! the group mean on demand.
//!
//! NaN observations are dropped silently, so a label is present in the
//! accumulator if and only if at least one non-NaN value was added under it.

use std::{borrow::Borrow, collections::BTreeMap};

/// Running sum and count for a single group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupSum {
    /// Sum of all accepted values.
    pub sum: f64,
    /// Number of accepted values.
    pub count: f64,
}

impl GroupSum {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1.0;
    }

    /// Arithmetic mean (`sum / count`).
    ///
    /// Yields NaN when the group is empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.sum / self.count
    }
}

/// Incremental sum/count accumulator keyed by a group label.
///
/// # Examples
///
/// ```
/// use strata_stats::group::GroupAccumulator;
///
/// let mut acc: GroupAccumulator = GroupAccumulator::new();
/// acc.add(1.0, "a");
/// acc.add(3.0, "a");
/// acc.add(10.0, "b");
///
/// assert_eq!(acc.mean("a"), 2.0);
/// assert_eq!(acc.mean("b"), 10.0);
/// assert!(acc.mean("missing").is_nan());
/// ```
#[derive(Debug, Clone)]
pub struct GroupAccumulator<K = String> {
    groups: BTreeMap<K, GroupSum>,
}

impl<K> Default for GroupAccumulator<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K> GroupAccumulator<K>
where
    K: Ord,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the group identified by `key`.
    ///
    /// NaN values are ignored and never create a group.
    pub fn add<Q>(&mut self, value: f64, key: &Q)
    where
        K: Borrow<Q>,
        Q: Ord + ToOwned<Owned = K> + ?Sized,
    {
        if value.is_nan() {
            return;
        }
        if let Some(group) = self.groups.get_mut(key) {
            group.push(value);
        } else {
            let mut group = GroupSum::default();
            group.push(value);
            self.groups.insert(key.to_owned(), group);
        }
    }

    /// Mean of the group identified by `key`.
    ///
    /// An absent group has a zero count, so the result is NaN. Callers that need
    /// to distinguish missing groups should use [`get`](Self::get).
    pub fn mean<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).copied().unwrap_or_default().mean()
    }

    /// Number of accepted values for `key` (zero when absent).
    pub fn count<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).map_or(0.0, |group| group.count)
    }

    /// Sum of accepted values for `key` (zero when absent).
    pub fn sum<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).map_or(0.0, |group| group.sum)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&GroupSum>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.groups.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.groups.contains_key(key)
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

    /// Group labels in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.keys()
    }

    /// Groups in ascending label order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &GroupSum)> {
        self.groups.iter()
    }
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

    #[test]
    fn test_mean_of_single_group() {
        let mut acc: GroupAccumulator = GroupAccumulator::new();
        for value in [1.0, 2.0, 3.0, 4.0] {
            acc.add(value, "a");
        }
        assert_close(acc.mean("a"), 2.5);
        assert_close(acc.count("a"), 4.0);
        assert_close(acc.sum("a"), 10.0);
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut acc: GroupAccumulator = GroupAccumulator::new();
        acc.add(1.0, "a");
        acc.add(f64::NAN, "a");
        acc.add(3.0, "a");

        assert_eq!(acc.mean("a"), 2.0);
        assert_eq!(acc.count("a"), 2.0);
    }

    #[test]
    fn test_nan_never_creates_group() {
        let mut acc: GroupAccumulator = GroupAccumulator::new();
        acc.add(f64::NAN, "ghost");

        assert!(acc.is_empty());
        assert!(!acc.contains("ghost"));
        assert_eq!(acc.count("ghost"), 0.0);
    }

    #[test]
    fn test_absent_group_mean_is_nan() {
        let acc: GroupAccumulator = GroupAccumulator::new();
        assert!(acc.mean("nothing").is_nan());
        assert!(acc.get("nothing").is_none());
    }

    #[test]
    fn test_groups_are_independent() {
        let mut acc: GroupAccumulator = GroupAccumulator::new();
        acc.add(1.0, "a");
        acc.add(3.0, "a");
        acc.add(2.0, "b");
        acc.add(4.0, "b");
        acc.add(100.0, "c");

        assert_eq!(acc.len(), 3);
        assert_close(acc.mean("a"), 2.0);
        assert_close(acc.mean("b"), 3.0);
        assert_close(acc.mean("c"), 100.0);
        assert_eq!(
            acc.keys().map(String::as_str).collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
    }

    #[test]
    fn test_infinite_values_are_accepted() {
        let mut acc: GroupAccumulator = GroupAccumulator::new();
        acc.add(f64::INFINITY, "a");
        acc.add(1.0, "a");

        assert_eq!(acc.count("a"), 2.0);
        assert_eq!(acc.mean("a"), f64::INFINITY);
    }

    #[test]
    fn test_order_of_addition_does_not_matter() {
        let mut values = (0..200)
            .map(|i| f64::from(i) * 0.37 - 20.0)
            .collect::<Vec<_>>();
        let mut forward: GroupAccumulator = GroupAccumulator::new();
        for value in &values {
            forward.add(*value, "k");
        }

        values.shuffle(&mut rand::rng());
        let mut shuffled: GroupAccumulator = GroupAccumulator::new();
        for value in &values {
            shuffled.add(*value, "k");
        }

        assert_close(forward.mean("k"), shuffled.mean("k"));
        assert_eq!(forward.count("k"), shuffled.count("k"));
    }

    #[test]
    fn test_non_string_keys() {
        let mut acc = GroupAccumulator::<u32>::new();
        acc.add(2.0, &7);
        acc.add(4.0, &7);
        assert_close(acc.mean(&7), 3.0);
    }
}
