//! Two-sample t-tests and F-tests computed from group summaries.
//!
//! Both tests work on the count, mean and (population) standard deviation of
//! two groups, as produced by
//! [`MomentAccumulator::summary`](crate::moments::MomentAccumulator::summary).
//! P-values are two-tailed: `p = 2 * min(CDF(stat), 1 - CDF(stat))`.
//!
//! Degenerate degrees of freedom (zero, negative, NaN or infinite) and NaN
//! statistics produce a NaN p-value instead of evaluating the distribution with
//! invalid parameters.

use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::moments::GroupMoments;

/// Which statistic to compute when contrasting two groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum TestKind {
    /// `t = (mean1 - mean2) / sqrt(sd1²/n1 + sd2²/n2)`, `df = n1 + n2 - 2`
    #[display("t")]
    T,
    /// `f = sd1² / sd2²`, `df1 = n1 - 1`, `df2 = n2 - 1`
    #[display("f")]
    F,
}

/// Test statistic, degrees of freedom and two-tailed p-value.
///
/// For a t-test both `df1` and `df2` hold the combined degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub df1: f64,
    pub df2: f64,
    pub p: f64,
}

impl TestKind {
    /// Contrasts `control` against `experiment`.
    #[must_use]
    pub fn evaluate(self, control: &GroupMoments, experiment: &GroupMoments) -> TestOutcome {
        match self {
            TestKind::T => t_test(control, experiment),
            TestKind::F => f_test(control, experiment),
        }
    }
}

#[must_use]
pub fn t_test(control: &GroupMoments, experiment: &GroupMoments) -> TestOutcome {
    let statistic = t_statistic(
        control.mean,
        experiment.mean,
        control.std_dev,
        experiment.std_dev,
        control.count,
        experiment.count,
    );
    let df = control.count + experiment.count - 2.0;
    TestOutcome {
        statistic,
        df1: df,
        df2: df,
        p: t_test_p(statistic, df),
    }
}

#[must_use]
pub fn f_test(control: &GroupMoments, experiment: &GroupMoments) -> TestOutcome {
    let statistic = f_statistic(control.std_dev, experiment.std_dev);
    let df1 = control.count - 1.0;
    let df2 = experiment.count - 1.0;
    TestOutcome {
        statistic,
        df1,
        df2,
        p: f_test_p(statistic, df1, df2),
    }
}

#[must_use]
pub fn t_statistic(mean1: f64, mean2: f64, sd1: f64, sd2: f64, count1: f64, count2: f64) -> f64 {
    let standard_error = ((sd1 * sd1) / count1 + (sd2 * sd2) / count2).sqrt();
    (mean1 - mean2) / standard_error
}

#[must_use]
pub fn f_statistic(sd1: f64, sd2: f64) -> f64 {
    (sd1 * sd1) / (sd2 * sd2)
}

/// Degrees of freedom that no distribution can be parameterized with.
#[must_use]
pub fn is_degenerate_df(df: f64) -> bool {
    df <= 0.0 || df.is_nan() || df.is_infinite()
}

/// Two-tailed p-value of `t` under Student's t with `df` degrees of freedom.
#[must_use]
pub fn t_test_p(t: f64, df: f64) -> f64 {
    if is_degenerate_df(df) || t.is_nan() {
        return f64::NAN;
    }
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |dist| two_tailed(dist.cdf(t)))
}

/// Two-tailed p-value of `f` under the F distribution with `(df1, df2)`.
#[must_use]
pub fn f_test_p(f: f64, df1: f64, df2: f64) -> f64 {
    if is_degenerate_df(df1) || is_degenerate_df(df2) || f.is_nan() {
        return f64::NAN;
    }
    FisherSnedecor::new(df1, df2).map_or(f64::NAN, |dist| two_tailed(dist.cdf(f)))
}

fn two_tailed(cdf: f64) -> f64 {
    2.0 * cdf.min(1.0 - cdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments(values: &[f64]) -> GroupMoments {
        #[expect(clippy::cast_precision_loss)]
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| v * v).sum::<f64>() / count - mean * mean;
        GroupMoments {
            count,
            mean,
            variance,
            std_dev: variance.sqrt(),
        }
    }

    #[test]
    fn test_t_statistic_formula() {
        let t = t_statistic(5.0, 3.0, 2.0, 1.0, 4.0, 1.0);
        // (5 - 3) / sqrt(4/4 + 1/1)
        assert!((t - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_known_t_p_value() {
        let p = t_test_p(2.0, 10.0);
        assert!((p - 0.0734).abs() < 1e-3, "p = {p}");
    }

    #[test]
    fn test_zero_t_gives_p_one() {
        let p = t_test_p(0.0, 8.0);
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_significant_difference() {
        let baseline = moments(&[10.0, 12.0, 11.0, 13.0, 10.0]);
        let current = moments(&[25.0, 27.0, 26.0, 28.0, 25.0]);
        let outcome = TestKind::T.evaluate(&baseline, &current);
        assert!(outcome.statistic < 0.0);
        assert_eq!(outcome.df1, 8.0);
        assert_eq!(outcome.df2, 8.0);
        assert!(outcome.p < 0.05, "p = {}", outcome.p);
    }

    #[test]
    fn test_similar_groups_not_significant() {
        let baseline = moments(&[10.0, 12.0, 11.0, 13.0, 10.0]);
        let current = moments(&[11.0, 13.0, 10.0, 12.0, 11.0]);
        let outcome = TestKind::T.evaluate(&baseline, &current);
        assert!(outcome.p >= 0.05, "p = {}", outcome.p);
    }

    #[test]
    fn test_swapping_groups_negates_t_and_keeps_p() {
        let a = moments(&[1.0, 2.0, 4.0, 7.0]);
        let b = moments(&[3.0, 5.0, 6.0, 9.0, 12.0]);
        let forward = TestKind::T.evaluate(&a, &b);
        let backward = TestKind::T.evaluate(&b, &a);

        assert!((forward.statistic + backward.statistic).abs() < 1e-12);
        assert!((forward.p - backward.p).abs() < 1e-12);
    }

    #[test]
    fn test_single_observations_give_nan_p() {
        let a = moments(&[1.0]);
        let b = moments(&[2.0]);

        let t = TestKind::T.evaluate(&a, &b);
        assert_eq!(t.df1, 0.0);
        assert!(t.p.is_nan());

        let f = TestKind::F.evaluate(&a, &b);
        assert_eq!(f.df1, 0.0);
        assert_eq!(f.df2, 0.0);
        assert!(f.p.is_nan());
    }

    #[test]
    fn test_degenerate_df() {
        assert!(is_degenerate_df(0.0));
        assert!(is_degenerate_df(-1.0));
        assert!(is_degenerate_df(f64::NAN));
        assert!(is_degenerate_df(f64::INFINITY));
        assert!(!is_degenerate_df(3.0));
        assert!(t_test_p(1.0, f64::INFINITY).is_nan());
        assert!(f_test_p(1.0, 3.0, -2.0).is_nan());
    }

    #[test]
    fn test_nan_statistic_gives_nan_p() {
        assert!(t_test_p(f64::NAN, 5.0).is_nan());
        assert!(f_test_p(f64::NAN, 5.0, 5.0).is_nan());
    }

    #[test]
    fn test_f_statistic_and_equal_variances() {
        assert_eq!(f_statistic(2.0, 1.0), 4.0);
        let p = f_test_p(1.0, 6.0, 6.0);
        assert!((p - 1.0).abs() < 1e-9, "p = {p}");
    }

    #[test]
    fn test_f_test_detects_spread_difference() {
        let narrow = moments(&[10.0, 10.1, 9.9, 10.05, 9.95, 10.0, 10.02, 9.98]);
        let wide = moments(&[2.0, 18.0, 5.0, 15.0, 8.0, 12.0, 0.0, 20.0]);
        let outcome = TestKind::F.evaluate(&wide, &narrow);
        assert!(outcome.statistic > 1.0);
        assert_eq!(outcome.df1, 7.0);
        assert!(outcome.p < 0.01, "p = {}", outcome.p);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TestKind::T.to_string(), "t");
        assert_eq!(TestKind::F.to_string(), "f");
    }
}
