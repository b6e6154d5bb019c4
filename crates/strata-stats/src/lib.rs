//! Streaming statistical accumulators for the Strata project.
//!
//! This crate provides the numerical core used by the table pipelines:
//!
//! - **Group accumulation**: Per-label sums and counts, exposing group means
//! - **Moment accumulation**: Per-label sums of squares on top of group sums,
//!   exposing population variance and standard deviation
//! - **Linear fits**: One-pass centered cross-product accumulation for `y ~ x`
//! - **Correlation**: Per-label sums of pairs, exposing Pearson correlation
//! - **Hypothesis tests**: Two-tailed Student's t and F tests computed from
//!   group summaries rather than raw samples
//!
//! None of these types retain the observations they are fed. Their memory use is
//! proportional to the number of distinct group labels, not to the number of rows.
//!
//! # Modules
//!
//! - [`group`]: Sum/count accumulation keyed by a group label
//! - [`moments`]: Sum-of-squares accumulation for variance and standard deviation
//! - [`correlation`]: Pearson correlation of `(x, y)` pairs keyed by a group label
//! - [`linear`]: Simple linear regression centered on precomputed means
//! - [`hypothesis`]: t-test and F-test statistics and p-values
//!
//! # Examples
//!
//! ## Group means
//!
//! ```
//! use strata_stats::group::GroupAccumulator;
//!
//! let mut acc = GroupAccumulator::new();
//! acc.add(1.0, "a");
//! acc.add(f64::NAN, "a");
//! acc.add(3.0, "a");
//! assert_eq!(acc.mean("a"), 2.0);
//! assert_eq!(acc.count("a"), 2.0);
//! ```
//!
//! ## Variance
//!
//! ```
//! use strata_stats::moments::MomentAccumulator;
//!
//! let mut acc = MomentAccumulator::new();
//! for value in [2.0, 4.0, 6.0, 8.0] {
//!     acc.add(value, "x");
//! }
//! assert_eq!(acc.mean("x"), 5.0);
//! assert_eq!(acc.variance("x"), 5.0);
//! ```
//!
//! ## Linear fit
//!
//! ```
//! use strata_stats::linear::LinearFit;
//!
//! let points = [(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)];
//! let mut fit = LinearFit::centered_on(1.0, 3.0);
//! for (x, y) in points {
//!     fit.add(x, y);
//! }
//! let model = fit.model();
//! assert_eq!(model.slope, 2.0);
//! assert_eq!(model.intercept, 1.0);
//! ```
//!
//! ## Comparing two groups
//!
//! ```
//! use strata_stats::{hypothesis::TestKind, moments::MomentAccumulator};
//!
//! let mut acc = MomentAccumulator::new();
//! for value in [10.0, 12.0, 11.0, 13.0, 10.0] {
//!     acc.add(value, "baseline");
//! }
//! for value in [25.0, 27.0, 26.0, 28.0, 25.0] {
//!     acc.add(value, "current");
//! }
//! let baseline = acc.summary("baseline").unwrap();
//! let current = acc.summary("current").unwrap();
//! let outcome = TestKind::T.evaluate(&baseline, &current);
//! assert!(outcome.statistic < 0.0);
//! assert!(outcome.p < 0.05);
//! ```

pub mod correlation;
pub mod group;
pub mod hypothesis;
pub mod linear;
pub mod moments;
