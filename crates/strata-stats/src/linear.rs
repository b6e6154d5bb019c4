//! Simple linear regression of `y ~ x` from streamed observations.
//!
//! A [`LinearFit`] is centered on means that were computed in an earlier pass
//! over the same data. Each call to [`LinearFit::add`] then accumulates the
//! centered cross product and the centered squared deviation of `x`, from which
//! the least-squares slope and intercept follow:
//!
//! ```text
//! slope     = Σ (x - x̄)(y - ȳ) / Σ (x - x̄)²
//! intercept = ȳ - slope * x̄
//! ```
//!
//! The centering means stay fixed for the lifetime of the fit.

/// Accumulator for a single independent/dependent variable pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    x_mean: f64,
    y_mean: f64,
    cross_product_sum: f64,
    x_deviation_sq_sum: f64,
    count: f64,
}

impl LinearFit {
    /// Creates an empty fit centered on the given means.
    #[must_use]
    pub fn centered_on(x_mean: f64, y_mean: f64) -> Self {
        Self {
            x_mean,
            y_mean,
            cross_product_sum: 0.0,
            x_deviation_sq_sum: 0.0,
            count: 0.0,
        }
    }

    /// Accumulates one `(x, y)` observation.
    ///
    /// Pairs where either coordinate is NaN are ignored.
    pub fn add(&mut self, x: f64, y: f64) {
        if x.is_nan() || y.is_nan() {
            return;
        }
        let x_dev = x - self.x_mean;
        let y_dev = y - self.y_mean;
        self.cross_product_sum += x_dev * y_dev;
        self.x_deviation_sq_sum += x_dev * x_dev;
        self.count += 1.0;
    }

    #[must_use]
    pub fn x_mean(&self) -> f64 {
        self.x_mean
    }

    #[must_use]
    pub fn y_mean(&self) -> f64 {
        self.y_mean
    }

    /// Number of accepted observations.
    #[must_use]
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Least-squares slope.
    ///
    /// When `x` has no spread the denominator is zero and the result is NaN or
    /// infinite.
    #[must_use]
    pub fn slope(&self) -> f64 {
        self.cross_product_sum / self.x_deviation_sq_sum
    }

    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.y_mean - self.slope() * self.x_mean
    }

    /// Coefficients of the fitted line.
    #[must_use]
    pub fn model(&self) -> LinearModel {
        LinearModel {
            slope: self.slope(),
            intercept: self.intercept(),
        }
    }
}

/// Coefficients of `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    #[must_use]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Predicted `y` for `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Observed `y` minus the prediction for `x`.
    #[must_use]
    pub fn residual(&self, y: f64, x: f64) -> f64 {
        y - self.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn fit_points(points: &[(f64, f64)]) -> LinearFit {
        #[expect(clippy::cast_precision_loss)]
        let n = points.len() as f64;
        let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;
        let mut fit = LinearFit::centered_on(x_mean, y_mean);
        for &(x, y) in points {
            fit.add(x, y);
        }
        fit
    }

    #[test]
    fn test_perfect_line() {
        let points = (0..5)
            .map(|x| {
                let x = f64::from(x);
                (x, 2.0 * x + 1.0)
            })
            .collect::<Vec<_>>();
        let fit = fit_points(&points);
        let model = fit.model();

        assert_close(model.slope, 2.0);
        assert_close(model.intercept, 1.0);
        assert_eq!(fit.count(), 5.0);
        for (x, y) in points {
            assert_close(model.residual(y, x), 0.0);
        }
    }

    #[test]
    fn test_noisy_line_matches_least_squares() {
        let points = [(1.0, 2.1), (2.0, 3.9), (3.0, 6.2), (4.0, 7.8), (5.0, 10.1)];
        let model = fit_points(&points).model();
        // Closed-form least squares for these points
        assert_close(model.slope, 1.99);
        assert_close(model.intercept, 0.05);
    }

    #[test]
    fn test_negative_slope() {
        let points = [(0.0, 10.0), (1.0, 7.0), (2.0, 4.0)];
        let model = fit_points(&points).model();
        assert_close(model.slope, -3.0);
        assert_close(model.intercept, 10.0);
    }

    #[test]
    fn test_zero_x_variance_is_not_finite() {
        let fit = fit_points(&[(3.0, 1.0), (3.0, 2.0), (3.0, 5.0)]);
        assert!(!fit.slope().is_finite());
        assert!(!fit.intercept().is_finite());
    }

    #[test]
    fn test_single_point_slope_is_nan() {
        let fit = fit_points(&[(1.0, 1.0)]);
        assert!(fit.slope().is_nan());
    }

    #[test]
    fn test_nan_pairs_are_ignored() {
        let mut fit = LinearFit::centered_on(1.0, 3.0);
        fit.add(0.0, 1.0);
        fit.add(f64::NAN, 100.0);
        fit.add(1.0, f64::NAN);
        fit.add(1.0, 3.0);
        fit.add(2.0, 5.0);
        assert_eq!(fit.count(), 3.0);
        assert_close(fit.slope(), 2.0);
    }

    #[test]
    fn test_predict_and_residual() {
        let model = LinearModel::new(2.0, 1.0);
        assert_eq!(model.predict(3.0), 7.0);
        assert_eq!(model.residual(10.0, 3.0), 3.0);
    }
}
