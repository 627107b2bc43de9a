//! Natural cubic spline through filament sample points.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Natural cubic spline over strictly increasing abscissae.
///
/// Outside the fitted range the curve continues linearly along the
/// endpoint tangent, which is what long, almost horizontal staff line
/// filaments need when probed slightly past their ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots, zero at both ends.
    m: Vec<f64>,
}

impl NaturalSpline {
    /// Fits a spline through the given points.
    ///
    /// Returns `None` with fewer than two points or non increasing
    /// abscissae. Two points yield a straight segment.
    pub fn fit(points: &[Point2<f64>]) -> Option<Self> {
        let n = points.len();
        if n < 2 {
            return None;
        }
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        let mut m = vec![0.0; n];
        if n > 2 {
            // Thomas algorithm on the interior knots.
            let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
            let k = n - 2;
            let mut diag = vec![0.0; k];
            let mut upper = vec![0.0; k];
            let mut rhs = vec![0.0; k];
            for i in 0..k {
                diag[i] = 2.0 * (h[i] + h[i + 1]);
                upper[i] = h[i + 1];
                rhs[i] = 6.0 * ((ys[i + 2] - ys[i + 1]) / h[i + 1] - (ys[i + 1] - ys[i]) / h[i]);
            }
            for i in 1..k {
                let factor = h[i] / diag[i - 1];
                diag[i] -= factor * upper[i - 1];
                rhs[i] -= factor * rhs[i - 1];
            }
            m[k] = rhs[k - 1] / diag[k - 1];
            for i in (1..k).rev() {
                m[i] = (rhs[i - 1] - upper[i - 1] * m[i + 1]) / diag[i - 1];
            }
        }
        Some(Self { xs, ys, m })
    }

    #[inline]
    pub fn first_x(&self) -> f64 {
        self.xs[0]
    }

    #[inline]
    pub fn last_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    /// Index of the segment containing `x`, clamped to the valid range.
    fn segment(&self, x: f64) -> usize {
        let n = self.xs.len();
        match self.xs.binary_search_by(|v| v.partial_cmp(&x).unwrap()) {
            Ok(i) => i.min(n - 2),
            Err(i) => i.saturating_sub(1).min(n - 2),
        }
    }

    /// Ordinate at `x`, linearly extrapolated outside the knot range.
    pub fn y_at(&self, x: f64) -> f64 {
        if x < self.first_x() {
            return self.ys[0] + (x - self.first_x()) * self.slope_at(self.first_x());
        }
        if x > self.last_x() {
            let n = self.xs.len();
            return self.ys[n - 1] + (x - self.last_x()) * self.slope_at(self.last_x());
        }
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }

    /// Tangent slope dy/dx at `x`, constant outside the knot range.
    pub fn slope_at(&self, x: f64) -> f64 {
        let x = x.clamp(self.first_x(), self.last_x());
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        (self.ys[i + 1] - self.ys[i]) / h
            + ((3.0 * b * b - 1.0) * self.m[i + 1] - (3.0 * a * a - 1.0) * self.m[i]) * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_knots() {
        let pts = [
            Point2::new(0.0, 1.0),
            Point2::new(3.0, 2.5),
            Point2::new(7.0, 2.0),
            Point2::new(12.0, 4.0),
        ];
        let spline = NaturalSpline::fit(&pts).unwrap();
        for p in &pts {
            assert!(
                (spline.y_at(p.x) - p.y).abs() < 1e-9,
                "knot ({}, {}) missed: {}",
                p.x,
                p.y,
                spline.y_at(p.x)
            );
        }
    }

    #[test]
    fn two_points_make_a_line() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(10.0, 5.0)];
        let spline = NaturalSpline::fit(&pts).unwrap();
        assert!((spline.y_at(4.0) - 2.0).abs() < 1e-9);
        assert!((spline.slope_at(4.0) - 0.5).abs() < 1e-9);
        // Extrapolation continues the same line.
        assert!((spline.y_at(20.0) - 10.0).abs() < 1e-9);
        assert!((spline.y_at(-10.0) + 5.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(NaturalSpline::fit(&[Point2::new(1.0, 1.0)]).is_none());
        let bad = [Point2::new(0.0, 0.0), Point2::new(0.0, 1.0)];
        assert!(NaturalSpline::fit(&bad).is_none());
    }
}
