use super::constants::MIN_SPLINE_KNOTS;
use super::error::SplineError;

/// An interpolating natural cubic spline.
///
/// Passes exactly through every knot (no smoothing) with zero curvature at both ends.
/// Evaluation outside the knot range extends the polynomial of the nearest interval.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    // Second derivative at each knot
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::LengthMismatch(x.len(), y.len()));
        }
        let n = x.len();
        if n < MIN_SPLINE_KNOTS {
            return Err(SplineError::TooFewKnots(n));
        }
        if let Some(bad) = x.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(SplineError::NonIncreasingKnots(bad + 1));
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

        // Tridiagonal system for the interior second derivatives; the natural boundary
        // pins m[0] and m[n-1] to zero.
        let mut lower = vec![0.0; n];
        let mut diag = vec![1.0; n];
        let mut upper = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 1..(n - 1) {
            lower[i] = h[i - 1];
            diag[i] = 2.0 * (h[i - 1] + h[i]);
            upper[i] = h[i];
            rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }

        // Thomas algorithm
        let mut c_prime = vec![0.0; n];
        let mut d_prime = vec![0.0; n];
        c_prime[0] = upper[0] / diag[0];
        d_prime[0] = rhs[0] / diag[0];
        for i in 1..n {
            let denom = diag[i] - lower[i] * c_prime[i - 1];
            c_prime[i] = upper[i] / denom;
            d_prime[i] = (rhs[i] - lower[i] * d_prime[i - 1]) / denom;
        }
        let mut m = vec![0.0; n];
        m[n - 1] = d_prime[n - 1];
        for i in (0..(n - 1)).rev() {
            m[i] = d_prime[i] - c_prime[i] * m[i + 1];
        }

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Evaluate the spline at t
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.x.len();
        let idx = self.x.partition_point(|xi| *xi <= t);
        let i = idx.saturating_sub(1).min(n - 2);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a.powi(3) - a) * self.m[i] + (b.powi(3) - b) * self.m[i + 1]) * h * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_knots() {
        let x = [0.0, 1.0, 2.5, 3.0, 4.0, 6.0];
        let y = [0.0, 2.0, -1.0, 4.0, 3.0, 0.5];
        let spline = CubicSpline::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert!((spline.eval(*xi) - yi).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reproduces_line() {
        let x = [0.0, 1.0, 2.0, 4.0, 5.0];
        let y = [1.0, 3.0, 5.0, 9.0, 11.0];
        let spline = CubicSpline::new(&x, &y).unwrap();
        assert!((spline.eval(3.0) - 7.0).abs() < 1e-12);
        assert!((spline.eval(6.0) - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_gap_value() {
        // Knots of [1, 2, 3, _, 4, 5] with index 3 missing
        let spline = CubicSpline::new(&[0.0, 1.0, 2.0, 4.0, 5.0], &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let value = spline.eval(3.0);
        assert!((value - 3.506147540983607).abs() < 1e-9);
    }

    #[test]
    fn test_bad_knots() {
        assert_eq!(
            CubicSpline::new(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap_err(),
            SplineError::TooFewKnots(3)
        );
        assert_eq!(
            CubicSpline::new(&[0.0, 1.0, 1.0, 2.0], &[0.0, 1.0, 2.0, 3.0]).unwrap_err(),
            SplineError::NonIncreasingKnots(2)
        );
        assert_eq!(
            CubicSpline::new(&[0.0, 1.0], &[0.0]).unwrap_err(),
            SplineError::LengthMismatch(2, 1)
        );
    }
}
