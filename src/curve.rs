//! Term-structure curves indexed by maturity.
//!
//! The zero-rate curve and the maturity-indexed SABR parameters are all
//! [`TermCurve`]s. Two implementations are provided:
//!
//! - [`FlatCurve`]: a constant.
//! - [`MonotoneCubic`]: shape-preserving piecewise cubic Hermite
//!   interpolation (Fritsch-Carlson), flat outside the knot range.
//!
//! # References
//! - Fritsch, F.N. & Carlson, R.E. "Monotone Piecewise Cubic Interpolation" (1980)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{self, VolError};
use crate::validate::{validate_finite, validate_same_len};

/// A scalar function of maturity, treated as immutable for the duration of a call.
pub trait TermCurve: Send + Sync + fmt::Debug {
    /// Curve value at maturity `t` (years). A NaN maturity yields NaN.
    fn value(&self, t: f64) -> f64;
}

/// A curve with the same value at every maturity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatCurve(pub f64);

impl TermCurve for FlatCurve {
    fn value(&self, _t: f64) -> f64 {
        self.0
    }
}

/// Coefficients for one Hermite interval.
///
/// On \[xᵢ, xᵢ₊₁\]: `y(x) = a + b·(x − xᵢ) + c·(x − xᵢ)² + d·(x − xᵢ)³`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CubicCoeff {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

/// Monotone piecewise cubic interpolator.
///
/// Between knots the interpolant never overshoots the data: it is monotone
/// wherever the data is and preserves local extrema. Outside the knot range
/// the end values are held flat.
///
/// # Examples
/// ```
/// use sabrvol::curve::{MonotoneCubic, TermCurve};
///
/// let curve = MonotoneCubic::new(vec![0.25, 1.0, 2.0], vec![0.01, 0.015, 0.02])?;
/// assert!((curve.value(1.0) - 0.015).abs() < 1e-15);
/// assert_eq!(curve.value(5.0), 0.02);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MonotoneCubicRaw", into = "MonotoneCubicRaw")]
pub struct MonotoneCubic {
    xs: Vec<f64>,
    ys: Vec<f64>,
    coeffs: Vec<CubicCoeff>,
}

#[derive(Serialize, Deserialize)]
struct MonotoneCubicRaw {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl TryFrom<MonotoneCubicRaw> for MonotoneCubic {
    type Error = VolError;
    fn try_from(raw: MonotoneCubicRaw) -> Result<Self, Self::Error> {
        Self::new(raw.xs, raw.ys)
    }
}

impl From<MonotoneCubic> for MonotoneCubicRaw {
    fn from(c: MonotoneCubic) -> Self {
        Self { xs: c.xs, ys: c.ys }
    }
}

impl MonotoneCubic {
    /// Build the interpolant through `(xs[i], ys[i])`.
    ///
    /// A single knot gives a constant curve; two knots give a straight line.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] if the inputs are empty, of
    /// different lengths, non-finite, or `xs` is not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> error::Result<Self> {
        validate_same_len(xs.len(), ys.len(), "knot abscissae and values")?;
        if xs.is_empty() {
            return Err(VolError::InvalidInput {
                message: "monotone cubic requires at least 1 knot".into(),
            });
        }
        for (&x, &y) in xs.iter().zip(&ys) {
            validate_finite(x, "knot abscissa")?;
            validate_finite(y, "knot value")?;
        }
        for (i, w) in xs.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(VolError::InvalidInput {
                    message: format!(
                        "knots must be strictly increasing, but xs[{}]={} >= xs[{}]={}",
                        i,
                        w[0],
                        i + 1,
                        w[1]
                    ),
                });
            }
        }

        let slopes = hermite_slopes(&xs, &ys);
        let coeffs = xs
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let h = w[1] - w[0];
                let delta = (ys[i + 1] - ys[i]) / h;
                let (m0, m1) = (slopes[i], slopes[i + 1]);
                CubicCoeff {
                    a: ys[i],
                    b: m0,
                    c: (3.0 * delta - 2.0 * m0 - m1) / h,
                    d: (m0 + m1 - 2.0 * delta) / (h * h),
                }
            })
            .collect();

        Ok(Self { xs, ys, coeffs })
    }

    /// Knot abscissae.
    pub fn knots(&self) -> &[f64] {
        &self.xs
    }

    /// Knot values.
    pub fn values(&self) -> &[f64] {
        &self.ys
    }
}

impl TermCurve for MonotoneCubic {
    fn value(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        let n = self.xs.len();
        if t <= self.xs[0] {
            return self.ys[0];
        }
        if t >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        let i = self.xs.partition_point(|&x| x <= t) - 1;
        let c = &self.coeffs[i];
        let dx = t - self.xs[i];
        c.a + dx * (c.b + dx * (c.c + dx * c.d))
    }
}

/// Knot derivatives: weighted harmonic mean of neighbouring secants in the
/// interior (zero at local extrema), three-point rule at the ends clipped to
/// keep monotonicity.
fn hermite_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n == 1 {
        return vec![0.0];
    }
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();
    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut m = vec![0.0; n];
    for k in 1..n - 1 {
        let (d0, d1) = (delta[k - 1], delta[k]);
        if d0 == 0.0 || d1 == 0.0 || d0.signum() != d1.signum() {
            m[k] = 0.0;
        } else {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            m[k] = (w1 + w2) / (w1 / d0 + w2 / d1);
        }
    }
    m[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    m[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    m
}

fn end_slope(h0: f64, h1: f64, d0: f64, d1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * d0 - h0 * d1) / (h0 + h1);
    if d.signum() != d0.signum() || d0 == 0.0 {
        0.0
    } else if d0.signum() != d1.signum() && d.abs() > 3.0 * d0.abs() {
        3.0 * d0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nan_maturity_yields_nan() {
        let c = MonotoneCubic::new(vec![0.25, 1.0, 2.0], vec![0.01, 0.02, 0.03]).unwrap();
        assert!(c.value(f64::NAN).is_nan());
        assert_eq!(c.value(f64::INFINITY), 0.03);
        assert_eq!(c.value(f64::NEG_INFINITY), 0.01);
    }

    #[test]
    fn passes_through_knots() {
        let xs = vec![0.1, 0.5, 1.0, 2.0, 5.0];
        let ys = vec![0.02, 0.025, 0.024, 0.03, 0.031];
        let c = MonotoneCubic::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(&ys) {
            assert_abs_diff_eq!(c.value(*x), *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn preserves_monotone_data() {
        let xs = vec![0.0, 1.0, 1.5, 4.0, 4.1, 10.0];
        let ys = vec![0.0, 0.1, 0.9, 1.0, 3.0, 3.01];
        let c = MonotoneCubic::new(xs, ys).unwrap();
        let mut prev = c.value(0.0);
        for i in 1..=1000 {
            let v = c.value(i as f64 * 0.01);
            assert!(v >= prev - 1e-14, "decrease at x={}: {prev} -> {v}", i as f64 * 0.01);
            prev = v;
        }
    }

    #[test]
    fn no_overshoot_at_local_extremum() {
        let c = MonotoneCubic::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]).unwrap();
        for i in 0..=200 {
            let v = c.value(i as f64 * 0.01);
            assert!(v <= 1.0 + 1e-14 && v >= -1e-14, "overshoot {v}");
        }
    }

    #[test]
    fn flat_extrapolation() {
        let c = MonotoneCubic::new(vec![1.0, 2.0, 3.0], vec![5.0, 6.0, 8.0]).unwrap();
        assert_eq!(c.value(0.0), 5.0);
        assert_eq!(c.value(-3.0), 5.0);
        assert_eq!(c.value(100.0), 8.0);
    }

    #[test]
    fn reproduces_linear_data() {
        let c = MonotoneCubic::new(vec![0.0, 1.0, 3.0, 4.0], vec![1.0, 3.0, 7.0, 9.0]).unwrap();
        assert_abs_diff_eq!(c.value(2.0), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.value(0.25), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn one_and_two_knots() {
        let one = MonotoneCubic::new(vec![1.0], vec![0.3]).unwrap();
        assert_eq!(one.value(0.0), 0.3);
        assert_eq!(one.value(7.0), 0.3);

        let two = MonotoneCubic::new(vec![0.0, 2.0], vec![1.0, 2.0]).unwrap();
        assert_abs_diff_eq!(two.value(1.0), 1.5, epsilon = 1e-15);
    }

    #[test]
    fn rejects_bad_knots() {
        assert!(MonotoneCubic::new(vec![], vec![]).is_err());
        assert!(MonotoneCubic::new(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(MonotoneCubic::new(vec![1.0, 1.0], vec![1.0, 2.0]).is_err());
        assert!(MonotoneCubic::new(vec![2.0, 1.0], vec![1.0, 2.0]).is_err());
        assert!(MonotoneCubic::new(vec![1.0, 2.0], vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn flat_curve_is_constant() {
        let c = FlatCurve(0.03);
        assert_eq!(c.value(0.0), 0.03);
        assert_eq!(c.value(30.0), 0.03);
    }

    #[test]
    fn serde_round_trip_rebuilds_coefficients() {
        let c = MonotoneCubic::new(vec![0.5, 1.0, 2.0], vec![0.2, 0.25, 0.22]).unwrap();
        let json = serde_json::to_string(&c).unwrap();
        let back: MonotoneCubic = serde_json::from_str(&json).unwrap();
        for i in 0..30 {
            let t = 0.4 + i as f64 * 0.06;
            assert_eq!(c.value(t), back.value(t));
        }
    }

    #[test]
    fn deserialize_rejects_unsorted_knots() {
        let json = r#"{"xs":[2.0,1.0],"ys":[0.1,0.2]}"#;
        assert!(serde_json::from_str::<MonotoneCubic>(json).is_err());
    }
}
