//! Finite-difference derivatives of fallible scalar functions.
//!
//! Shared by the Dupire extraction (strike and maturity sensitivities of the
//! implied surface, slope of the zero curve) so the step-size logic lives in
//! one place.

use serde::{Deserialize, Serialize};

use crate::error;
use crate::validate::validate_positive;

/// Stencil for first derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// `(f(x + h) − f(x)) / h`, first-order accurate.
    Forward,
    /// `(f(x + h) − f(x − h)) / 2h`, second-order accurate.
    Central,
}

/// A finite-difference operator with a fixed step and stencil.
///
/// # Examples
/// ```
/// use sabrvol::numdiff::{FiniteDifference, Scheme};
///
/// let fd = FiniteDifference::new(1e-5, Scheme::Central)?;
/// let d = fd.first(|x| Ok(x * x), 3.0)?;
/// assert!((d - 6.0).abs() < 1e-8);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiniteDifference {
    step: f64,
    scheme: Scheme,
}

impl FiniteDifference {
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if
    /// `step` is not positive and finite.
    pub fn new(step: f64, scheme: Scheme) -> error::Result<Self> {
        validate_positive(step, "finite-difference step")?;
        Ok(Self { step, scheme })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// First derivative of `f` at `x`.
    pub fn first<F>(&self, f: F, x: f64) -> error::Result<f64>
    where
        F: Fn(f64) -> error::Result<f64>,
    {
        let fx = match self.scheme {
            Scheme::Forward => f(x)?,
            // unused by the central stencil
            Scheme::Central => 0.0,
        };
        self.first_from(f, x, fx)
    }

    /// First derivative of `f` at `x` when `f(x)` is already known.
    pub fn first_from<F>(&self, f: F, x: f64, fx: f64) -> error::Result<f64>
    where
        F: Fn(f64) -> error::Result<f64>,
    {
        let h = self.step;
        match self.scheme {
            Scheme::Forward => Ok((f(x + h)? - fx) / h),
            Scheme::Central => Ok((f(x + h)? - f(x - h)?) / (2.0 * h)),
        }
    }

    /// Second derivative `(f(x + h) − 2f(x) + f(x − h)) / h²`, always central.
    pub fn second<F>(&self, f: F, x: f64) -> error::Result<f64>
    where
        F: Fn(f64) -> error::Result<f64>,
    {
        let fx = f(x)?;
        self.second_from(f, x, fx)
    }

    /// Second derivative when `f(x)` is already known.
    pub fn second_from<F>(&self, f: F, x: f64, fx: f64) -> error::Result<f64>
    where
        F: Fn(f64) -> error::Result<f64>,
    {
        let h = self.step;
        Ok((f(x + h)? + f(x - h)? - 2.0 * fx) / (h * h))
    }
}
