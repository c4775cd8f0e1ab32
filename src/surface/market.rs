//! Market inputs shared by the surface and the local-vol extraction.

use std::sync::Arc;

use crate::conventions::forward_price;
use crate::curve::{FlatCurve, TermCurve};
use crate::error;
use crate::validate::{validate_finite, validate_positive};

/// Spot level and continuously compounded zero-rate curve.
///
/// Cloning is cheap; the curve is shared.
#[derive(Debug, Clone)]
pub struct MarketContext {
    spot: f64,
    zero_rates: Arc<dyn TermCurve>,
}

impl MarketContext {
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if
    /// `spot` is not positive and finite.
    pub fn new(spot: f64, zero_rates: Arc<dyn TermCurve>) -> error::Result<Self> {
        validate_positive(spot, "spot")?;
        Ok(Self { spot, zero_rates })
    }

    /// Market with a flat zero curve.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if
    /// `spot` is not positive or `rate` is not finite.
    pub fn flat(spot: f64, rate: f64) -> error::Result<Self> {
        validate_finite(rate, "rate")?;
        Self::new(spot, Arc::new(FlatCurve(rate)))
    }

    pub fn spot(&self) -> f64 {
        self.spot
    }

    pub fn zero_curve(&self) -> &Arc<dyn TermCurve> {
        &self.zero_rates
    }

    /// Zero rate r(T).
    pub fn zero_rate(&self, expiry: f64) -> f64 {
        self.zero_rates.value(expiry)
    }

    /// Forward F(T) = S₀ · exp(r(T) · T).
    pub fn forward(&self, expiry: f64) -> f64 {
        forward_price(self.spot, self.zero_rate(expiry), expiry)
    }
}
