//! Dupire local volatility extraction.
//!
//! Works directly on implied volatility σ(T, K) rather than total variance:
//!
//! ```text
//!            2·∂σ/∂T + σ/T + 2·K·r(T)·∂σ/∂K
//! σ²_loc = ─────────────────────────────────────────────────────────────────
//!          K²·(∂²σ/∂K² − d₁·√T·(∂σ/∂K)² + (1/(K·√T) + d₁·∂σ/∂K)² / σ)
//!
//! d₁   = (ln(S₀/K) + z(T)·T + ½σ²T) / (σ·√T)
//! r(T) = z(T) + T·∂z/∂T        (instantaneous forward rate)
//! ```
//!
//! where z(T) is the zero rate and the strike K is identified with the spot
//! level S at which the local vol is queried. A negative ratio is clamped
//! to zero.
//!
//! # References
//! - Dupire, B. "Pricing with a Smile" (1994)

use std::fmt;
use std::sync::Arc;

use crate::error::{self, VolError};
use crate::numdiff::{FiniteDifference, Scheme};
use crate::surface::{MarketContext, VolSurface};
use crate::types::Vol;
use crate::validate::{validate_finite, validate_positive};

use super::LocalVol;

/// Substituted for `t = 0`, where `σ/t` and `1/√t` are undefined.
const MIN_EXPIRY: f64 = 1e-4;

/// Dupire local vol derived from an implied vol surface and the market it
/// was built on.
#[derive(Clone)]
pub struct DupireLocalVol {
    surface: Arc<dyn VolSurface>,
    market: MarketContext,
    time_bump: f64,
}

impl fmt::Debug for DupireLocalVol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DupireLocalVol")
            .field("surface", &self.surface)
            .field("spot", &self.market.spot())
            .field("time_bump", &self.time_bump)
            .finish()
    }
}

impl DupireLocalVol {
    /// Default maturity step. The strike step is `time_bump · S`.
    pub const DEFAULT_TIME_BUMP: f64 = 1e-5;

    /// Create a Dupire local vol from an implied vol surface.
    ///
    /// `market` supplies S₀ and the zero curve used in d₁ and r(T).
    pub fn new(surface: Arc<dyn VolSurface>, market: MarketContext) -> Self {
        Self {
            surface,
            market,
            time_bump: Self::DEFAULT_TIME_BUMP,
        }
    }

    /// Override the finite-difference step.
    ///
    /// # Errors
    ///
    /// Returns [`VolError::InvalidInput`] if `time_bump` is zero, negative,
    /// NaN, or infinite.
    pub fn with_time_bump(mut self, time_bump: f64) -> error::Result<Self> {
        validate_positive(time_bump, "time_bump")?;
        self.time_bump = time_bump;
        Ok(self)
    }

    pub fn time_bump(&self) -> f64 {
        self.time_bump
    }

    pub fn market(&self) -> &MarketContext {
        &self.market
    }
}

impl LocalVol for DupireLocalVol {
    /// # Errors
    /// Returns [`VolError::InvalidInput`] for a negative or non-finite
    /// `expiry` or a non-positive `spot_level`; propagates surface errors;
    /// returns [`VolError::NumericalError`] if the Dupire ratio is infinite.
    fn local_vol(&self, expiry: f64, spot_level: f64) -> error::Result<Vol> {
        validate_finite(expiry, "expiry")?;
        if expiry < 0.0 {
            return Err(VolError::InvalidInput {
                message: format!("expiry must be non-negative, got {expiry}"),
            });
        }
        validate_positive(spot_level, "spot level")?;

        let t = if expiry == 0.0 { MIN_EXPIRY } else { expiry };
        let s = spot_level;
        let sqrt_t = t.sqrt();

        let d_time = FiniteDifference::new(self.time_bump, Scheme::Forward)?;
        let d_strike = FiniteDifference::new(self.time_bump * s, Scheme::Forward)?;

        let vol_at = |tt: f64, k: f64| self.surface.black_vol(tt, k).map(|v| v.0);

        let vol = vol_at(t, s)?;
        let zc = self.market.zero_rate(t);
        let r_t = zc + t * d_time.first_from(|tt| Ok(self.market.zero_rate(tt)), t, zc)?;

        let dvol_dt = d_time.first_from(|tt| vol_at(tt, s), t, vol)?;
        let dvol_dk = d_strike.first_from(|k| vol_at(t, k), s, vol)?;
        let d2vol_dk2 = d_strike.second_from(|k| vol_at(t, k), s, vol)?;

        let d1 = ((self.market.spot() / s).ln() + zc * t + 0.5 * vol * vol * t) / (vol * sqrt_t);

        let num = 2.0 * dvol_dt + vol / t + 2.0 * s * r_t * dvol_dk;
        let skew_term = 1.0 / (s * sqrt_t) + d1 * dvol_dk;
        let den = s * s * (d2vol_dk2 - d1 * sqrt_t * dvol_dk * dvol_dk + skew_term * skew_term / vol);

        let ratio = num / den;
        if ratio.is_infinite() {
            return Err(VolError::NumericalError {
                message: format!(
                    "infinite local variance at t={t}, S={s} (denominator {den})"
                ),
            });
        }
        if ratio.is_nan() || ratio < 0.0 {
            #[cfg(feature = "logging")]
            tracing::debug!(t, s, num, den, "negative local variance clamped to zero");
            return Ok(Vol(0.0));
        }

        Ok(Vol(ratio.sqrt()))
    }
}
