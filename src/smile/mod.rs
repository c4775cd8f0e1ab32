//! Single-tenor volatility smile models.
//!
//! A smile represents how implied volatility varies with strike at a fixed
//! expiry. All models implement the [`SmileSection`] trait.
//!
//! ## Models
//!
//! - [`SabrSmile`]: Hagan (2002) log-normal SABR expansion with fixed beta,
//!   calibrated by bounded least squares

pub mod sabr;

pub use sabr::{CalibrationConfig, SabrCalibration, SabrParams, SabrSmile, sabr_vol};

use crate::error;
use crate::types::{Variance, Vol};

/// A single-tenor volatility smile.
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use in concurrent pricing.
pub trait SmileSection: Send + Sync {
    /// Implied Black volatility σ at the given strike.
    fn vol(&self, strike: f64) -> error::Result<Vol>;

    /// Implied vols at each strike, index-aligned with `strikes`.
    fn vols(&self, strikes: &[f64]) -> error::Result<Vec<Vol>> {
        strikes.iter().map(|&k| self.vol(k)).collect()
    }

    /// Total Black variance σ²T at the given strike.
    fn variance(&self, strike: f64) -> error::Result<Variance> {
        let v = self.vol(strike)?;
        Ok(Variance(v.0 * v.0 * self.expiry()))
    }

    /// Forward price F at this tenor.
    fn forward(&self) -> f64;

    /// Time to expiry T in years.
    fn expiry(&self) -> f64;
}
