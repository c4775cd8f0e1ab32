//! Implied volatility surfaces over (expiry, strike).
//!
//! - [`MarketContext`]: spot and zero-rate curve, injected wherever a
//!   forward or a rate is needed
//! - [`SabrSurface`]: SABR smiles whose parameters are read off
//!   maturity-indexed curves
//! - [`SabrSurfaceBuilder`]: calibrates one SABR smile per tenor and fits
//!   monotone cubic curves through the parameters

pub mod builder;
pub mod market;
pub mod sabr;

pub use builder::SabrSurfaceBuilder;
pub use market::MarketContext;
pub use sabr::SabrSurface;

use crate::error;
use crate::smile::SmileSection;
use crate::types::{Variance, Vol};

/// A full volatility surface: (expiry, strike) → vol.
///
/// All implementations must be `Send + Sync` so a surface can be shared via
/// `Arc<dyn VolSurface>`. Surfaces are immutable after construction.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sabrvol::curve::FlatCurve;
/// use sabrvol::surface::{MarketContext, SabrSurface, VolSurface};
///
/// let market = MarketContext::flat(100.0, 0.02)?;
/// let surface = SabrSurface::new(
///     market,
///     Arc::new(FlatCurve(5.0)),
///     Arc::new(FlatCurve(0.4)),
///     Arc::new(FlatCurve(-0.3)),
///     0.3,
/// )?;
///
/// let vol = surface.black_vol(0.5, 100.0)?;
/// let var = surface.black_variance(0.5, 100.0)?;
/// assert!((var.0 - vol.0 * vol.0 * 0.5).abs() < 1e-12);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
pub trait VolSurface: Send + Sync + std::fmt::Debug {
    /// Black implied volatility σ(T, K).
    fn black_vol(&self, expiry: f64, strike: f64) -> error::Result<Vol>;

    /// Implied vols at one expiry, index-aligned with `strikes`.
    fn black_vols(&self, expiry: f64, strikes: &[f64]) -> error::Result<Vec<Vol>> {
        strikes.iter().map(|&k| self.black_vol(expiry, k)).collect()
    }

    /// Black total variance σ²(T, K) · T.
    fn black_variance(&self, expiry: f64, strike: f64) -> error::Result<Variance> {
        let v = self.black_vol(expiry, strike)?;
        Ok(Variance(v.0 * v.0 * expiry))
    }

    /// A smile section at the given expiry.
    fn smile_at(&self, expiry: f64) -> error::Result<Box<dyn SmileSection>>;
}
