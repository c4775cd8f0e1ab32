//! Local volatility extraction from implied volatility surfaces.
//!
//! Local volatility σ_loc(t, S) is the instantaneous volatility in the
//! Dupire framework. It is derived from the implied volatility surface
//! via the Dupire formula.
//!
//! # Usage
//! Compose [`DupireLocalVol`] around any [`VolSurface`](crate::surface::VolSurface)
//! rather than calling `local_vol()` on the surface directly. This keeps surface
//! types free of Dupire numerics.
//!
//! # References
//! - Dupire, B. "Pricing with a Smile" (1994)

pub mod dupire;

pub use dupire::DupireLocalVol;

use crate::error;
use crate::types::Vol;

/// Local volatility surface.
///
/// Provides σ_loc(t, S) at any point, derived from an implied vol surface.
pub trait LocalVol: Send + Sync {
    /// Local volatility at time `expiry` and spot level `spot_level`.
    fn local_vol(&self, expiry: f64, spot_level: f64) -> error::Result<Vol>;

    /// Local vols along a time grid at a fixed spot level, index-aligned
    /// with `expiries`.
    fn local_vols(&self, expiries: &[f64], spot_level: f64) -> error::Result<Vec<Vol>> {
        expiries
            .iter()
            .map(|&t| self.local_vol(t, spot_level))
            .collect()
    }
}
