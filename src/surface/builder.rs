//! Builder that calibrates a [`SabrSurface`] from per-tenor market smiles.
//!
//! ```
//! use sabrvol::surface::{SabrSurfaceBuilder, VolSurface};
//!
//! let strikes = vec![80.0, 90.0, 95.0, 100.0, 105.0, 110.0, 120.0];
//! let vols = vec![0.28, 0.24, 0.22, 0.20, 0.21, 0.22, 0.25];
//!
//! let surface = SabrSurfaceBuilder::new()
//!     .spot(100.0)
//!     .flat_rate(0.02)
//!     .add_tenor(0.25, &strikes, &vols)
//!     .add_tenor(1.00, &strikes, &vols)
//!     .build()
//!     .unwrap();
//!
//! let vol = surface.black_vol(0.5, 100.0).unwrap();
//! assert!(vol.0 > 0.0);
//! ```

use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::curve::{FlatCurve, MonotoneCubic, TermCurve};
use crate::error::{self, VolError};
use crate::smile::{CalibrationConfig, SabrCalibration, SabrParams, SabrSmile, SmileSection};
use crate::surface::{MarketContext, SabrSurface};
use crate::validate::validate_positive;

/// Accumulates spot, zero curve and per-tenor (strikes, vols) quotes, then
/// calibrates one SABR smile per tenor and interpolates the parameters
/// across maturities with [`MonotoneCubic`] curves.
#[derive(Debug)]
pub struct SabrSurfaceBuilder {
    spot: Option<f64>,
    zero_curve: Option<Arc<dyn TermCurve>>,
    beta: f64,
    config: CalibrationConfig,
    require_convergence: bool,
    tenor_data: Vec<TenorData>,
}

#[derive(Debug)]
struct TenorData {
    expiry: f64,
    strikes: Vec<f64>,
    vols: Vec<f64>,
}

impl SabrSurfaceBuilder {
    /// Create a builder with β = [`SabrParams::DEFAULT_BETA`] and default
    /// calibration settings.
    pub fn new() -> Self {
        Self {
            spot: None,
            zero_curve: None,
            beta: SabrParams::DEFAULT_BETA,
            config: CalibrationConfig::default(),
            require_convergence: false,
            tenor_data: Vec::new(),
        }
    }

    /// Set the spot price.
    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    /// Use a flat zero rate.
    pub fn flat_rate(mut self, rate: f64) -> Self {
        self.zero_curve = Some(Arc::new(FlatCurve(rate)));
        self
    }

    /// Use a zero-rate term structure.
    pub fn zero_curve(mut self, curve: Arc<dyn TermCurve>) -> Self {
        self.zero_curve = Some(curve);
        self
    }

    /// Set the fixed CEV exponent used for every tenor.
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Override the per-tenor calibration settings.
    pub fn calibration_config(mut self, config: CalibrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Reject the build if any tenor's fit is not converged (see
    /// [`SabrCalibration::ensure_converged`]). Off by default: such fits are
    /// kept and only counted in the build log.
    pub fn require_convergence(mut self, require: bool) -> Self {
        self.require_convergence = require;
        self
    }

    /// Add market data for a tenor.
    ///
    /// `strikes` (ascending) and `vols` must have the same length.
    pub fn add_tenor(mut self, expiry: f64, strikes: &[f64], vols: &[f64]) -> Self {
        self.tenor_data.push(TenorData {
            expiry,
            strikes: strikes.to_vec(),
            vols: vols.to_vec(),
        });
        self
    }

    /// Build the surface.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] if spot or the zero curve is
    /// missing, no tenors were added, two tenors share an expiry, or any
    /// tenor's data is invalid; propagates calibration errors, including
    /// non-converged fits when [`require_convergence`](Self::require_convergence)
    /// is set.
    pub fn build(self) -> error::Result<SabrSurface> {
        self.build_with_calibrations().map(|(surface, _)| surface)
    }

    /// Build the surface and return the per-tenor fits, sorted by expiry.
    ///
    /// # Errors
    /// See [`build`](Self::build).
    pub fn build_with_calibrations(self) -> error::Result<(SabrSurface, Vec<SabrCalibration>)> {
        #[cfg(feature = "logging")]
        tracing::debug!(
            n_tenors = self.tenor_data.len(),
            beta = self.beta,
            "SABR surface build started"
        );

        let spot = self.spot.ok_or_else(|| VolError::InvalidInput {
            message: "spot price is required".into(),
        })?;
        let zero_curve = self.zero_curve.ok_or_else(|| VolError::InvalidInput {
            message: "zero-rate curve is required".into(),
        })?;
        let market = MarketContext::new(spot, zero_curve)?;

        if self.tenor_data.is_empty() {
            return Err(VolError::InvalidInput {
                message: "at least one tenor is required".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(VolError::InvalidInput {
                message: format!("SABR beta must be in [0, 1], got {}", self.beta),
            });
        }

        let beta = self.beta;
        let config = self.config;
        let require_convergence = self.require_convergence;
        let calibrate_tenor = |tenor: &TenorData| -> error::Result<SabrCalibration> {
            validate_positive(tenor.expiry, "expiry")?;
            let forward = market.forward(tenor.expiry);
            let calibration = SabrSmile::calibrate_with(
                tenor.expiry,
                forward,
                &tenor.strikes,
                &tenor.vols,
                beta,
                &config,
            )?;
            if require_convergence {
                calibration.ensure_converged()
            } else {
                Ok(calibration)
            }
        };

        #[cfg(feature = "parallel")]
        let mut calibrations: Vec<SabrCalibration> = self
            .tenor_data
            .par_iter()
            .map(calibrate_tenor)
            .collect::<error::Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let mut calibrations: Vec<SabrCalibration> = self
            .tenor_data
            .iter()
            .map(calibrate_tenor)
            .collect::<error::Result<Vec<_>>>()?;

        calibrations.sort_by(|a, b| a.smile.expiry().total_cmp(&b.smile.expiry()));
        for w in calibrations.windows(2) {
            if w[0].smile.expiry() == w[1].smile.expiry() {
                return Err(VolError::InvalidInput {
                    message: format!("duplicate tenor {}", w[0].smile.expiry()),
                });
            }
        }

        let expiries: Vec<f64> = calibrations.iter().map(|c| c.smile.expiry()).collect();
        let curve = |f: fn(&SabrParams) -> f64| -> error::Result<Arc<dyn TermCurve>> {
            let ys = calibrations.iter().map(|c| f(c.smile.params())).collect();
            Ok(Arc::new(MonotoneCubic::new(expiries.clone(), ys)?))
        };
        let sigma0 = curve(SabrParams::sigma0)?;
        let alpha = curve(SabrParams::alpha)?;
        let rho = curve(SabrParams::rho)?;

        #[cfg(feature = "logging")]
        tracing::debug!(
            n_tenors = expiries.len(),
            converged = calibrations.iter().filter(|c| c.converged).count(),
            "SABR surface build complete"
        );

        let surface = SabrSurface::new(market, sigma0, alpha, rho, beta)?;
        Ok((surface, calibrations))
    }
}

impl Default for SabrSurfaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
