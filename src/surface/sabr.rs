//! SABR surface: per-expiry SABR smiles with maturity-indexed parameters.
//!
//! At expiry T the surface evaluates
//!
//! ```text
//! F(T) = S₀ · exp(r(T) · T)
//! σ(T, K) = σ_SABR(T, K; F(T), σ₀(T), α(T), ρ(T), β)
//! ```

use std::sync::Arc;

use crate::curve::TermCurve;
use crate::error::{self, VolError};
use crate::smile::{SabrParams, SabrSmile, SmileSection};
use crate::surface::{MarketContext, VolSurface};
use crate::types::Vol;
use crate::validate::{validate_finite, validate_positive};

/// Implied vol surface built from SABR parameter term structures.
#[derive(Debug, Clone)]
pub struct SabrSurface {
    market: MarketContext,
    sigma0: Arc<dyn TermCurve>,
    alpha: Arc<dyn TermCurve>,
    rho: Arc<dyn TermCurve>,
    beta: f64,
}

impl SabrSurface {
    /// # Errors
    /// Returns [`VolError::InvalidInput`] if `beta` is outside \[0, 1\].
    pub fn new(
        market: MarketContext,
        sigma0: Arc<dyn TermCurve>,
        alpha: Arc<dyn TermCurve>,
        rho: Arc<dyn TermCurve>,
        beta: f64,
    ) -> error::Result<Self> {
        if !(0.0..=1.0).contains(&beta) {
            return Err(VolError::InvalidInput {
                message: format!("beta must be in [0, 1], got {beta}"),
            });
        }
        Ok(Self {
            market,
            sigma0,
            alpha,
            rho,
            beta,
        })
    }

    pub fn market(&self) -> &MarketContext {
        &self.market
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// SABR parameters read off the curves at `expiry`.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] for a non-finite expiry or if the
    /// curves produce parameters outside the model domain at this expiry.
    pub fn params_at(&self, expiry: f64) -> error::Result<SabrParams> {
        validate_finite(expiry, "expiry")?;
        SabrParams::new(
            self.sigma0.value(expiry),
            self.alpha.value(expiry),
            self.rho.value(expiry),
            self.beta,
        )
    }

    /// The SABR smile at `expiry`, with the forward taken from the market.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] for a non-positive expiry or
    /// out-of-domain interpolated parameters.
    pub fn smile(&self, expiry: f64) -> error::Result<SabrSmile> {
        validate_positive(expiry, "expiry")?;
        SabrSmile::new(self.market.forward(expiry), expiry, self.params_at(expiry)?)
    }
}

impl VolSurface for SabrSurface {
    fn black_vol(&self, expiry: f64, strike: f64) -> error::Result<Vol> {
        self.smile(expiry)?.vol(strike)
    }

    fn black_vols(&self, expiry: f64, strikes: &[f64]) -> error::Result<Vec<Vol>> {
        self.smile(expiry)?.vols(strikes)
    }

    fn smile_at(&self, expiry: f64) -> error::Result<Box<dyn SmileSection>> {
        Ok(Box::new(self.smile(expiry)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{FlatCurve, MonotoneCubic};
    use crate::smile::sabr_vol;
    use approx::assert_abs_diff_eq;

    fn flat_surface() -> SabrSurface {
        SabrSurface::new(
            MarketContext::flat(100.0, 0.03).unwrap(),
            Arc::new(FlatCurve(5.0)),
            Arc::new(FlatCurve(0.4)),
            Arc::new(FlatCurve(-0.3)),
            0.3,
        )
        .unwrap()
    }

    #[test]
    fn nan_expiry_is_rejected() {
        let s = SabrSurface::new(
            MarketContext::flat(100.0, 0.03).unwrap(),
            Arc::new(MonotoneCubic::new(vec![0.5, 1.0], vec![5.0, 5.5]).unwrap()),
            Arc::new(FlatCurve(0.4)),
            Arc::new(FlatCurve(-0.3)),
            0.3,
        )
        .unwrap();
        assert!(matches!(s.params_at(f64::NAN), Err(VolError::InvalidInput { .. })));
        assert!(s.black_vol(f64::NAN, 100.0).is_err());
    }

    #[test]
    fn matches_direct_sabr_evaluation() {
        let s = flat_surface();
        let t: f64 = 0.75;
        let fwd = 100.0 * (0.03 * t).exp();
        let p = SabrParams::new(5.0, 0.4, -0.3, 0.3).unwrap();
        for k in [80.0, 95.0, 100.0, 110.0, 130.0] {
            let expected = sabr_vol(t, k, fwd, &p).unwrap();
            assert_abs_diff_eq!(s.black_vol(t, k).unwrap().0, expected.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn vectorized_query_aligns_with_scalar() {
        let s = flat_surface();
        let strikes = [85.0, 100.0, 115.0];
        let vols = s.black_vols(1.0, &strikes).unwrap();
        for (k, v) in strikes.iter().zip(&vols) {
            assert_eq!(s.black_vol(1.0, *k).unwrap(), *v);
        }
    }

    #[test]
    fn params_follow_term_structure() {
        let sigma0 = MonotoneCubic::new(vec![0.5, 1.0, 2.0], vec![4.0, 5.0, 5.5]).unwrap();
        let s = SabrSurface::new(
            MarketContext::flat(100.0, 0.0).unwrap(),
            Arc::new(sigma0),
            Arc::new(FlatCurve(0.4)),
            Arc::new(FlatCurve(-0.3)),
            0.3,
        )
        .unwrap();
        assert_eq!(s.params_at(1.0).unwrap().sigma0(), 5.0);
        assert_eq!(s.params_at(0.1).unwrap().sigma0(), 4.0);
        let mid = s.params_at(1.5).unwrap().sigma0();
        assert!(mid > 5.0 && mid < 5.5);
    }

    #[test]
    fn smile_at_uses_market_forward() {
        let s = flat_surface();
        let smile = s.smile_at(2.0).unwrap();
        assert_abs_diff_eq!(smile.forward(), 100.0 * 0.06_f64.exp(), epsilon = 1e-12);
        assert_eq!(smile.expiry(), 2.0);
    }

    #[test]
    fn rejects_bad_expiry_and_beta() {
        assert!(flat_surface().black_vol(0.0, 100.0).is_err());
        let r = SabrSurface::new(
            MarketContext::flat(100.0, 0.0).unwrap(),
            Arc::new(FlatCurve(5.0)),
            Arc::new(FlatCurve(0.4)),
            Arc::new(FlatCurve(-0.3)),
            1.5,
        );
        assert!(matches!(r, Err(VolError::InvalidInput { .. })));
    }

    #[test]
    fn out_of_domain_curve_is_reported() {
        let s = SabrSurface::new(
            MarketContext::flat(100.0, 0.0).unwrap(),
            Arc::new(FlatCurve(5.0)),
            Arc::new(FlatCurve(0.4)),
            Arc::new(FlatCurve(-1.2)),
            0.3,
        )
        .unwrap();
        assert!(matches!(
            s.black_vol(1.0, 100.0),
            Err(VolError::InvalidInput { .. })
        ));
    }
}
