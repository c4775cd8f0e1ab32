//! SABR (Stochastic Alpha Beta Rho) smile model.
//!
//! SABR models the forward as a CEV process with stochastic volatility:
//!
//! ```text
//! dF = σ · F^β · dW₁
//! dσ = α · σ · dW₂
//! dW₁·dW₂ = ρ dt,   σ(0) = σ₀
//! ```
//!
//! The Hagan expansion gives a closed-form approximation of the Black
//! implied volatility as a function of strike:
//!
//! ```text
//! fk   = (F·K)^(1−β),  l = ln(F/K)
//! a    = (1−β)²/24 · σ₀²/fk
//! b    = ¼ · ρβασ₀ / √fk
//! c    = (2 − 3ρ²) · α²/24
//! z    = α·√fk·l / σ₀
//! x(z) = ln[(√(1 − 2ρz + z²) + z − ρ) / (1 − ρ)]
//! σ_B  = σ₀·(1 + (a+b+c)T) · z / (√fk·(1 + (1−β)²l²/24 + (1−β)⁴l⁴/1920) · x(z))
//! ```
//!
//! The `z / x(z)` factor is dropped when `|z| ≤ 1e-4`, where both terms
//! vanish near the forward.
//!
//! # References
//! - Hagan, P. et al. "Managing Smile Risk" (2002)

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::conventions::log_moneyness;
use crate::error::{self, VolError};
use crate::optim::{Bounds, NelderMeadConfig, NelderMeadResult, nelder_mead};
use crate::smile::SmileSection;
use crate::types::Vol;
use crate::validate::{validate_positive, validate_same_len};

/// `|z|` at or below which the ATM form of the expansion is used.
const ATM_Z_THRESHOLD: f64 = 1e-4;

/// Lower bound on σ₀ during calibration.
pub const SIGMA0_FLOOR: f64 = 0.01;
/// Lower bound on α during calibration.
pub const ALPHA_FLOOR: f64 = 0.01;
/// Calibrated ρ is kept in `[−RHO_BOUND, RHO_BOUND]`.
pub const RHO_BOUND: f64 = 0.99;

/// SABR parameter set with a fixed CEV exponent.
///
/// # Examples
/// ```
/// use sabrvol::smile::SabrParams;
///
/// let p = SabrParams::with_default_beta(0.2, 0.4, -0.25)?;
/// assert_eq!(p.beta(), 0.3);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SabrParamsRaw", into = "SabrParamsRaw")]
pub struct SabrParams {
    /// Initial vol level σ₀ > 0.
    sigma0: f64,
    /// Vol-of-vol α > 0.
    alpha: f64,
    /// Spot-vol correlation ρ ∈ (−1, 1).
    rho: f64,
    /// CEV exponent β ∈ \[0, 1\].
    beta: f64,
}

#[derive(Serialize, Deserialize)]
struct SabrParamsRaw {
    sigma0: f64,
    alpha: f64,
    rho: f64,
    beta: f64,
}

impl TryFrom<SabrParamsRaw> for SabrParams {
    type Error = VolError;
    fn try_from(raw: SabrParamsRaw) -> Result<Self, Self::Error> {
        Self::new(raw.sigma0, raw.alpha, raw.rho, raw.beta)
    }
}

impl From<SabrParams> for SabrParamsRaw {
    fn from(p: SabrParams) -> Self {
        Self {
            sigma0: p.sigma0,
            alpha: p.alpha,
            rho: p.rho,
            beta: p.beta,
        }
    }
}

impl SabrParams {
    /// Conventional β when none is supplied.
    pub const DEFAULT_BETA: f64 = 0.3;

    /// # Errors
    /// Returns [`VolError::InvalidInput`] if σ₀ or α is not positive, ρ is
    /// outside (−1, 1), or β is outside \[0, 1\].
    pub fn new(sigma0: f64, alpha: f64, rho: f64, beta: f64) -> error::Result<Self> {
        validate_positive(sigma0, "sigma0")?;
        validate_positive(alpha, "alpha")?;

        if rho.abs() >= 1.0 || rho.is_nan() {
            return Err(VolError::InvalidInput {
                message: format!("rho must be in (-1, 1), got {rho}"),
            });
        }

        if !(0.0..=1.0).contains(&beta) {
            return Err(VolError::InvalidInput {
                message: format!("beta must be in [0, 1], got {beta}"),
            });
        }

        Ok(Self {
            sigma0,
            alpha,
            rho,
            beta,
        })
    }

    /// Parameters with β = [`DEFAULT_BETA`](Self::DEFAULT_BETA).
    pub fn with_default_beta(sigma0: f64, alpha: f64, rho: f64) -> error::Result<Self> {
        Self::new(sigma0, alpha, rho, Self::DEFAULT_BETA)
    }

    pub fn sigma0(&self) -> f64 {
        self.sigma0
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }
}

/// Hagan log-normal vol without input checks. Used directly by the
/// calibration objective.
fn hagan_lognormal(
    expiry: f64,
    strike: f64,
    forward: f64,
    sigma0: f64,
    alpha: f64,
    rho: f64,
    beta: f64,
) -> f64 {
    let one_m_beta = 1.0 - beta;
    let fk_beta = (forward * strike).powf(one_m_beta);
    let sqrt_fk = fk_beta.sqrt();
    let log_fk = log_moneyness(forward, strike);

    let a = one_m_beta * one_m_beta / 24.0 * sigma0 * sigma0 / fk_beta;
    let b = 0.25 * rho * beta * alpha * sigma0 / sqrt_fk;
    let c = (2.0 - 3.0 * rho * rho) * alpha * alpha / 24.0;
    let z = alpha * sqrt_fk * log_fk / sigma0;

    let l2 = log_fk * log_fk;
    let omb2 = one_m_beta * one_m_beta;
    let mut num = sigma0 * (1.0 + (a + b + c) * expiry);
    let mut den = sqrt_fk * (1.0 + omb2 * l2 / 24.0 + omb2 * omb2 * l2 * l2 / 1920.0);

    if z.abs() > ATM_Z_THRESHOLD {
        num *= z;
        den *= x_of_z(rho, z);
    }
    num / den
}

fn x_of_z(rho: f64, z: f64) -> f64 {
    (((1.0 - 2.0 * rho * z + z * z).sqrt() + z - rho) / (1.0 - rho)).ln()
}

fn checked_vol(v: f64, strike: f64) -> error::Result<Vol> {
    if !v.is_finite() || v <= 0.0 {
        return Err(VolError::NumericalError {
            message: format!("SABR expansion produced invalid vol {v} at strike {strike}"),
        });
    }
    Ok(Vol(v))
}

/// Hagan (2002) log-normal SABR volatility at one strike.
///
/// # Errors
/// Returns [`VolError::InvalidInput`] for non-positive expiry, strike or
/// forward, and [`VolError::NumericalError`] if the expansion breaks down
/// (non-finite or non-positive result).
///
/// # Examples
/// ```
/// use sabrvol::smile::{SabrParams, sabr_vol};
///
/// let p = SabrParams::with_default_beta(0.2, 0.5, -0.3)?;
/// let v = sabr_vol(1.0, 0.9, 1.0, &p)?;
/// assert!(v.0 > sabr_vol(1.0, 1.1, 1.0, &p)?.0);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
pub fn sabr_vol(expiry: f64, strike: f64, forward: f64, params: &SabrParams) -> error::Result<Vol> {
    validate_positive(expiry, "expiry")?;
    validate_positive(strike, "strike")?;
    validate_positive(forward, "forward")?;
    let v = hagan_lognormal(
        expiry,
        strike,
        forward,
        params.sigma0,
        params.alpha,
        params.rho,
        params.beta,
    );
    checked_vol(v, strike)
}

/// Nelder-Mead settings, start points and acceptance rules for SABR
/// calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Iteration limit per simplex run.
    pub max_iterations: usize,
    /// Simplex diameter convergence threshold.
    pub diameter_tol: f64,
    /// Objective value spread convergence threshold.
    pub fvalue_tol: f64,
    /// Extra runs restarted from the best point to escape a collapsed simplex.
    pub restarts: usize,
    /// Vol-of-vol of the fixed start point.
    pub initial_alpha: f64,
    /// Correlation of the fixed start point.
    pub initial_rho: f64,
    /// Number of best (α, ρ) seed-grid points polished alongside the fixed
    /// start point.
    pub grid_starts: usize,
    /// RMS vol error above which a fit is not reported as converged.
    pub max_rms_error: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            diameter_tol: 1e-10,
            fvalue_tol: 1e-20,
            restarts: 3,
            initial_alpha: 0.2,
            initial_rho: -0.2,
            grid_starts: 3,
            max_rms_error: 5e-3,
        }
    }
}

/// Outcome of [`SabrSmile::calibrate`]: the fitted smile plus fit diagnostics.
#[derive(Debug, Clone)]
pub struct SabrCalibration {
    /// The smile at the best parameters found.
    pub smile: SabrSmile,
    /// Sum of squared vol errors at the best parameters.
    pub sse: f64,
    /// Total simplex iterations across all start points and restarts.
    pub iterations: usize,
    /// The optimizer converged, no parameter sits on its calibration bound
    /// and the RMS error is within [`CalibrationConfig::max_rms_error`].
    pub converged: bool,
    /// Whether the best simplex run met a tolerance before its iteration limit.
    pub optimizer_converged: bool,
    /// Whether σ₀, α or ρ ended on its calibration bound.
    pub at_bound: bool,
    n_quotes: usize,
    max_rms_error: f64,
}

impl SabrCalibration {
    /// Root-mean-square vol error of the fit.
    pub fn rms_error(&self) -> f64 {
        (self.sse / self.n_quotes as f64).sqrt()
    }

    /// Turn a non-converged fit into an error.
    ///
    /// # Errors
    /// Returns [`VolError::CalibrationError`] if `converged` is false, naming
    /// each failed acceptance rule.
    pub fn ensure_converged(self) -> error::Result<Self> {
        if self.converged {
            return Ok(self);
        }
        let rms = self.rms_error();
        let mut reasons = Vec::new();
        if !self.optimizer_converged {
            reasons.push(format!(
                "optimizer stopped after {} iterations without converging",
                self.iterations
            ));
        }
        if self.at_bound {
            reasons.push("parameters pinned to a calibration bound".to_string());
        }
        if rms > self.max_rms_error {
            reasons.push(format!(
                "rms error {rms:.3e} above tolerance {:.3e}",
                self.max_rms_error
            ));
        }
        if reasons.is_empty() {
            reasons.push("fit rejected".to_string());
        }
        Err(VolError::CalibrationError {
            message: reasons.join("; "),
            model: "SABR",
            rms_error: Some(rms),
        })
    }
}

/// SABR volatility smile at a single expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SabrSmileRaw", into = "SabrSmileRaw")]
pub struct SabrSmile {
    forward: f64,
    expiry: f64,
    params: SabrParams,
}

#[derive(Serialize, Deserialize)]
struct SabrSmileRaw {
    forward: f64,
    expiry: f64,
    params: SabrParams,
}

impl TryFrom<SabrSmileRaw> for SabrSmile {
    type Error = VolError;
    fn try_from(raw: SabrSmileRaw) -> Result<Self, Self::Error> {
        Self::new(raw.forward, raw.expiry, raw.params)
    }
}

impl From<SabrSmile> for SabrSmileRaw {
    fn from(s: SabrSmile) -> Self {
        Self {
            forward: s.forward,
            expiry: s.expiry,
            params: s.params,
        }
    }
}

impl SabrSmile {
    /// Create a SABR smile from parameters.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] if forward or expiry is not positive.
    pub fn new(forward: f64, expiry: f64, params: SabrParams) -> error::Result<Self> {
        validate_positive(forward, "forward")?;
        validate_positive(expiry, "expiry")?;
        Ok(Self {
            forward,
            expiry,
            params,
        })
    }

    pub fn params(&self) -> &SabrParams {
        &self.params
    }

    /// Calibrate (σ₀, α, ρ) to market vols with default settings.
    ///
    /// See [`calibrate_with`](Self::calibrate_with).
    pub fn calibrate(
        expiry: f64,
        forward: f64,
        strikes: &[f64],
        market_vols: &[f64],
        beta: f64,
    ) -> error::Result<SabrCalibration> {
        Self::calibrate_with(
            expiry,
            forward,
            strikes,
            market_vols,
            beta,
            &CalibrationConfig::default(),
        )
    }

    /// Calibrate (σ₀, α, ρ) by minimizing `Σ (σ_SABR(Kᵢ) − σᵢ)²` with β fixed.
    ///
    /// σ₀ is searched on the ATM vol scale `σ₀ / F^(1−β)`. Every start point
    /// takes its σ₀ from inverting the quote nearest the money. The starts
    /// are the configured (α, ρ) and the best
    /// [`grid_starts`](CalibrationConfig::grid_starts) points of a coarse
    /// (α, ρ) grid. Each is polished by Nelder-Mead with restarts within
    /// σ₀ ≥ [`SIGMA0_FLOOR`], α ≥ [`ALPHA_FLOOR`], |ρ| ≤ [`RHO_BOUND`], and
    /// the best fit wins.
    ///
    /// # Arguments
    /// * `expiry`: Time to expiry in years (must be > 0)
    /// * `forward`: Forward price (must be > 0)
    /// * `strikes`: Strikes sorted ascending, index-aligned with `market_vols`
    /// * `market_vols`: Market implied vols (at least 3)
    /// * `beta`: Fixed CEV exponent in \[0, 1\]
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] for mismatched lengths, fewer than 3
    /// quotes, out-of-domain inputs or a non-positive `max_rms_error`;
    /// [`VolError::CalibrationError`] if the optimizer ends on parameters the
    /// model rejects.
    pub fn calibrate_with(
        expiry: f64,
        forward: f64,
        strikes: &[f64],
        market_vols: &[f64],
        beta: f64,
        config: &CalibrationConfig,
    ) -> error::Result<SabrCalibration> {
        /// Three free parameters.
        const MIN_POINTS: usize = 3;
        /// Fixed-point steps when matching σ₀ to the ATM quote.
        const ATM_SEED_STEPS: usize = 8;
        /// Distance to a bound that counts as pinned (relative for σ₀).
        const BOUND_TOL: f64 = 1e-4;
        const SEED_ALPHAS: [f64; 6] = [0.05, 0.15, 0.3, 0.5, 0.8, 1.2];
        const SEED_RHOS: [f64; 9] = [-0.8, -0.6, -0.4, -0.2, 0.0, 0.2, 0.4, 0.6, 0.8];

        validate_positive(expiry, "expiry")?;
        validate_positive(forward, "forward")?;
        validate_same_len(strikes.len(), market_vols.len(), "strikes and market vols")?;
        if strikes.len() < MIN_POINTS {
            return Err(VolError::InvalidInput {
                message: format!(
                    "at least {MIN_POINTS} market points required, got {}",
                    strikes.len()
                ),
            });
        }
        for (&k, &v) in strikes.iter().zip(market_vols) {
            validate_positive(k, "strike")?;
            validate_positive(v, "market vol")?;
        }
        if !(0.0..=1.0).contains(&beta) {
            return Err(VolError::InvalidInput {
                message: format!("beta must be in [0, 1], got {beta}"),
            });
        }
        if config.max_rms_error.is_nan() || config.max_rms_error <= 0.0 {
            return Err(VolError::InvalidInput {
                message: format!(
                    "max_rms_error must be positive, got {}",
                    config.max_rms_error
                ),
            });
        }

        #[cfg(feature = "logging")]
        tracing::debug!(
            forward,
            expiry,
            beta,
            n_quotes = strikes.len(),
            "SABR calibration started"
        );

        // x = (σ₀ / F^(1−β), α, ρ)
        let scale = forward.powf(1.0 - beta);
        let objective = |x: &[f64; 3]| -> f64 {
            strikes
                .iter()
                .zip(market_vols)
                .map(|(&k, &v)| {
                    let model = hagan_lognormal(expiry, k, forward, x[0] * scale, x[1], x[2], beta);
                    (model - v) * (model - v)
                })
                .sum()
        };

        let bounds = Bounds {
            lower: [SIGMA0_FLOOR / scale, ALPHA_FLOOR, -RHO_BOUND],
            upper: [f64::INFINITY, f64::INFINITY, RHO_BOUND],
        };
        let nm_config = NelderMeadConfig {
            max_iter: config.max_iterations,
            diameter_tol: config.diameter_tol,
            fvalue_tol: config.fvalue_tol,
        };

        let (atm_strike, atm_vol) = strikes
            .iter()
            .copied()
            .zip(market_vols.iter().copied())
            .min_by(|a, b| {
                log_moneyness(forward, a.0)
                    .abs()
                    .total_cmp(&log_moneyness(forward, b.0).abs())
            })
            .ok_or_else(|| VolError::InvalidInput {
                message: "no market quotes".into(),
            })?;

        // Scaled σ₀ reproducing the ATM quote for the given (α, ρ)
        let atm_seed = |alpha: f64, rho: f64| -> Option<f64> {
            let mut sigma0 = atm_vol * (forward * atm_strike).powf(0.5 * (1.0 - beta));
            for _ in 0..ATM_SEED_STEPS {
                let model = hagan_lognormal(expiry, atm_strike, forward, sigma0, alpha, rho, beta);
                if !model.is_finite() || model <= 0.0 {
                    return None;
                }
                sigma0 *= atm_vol / model;
            }
            (sigma0.is_finite() && sigma0 > 0.0).then(|| (sigma0 / scale).max(bounds.lower[0]))
        };

        let mut grid: Vec<([f64; 3], f64)> = SEED_ALPHAS
            .iter()
            .flat_map(|&alpha| SEED_RHOS.iter().map(move |&rho| (alpha, rho)))
            .filter_map(|(alpha, rho)| atm_seed(alpha, rho).map(|s| [s, alpha, rho]))
            .map(|x| (x, objective(&x)))
            .filter(|(_, f)| f.is_finite())
            .collect();
        grid.sort_by(|a, b| a.1.total_cmp(&b.1));

        let fixed_start = [
            atm_seed(config.initial_alpha, config.initial_rho).unwrap_or(atm_vol),
            config.initial_alpha,
            config.initial_rho,
        ];
        let starts = std::iter::once(fixed_start).chain(
            grid.iter()
                .take(config.grid_starts)
                .map(|(x, _)| *x),
        );

        let mut best: Option<NelderMeadResult<3>> = None;
        let mut iterations = 0;
        for x0 in starts {
            let steps = [0.25 * x0[0].max(bounds.lower[0]), 0.1, 0.1];
            let mut result = nelder_mead(objective, x0, steps, &bounds, &nm_config);
            iterations += result.iterations;
            for _ in 0..config.restarts {
                let restart = nelder_mead(objective, result.x, steps, &bounds, &nm_config);
                iterations += restart.iterations;
                let improvement = result.fval - restart.fval;
                if restart.fval <= result.fval {
                    result = restart;
                }
                if improvement <= config.fvalue_tol {
                    break;
                }
            }
            if best.is_none_or(|b| result.fval < b.fval) {
                best = Some(result);
            }
        }
        let result = best.ok_or_else(|| VolError::CalibrationError {
            message: "no start point evaluated".into(),
            model: "SABR",
            rms_error: None,
        })?;

        let [x_sigma0, alpha, rho] = result.x;
        let sigma0 = x_sigma0 * scale;
        let n_quotes = strikes.len();
        let rms = (result.fval / n_quotes as f64).sqrt();
        let at_bound = x_sigma0 <= bounds.lower[0] * (1.0 + BOUND_TOL)
            || alpha <= ALPHA_FLOOR + BOUND_TOL
            || rho.abs() >= RHO_BOUND - BOUND_TOL;
        let converged = result.converged && !at_bound && rms <= config.max_rms_error;

        #[cfg(feature = "logging")]
        tracing::debug!(
            sigma0,
            alpha,
            rho,
            sse = result.fval,
            iterations,
            converged,
            at_bound,
            "SABR calibration complete"
        );

        let smile = SabrParams::new(sigma0, alpha, rho, beta)
            .and_then(|p| Self::new(forward, expiry, p))
            .map_err(|e| VolError::CalibrationError {
                message: format!("calibrated params invalid: {e}"),
                model: "SABR",
                rms_error: Some(rms),
            })?;

        Ok(SabrCalibration {
            smile,
            sse: result.fval,
            iterations,
            converged,
            optimizer_converged: result.converged,
            at_bound,
            n_quotes,
            max_rms_error: config.max_rms_error,
        })
    }
}

impl SmileSection for SabrSmile {
    fn vol(&self, strike: f64) -> error::Result<Vol> {
        sabr_vol(self.expiry, strike, self.forward, &self.params)
    }

    fn vols(&self, strikes: &[f64]) -> error::Result<Vec<Vol>> {
        #[cfg(feature = "parallel")]
        let vols = strikes.par_iter().map(|&k| self.vol(k)).collect();
        #[cfg(not(feature = "parallel"))]
        let vols = strikes.iter().map(|&k| self.vol(k)).collect();
        vols
    }

    fn forward(&self) -> f64 {
        self.forward
    }

    fn expiry(&self) -> f64 {
        self.expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const F: f64 = 1.0;
    const T: f64 = 1.0;
    const SIGMA0: f64 = 0.2;
    const ALPHA: f64 = 0.5;
    const RHO: f64 = -0.3;

    fn params() -> SabrParams {
        SabrParams::with_default_beta(SIGMA0, ALPHA, RHO).unwrap()
    }

    fn make_smile() -> SabrSmile {
        SabrSmile::new(F, T, params()).unwrap()
    }

    fn grid() -> Vec<f64> {
        (0..13).map(|i| 0.7 + 0.05 * i as f64).collect()
    }

    // --- Parameter validation ---

    #[test]
    fn params_accessors() {
        let p = SabrParams::new(0.3, 0.4, 0.1, 0.5).unwrap();
        assert_eq!(p.sigma0(), 0.3);
        assert_eq!(p.alpha(), 0.4);
        assert_eq!(p.rho(), 0.1);
        assert_eq!(p.beta(), 0.5);
        assert_eq!(params().beta(), SabrParams::DEFAULT_BETA);
    }

    #[test]
    fn params_beta_edges_accepted() {
        assert!(SabrParams::new(0.2, 0.4, 0.0, 0.0).is_ok());
        assert!(SabrParams::new(0.2, 0.4, 0.0, 1.0).is_ok());
    }

    #[test]
    fn params_reject_out_of_range() {
        let bad = [
            (0.0, ALPHA, RHO, 0.3),
            (-0.1, ALPHA, RHO, 0.3),
            (f64::NAN, ALPHA, RHO, 0.3),
            (SIGMA0, 0.0, RHO, 0.3),
            (SIGMA0, f64::INFINITY, RHO, 0.3),
            (SIGMA0, ALPHA, 1.0, 0.3),
            (SIGMA0, ALPHA, -1.0, 0.3),
            (SIGMA0, ALPHA, f64::NAN, 0.3),
            (SIGMA0, ALPHA, RHO, -0.1),
            (SIGMA0, ALPHA, RHO, 1.1),
            (SIGMA0, ALPHA, RHO, f64::NAN),
        ];
        for (s, a, r, b) in bad {
            let res = SabrParams::new(s, a, r, b);
            assert!(
                matches!(res, Err(VolError::InvalidInput { .. })),
                "accepted ({s}, {a}, {r}, {b})"
            );
        }
    }

    #[test]
    fn smile_rejects_bad_forward_and_expiry() {
        assert!(SabrSmile::new(0.0, T, params()).is_err());
        assert!(SabrSmile::new(F, -1.0, params()).is_err());
        assert!(SabrSmile::new(f64::NAN, T, params()).is_err());
    }

    // --- Hagan expansion ---

    #[test]
    fn atm_limit_matches_closed_form() {
        // With F = 1, fk^β = 1 near the money and the vol reduces to σ₀(1 + (a+b+c)T)
        let beta = SabrParams::DEFAULT_BETA;
        let a = (1.0 - beta).powi(2) / 24.0 * SIGMA0 * SIGMA0;
        let b = 0.25 * RHO * beta * ALPHA * SIGMA0;
        let c = (2.0 - 3.0 * RHO * RHO) * ALPHA * ALPHA / 24.0;
        let expected = SIGMA0 * (1.0 + (a + b + c) * T);

        let v = sabr_vol(T, F * (1.0 + 1e-9), F, &params()).unwrap();
        assert_abs_diff_eq!(v.0, expected, epsilon = 1e-9);
        let exact = sabr_vol(T, F, F, &params()).unwrap();
        assert_abs_diff_eq!(exact.0, expected, epsilon = 1e-15);
    }

    #[test]
    fn atm_branch_scales_with_forward_level() {
        let f: f64 = 100.0;
        let beta = SabrParams::DEFAULT_BETA;
        let fk = f.powf(2.0 * (1.0 - beta));
        let a = (1.0 - beta).powi(2) / 24.0 * SIGMA0 * SIGMA0 / fk;
        let b = 0.25 * RHO * beta * ALPHA * SIGMA0 / fk.sqrt();
        let c = (2.0 - 3.0 * RHO * RHO) * ALPHA * ALPHA / 24.0;
        let expected = SIGMA0 * (1.0 + (a + b + c) * T) / fk.sqrt();
        let v = sabr_vol(T, f, f, &params()).unwrap();
        assert_abs_diff_eq!(v.0, expected, epsilon = 1e-14);
    }

    #[test]
    fn continuous_across_atm_threshold() {
        let atm = sabr_vol(T, F, F, &params()).unwrap().0;
        // z ≈ α·ln(F/K)/σ₀ ≈ 2.5e-4 here, so the x(z) branch is active
        let near = sabr_vol(T, F * (1.0 - 1e-4), F, &params()).unwrap().0;
        assert!((near - atm).abs() < 1e-4, "atm={atm}, near={near}");
    }

    #[test]
    fn negative_rho_gives_downward_skew() {
        let s = make_smile();
        let low = s.vol(0.8).unwrap().0;
        let high = s.vol(1.2).unwrap().0;
        assert!(low > high, "low={low}, high={high}");
    }

    #[test]
    fn vols_align_with_strikes() {
        let s = make_smile();
        let strikes = grid();
        let vols = s.vols(&strikes).unwrap();
        assert_eq!(vols.len(), strikes.len());
        for (k, v) in strikes.iter().zip(&vols) {
            assert_eq!(s.vol(*k).unwrap(), *v);
        }
    }

    #[test]
    fn vols_propagate_invalid_strike() {
        let s = make_smile();
        assert!(s.vols(&[0.9, -1.0, 1.1]).is_err());
    }

    #[test]
    fn variance_is_vol_squared_times_expiry() {
        let s = SabrSmile::new(F, 0.5, params()).unwrap();
        let v = s.vol(0.9).unwrap().0;
        assert_abs_diff_eq!(s.variance(0.9).unwrap().0, v * v * 0.5, epsilon = 1e-15);
    }

    #[test]
    fn sabr_vol_rejects_bad_inputs() {
        assert!(sabr_vol(0.0, 1.0, 1.0, &params()).is_err());
        assert!(sabr_vol(1.0, 0.0, 1.0, &params()).is_err());
        assert!(sabr_vol(1.0, 1.0, -1.0, &params()).is_err());
    }

    // --- Calibration ---

    #[test]
    fn calibration_recovers_parameters() {
        let strikes = grid();
        let vols: Vec<f64> = make_smile().vols(&strikes).unwrap().iter().map(|v| v.0).collect();

        let cal = SabrSmile::calibrate(T, F, &strikes, &vols, SabrParams::DEFAULT_BETA).unwrap();
        let p = cal.smile.params();
        assert!(cal.converged);
        assert_abs_diff_eq!(p.sigma0(), SIGMA0, epsilon = 1e-3);
        assert_abs_diff_eq!(p.alpha(), ALPHA, epsilon = 1e-3);
        assert_abs_diff_eq!(p.rho(), RHO, epsilon = 1e-3);
        assert!(cal.rms_error() < 1e-6, "rms = {}", cal.rms_error());
    }

    /// Noiseless quotes on 70..130 around an equity-level forward.
    fn equity_quotes(expiry: f64, truth: &SabrParams) -> (Vec<f64>, Vec<f64>) {
        let strikes: Vec<f64> = (0..13).map(|i| 70.0 + 5.0 * i as f64).collect();
        let smile = SabrSmile::new(100.0, expiry, *truth).unwrap();
        let vols = smile.vols(&strikes).unwrap().iter().map(|v| v.0).collect();
        (strikes, vols)
    }

    fn assert_recovers(expiry: f64, sigma0: f64, alpha: f64, rho: f64) {
        let truth = SabrParams::new(sigma0, alpha, rho, 0.3).unwrap();
        let (strikes, vols) = equity_quotes(expiry, &truth);
        let cal = SabrSmile::calibrate(expiry, 100.0, &strikes, &vols, 0.3).unwrap();
        let p = cal.smile.params();
        let case = format!(
            "T={expiry} truth=({sigma0}, {alpha}, {rho}) got=({}, {}, {}) rms={:e}",
            p.sigma0(),
            p.alpha(),
            p.rho(),
            cal.rms_error()
        );
        assert!(cal.converged, "{case}");
        assert!((p.sigma0() - sigma0).abs() < 1e-3, "{case}");
        assert!((p.alpha() - alpha).abs() < 1e-3, "{case}");
        assert!((p.rho() - rho).abs() < 1e-3, "{case}");
    }

    #[test]
    fn calibration_fits_equity_level_forward() {
        // σ₀ sits near vol · F^(1−β) ≈ 5 here, far above the ATM vol itself
        assert_recovers(0.5, 5.0, 0.4, -0.25);
    }

    #[test]
    fn calibration_recovers_parameter_grid() {
        for expiry in [0.25, 0.5, 1.0, 2.0] {
            for sigma0 in [4.0, 6.0] {
                for alpha in [0.2, 0.6] {
                    for rho in [-0.5, 0.0, 0.25] {
                        assert_recovers(expiry, sigma0, alpha, rho);
                    }
                }
            }
        }
    }

    #[test]
    fn calibration_respects_bounds() {
        // A flat smile wants α → 0; the fit must stop at the floor
        let strikes = grid();
        let vols = vec![0.2; strikes.len()];
        let cal = SabrSmile::calibrate(T, F, &strikes, &vols, 0.3).unwrap();
        let p = cal.smile.params();
        assert!(p.sigma0() >= SIGMA0_FLOOR);
        assert!(p.alpha() >= ALPHA_FLOOR);
        assert!(p.rho().abs() <= RHO_BOUND);
    }

    #[test]
    fn fit_pinned_to_bound_is_not_converged() {
        // With β = 1 a flat smile is exactly α → 0, below the α floor
        let strikes = grid();
        let vols = vec![0.2; strikes.len()];
        let cal = SabrSmile::calibrate(T, F, &strikes, &vols, 1.0).unwrap();
        assert!(cal.smile.params().alpha() < 2.0 * ALPHA_FLOOR);
        assert!(cal.at_bound);
        assert!(!cal.converged);
        match cal.ensure_converged() {
            Err(VolError::CalibrationError { message, model, .. }) => {
                assert_eq!(model, "SABR");
                assert!(message.contains("bound"), "{message}");
            }
            other => panic!("expected calibration error, got {other:?}"),
        }
    }

    #[test]
    fn poor_fit_is_not_converged() {
        // Alternating quotes no smooth smile can follow
        let strikes = grid();
        let vols: Vec<f64> = (0..strikes.len())
            .map(|i| if i % 2 == 0 { 0.2 } else { 0.3 })
            .collect();
        let cal = SabrSmile::calibrate(T, F, &strikes, &vols, 0.3).unwrap();
        assert!(cal.rms_error() > 5e-3, "rms = {}", cal.rms_error());
        assert!(!cal.converged);
        let err = cal.ensure_converged().unwrap_err();
        assert!(err.to_string().contains("rms error"), "{err}");
    }

    #[test]
    fn calibration_rejects_non_positive_rms_tolerance() {
        let strikes = grid();
        let vols: Vec<f64> = make_smile().vols(&strikes).unwrap().iter().map(|v| v.0).collect();
        let config = CalibrationConfig {
            max_rms_error: 0.0,
            ..CalibrationConfig::default()
        };
        let r = SabrSmile::calibrate_with(T, F, &strikes, &vols, 0.3, &config);
        assert!(matches!(r, Err(VolError::InvalidInput { .. })));
    }

    #[test]
    fn calibration_rejects_mismatched_lengths() {
        let r = SabrSmile::calibrate(T, F, &[0.9, 1.0, 1.1], &[0.2, 0.2], 0.3);
        assert!(matches!(r, Err(VolError::InvalidInput { .. })));
    }

    #[test]
    fn calibration_rejects_too_few_points() {
        let r = SabrSmile::calibrate(T, F, &[0.9, 1.1], &[0.2, 0.2], 0.3);
        assert!(matches!(r, Err(VolError::InvalidInput { .. })));
    }

    #[test]
    fn calibration_rejects_non_positive_vol() {
        let r = SabrSmile::calibrate(T, F, &[0.9, 1.0, 1.1], &[0.2, 0.0, 0.2], 0.3);
        assert!(matches!(r, Err(VolError::InvalidInput { .. })));
    }

    #[test]
    fn ensure_converged_flags_truncated_fit() {
        let strikes = grid();
        let vols: Vec<f64> = make_smile().vols(&strikes).unwrap().iter().map(|v| v.0).collect();
        let config = CalibrationConfig {
            max_iterations: 2,
            restarts: 0,
            ..CalibrationConfig::default()
        };
        let cal = SabrSmile::calibrate_with(T, F, &strikes, &vols, 0.3, &config).unwrap();
        assert!(!cal.optimizer_converged);
        assert!(!cal.converged);
        match cal.ensure_converged() {
            Err(VolError::CalibrationError {
                message,
                model,
                rms_error,
            }) => {
                assert_eq!(model, "SABR");
                assert!(rms_error.is_some());
                assert!(message.contains("without converging"), "{message}");
            }
            other => panic!("expected calibration error, got {other:?}"),
        }
    }

    // --- Serde ---

    #[test]
    fn serde_round_trip() {
        let s = make_smile();
        let json = serde_json::to_string(&s).unwrap();
        let s2: SabrSmile = serde_json::from_str(&json).unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn deserialize_rejects_invalid_rho() {
        let json = r#"{"sigma0":0.2,"alpha":0.5,"rho":1.5,"beta":0.3}"#;
        assert!(serde_json::from_str::<SabrParams>(json).is_err());
    }
}
