//! Newton-Raphson implied volatility.
//!
//! Iterates `σ ← σ − (V(σ) − P) / vega(σ)` until the step is within
//! tolerance. The three stopping conditions that make the step unusable are
//! reported as [`SolverFailure`] values so callers can retry from another seed.

use serde::{Deserialize, Serialize};

use crate::error::{self, SolverFailure, VolError};
use crate::pricing::OptionSpec;
use crate::types::Vol;
use crate::validate::{validate_finite, validate_positive};

/// Newton-Raphson stopping rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// Absolute tolerance on `|σ_next − σ|`.
    pub tolerance: f64,
    /// Vega below this is treated as flat.
    pub min_vega: f64,
    /// Volatility estimates below this are rejected.
    pub min_vol: f64,
    /// Maximum number of Newton steps.
    pub max_iterations: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            min_vega: 1e-4,
            min_vol: 1e-4,
            max_iterations: 300,
        }
    }
}

/// A converged implied volatility with the number of Newton steps taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpliedVolSolution {
    pub vol: Vol,
    pub iterations: usize,
}

/// Newton-Raphson implied volatility solver.
///
/// # Examples
/// ```
/// use sabrvol::implied::ImpliedVolSolver;
/// use sabrvol::pricing::OptionSpec;
/// use sabrvol::types::OptionType;
///
/// let spec = OptionSpec::new(OptionType::Call, 100.0, 1.0, 100.0, 0.02)?;
/// let market = spec.price(0.2)?;
/// let sol = ImpliedVolSolver::default().solve(market, 0.15, &spec)?;
/// assert!((sol.vol.0 - 0.2).abs() < 1e-6);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpliedVolSolver {
    config: NewtonConfig,
}

impl ImpliedVolSolver {
    /// Create a solver with custom stopping rules.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`] if a tolerance or floor is not
    /// positive, or `max_iterations` is zero.
    pub fn new(config: NewtonConfig) -> error::Result<Self> {
        validate_positive(config.tolerance, "tolerance")?;
        validate_positive(config.min_vega, "min_vega")?;
        validate_positive(config.min_vol, "min_vol")?;
        if config.max_iterations == 0 {
            return Err(VolError::InvalidInput {
                message: "max_iterations must be at least 1".into(),
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    /// Recover the volatility that reprices `option` to `market_price`,
    /// starting the search at `init_vol`.
    ///
    /// # Errors
    /// - [`VolError::InvalidInput`] if `market_price` is not finite or
    ///   `init_vol` is not positive.
    /// - [`VolError::Solver`] with [`SolverFailure::FlatVega`],
    ///   [`SolverFailure::VolFloor`] or [`SolverFailure::MaxIterations`].
    pub fn solve(
        &self,
        market_price: f64,
        init_vol: f64,
        option: &OptionSpec,
    ) -> error::Result<ImpliedVolSolution> {
        validate_finite(market_price, "market price")?;
        validate_positive(init_vol, "initial vol")?;

        let cfg = &self.config;
        let mut vol = init_vol;

        for iteration in 1..=cfg.max_iterations {
            let diff = option.price_unchecked(vol) - market_price;
            let vega = option.vega_unchecked(vol);
            if vega.is_nan() || vega < cfg.min_vega {
                return Err(self.fail(SolverFailure::FlatVega, iteration, vol));
            }

            let next_vol = vol - diff / vega;
            if next_vol.is_nan() || next_vol < cfg.min_vol {
                return Err(self.fail(SolverFailure::VolFloor, iteration, next_vol));
            }

            if (next_vol - vol).abs() <= cfg.tolerance {
                return Ok(ImpliedVolSolution {
                    vol: Vol(next_vol),
                    iterations: iteration,
                });
            }
            vol = next_vol;
        }

        Err(self.fail(SolverFailure::MaxIterations, cfg.max_iterations, vol))
    }

    fn fail(&self, reason: SolverFailure, iterations: usize, last_vol: f64) -> VolError {
        #[cfg(feature = "logging")]
        tracing::debug!(%reason, iterations, last_vol, "implied vol search failed");

        VolError::Solver {
            reason,
            iterations,
            last_vol,
        }
    }
}

/// Implied volatility with the default stopping rules.
///
/// # Errors
/// See [`ImpliedVolSolver::solve`].
pub fn implied_vol(market_price: f64, init_vol: f64, option: &OptionSpec) -> error::Result<Vol> {
    ImpliedVolSolver::default()
        .solve(market_price, init_vol, option)
        .map(|s| s.vol)
}
