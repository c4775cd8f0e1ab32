//! Error types for the sabrvol library.
//!
//! All fallible operations return `Result<T, VolError>` rather than panicking
//! or terminating the process. Solver failures carry enough context (cause,
//! iteration count, last estimate) for a caller to retry with another seed.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, VolError>;

/// Which stopping condition ended a Newton-Raphson implied-vol search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverFailure {
    /// Vega fell below the configured floor, so the Newton step is unstable.
    FlatVega,
    /// The next volatility estimate fell below the configured floor.
    VolFloor,
    /// The iteration cap was reached before the step size met the tolerance.
    MaxIterations,
}

impl fmt::Display for SolverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolverFailure::FlatVega => "vega below floor",
            SolverFailure::VolFloor => "volatility below floor",
            SolverFailure::MaxIterations => "iteration limit reached",
        };
        f.write_str(s)
    }
}

/// Errors raised by pricing, calibration and local-vol extraction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VolError {
    /// Smile calibration failed or did not converge.
    #[error("calibration failed: {message}")]
    CalibrationError {
        message: String,
        /// Model that failed (e.g., "SABR").
        model: &'static str,
        /// Final RMS error of the fit, if available.
        rms_error: Option<f64>,
    },

    /// Input data is invalid (e.g., negative vol, zero expiry, mismatched lengths).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Numerical computation failed (e.g., NaN, non-positive model vol).
    #[error("numerical error: {message}")]
    NumericalError { message: String },

    /// Implied volatility search stopped without converging.
    #[error("implied vol solver failed ({reason}) after {iterations} iterations, last vol {last_vol}")]
    Solver {
        reason: SolverFailure,
        iterations: usize,
        /// Last volatility estimate before the failure was detected.
        last_vol: f64,
    },
}
