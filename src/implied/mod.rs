//! Implied volatility extraction from option prices.
//!
//! - [`ImpliedVolSolver`]: Newton-Raphson inversion of the Black-Scholes
//!   price, returning a structured [`VolError::Solver`](crate::VolError::Solver)
//!   on flat vega, a volatility-floor breach, or non-convergence.

pub mod newton;

pub use newton::{ImpliedVolSolution, ImpliedVolSolver, NewtonConfig, implied_vol};
