//! Closed-form option pricing.
//!
//! - [`black_scholes`]: European price and vega under Black-Scholes with a
//!   constant continuous dividend yield.

pub mod black_scholes;

pub use black_scholes::{OptionSpec, norm_cdf, norm_pdf, price, vega};
