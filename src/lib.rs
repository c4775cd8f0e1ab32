//! # sabrvol
//!
//! Option pricing and volatility modelling around the SABR smile.
//!
//! Provides the pipeline: market smiles per tenor → SABR calibration →
//! maturity-interpolated implied vol surface → Dupire local volatility, plus
//! closed-form Black-Scholes pricing and a Newton-Raphson implied-vol solver.
//!
//! ## Architecture
//!
//! - **`pricing`**: Black-Scholes price and vega with a dividend yield
//! - **`implied`**: Implied volatility by Newton-Raphson with structured failures
//! - **`smile`**: Hagan SABR smile and its bounded least-squares calibration
//! - **`curve`**: Term-structure interpolators (flat, monotone cubic)
//! - **`surface`**: Market context, SABR surface and its builder
//! - **`local_vol`**: Dupire local volatility extraction
//! - **`numdiff`**: Finite-difference derivatives shared by the above
//!
//! ## Design
//!
//! - **Newtypes for outputs, bare `f64` for inputs.** [`Vol`] and [`Variance`]
//!   wrap return values to prevent accidental mixing. Inputs take raw `f64`
//!   for ergonomics; validation happens inside constructors and the builder.
//! - **No panics, no aborts.** Every fallible operation returns [`Result`].
//!   Solver breakdowns surface as [`VolError::Solver`] with a
//!   [`SolverFailure`] reason, the iteration count and the last estimate.
//! - **Explicit market data.** Spot and the zero curve travel in a
//!   [`MarketContext`](surface::MarketContext) instead of globals.
//! - **Thread-safe.** All traits require `Send + Sync`. Surfaces can be shared
//!   via `Arc<dyn VolSurface>` across pricing threads.
//! - **Serializable.** Value types and model structs implement Serde
//!   `Serialize` / `Deserialize` with validation on deserialization where
//!   invariants exist.
//!
//! ## Example
//!
//! ```
//! use sabrvol::implied::implied_vol;
//! use sabrvol::pricing::OptionSpec;
//! use sabrvol::OptionType;
//!
//! let spec = OptionSpec::new(OptionType::Call, 100.0, 1.0, 100.0, 0.02)?;
//! let premium = spec.price(0.2)?;
//! assert!((premium - 8.916).abs() < 1e-3);
//!
//! let vol = implied_vol(premium, 0.15, &spec)?;
//! assert!((vol.0 - 0.2).abs() < 1e-6);
//! # Ok::<(), sabrvol::VolError>(())
//! ```

pub mod conventions;
pub mod curve;
pub mod error;
pub mod implied;
pub mod local_vol;
pub mod numdiff;
mod optim;
pub mod pricing;
pub mod smile;
pub mod surface;
pub mod types;
mod validate;

#[doc(inline)]
pub use error::{Result, SolverFailure, VolError};
#[doc(inline)]
pub use local_vol::LocalVol;
#[doc(inline)]
pub use smile::SmileSection;
#[doc(inline)]
pub use surface::VolSurface;
#[doc(inline)]
pub use types::{OptionType, Variance, Vol};
