//! Black-Scholes European option pricing.
//!
//! ```text
//! d1 = (ln(S/K) + (r − q)·T + ½σ²T) / (σ√T)
//! d2 = d1 − σ√T
//! V  = φ·(S·e^(−qT)·N(φ·d1) − K·e^(−rT)·N(φ·d2)),   φ = +1 call, −1 put
//! ∂V/∂σ = K·e^(−rT)·n(d2)·√T
//! ```
//!
//! The validated entry points ([`price`], [`vega`], [`OptionSpec`]) reject
//! non-positive strike, expiry, spot and volatility instead of letting the
//! formulas divide by zero.

use std::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::error::{self, VolError};
use crate::types::OptionType;
use crate::validate::{validate_finite, validate_non_negative, validate_positive};

/// Standard normal CDF.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal PDF.
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// A European option contract together with the market inputs that do not
/// depend on volatility.
///
/// # Examples
/// ```
/// use sabrvol::pricing::OptionSpec;
/// use sabrvol::types::OptionType;
///
/// let spec = OptionSpec::new(OptionType::Call, 100.0, 1.0, 100.0, 0.02)?;
/// let p = spec.price(0.2)?;
/// assert!((p - 8.916).abs() < 1e-3);
/// # Ok::<(), sabrvol::VolError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OptionSpecRaw", into = "OptionSpecRaw")]
pub struct OptionSpec {
    option_type: OptionType,
    strike: f64,
    expiry: f64,
    spot: f64,
    rate: f64,
    div_yield: f64,
}

#[derive(Serialize, Deserialize)]
struct OptionSpecRaw {
    option_type: OptionType,
    strike: f64,
    expiry: f64,
    spot: f64,
    rate: f64,
    #[serde(default)]
    div_yield: f64,
}

impl TryFrom<OptionSpecRaw> for OptionSpec {
    type Error = VolError;
    fn try_from(raw: OptionSpecRaw) -> Result<Self, Self::Error> {
        Self::new(raw.option_type, raw.strike, raw.expiry, raw.spot, raw.rate)?
            .with_dividend_yield(raw.div_yield)
    }
}

impl From<OptionSpec> for OptionSpecRaw {
    fn from(o: OptionSpec) -> Self {
        Self {
            option_type: o.option_type,
            strike: o.strike,
            expiry: o.expiry,
            spot: o.spot,
            rate: o.rate,
            div_yield: o.div_yield,
        }
    }
}

impl OptionSpec {
    /// Create an option with no dividend yield.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if
    /// strike, expiry or spot are not positive and finite, or the rate is not finite.
    pub fn new(
        option_type: OptionType,
        strike: f64,
        expiry: f64,
        spot: f64,
        rate: f64,
    ) -> error::Result<Self> {
        validate_positive(strike, "strike")?;
        validate_positive(expiry, "expiry")?;
        validate_positive(spot, "spot")?;
        validate_finite(rate, "rate")?;
        Ok(Self {
            option_type,
            strike,
            expiry,
            spot,
            rate,
            div_yield: 0.0,
        })
    }

    /// Set a constant continuous dividend yield `q ≥ 0`.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if `q`
    /// is negative or not finite.
    pub fn with_dividend_yield(mut self, div_yield: f64) -> error::Result<Self> {
        validate_non_negative(div_yield, "dividend yield")?;
        self.div_yield = div_yield;
        Ok(self)
    }

    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    pub fn strike(&self) -> f64 {
        self.strike
    }

    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    pub fn spot(&self) -> f64 {
        self.spot
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn div_yield(&self) -> f64 {
        self.div_yield
    }

    /// Black-Scholes price at volatility `vol`.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if
    /// `vol` is not positive and finite.
    pub fn price(&self, vol: f64) -> error::Result<f64> {
        validate_positive(vol, "vol")?;
        Ok(self.price_unchecked(vol))
    }

    /// Black-Scholes vega at volatility `vol`.
    ///
    /// # Errors
    /// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) if
    /// `vol` is not positive and finite.
    pub fn vega(&self, vol: f64) -> error::Result<f64> {
        validate_positive(vol, "vol")?;
        Ok(self.vega_unchecked(vol))
    }

    /// Price for an already validated contract and a volatility the caller
    /// guarantees is positive.
    pub(crate) fn price_unchecked(&self, vol: f64) -> f64 {
        let v_sqrt_t = vol * self.expiry.sqrt();
        let d1 = ((self.spot / self.strike).ln()
            + (self.rate - self.div_yield) * self.expiry
            + 0.5 * vol * vol * self.expiry)
            / v_sqrt_t;
        let d2 = d1 - v_sqrt_t;
        let phi = self.option_type.sign();
        phi * (self.spot * (-self.div_yield * self.expiry).exp() * norm_cdf(phi * d1)
            - self.strike * (-self.rate * self.expiry).exp() * norm_cdf(phi * d2))
    }

    pub(crate) fn vega_unchecked(&self, vol: f64) -> f64 {
        let sqrt_t = self.expiry.sqrt();
        // d2 computed directly rather than from d1
        let d2 = ((self.spot / self.strike).ln()
            + (self.rate - self.div_yield) * self.expiry
            - 0.5 * vol * vol * self.expiry)
            / (vol * sqrt_t);
        self.strike * (-self.rate * self.expiry).exp() * norm_pdf(d2) * sqrt_t
    }
}

/// Black-Scholes price of a European option.
///
/// # Arguments
/// * `option_type`: Call or Put
/// * `strike`: Strike `K` (must be > 0)
/// * `expiry`: Time to expiry `T` in years (must be > 0)
/// * `spot`: Spot `S` (must be > 0)
/// * `rate`: Continuously compounded risk-free rate `r`
/// * `vol`: Volatility `σ` (must be > 0)
/// * `div_yield`: Continuous dividend yield `q ≥ 0`
///
/// # Errors
/// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) for
/// out-of-domain inputs.
pub fn price(
    option_type: OptionType,
    strike: f64,
    expiry: f64,
    spot: f64,
    rate: f64,
    vol: f64,
    div_yield: f64,
) -> error::Result<f64> {
    OptionSpec::new(option_type, strike, expiry, spot, rate)?
        .with_dividend_yield(div_yield)?
        .price(vol)
}

/// Black-Scholes vega. Identical for calls and puts, so no flavor argument.
///
/// # Errors
/// Returns [`VolError::InvalidInput`](crate::VolError::InvalidInput) for
/// out-of-domain inputs.
pub fn vega(
    strike: f64,
    expiry: f64,
    spot: f64,
    rate: f64,
    vol: f64,
    div_yield: f64,
) -> error::Result<f64> {
    OptionSpec::new(OptionType::Call, strike, expiry, spot, rate)?
        .with_dividend_yield(div_yield)?
        .vega(vol)
}
