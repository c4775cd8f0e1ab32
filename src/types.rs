//! Core domain types.
//!
//! Outputs that could be confused with one another are wrapped in newtypes
//! ([`Vol`], [`Variance`]); inputs stay bare `f64` and are validated inside
//! the functions that consume them.
//!
//! These types wrap `f64`, so only `PartialEq` and `PartialOrd` are derived.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VolError;

/// Volatility `σ`, measured as annualized standard deviation.
///
/// # Examples
/// ```
/// use sabrvol::types::Vol;
/// let vol = Vol(0.20);
/// assert_eq!(vol.0, 0.20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Vol(pub f64);

/// Total variance `σ²T`.
///
/// # Examples
/// ```
/// use sabrvol::types::Variance;
/// let var = Variance(0.04); // 20% vol over one year
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Variance(pub f64);

/// Option flavor: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Right to buy at strike price.
    Call,
    /// Right to sell at strike price.
    Put,
}

impl OptionType {
    /// Payoff sign φ: +1 for calls, −1 for puts.
    pub fn sign(self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => f.write_str("Call"),
            OptionType::Put => f.write_str("Put"),
        }
    }
}

/// Case-insensitive parse of `"call"` / `"put"`.
///
/// ```
/// use sabrvol::types::OptionType;
/// assert_eq!("CALL".parse::<OptionType>().unwrap(), OptionType::Call);
/// assert_eq!("Put".parse::<OptionType>().unwrap(), OptionType::Put);
/// ```
impl FromStr for OptionType {
    type Err = VolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("call") {
            Ok(OptionType::Call)
        } else if s.eq_ignore_ascii_case("put") {
            Ok(OptionType::Put)
        } else {
            Err(VolError::InvalidInput {
                message: format!("option flavor must be \"call\" or \"put\", got {s:?}"),
            })
        }
    }
}
