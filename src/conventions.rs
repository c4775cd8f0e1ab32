//! Market conventions shared by the pricer, the SABR expansion and the
//! surface: forwards under a continuously compounded zero rate and
//! log-moneyness.

/// Convert a strike to forward log-moneyness as used by Hagan's expansion:
/// `ln(F / K)`.
pub fn log_moneyness(forward: f64, strike: f64) -> f64 {
    (forward / strike).ln()
}

/// Compute forward price from spot: F = S · exp(r · T).
pub fn forward_price(spot: f64, rate: f64, expiry: f64) -> f64 {
    spot * (rate * expiry).exp()
}
