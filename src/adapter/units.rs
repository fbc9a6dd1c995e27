//! Token-unit conversions shared by the adapters

/// Decimals used by ray-encoded rates (supply APY on lending vaults).
pub const RAY_DECIMALS: u32 = 27;

/// Interpret a decimal integer string as a token amount with `decimals`
/// fractional digits.
///
/// Integers that fit in `u128` are split exactly into whole and fractional
/// parts before converting, anything larger falls back to `f64` parsing.
/// Returns `None` for empty or non-numeric input.
pub fn scale_by_decimals(raw: &str, decimals: u32) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(value) = raw.parse::<u128>() {
        let Some(divisor) = 10u128.checked_pow(decimals) else {
            return Some(value as f64 / 10f64.powi(decimals as i32));
        };
        let whole = value / divisor;
        let fraction = value % divisor;
        return Some(whole as f64 + fraction as f64 / divisor as f64);
    }

    let value: f64 = raw.parse().ok()?;
    value
        .is_finite()
        .then(|| value / 10f64.powi(decimals as i32))
}

/// Parse a ray-encoded (1e27) rate into a fraction.
pub fn parse_ray(raw: &str) -> Option<f64> {
    scale_by_decimals(raw, RAY_DECIMALS)
}

/// Round a USD amount to cents.
pub fn round_to_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `raw / 10^decimals * price`, rounded to cents.
pub fn usd_value(raw: &str, decimals: u32, price_usd: f64) -> Option<f64> {
    let amount = scale_by_decimals(raw, decimals)?;
    let usd = amount * price_usd;
    usd.is_finite().then(|| round_to_two_decimals(usd))
}
