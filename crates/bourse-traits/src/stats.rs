//! Statistical utility functions shared by the aggregation and model crates.

/// Trading days per year, used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minimum threshold for standard deviation to avoid division by zero.
/// Values below this threshold are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Rounds `value` to `decimals` places, halves away from zero.
///
/// Non-finite values pass through unchanged.
///
/// # Examples
///
/// ```
/// use bourse_traits::stats::round_to;
///
/// assert_eq!(round_to(-9.090909, 4), -9.0909);
/// assert_eq!(round_to(2.345, 1), 2.3);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Percentage change from `open` to `close`, rounded to 4 decimals.
///
/// An `open` of zero is not guarded: the result follows IEEE semantics
/// and is infinite or NaN.
pub fn daily_return_pct(open: f64, close: f64) -> f64 {
    round_to((close - open) / open * 100.0, 4)
}

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1 denominator).
///
/// Returns `None` for fewer than two observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Scales a daily volatility to a yearly one.
pub fn annualize_volatility(daily_std: f64) -> f64 {
    daily_std * TRADING_DAYS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(10.0, 4), 10.0);
        assert_eq!(round_to(-9.0909090909, 4), -9.0909);
        assert_eq!(round_to(1.005, 0), 1.0);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_daily_return_pct() {
        assert_eq!(daily_return_pct(100.0, 110.0), 10.0);
        assert_eq!(daily_return_pct(110.0, 100.0), -9.0909);
        assert_eq!(daily_return_pct(100.0, 100.0), 0.0);
    }

    #[test]
    fn test_daily_return_zero_open() {
        assert_eq!(daily_return_pct(0.0, 5.0), f64::INFINITY);
        assert!(daily_return_pct(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_mean() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(std, 2.138089935299395, epsilon = 1e-12);
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn test_annualize_volatility() {
        assert_relative_eq!(annualize_volatility(1.0), 15.874507866387544, epsilon = 1e-12);
    }
}
