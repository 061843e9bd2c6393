//! Daily return derivation.

use bourse_traits::stats::daily_return_pct;
use bourse_traits::types::{CLOSE, DAILY_RETURN, OPEN, float_values};
use bourse_traits::{DerivedTable, PriceTable, Result};
use polars::prelude::*;

/// Adds `dailyReturn_%` = round((close - open) / open * 100, 4) to every record.
///
/// An open price of zero is not guarded and yields an infinite or NaN return.
pub fn derive_returns(prices: &PriceTable) -> Result<DerivedTable> {
    let df = prices.data();
    let opens = float_values(df, OPEN)?;
    let closes = float_values(df, CLOSE)?;

    let returns: Vec<f64> = opens
        .iter()
        .zip(closes.iter())
        .map(|(&open, &close)| daily_return_pct(open, close))
        .collect();

    let mut derived = df.clone();
    derived.with_column(Series::new(DAILY_RETURN.into(), returns))?;
    DerivedTable::new(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Loader;

    fn prices(opens: &[f64], closes: &[f64]) -> PriceTable {
        let n = opens.len();
        let dates: Vec<String> = (0..n).map(|i| format!("2024-01-{:02}", i + 2)).collect();
        let raw = df! {
            "date" => dates,
            "ticker" => vec!["AAPL"; n],
            "open" => opens,
            "high" => vec![200.0; n],
            "low" => vec![50.0; n],
            "close" => closes,
            "volume" => vec![1_000.0; n],
        }
        .unwrap();
        Loader::default().clean(raw).unwrap()
    }

    #[test]
    fn test_derive_returns_scenario() {
        let derived = derive_returns(&prices(&[100.0, 110.0, 100.0], &[110.0, 100.0, 100.0])).unwrap();
        let returns = float_values(derived.data(), DAILY_RETURN).unwrap();
        assert_eq!(returns, vec![10.0, -9.0909, 0.0]);
    }

    #[test]
    fn test_derive_returns_matches_formula() {
        let opens = [12.34, 56.78, 99.99, 1.5];
        let closes = [12.01, 60.0, 100.0, 1.4999];
        let derived = derive_returns(&prices(&opens, &closes)).unwrap();
        let returns = float_values(derived.data(), DAILY_RETURN).unwrap();

        for ((open, close), r) in opens.iter().zip(closes.iter()).zip(returns.iter()) {
            let expected = ((close - open) / open * 100.0 * 10_000.0).round() / 10_000.0;
            approx::assert_abs_diff_eq!(*r, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_derive_returns_zero_open_is_unguarded() {
        let derived = derive_returns(&prices(&[0.0, 0.0], &[5.0, 0.0])).unwrap();
        let returns = float_values(derived.data(), DAILY_RETURN).unwrap();
        assert!(returns[0].is_infinite());
        assert!(returns[1].is_nan());
    }

    #[test]
    fn test_derive_returns_empty() {
        let derived = derive_returns(&prices(&[], &[])).unwrap();
        assert!(derived.is_empty());
    }
}
