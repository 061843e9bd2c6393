//! Aggregate views over derived price records.
//!
//! Each view is a read-only projection of a [`DerivedTable`], recomputed on
//! every run:
//! - full record detail with per-record traded value, ordered by date
//! - average return per ticker (first-seen ticker order)
//! - average return per date across tickers, ordered by date
//! - total and average traded value per ticker, largest average first
//! - daily and annualized return volatility per ticker, most volatile first

use bourse_traits::stats::TRADING_DAYS_PER_YEAR;
use bourse_traits::types::{CLOSE, DAILY_RETURN, DATE, TICKER, VOLUME};
use bourse_traits::{DerivedTable, Result};
use polars::prelude::*;
use tracing::debug;

/// Average of `dailyReturn_%`, rounded to 2 decimals.
pub const AVG_RETURN: &str = "avg_return_%";
/// Per-record `volume * close`.
pub const TRADED_VALUE: &str = "traded_value";
/// Per-ticker sum of traded value.
pub const TOTAL_TRADED_VALUE: &str = "total_traded_value";
/// Per-ticker mean of traded value.
pub const AVG_TRADED_VALUE: &str = "avg_traded_value";
/// Per-ticker sample standard deviation of `dailyReturn_%`, rounded to 2 decimals.
pub const VOLATILITY: &str = "volatility";
/// Volatility scaled by the square root of 252, rounded to 2 decimals.
pub const ANNUALIZED_VOLATILITY: &str = "annualized_volatility";

fn traded_value() -> Expr {
    (col(VOLUME) * col(CLOSE)).alias(TRADED_VALUE)
}

/// All records with their traded value, ordered by date.
pub fn record_detail(table: &DerivedTable) -> Result<DataFrame> {
    Ok(table
        .data()
        .clone()
        .lazy()
        .with_column(traded_value())
        .sort([DATE], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?)
}

/// `ticker -> round(avg(dailyReturn_%), 2)` in first-seen ticker order.
pub fn ticker_average_returns(table: &DerivedTable) -> Result<DataFrame> {
    Ok(table
        .data()
        .clone()
        .lazy()
        .group_by_stable([col(TICKER)])
        .agg([col(DAILY_RETURN).mean().round(2).alias(AVG_RETURN)])
        .collect()?)
}

/// `date -> round(avg(dailyReturn_%), 2)` across tickers, date ascending.
pub fn date_average_returns(table: &DerivedTable) -> Result<DataFrame> {
    Ok(table
        .data()
        .clone()
        .lazy()
        .group_by([col(DATE)])
        .agg([col(DAILY_RETURN).mean().round(2).alias(AVG_RETURN)])
        .sort([DATE], SortMultipleOptions::default())
        .collect()?)
}

/// `ticker -> (sum(traded value), avg(traded value))`, largest average first.
pub fn traded_value_ranking(table: &DerivedTable) -> Result<DataFrame> {
    Ok(table
        .data()
        .clone()
        .lazy()
        .with_column(traded_value())
        .group_by([col(TICKER)])
        .agg([
            col(TRADED_VALUE).sum().alias(TOTAL_TRADED_VALUE),
            col(TRADED_VALUE).mean().alias(AVG_TRADED_VALUE),
        ])
        .sort(
            [AVG_TRADED_VALUE],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true),
        )
        .collect()?)
}

/// `ticker -> (round(std, 2), round(std * sqrt(252), 2))`, most volatile first.
///
/// Uses the sample standard deviation; a ticker with a single record has a
/// null volatility and sorts last.
pub fn volatility(table: &DerivedTable) -> Result<DataFrame> {
    Ok(table
        .data()
        .clone()
        .lazy()
        .group_by([col(TICKER)])
        .agg([col(DAILY_RETURN).std(1).alias(VOLATILITY)])
        .with_columns([
            (col(VOLATILITY) * lit(TRADING_DAYS_PER_YEAR.sqrt()))
                .round(2)
                .alias(ANNUALIZED_VOLATILITY),
            col(VOLATILITY).round(2),
        ])
        .sort(
            [ANNUALIZED_VOLATILITY],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true),
        )
        .collect()?)
}

/// Every aggregate view of one derived table.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Full record detail ordered by date.
    pub detail: DataFrame,
    /// Average return per ticker.
    pub ticker_returns: DataFrame,
    /// Average return per date.
    pub date_returns: DataFrame,
    /// Traded value totals and averages per ticker.
    pub traded_value: DataFrame,
    /// Volatility and annualized volatility per ticker.
    pub volatility: DataFrame,
}

impl AggregateReport {
    /// Computes all views.
    pub fn compute(table: &DerivedTable) -> Result<Self> {
        let report = Self {
            detail: record_detail(table)?,
            ticker_returns: ticker_average_returns(table)?,
            date_returns: date_average_returns(table)?,
            traded_value: traded_value_ranking(table)?,
            volatility: volatility(table)?,
        };
        debug!(
            "Aggregated {} records into {} tickers and {} dates",
            report.detail.height(),
            report.ticker_returns.height(),
            report.date_returns.height()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Loader, derive_returns};
    use approx::assert_abs_diff_eq;
    use bourse_traits::stats::{annualize_volatility, mean, round_to, sample_std};
    use bourse_traits::types::{date_values, float_values, string_values};

    fn derived() -> DerivedTable {
        let raw = df! {
            "date" => &[
                "2024-01-03", "2024-01-02", "2024-01-04",
                "2024-01-02", "2024-01-03", "2024-01-04",
                "2024-01-02",
            ],
            "ticker" => &["AAPL", "AAPL", "AAPL", "MSFT", "MSFT", "MSFT", "TSLA"],
            "open" => &[110.0, 100.0, 100.0, 50.0, 51.0, 52.0, 20.0],
            "high" => &[112.0, 111.0, 101.0, 52.0, 53.0, 54.0, 21.0],
            "low" => &[98.0, 99.0, 99.0, 49.0, 50.0, 51.0, 19.0],
            "close" => &[100.0, 110.0, 100.0, 51.0, 50.0, 53.0, 20.5],
            "volume" => &[2_000.0, 1_000.0, 3_000.0, 10_000.0, 20_000.0, 30_000.0, 500.0],
        }
        .unwrap();
        derive_returns(&Loader::default().clean(raw).unwrap()).unwrap()
    }

    fn returns_of(table: &DerivedTable, ticker: &str) -> Vec<f64> {
        let tickers = string_values(table.data(), TICKER).unwrap();
        let returns = float_values(table.data(), DAILY_RETURN).unwrap();
        tickers
            .iter()
            .zip(returns)
            .filter(|(t, _)| t.as_deref() == Some(ticker))
            .map(|(_, r)| r)
            .collect()
    }

    #[test]
    fn test_record_detail_ordered_by_date() {
        let detail = record_detail(&derived()).unwrap();
        let dates = date_values(&detail, DATE).unwrap();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));

        let traded = float_values(&detail, TRADED_VALUE).unwrap();
        let volume = float_values(&detail, VOLUME).unwrap();
        let close = float_values(&detail, CLOSE).unwrap();
        for i in 0..detail.height() {
            assert_abs_diff_eq!(traded[i], volume[i] * close[i]);
        }
    }

    #[test]
    fn test_ticker_average_returns() {
        let table = derived();
        let view = ticker_average_returns(&table).unwrap();
        let tickers = string_values(&view, TICKER).unwrap();
        let averages = float_values(&view, AVG_RETURN).unwrap();

        assert_eq!(
            tickers,
            vec![Some("AAPL".into()), Some("MSFT".into()), Some("TSLA".into())]
        );
        for (ticker, avg) in tickers.iter().zip(averages) {
            let expected = round_to(mean(&returns_of(&table, ticker.as_deref().unwrap())), 2);
            assert_abs_diff_eq!(avg, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_date_average_returns_sorted() {
        let view = date_average_returns(&derived()).unwrap();
        assert_eq!(view.height(), 3);
        let dates = date_values(&view, DATE).unwrap();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));

        // 2024-01-02: AAPL 10.0, MSFT 2.0, TSLA 2.5
        let averages = float_values(&view, AVG_RETURN).unwrap();
        assert_abs_diff_eq!(averages[0], 4.83, epsilon = 1e-9);
    }

    #[test]
    fn test_traded_value_ranking() {
        let view = traded_value_ranking(&derived()).unwrap();
        let tickers = string_values(&view, TICKER).unwrap();
        assert_eq!(tickers[0].as_deref(), Some("MSFT"));
        assert_eq!(tickers[2].as_deref(), Some("TSLA"));

        let totals = float_values(&view, TOTAL_TRADED_VALUE).unwrap();
        let averages = float_values(&view, AVG_TRADED_VALUE).unwrap();
        assert_abs_diff_eq!(totals[0], 510_000.0 + 1_000_000.0 + 1_590_000.0);
        assert_abs_diff_eq!(averages[0], totals[0] / 3.0);
        assert!(averages.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_volatility_view() {
        let table = derived();
        let view = volatility(&table).unwrap();
        let tickers = string_values(&view, TICKER).unwrap();
        let vols = view.column(VOLATILITY).unwrap().as_materialized_series().f64().unwrap().clone();
        let annual = view
            .column(ANNUALIZED_VOLATILITY)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .clone();

        assert_eq!(tickers[0].as_deref(), Some("AAPL"));
        let aapl = sample_std(&returns_of(&table, "AAPL")).unwrap();
        assert_abs_diff_eq!(vols.get(0).unwrap(), round_to(aapl, 2), epsilon = 1e-9);
        assert_abs_diff_eq!(
            annual.get(0).unwrap(),
            round_to(annualize_volatility(aapl), 2),
            epsilon = 1e-9
        );

        // Single-record ticker: no sample deviation, sorted last.
        assert_eq!(tickers[2].as_deref(), Some("TSLA"));
        assert!(annual.get(2).is_none());
    }

    #[test]
    fn test_report_on_empty_table() {
        let raw = df! {
            "date" => &[Some("2024-01-02")],
            "ticker" => &[None::<&str>],
            "open" => &[Some(1.0)],
            "high" => &[Some(1.0)],
            "low" => &[Some(1.0)],
            "close" => &[Some(1.0)],
            "volume" => &[Some(1.0)],
        }
        .unwrap();
        let table = derive_returns(&Loader::default().clean(raw).unwrap()).unwrap();

        let report = AggregateReport::compute(&table).unwrap();
        assert_eq!(report.detail.height(), 0);
        assert_eq!(report.ticker_returns.height(), 0);
        assert_eq!(report.date_returns.height(), 0);
        assert_eq!(report.traded_value.height(), 0);
        assert_eq!(report.volatility.height(), 0);
    }
}
