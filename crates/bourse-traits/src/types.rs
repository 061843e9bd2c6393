//! Common types used throughout the Bourse workspace.
//!
//! This module defines the canonical column names, the price table wrappers,
//! and helpers that pull typed values out of a polars `DataFrame`.

use polars::prelude::*;

use crate::{BourseError, Result};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// Days between 0001-01-01 (CE) and 1970-01-01, used to decode polars dates.
pub const CE_TO_UNIX_EPOCH_DAYS: i32 = 719_163;

/// Trading date column.
pub const DATE: &str = "date";
/// Ticker symbol column.
pub const TICKER: &str = "ticker";
/// Opening price column.
pub const OPEN: &str = "open";
/// Daily high column.
pub const HIGH: &str = "high";
/// Daily low column.
pub const LOW: &str = "low";
/// Closing price column.
pub const CLOSE: &str = "close";
/// Traded volume column.
pub const VOLUME: &str = "volume";
/// Derived percentage return from open to close.
pub const DAILY_RETURN: &str = "dailyReturn_%";

/// Columns every price record carries, in canonical order.
pub const PRICE_COLUMNS: [&str; 7] = [DATE, TICKER, OPEN, HIGH, LOW, CLOSE, VOLUME];

/// Loaded price records.
///
/// Wraps a DataFrame with the [`PRICE_COLUMNS`] schema: `date` as a polars
/// `Date`, `ticker` as a string, and the four prices plus `volume` as
/// `Float64`. Rows never contain nulls.
#[derive(Debug, Clone)]
pub struct PriceTable {
    data: DataFrame,
}

impl PriceTable {
    /// Wraps a DataFrame after checking that all price columns are present.
    pub fn new(data: DataFrame) -> Result<Self> {
        require_columns(&data, &PRICE_COLUMNS)?;
        Ok(Self { data })
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Returns whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }
}

/// Price records plus the derived `dailyReturn_%` column.
///
/// Computed once after loading and shared read-only by every downstream
/// branch.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    data: DataFrame,
}

impl DerivedTable {
    /// Wraps a DataFrame after checking the price and return columns.
    pub fn new(data: DataFrame) -> Result<Self> {
        require_columns(&data, &PRICE_COLUMNS)?;
        require_columns(&data, &[DAILY_RETURN])?;
        Ok(Self { data })
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Returns whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }
}

impl AsRef<DataFrame> for DerivedTable {
    fn as_ref(&self) -> &DataFrame {
        &self.data
    }
}

/// Checks whether a DataFrame has a column with the given name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|s| s.as_str() == name)
}

/// Fails with [`BourseError::MissingColumn`] on the first absent column.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        if !has_column(df, name) {
            return Err(BourseError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

/// Reads a numeric column as `f64`, casting if needed. Nulls become NaN.
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| BourseError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v: Option<f64>| v.unwrap_or(f64::NAN))
        .collect())
}

/// Reads a column as strings, casting if needed. Nulls stay `None`.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| BourseError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v: Option<&str>| v.map(str::to_string))
        .collect())
}

/// Reads a polars `Date` column as chrono dates.
pub fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Date>> {
    let column = df
        .column(name)
        .map_err(|_| BourseError::MissingColumn(name.to_string()))?;
    let dates = column.as_materialized_series().date()?;
    dates
        .into_iter()
        .enumerate()
        .map(|(row, d): (usize, Option<i32>)| {
            d.and_then(|days| Date::from_num_days_from_ce_opt(days + CE_TO_UNIX_EPOCH_DAYS))
                .ok_or_else(|| BourseError::InvalidDate {
                    row,
                    value: format!("{d:?}"),
                })
        })
        .collect()
}
