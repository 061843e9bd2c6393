//! Price-file loader.
//!
//! Reads a delimited file with a header row into a [`PriceTable`]. Rows with a
//! null in any column are dropped, dates are normalised to a polars `Date`
//! under an explicit [`DateParsePolicy`], and the frame is projected to the
//! canonical price schema.

use std::path::Path;

use bourse_traits::types::{
    CLOSE, DATE, HIGH, LOW, OPEN, PRICE_COLUMNS, TICKER, VOLUME, require_columns, string_values,
};
use bourse_traits::{BourseError, Date, PriceTable, Result};
use chrono::{Months, TimeDelta};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How date strings are interpreted for the `yyyy-MM-dd` pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateParsePolicy {
    /// The historical lenient parser.
    ///
    /// Accepts unpadded fields, ignores trailing text after the day, and
    /// rolls out-of-range months and days over into the next period.
    #[default]
    Legacy,
    /// Exactly `yyyy-MM-dd`, zero padded, nothing trailing.
    Strict,
}

impl DateParsePolicy {
    /// Parses one raw value, returning `None` if the policy rejects it.
    pub fn parse(&self, raw: &str) -> Option<Date> {
        match self {
            Self::Legacy => parse_lenient(raw),
            Self::Strict => {
                let date = Date::parse_from_str(raw, "%Y-%m-%d").ok()?;
                (date.format("%Y-%m-%d").to_string() == raw).then_some(date)
            }
        }
    }
}

fn parse_lenient(raw: &str) -> Option<Date> {
    let (year, rest) = take_number(raw.trim_start())?;
    let (month, rest) = take_number(rest.strip_prefix('-')?)?;
    let (day, _) = take_number(rest.strip_prefix('-')?)?;

    let start = Date::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)?;
    let start = if month == 0 {
        start.checked_sub_months(Months::new(1))?
    } else {
        start.checked_add_months(Months::new(u32::try_from(month - 1).ok()?))?
    };
    start.checked_add_signed(TimeDelta::try_days(day - 1)?)
}

fn take_number(s: &str) -> Option<(i64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((s[..end].parse().ok()?, &s[end..]))
}

/// Loads price records from delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader {
    policy: DateParsePolicy,
}

impl Loader {
    /// Create a loader that parses dates with `policy`.
    #[must_use]
    pub const fn new(policy: DateParsePolicy) -> Self {
        Self { policy }
    }

    /// The date policy in use.
    #[must_use]
    pub const fn policy(&self) -> DateParsePolicy {
        self.policy
    }

    /// Reads `path` and returns the cleaned price table.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::Load`] if the file is missing or cannot be
    /// read, and the errors of [`Loader::clean`] otherwise.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<PriceTable> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(BourseError::Load(format!("{} does not exist", path.display())));
        }

        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| BourseError::Load(format!("{}: {}", path.display(), e)))?;

        if raw.width() == 0 {
            return Err(BourseError::Load(format!("{} is empty", path.display())));
        }

        info!("Read {} rows from {}", raw.height(), path.display());
        self.clean(raw)
    }

    /// Cleans an already-read frame into a price table.
    ///
    /// # Errors
    ///
    /// - [`BourseError::MissingColumn`] if a price column is absent
    /// - [`BourseError::InvalidDate`] on the first date the policy rejects
    /// - [`BourseError::Polars`] if a numeric column holds non-numeric text
    pub fn clean(&self, raw: DataFrame) -> Result<PriceTable> {
        let complete = drop_incomplete_rows(&raw)?;
        let dropped = raw.height() - complete.height();
        if dropped > 0 {
            info!("Dropped {} rows with missing fields", dropped);
        }

        require_columns(&complete, &PRICE_COLUMNS)?;

        let dates = string_values(&complete, DATE)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let value = value.unwrap_or_default();
                self.policy
                    .parse(&value)
                    .ok_or(BourseError::InvalidDate { row, value })
            })
            .collect::<Result<Vec<Date>>>()?;

        let mut columns: Vec<Column> = Vec::with_capacity(PRICE_COLUMNS.len());
        columns.push(Series::new(DATE.into(), dates).into());
        columns.push(
            complete
                .column(TICKER)?
                .as_materialized_series()
                .cast(&DataType::String)?
                .into(),
        );
        for name in [OPEN, HIGH, LOW, CLOSE, VOLUME] {
            let values = complete
                .column(name)?
                .as_materialized_series()
                .strict_cast(&DataType::Float64)?;
            columns.push(values.into());
        }

        let table = PriceTable::new(DataFrame::new(columns)?)?;
        debug!("Loaded {} price records", table.len());
        Ok(table)
    }
}

/// Keeps only rows where every column is non-null.
fn drop_incomplete_rows(df: &DataFrame) -> Result<DataFrame> {
    let mut mask = BooleanChunked::full("complete".into(), true, df.height());
    for column in df.get_columns() {
        mask = &mask & &column.is_not_null();
    }
    Ok(df.filter(&mask)?)
}
