//! Per-entity chronological split.
//!
//! Within each group, rows are ranked by the order column with
//! `percent_rank = (rank - 1) / (n - 1)`, where tied rows share the lowest
//! rank and a single-row group gets 0. Rows whose percent rank is at most the
//! ratio go to the first partition, the rest to the second. Every group
//! therefore keeps its earliest row in the first partition.

use std::cmp::Ordering;
use std::collections::HashMap;

use bourse_traits::types::{DATE, TICKER, float_values, require_columns, string_values};
use bourse_traits::{BourseError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug)]
enum SortKeys {
    Day(Vec<Option<i32>>),
    Text(Vec<Option<String>>),
    Number(Vec<f64>),
}

impl SortKeys {
    fn read(df: &DataFrame, column: &str) -> Result<Self> {
        let series = df
            .column(column)
            .map_err(|_| BourseError::MissingColumn(column.to_string()))?
            .as_materialized_series();
        Ok(match series.dtype() {
            DataType::Date => Self::Day(series.date()?.into_iter().collect()),
            DataType::String => Self::Text(string_values(df, column)?),
            _ => Self::Number(float_values(df, column)?),
        })
    }

    fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            Self::Day(v) => v[a].cmp(&v[b]),
            Self::Text(v) => v[a].cmp(&v[b]),
            Self::Number(v) => v[a].total_cmp(&v[b]),
        }
    }
}

/// Splits a frame per group by chronological rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSplit {
    group_column: String,
    order_column: String,
    ratio: f64,
}

impl RankSplit {
    /// Split by ticker, ordered by date, at `ratio`.
    pub fn new(ratio: f64) -> Self {
        Self {
            group_column: TICKER.to_string(),
            order_column: DATE.to_string(),
            ratio,
        }
    }

    /// Override the group and order columns.
    #[must_use]
    pub fn with_columns(mut self, group: impl Into<String>, order: impl Into<String>) -> Self {
        self.group_column = group.into();
        self.order_column = order.into();
        self
    }

    /// Use the same columns at a different ratio.
    #[must_use]
    pub fn with_ratio(&self, ratio: f64) -> Self {
        Self {
            ratio,
            ..self.clone()
        }
    }

    /// The split ratio.
    pub const fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Percent rank of every row within its group, in input row order.
    pub fn percent_ranks(&self, df: &DataFrame) -> Result<Vec<f64>> {
        require_columns(df, &[self.group_column.as_str(), self.order_column.as_str()])?;
        let groups = string_values(df, &self.group_column)?;
        let keys = SortKeys::read(df, &self.order_column)?;

        let mut members: HashMap<Option<&str>, Vec<usize>> = HashMap::new();
        for (row, group) in groups.iter().enumerate() {
            members.entry(group.as_deref()).or_default().push(row);
        }

        let mut ranks = vec![0.0; df.height()];
        for rows in members.values_mut() {
            let n = rows.len();
            if n < 2 {
                continue;
            }
            rows.sort_by(|&a, &b| keys.compare(a, b));
            let denominator = (n - 1) as f64;
            let mut rank = 0;
            for (position, &row) in rows.iter().enumerate() {
                if position > 0 && keys.compare(rows[position - 1], row) != Ordering::Equal {
                    rank = position;
                }
                ranks[row] = rank as f64 / denominator;
            }
        }
        Ok(ranks)
    }

    /// `true` for rows in the first partition.
    pub fn mask(&self, df: &DataFrame) -> Result<Vec<bool>> {
        Ok(self
            .percent_ranks(df)?
            .into_iter()
            .map(|r| r <= self.ratio)
            .collect())
    }

    /// Returns `(first, second)` partitions, each in input row order.
    pub fn split(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let mask = BooleanChunked::from_slice("split".into(), &self.mask(df)?);
        let first = df.filter(&mask)?;
        let second = df.filter(&!&mask)?;
        debug!(
            "Split {} rows at {} into {} and {}",
            df.height(),
            self.ratio,
            first.height(),
            second.height()
        );
        Ok((first, second))
    }
}
