//! Descriptive statistics over historical stock-price records.
//!
//! This crate covers the first half of a run:
//! - Loading a delimited price file into a [`PriceTable`](bourse_traits::PriceTable)
//! - Deriving the percentage daily return for every record
//! - Computing grouped and ranked aggregate views (average return,
//!   traded value, volatility)
//! - Writing aggregate views to columnar or delimited-text files
//!
//! # Example
//!
//! ```rust,ignore
//! use bourse_stats::{AggregateReport, DateParsePolicy, Loader, derive_returns};
//!
//! let prices = Loader::new(DateParsePolicy::Legacy).load("stock_prices.csv")?;
//! let derived = derive_returns(&prices)?;
//! let report = AggregateReport::compute(&derived)?;
//! println!("{}", report.volatility);
//! ```

pub mod aggregate;
pub mod loader;
pub mod persist;
pub mod returns;

// Re-export main types
pub use aggregate::AggregateReport;
pub use loader::{DateParsePolicy, Loader};
pub use persist::{ViewFormat, ViewWriter, read_view, write_view};
pub use returns::derive_returns;
