#![doc(issue_tracker_base_url = "https://github.com/factordynamics/bourse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # bourse
//!
//! Descriptive statistics and predictive models over historical stock prices.
//!
//! bourse is an umbrella crate that re-exports the bourse sub-crates and adds
//! the two end-to-end model workflows plus the run configuration.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bourse::{AggregateReport, DirectionClassifier, Loader, RunConfig, derive_returns};
//!
//! # fn main() -> bourse::Result<()> {
//! let config = RunConfig::default();
//! let prices = Loader::new(config.date_policy).load("src/resources/stock_prices_.csv")?;
//! let table = derive_returns(&prices)?;
//!
//! let report = AggregateReport::compute(&table)?;
//! println!("{}", report.volatility);
//!
//! let (model, outcome) = DirectionClassifier::new(config.classifier.clone()).run(&table)?;
//! println!("test accuracy {:.4}", outcome.accuracy);
//! model.save(&config.classifier_model_dir(), bourse::classifier::MODEL_KIND)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Error type, table wrappers and the estimator seams
//! - [`stats`] - Loader, daily returns, aggregate views and their persistence
//! - [`ml`] - Encoders, linear models, pipelines and parameter search
//! - [`classifier`] - UP/DOWN/UNCHANGED direction workflow
//! - [`regressor`] - Close-price regression workflow
//! - [`config`] - Run configuration
//!
//! ## Architecture
//!
//! A run is linear and single-pass:
//!
//! 1. **Loader** reads and cleans the price file
//! 2. **Feature deriver** adds `dailyReturn_%`
//! 3. **Aggregator**, **classifier** and **regressor** are independent branches
//!    over the same derived table

/// Version information for the bourse crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Core Types
// ============================================================================

/// Shared vocabulary: errors, table wrappers, column names and the
/// [`Estimator`] / [`Transformer`] seams.
pub mod traits {
    pub use bourse_traits::*;
}

pub use bourse_traits::{BourseError, Result};
pub use bourse_traits::{DerivedTable, Estimator, PriceTable, Transformer};

// ============================================================================
// Statistics
// ============================================================================

/// Loading, return derivation and aggregate views.
///
/// ## Views
///
/// - Record detail with traded value, ordered by date
/// - Average return per ticker
/// - Average return per date
/// - Traded value ranking
/// - Volatility and annualized volatility (× √252)
pub mod stats {
    pub use bourse_stats::*;
}

pub use bourse_stats::{AggregateReport, DateParsePolicy, Loader, ViewFormat, ViewWriter, derive_returns};

// ============================================================================
// Models
// ============================================================================

/// Feature encoding, models and parameter search.
pub mod ml {
    pub use bourse_ml::*;
}

// ============================================================================
// Workflows
// ============================================================================

pub mod classifier;
pub mod config;
pub mod regressor;

pub use classifier::{ClassifierReport, Direction, DirectionClassifier};
pub use config::{ClassifierConfig, RegressorConfig, RunConfig};
pub use regressor::{CloseRegressor, RegressorReport};
