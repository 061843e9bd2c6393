#![doc(issue_tracker_base_url = "https://github.com/factordynamics/bourse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types for the Bourse stock-price analytics workspace.
//!
//! This crate provides the shared vocabulary used by the statistics and
//! machine-learning crates: the error type, the price table wrappers,
//! numeric helpers, and the estimator/transformer seams.

/// The version of the bourse-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod error;
pub mod estimator;
pub mod stats;
pub mod types;

// Re-exports
pub use error::{BourseError, Result};
pub use estimator::{Estimator, Transformer};
pub use types::{Date, DerivedTable, PriceTable};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
