//! Error types for the Bourse workspace.
//!
//! Every stage of a run reports failures through [`BourseError`]. None of
//! these errors are recovered locally: the binary aborts the run on the first
//! one it sees.

use thiserror::Error;

/// The main error type for Bourse operations.
#[derive(Debug, Error)]
pub enum BourseError {
    /// The input file is missing, empty, or unreadable.
    #[error("Load failed: {0}")]
    Load(String),

    /// A date value could not be parsed under the configured policy.
    #[error("Invalid date at row {row}: '{value}'")]
    InvalidDate {
        /// Zero-based row index after null filtering.
        row: usize,
        /// The raw value that failed to parse.
        value: String,
    },

    /// A required column is missing from the data.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A parameter grid produced no candidate combination.
    #[error("Parameter grid has no candidates: {0}")]
    EmptyGrid(String),

    /// A stage list that cannot be fitted as a pipeline.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Model fitting failed.
    #[error("Fit failed: {0}")]
    Fit(String),

    /// A model was used before being fitted.
    #[error("Model has not been fitted: {0}")]
    NotFitted(String),

    /// A category was not seen when the indexer was fitted.
    #[error("Unseen category '{value}' in column '{column}'")]
    UnseenCategory {
        /// The indexed column.
        column: String,
        /// The offending value.
        value: String,
    },

    /// A model artifact could not be written or read.
    #[error("Model artifact error: {0}")]
    Artifact(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for Bourse operations.
pub type Result<T> = std::result::Result<T, BourseError>;
