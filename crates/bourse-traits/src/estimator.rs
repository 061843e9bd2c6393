//! Estimator and transformer seams.
//!
//! An [`Estimator`] learns from a DataFrame and yields a fitted model; a
//! [`Transformer`] maps a DataFrame to some output without learning. Fitted
//! encoders, pipelines and tuned pipelines all sit on one side of this split.

use crate::Result;
use polars::prelude::DataFrame;

/// Something that maps a DataFrame to an output.
///
/// # Example
///
/// ```no_run
/// use bourse_traits::{Result, Transformer};
/// use polars::prelude::*;
///
/// struct RowCount;
///
/// impl Transformer for RowCount {
///     type Output = usize;
///
///     fn transform(&self, data: &DataFrame) -> Result<usize> {
///         Ok(data.height())
///     }
/// }
/// ```
pub trait Transformer {
    /// The value produced from a DataFrame.
    type Output;

    /// Applies the transformation.
    ///
    /// # Errors
    ///
    /// Returns an error if required columns are missing or values cannot be
    /// encoded.
    fn transform(&self, data: &DataFrame) -> Result<Self::Output>;
}

/// Something that can be fitted to a DataFrame.
pub trait Estimator {
    /// The fitted model.
    type Model;

    /// Fits the model on `data`.
    ///
    /// Fitting is synchronous: the call returns only once the model is
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is unusable or the fit fails.
    fn fit(&self, data: &DataFrame) -> Result<Self::Model>;
}
