//! Close-price regressor.
//!
//! Dates and tickers are indexed over the whole derived table before the
//! split, so both partitions share one encoding. The feature vector is
//! `date one-hot, open, close, high, low, volume, ticker index,
//! dailyReturn_%`. `close` is both a feature and the target.

use bourse_ml::{
    FeatureEncoder, FeatureSpec, HandleInvalid, LinearRegression, Metric, Param, ParamGridBuilder,
    ParamMap, Pipeline, RankSplit, RegressionMetrics, Stage, TrainValidationSplit,
    TrainValidationSplitModel,
};
use bourse_traits::types::{CLOSE, DAILY_RETURN, DATE, HIGH, LOW, OPEN, TICKER, VOLUME};
use bourse_traits::{BourseError, DerivedTable, Estimator, Result, Transformer};
use polars::prelude::*;
use tracing::info;

use crate::config::RegressorConfig;

/// Artifact kind written by [`CloseRegressor`].
pub const MODEL_KIND: &str = "close_regressor";

/// Derived table with `date` as text and `volume` as `Float64`.
pub fn coerce(table: &DerivedTable) -> Result<DataFrame> {
    Ok(table
        .data()
        .clone()
        .lazy()
        .with_columns([
            col(DATE).cast(DataType::String),
            col(VOLUME).cast(DataType::Float64),
        ])
        .collect()?)
}

/// Outcome of a regressor run.
#[derive(Debug, Clone)]
pub struct RegressorReport {
    /// Test rows with ticker, date, close and the predicted close.
    pub predictions: DataFrame,
    /// Error metrics on the test partition.
    pub metrics: RegressionMetrics,
    /// Winning parameters.
    pub best_params: ParamMap,
    /// Every candidate with its validation RMSE, in grid order.
    pub candidates: Vec<(ParamMap, f64)>,
    /// Rows in the train partition.
    pub train_rows: usize,
    /// Rows in the test partition.
    pub test_rows: usize,
}

/// Close-price regression workflow.
#[derive(Debug, Clone, Default)]
pub struct CloseRegressor {
    config: RegressorConfig,
}

impl CloseRegressor {
    /// Create a workflow with `config`.
    pub const fn new(config: RegressorConfig) -> Self {
        Self { config }
    }

    /// The settings in use.
    pub const fn config(&self) -> &RegressorConfig {
        &self.config
    }

    /// The unfitted feature encoder. Rows with a non-finite feature are
    /// skipped.
    pub fn encoder() -> FeatureEncoder {
        FeatureEncoder::regression(CLOSE)
            .with_features([
                FeatureSpec::one_hot(DATE),
                FeatureSpec::numeric(OPEN),
                FeatureSpec::numeric(CLOSE),
                FeatureSpec::numeric(HIGH),
                FeatureSpec::numeric(LOW),
                FeatureSpec::numeric(VOLUME),
                FeatureSpec::indexed(TICKER),
                FeatureSpec::numeric(DAILY_RETURN),
            ])
            .with_handle_invalid(HandleInvalid::Skip)
    }

    /// Pre-fitted encoder followed by the linear model.
    pub fn pipeline(&self, coerced: &DataFrame) -> Result<Pipeline> {
        let encoded = Self::encoder().fit(coerced)?;
        let model = LinearRegression {
            max_iter: self.config.max_iter,
            ..LinearRegression::default()
        };
        Ok(Pipeline::new(vec![Stage::Encoded(encoded), Stage::Regressor(model)]))
    }

    /// Elastic-net mixing × regularization strength. The default mixing axis
    /// is `[0.0]`, a pure ridge search.
    pub fn grid(&self) -> Result<Vec<ParamMap>> {
        ParamGridBuilder::new()
            .add_grid(Param::ElasticNetParam, &self.config.elastic_net)
            .add_grid(Param::RegParam, &self.config.reg_param)
            .build()
    }

    /// Encodes, splits, searches and evaluates.
    pub fn run(&self, table: &DerivedTable) -> Result<(TrainValidationSplitModel, RegressorReport)> {
        let coerced = coerce(table)?;
        let pipeline = self.pipeline(&coerced)?;
        let grid = self.grid()?;

        let (train, test) = RankSplit::new(self.config.train_ratio).split(&coerced)?;
        info!(
            "Close regressor: {} train rows, {} test rows",
            train.height(),
            test.height()
        );

        let search = TrainValidationSplit::new(pipeline, grid.clone(), Metric::Rmse)
            .with_split(RankSplit::new(self.config.validation_ratio));
        let model = search.fit(&train)?;

        let predictions = model.transform(&test)?;
        let actual = predictions
            .label()
            .ok_or_else(|| BourseError::MissingColumn(CLOSE.to_string()))?;
        let metrics = RegressionMetrics::compute(predictions.prediction(), actual);
        info!(
            "Test RMSE {:.4}, MAE {:.4}, R2 {:.4} on {} rows",
            metrics.rmse, metrics.mae, metrics.r2, metrics.count
        );

        let report = RegressorReport {
            predictions: predictions.to_frame(&test, &[TICKER, DATE, CLOSE])?,
            metrics,
            best_params: model.best_params().clone(),
            candidates: grid
                .into_iter()
                .zip(model.validation_metrics().iter().copied())
                .collect(),
            train_rows: train.height(),
            test_rows: test.height(),
        };
        Ok((model, report))
    }
}
