//! Next-period direction classifier.
//!
//! Labels every derived record UP, DOWN or UNCHANGED from the sign of its
//! daily return, splits each ticker chronologically into train and test,
//! searches an elastic-net grid for a multinomial logistic model, and scores
//! the winner on the test partition.

use std::fmt;

use bourse_ml::{
    FeatureEncoder, FeatureSpec, LogisticRegression, Metric, PREDICTION, Param, ParamGridBuilder,
    ParamMap, Pipeline, RankSplit, Stage, TrainValidationSplit, TrainValidationSplitModel,
};
use bourse_traits::types::{DAILY_RETURN, DATE, HIGH, LOW, OPEN, TICKER, VOLUME, float_values};
use bourse_traits::{DerivedTable, Estimator, Result, Transformer};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ClassifierConfig;

/// Label column added to the derived table.
pub const DIRECTION: &str = "direction";
/// Predicted label column in [`ClassifierReport::predictions`].
pub const PREDICTED_DIRECTION: &str = "predicted_direction";
/// Artifact kind written by [`DirectionClassifier`].
pub const MODEL_KIND: &str = "direction_classifier";

/// Sign of a record's daily return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Positive return, including +inf.
    Up,
    /// Negative return, including -inf.
    Down,
    /// Exactly zero.
    Unchanged,
}

impl Direction {
    /// Label text.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Unchanged => "UNCHANGED",
        }
    }

    /// Direction of a percentage return. NaN has none.
    pub fn from_return(value: f64) -> Option<Self> {
        if value > 0.0 {
            Some(Self::Up)
        } else if value < 0.0 {
            Some(Self::Down)
        } else if value == 0.0 {
            Some(Self::Unchanged)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The derived table plus a nullable [`DIRECTION`] column.
pub fn label_directions(table: &DerivedTable) -> Result<DataFrame> {
    let labels: Vec<Option<&'static str>> = float_values(table.data(), DAILY_RETURN)?
        .into_iter()
        .map(|r| Direction::from_return(r).map(|d| d.as_str()))
        .collect();
    let mut labeled = table.data().clone();
    labeled.with_column(Series::new(DIRECTION.into(), labels))?;
    Ok(labeled)
}

/// Labeled records only. Rows without a direction are dropped with a warning.
pub fn labeled_rows(table: &DerivedTable) -> Result<DataFrame> {
    let labeled = label_directions(table)?;
    let mask = labeled.column(DIRECTION)?.is_not_null();
    let rows = labeled.filter(&mask)?;
    let dropped = labeled.height() - rows.height();
    if dropped > 0 {
        warn!("Excluded {} records with an undefined {}", dropped, DAILY_RETURN);
    }
    Ok(rows)
}

/// Outcome of a classifier run.
#[derive(Debug, Clone)]
pub struct ClassifierReport {
    /// Test rows with ticker, date, direction, predicted direction and its
    /// probability.
    pub predictions: DataFrame,
    /// Accuracy on the test partition.
    pub accuracy: f64,
    /// Winning parameters.
    pub best_params: ParamMap,
    /// Every candidate with its validation accuracy, in grid order.
    pub candidates: Vec<(ParamMap, f64)>,
    /// Rows in the train partition.
    pub train_rows: usize,
    /// Rows in the test partition.
    pub test_rows: usize,
}

/// Direction classifier workflow.
#[derive(Debug, Clone, Default)]
pub struct DirectionClassifier {
    config: ClassifierConfig,
}

impl DirectionClassifier {
    /// Create a workflow with `config`.
    pub const fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// The settings in use.
    pub const fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Encoder and logistic model as a two-stage pipeline.
    ///
    /// `direction` is the target; `ticker` is one-hot encoded and the four
    /// continuous fields pass through.
    pub fn pipeline(&self) -> Pipeline {
        let encoder = FeatureEncoder::classification(DIRECTION).with_features([
            FeatureSpec::one_hot(TICKER),
            FeatureSpec::numeric(OPEN),
            FeatureSpec::numeric(HIGH),
            FeatureSpec::numeric(LOW),
            FeatureSpec::numeric(VOLUME),
        ]);
        let model = LogisticRegression {
            max_iter: self.config.max_iter,
            ..LogisticRegression::default()
        };
        Pipeline::new(vec![Stage::Encoder(encoder), Stage::Classifier(model)])
    }

    /// Elastic-net mixing × regularization strength.
    pub fn grid(&self) -> Result<Vec<ParamMap>> {
        ParamGridBuilder::new()
            .add_grid(Param::ElasticNetParam, &self.config.elastic_net)
            .add_grid(Param::RegParam, &self.config.reg_param)
            .build()
    }

    /// Labels, splits, searches and evaluates.
    ///
    /// # Errors
    ///
    /// Fails on an empty grid, a missing column, or a fit that does not
    /// converge to a finite objective.
    pub fn run(&self, table: &DerivedTable) -> Result<(TrainValidationSplitModel, ClassifierReport)> {
        let labeled = labeled_rows(table)?;
        let (train, test) = RankSplit::new(self.config.train_ratio).split(&labeled)?;
        info!(
            "Direction classifier: {} train rows, {} test rows",
            train.height(),
            test.height()
        );

        let grid = self.grid()?;
        let search = TrainValidationSplit::new(self.pipeline(), grid.clone(), Metric::Accuracy)
            .with_split(RankSplit::new(self.config.validation_ratio));
        let model = search.fit(&train)?;

        let predictions = model.transform(&test)?;
        let accuracy = Metric::Accuracy.evaluate(&predictions)?;
        info!("Test accuracy {:.4} on {} rows", accuracy, predictions.len());

        let mut frame = predictions.to_frame(&test, &[TICKER, DATE, DIRECTION])?;
        frame.rename(PREDICTION, PREDICTED_DIRECTION.into())?;

        let report = ClassifierReport {
            predictions: frame,
            accuracy,
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
