//! Parameter grids and train/validation model selection.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use bourse_traits::{BourseError, Estimator, Result, Transformer};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact::{ModelMetadata, load_model, save_model};
use crate::metrics::Metric;
use crate::pipeline::{Pipeline, PipelineModel, Predictions};
use crate::split::RankSplit;

/// A tunable model hyper-parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Overall penalty strength.
    RegParam,
    /// L1 share of the penalty.
    ElasticNetParam,
    /// Iteration cap.
    MaxIter,
}

impl Param {
    /// Display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegParam => "reg_param",
            Self::ElasticNetParam => "elastic_net_param",
            Self::MaxIter => "max_iter",
        }
    }
}

/// One assignment of values to parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamMap(BTreeMap<Param, f64>);

impl ParamMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `param` to `value`, replacing any earlier value.
    #[must_use]
    pub fn with(mut self, param: Param, value: f64) -> Self {
        self.0.insert(param, value);
        self
    }

    /// The value of `param`, if set.
    pub fn get(&self, param: Param) -> Option<f64> {
        self.0.get(&param).copied()
    }

    /// Assignments in parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (Param, f64)> + '_ {
        self.0.iter().map(|(&p, &v)| (p, v))
    }

    /// Number of assigned parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameter is assigned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(p, v)| format!("{}={}", p.name(), v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Builds the cross product of per-parameter candidate lists.
#[derive(Debug, Clone, Default)]
pub struct ParamGridBuilder {
    axes: Vec<(Param, Vec<f64>)>,
}

impl ParamGridBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candidate values for `param`.
    #[must_use]
    pub fn add_grid(mut self, param: Param, values: &[f64]) -> Self {
        self.axes.push((param, values.to_vec()));
        self
    }

    /// Every combination, earlier axes varying slowest.
    ///
    /// A builder with no axes yields one empty map.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::EmptyGrid`] if any axis has no values.
    pub fn build(&self) -> Result<Vec<ParamMap>> {
        let mut maps = vec![ParamMap::new()];
        for (param, values) in &self.axes {
            if values.is_empty() {
                return Err(BourseError::EmptyGrid(format!("no values for {}", param.name())));
            }
            maps = maps
                .iter()
                .flat_map(|m| values.iter().map(move |&v| m.clone().with(*param, v)))
                .collect();
        }
        Ok(maps)
    }
}

/// Selects the best parameter map on a held-out validation partition.
///
/// The training data is re-split per ticker by chronological rank, every
/// candidate is fitted on the first partition and scored on the second, and
/// the winner is refitted on all of the training data. Ties keep the earlier
/// candidate. When no candidate scores a finite metric, as with an empty
/// validation partition, the first candidate is kept.
#[derive(Debug, Clone)]
pub struct TrainValidationSplit {
    estimator: Pipeline,
    grid: Vec<ParamMap>,
    metric: Metric,
    split: RankSplit,
}

impl TrainValidationSplit {
    /// Create a search with a 0.75 train ratio.
    pub fn new(estimator: Pipeline, grid: Vec<ParamMap>, metric: Metric) -> Self {
        Self {
            estimator,
            grid,
            metric,
            split: RankSplit::new(0.75),
        }
    }

    /// Use `split` for the validation partition.
    #[must_use]
    pub fn with_split(mut self, split: RankSplit) -> Self {
        self.split = split;
        self
    }

    /// Keep the split columns, change the ratio.
    #[must_use]
    pub fn with_train_ratio(mut self, ratio: f64) -> Self {
        self.split = self.split.with_ratio(ratio);
        self
    }

    /// The candidate parameter maps.
    pub fn grid(&self) -> &[ParamMap] {
        &self.grid
    }
}

impl Estimator for TrainValidationSplit {
    type Model = TrainValidationSplitModel;

    fn fit(&self, data: &DataFrame) -> Result<TrainValidationSplitModel> {
        if self.grid.is_empty() {
            return Err(BourseError::EmptyGrid("the search has no parameter maps".to_string()));
        }
        self.estimator.validate()?;

        let (train, validation) = self.split.split(data)?;
        info!(
            "Validating {} candidates on {} rows ({} held out)",
            self.grid.len(),
            train.height(),
            validation.height()
        );

        let mut validation_metrics = Vec::with_capacity(self.grid.len());
        if validation.height() == 0 {
            validation_metrics.resize(self.grid.len(), f64::NAN);
        } else {
            for params in &self.grid {
                let model = self.estimator.with_params(params).fit(&train)?;
                let score = self.metric.evaluate(&model.transform(&validation)?)?;
                info!("{} {} = {:.6}", params, self.metric.name(), score);
                validation_metrics.push(score);
            }
        }

        let mut best: Option<usize> = None;
        for (i, &score) in validation_metrics.iter().enumerate() {
            let incumbent = best.map_or(f64::NAN, |b| validation_metrics[b]);
            if self.metric.is_better(score, incumbent) {
                best = Some(i);
            }
        }
        let best = best.unwrap_or_else(|| {
            warn!(
                "No finite validation {} ({} rows held out); keeping the first candidate",
                self.metric.name(),
                validation.height()
            );
            0
        });

        let best_params = self.grid[best].clone();
        info!("Best parameters {}; refitting on {} rows", best_params, data.height());
        let best_model = self.estimator.with_params(&best_params).fit(data)?;

        Ok(TrainValidationSplitModel {
            best_model,
            best_params,
            validation_metrics,
            metric: self.metric,
        })
    }
}

/// The refitted winner of a [`TrainValidationSplit`].
#[derive(Debug, Clone)]
pub struct TrainValidationSplitModel {
    best_model: PipelineModel,
    best_params: ParamMap,
    validation_metrics: Vec<f64>,
    metric: Metric,
}

impl TrainValidationSplitModel {
    /// The refitted best pipeline.
    pub const fn best_model(&self) -> &PipelineModel {
        &self.best_model
    }

    /// The winning parameter map.
    pub const fn best_params(&self) -> &ParamMap {
        &self.best_params
    }

    /// Validation score per candidate, in grid order.
    pub fn validation_metrics(&self) -> &[f64] {
        &self.validation_metrics
    }

    /// The selection metric.
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    /// Writes the model to `dir`, replacing any previous artifact.
    pub fn save(&self, dir: &Path, kind: &str) -> Result<()> {
        let metadata = ModelMetadata::new(kind, &self.best_model)
            .with_selection(self.metric, &self.best_params, &self.validation_metrics);
        save_model(dir, &self.best_model, &metadata)
    }

    /// Reads a model written by [`TrainValidationSplitModel::save`].
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::Artifact`] if the artifact lacks selection
    /// metadata.
    pub fn load(dir: &Path) -> Result<Self> {
        let (best_model, metadata) = load_model(dir)?;
        let metric = metadata
            .metric
            .ok_or_else(|| BourseError::Artifact("artifact has no selection metric".to_string()))?;
        Ok(Self {
            best_model,
            best_params: metadata.best_params,
            validation_metrics: metadata
                .validation_metrics
                .into_iter()
                .map(|m| m.unwrap_or(f64::NAN))
                .collect(),
            metric,
        })
    }
}

impl Transformer for TrainValidationSplitModel {
    type Output = Predictions;

    fn transform(&self, data: &DataFrame) -> Result<Predictions> {
        self.best_model.transform(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{FeatureEncoder, FeatureSpec};
    use crate::linear::LinearRegression;
    use crate::pipeline::Stage;
    use polars::prelude::*;

    #[test]
    fn test_grid_cross_product() {
        let grid = ParamGridBuilder::new()
            .add_grid(Param::ElasticNetParam, &[0.0, 0.5, 1.0])
            .add_grid(Param::RegParam, &[0.1, 2.0])
            .build()
            .unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0].get(Param::ElasticNetParam), Some(0.0));
        assert_eq!(grid[0].get(Param::RegParam), Some(0.1));
        assert_eq!(grid[1].get(Param::RegParam), Some(2.0));
        assert_eq!(grid[5].get(Param::ElasticNetParam), Some(1.0));
    }

    #[test]
    fn test_grid_without_axes_has_one_map() {
        let grid = ParamGridBuilder::new().build().unwrap();
        assert_eq!(grid, vec![ParamMap::new()]);
    }

    #[test]
    fn test_empty_axis_is_rejected() {
        let err = ParamGridBuilder::new()
            .add_grid(Param::RegParam, &[0.1])
            .add_grid(Param::ElasticNetParam, &[])
            .build()
            .unwrap_err();
        assert!(matches!(err, BourseError::EmptyGrid(_)));
    }

    #[test]
    fn test_param_map_display() {
        let params = ParamMap::new().with(Param::RegParam, 0.5).with(Param::ElasticNetParam, 1.0);
        assert_eq!(params.to_string(), "{reg_param=0.5, elastic_net_param=1}");
    }

    fn trend_frame() -> DataFrame {
        let n = 12;
        let tickers: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "AAPL" } else { "MSFT" }).collect();
        let dates: Vec<String> = (0..n).map(|i| format!("2024-01-{:02}", i / 2 + 1)).collect();
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        df! {
            "ticker" => tickers,
            "date" => dates,
            "x" => x,
            "y" => y,
        }
        .unwrap()
    }

    fn regression_search(grid: Vec<ParamMap>) -> TrainValidationSplit {
        let pipeline = Pipeline::new(vec![
            Stage::Encoder(FeatureEncoder::regression("y").with_feature(FeatureSpec::numeric("x"))),
            Stage::Regressor(LinearRegression::default()),
        ]);
        TrainValidationSplit::new(pipeline, grid, Metric::Rmse).with_train_ratio(0.75)
    }

    #[test]
    fn test_search_prefers_weaker_penalty_on_exact_data() {
        let grid = ParamGridBuilder::new()
            .add_grid(Param::RegParam, &[5.0, 0.0, 1.0])
            .build()
            .unwrap();
        let model = regression_search(grid).fit(&trend_frame()).unwrap();

        assert_eq!(model.best_params().get(Param::RegParam), Some(0.0));
        assert_eq!(model.validation_metrics().len(), 3);
        assert!(model.validation_metrics()[1] < 1e-6);
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let grid = ParamGridBuilder::new()
            .add_grid(Param::MaxIter, &[10.0, 20.0])
            .build()
            .unwrap();
        let model = regression_search(grid).fit(&trend_frame()).unwrap();
        assert_eq!(model.best_params().get(Param::MaxIter), Some(10.0));
    }

    #[test]
    fn test_empty_validation_keeps_first_candidate() {
        // One date per ticker: every row ranks 0 and stays in training.
        let data = trend_frame().slice(0, 2);
        let grid = ParamGridBuilder::new()
            .add_grid(Param::RegParam, &[0.3, 0.1])
            .build()
            .unwrap();
        let model = regression_search(grid).fit(&data).unwrap();

        assert_eq!(model.best_params().get(Param::RegParam), Some(0.3));
        assert_eq!(model.validation_metrics().len(), 2);
        assert!(model.validation_metrics().iter().all(|m| m.is_nan()));
        assert_eq!(model.transform(&data).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_grid_is_fatal() {
        let err = regression_search(Vec::new()).fit(&trend_frame()).unwrap_err();
        assert!(matches!(err, BourseError::EmptyGrid(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("bourse_tuning_save_and_load");
        let grid = ParamGridBuilder::new()
            .add_grid(Param::RegParam, &[0.0, 0.5])
            .build()
            .unwrap();
        let data = trend_frame();
        let model = regression_search(grid).fit(&data).unwrap();

        model.save(&dir, "test_regressor").unwrap();
        let loaded = TrainValidationSplitModel::load(&dir).unwrap();

        assert_eq!(loaded.best_params(), model.best_params());
        assert_eq!(loaded.metric(), Metric::Rmse);
        let before = model.transform(&data).unwrap();
        let after = loaded.transform(&data).unwrap();
        for (a, b) in before.prediction().iter().zip(after.prediction()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
