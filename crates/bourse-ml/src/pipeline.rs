//! Stage pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s: one or more encoders
//! followed by exactly one model. Encoder outputs are concatenated column-wise
//! into one design matrix, and exactly one encoder declares the target.
//! Fitting yields a [`PipelineModel`] holding the fitted form of every stage.

use bourse_traits::types::require_columns;
use bourse_traits::{BourseError, Estimator, Result, Transformer};
use ndarray::{Array2, Axis, concatenate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::encode::{Encoded, FeatureEncoder, FittedEncoder, FittedLabel, LabelSpec};
use crate::linear::{LinearModel, LinearRegression};
use crate::logistic::{LogisticModel, LogisticRegression};
use crate::tuning::{Param, ParamMap};

/// Name of the prediction column in [`Predictions::to_frame`].
pub const PREDICTION: &str = "prediction";
/// Name of the predicted-class probability column in [`Predictions::to_frame`].
pub const PROBABILITY: &str = "probability";

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// An encoder fitted with the pipeline.
    Encoder(FeatureEncoder),
    /// An encoder fitted beforehand, used as-is.
    Encoded(FittedEncoder),
    /// Multinomial logistic regression on a categorical target.
    Classifier(LogisticRegression),
    /// Linear regression on a continuous target.
    Regressor(LinearRegression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Categorical,
    Numeric,
}

impl Stage {
    const fn is_model(&self) -> bool {
        matches!(self, Self::Classifier(_) | Self::Regressor(_))
    }

    fn target(&self) -> Option<TargetKind> {
        match self {
            Self::Encoder(e) => e.label().map(|l| match l {
                LabelSpec::Categorical(_) => TargetKind::Categorical,
                LabelSpec::Numeric(_) => TargetKind::Numeric,
            }),
            Self::Encoded(e) => e.label().map(|l| match l {
                FittedLabel::Categorical(_) => TargetKind::Categorical,
                FittedLabel::Numeric(_) => TargetKind::Numeric,
            }),
            Self::Classifier(_) | Self::Regressor(_) => None,
        }
    }

    fn apply(&mut self, params: &ParamMap) {
        let (reg_param, elastic_net_param, max_iter) = match self {
            Self::Classifier(m) => (&mut m.reg_param, &mut m.elastic_net_param, &mut m.max_iter),
            Self::Regressor(m) => (&mut m.reg_param, &mut m.elastic_net_param, &mut m.max_iter),
            Self::Encoder(_) | Self::Encoded(_) => return,
        };
        for (param, value) in params.iter() {
            match param {
                Param::RegParam => *reg_param = value,
                Param::ElasticNetParam => *elastic_net_param = value,
                Param::MaxIter => *max_iter = value.max(0.0) as usize,
            }
        }
    }
}

/// An unfitted stage sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create a pipeline from stages in order.
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The stages in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// A copy with `params` applied to the model stage.
    #[must_use]
    pub fn with_params(&self, params: &ParamMap) -> Self {
        let mut next = self.clone();
        for stage in &mut next.stages {
            stage.apply(params);
        }
        next
    }

    /// Checks the stage layout.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::InvalidPipeline`] unless the pipeline is one or
    /// more encoders followed by one model, with exactly one encoder declaring
    /// a target of the kind the model expects.
    pub fn validate(&self) -> Result<()> {
        let Some((model, encoders)) = self.stages.split_last() else {
            return Err(BourseError::InvalidPipeline("no stages".to_string()));
        };
        let expected = match model {
            Stage::Classifier(_) => TargetKind::Categorical,
            Stage::Regressor(_) => TargetKind::Numeric,
            _ => {
                return Err(BourseError::InvalidPipeline(
                    "the last stage must be a model".to_string(),
                ));
            }
        };
        if encoders.is_empty() {
            return Err(BourseError::InvalidPipeline("no encoder stages".to_string()));
        }
        if encoders.iter().any(Stage::is_model) {
            return Err(BourseError::InvalidPipeline(
                "a model may only appear as the last stage".to_string(),
            ));
        }
        let targets: Vec<TargetKind> = encoders.iter().filter_map(Stage::target).collect();
        match targets.as_slice() {
            [kind] if *kind == expected => Ok(()),
            [kind] => Err(BourseError::InvalidPipeline(format!(
                "target is {kind:?} but the model expects {expected:?}"
            ))),
            [] => Err(BourseError::InvalidPipeline("no stage declares a target".to_string())),
            _ => Err(BourseError::InvalidPipeline(
                "more than one stage declares a target".to_string(),
            )),
        }
    }
}

impl Estimator for Pipeline {
    type Model = PipelineModel;

    fn fit(&self, data: &DataFrame) -> Result<PipelineModel> {
        self.validate()?;

        let mut fitted = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            match stage {
                Stage::Encoder(encoder) => fitted.push(FittedStage::Encoder(encoder.fit(data)?)),
                Stage::Encoded(encoder) => fitted.push(FittedStage::Encoder(encoder.clone())),
                Stage::Classifier(_) | Stage::Regressor(_) => {}
            }
        }

        let encoded = encode_all(fitted.iter().filter_map(FittedStage::encoder), data)?;
        let rows = encoded.kept_rows();
        let (x, label) = encoded.select(&rows);
        let label = label.ok_or_else(|| {
            BourseError::InvalidPipeline("training data has no target column".to_string())
        })?;

        let model = match self.stages.last() {
            Some(Stage::Classifier(estimator)) => {
                let classes = fitted
                    .iter()
                    .filter_map(FittedStage::encoder)
                    .find_map(FittedEncoder::class_labels)
                    .map_or(0, <[String]>::len);
                let y: Vec<usize> = label.iter().map(|&v| v as usize).collect();
                FittedStage::Classifier(estimator.fit(&x, &y, classes)?)
            }
            Some(Stage::Regressor(estimator)) => FittedStage::Regressor(estimator.fit(&x, &label)?),
            _ => return Err(BourseError::InvalidPipeline("the last stage must be a model".to_string())),
        };
        debug!("Fitted pipeline on {} rows, {} features", x.nrows(), x.ncols());
        fitted.push(model);

        Ok(PipelineModel { stages: fitted })
    }
}

/// The fitted form of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FittedStage {
    /// A fitted encoder.
    Encoder(FittedEncoder),
    /// A fitted classifier.
    Classifier(LogisticModel),
    /// A fitted regressor.
    Regressor(LinearModel),
}

impl FittedStage {
    /// The encoder, if this stage is one.
    pub const fn encoder(&self) -> Option<&FittedEncoder> {
        match self {
            Self::Encoder(e) => Some(e),
            _ => None,
        }
    }
}

fn encode_all<'a>(
    encoders: impl IntoIterator<Item = &'a FittedEncoder>,
    data: &DataFrame,
) -> Result<Encoded> {
    let n = data.height();
    let blocks = encoders
        .into_iter()
        .map(|e| e.transform(data))
        .collect::<Result<Vec<Encoded>>>()?;

    let mut keep = vec![true; n];
    let mut label = None;
    for block in &blocks {
        for (k, &b) in keep.iter_mut().zip(&block.keep) {
            *k &= b;
        }
        if block.label.is_some() {
            label.clone_from(&block.label);
        }
    }
    let views: Vec<_> = blocks.iter().map(|b| b.features.view()).collect();
    let features = if views.is_empty() {
        Array2::zeros((n, 0))
    } else {
        concatenate(Axis(1), &views).map_err(|e| BourseError::InvalidData(e.to_string()))?
    };

    let dropped = keep.iter().filter(|&&k| !k).count();
    if dropped > 0 {
        warn!("Skipped {} of {} rows that could not be encoded", dropped, n);
    }
    Ok(Encoded {
        features,
        keep,
        label,
    })
}

/// A fitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineModel {
    stages: Vec<FittedStage>,
}

impl PipelineModel {
    /// The fitted stages in order.
    pub fn stages(&self) -> &[FittedStage] {
        &self.stages
    }

    fn encoders(&self) -> impl Iterator<Item = &FittedEncoder> {
        self.stages.iter().filter_map(FittedStage::encoder)
    }

    /// Names of the design-matrix columns.
    pub fn feature_names(&self) -> Vec<String> {
        self.encoders().flat_map(FittedEncoder::feature_names).collect()
    }

    /// Class labels in index order, for a classifier.
    pub fn class_labels(&self) -> Option<&[String]> {
        self.encoders().find_map(FittedEncoder::class_labels)
    }

    /// The source column of the target.
    pub fn label_column(&self) -> Option<&str> {
        self.encoders()
            .find_map(FittedEncoder::label)
            .map(FittedLabel::column)
    }
}

impl Transformer for PipelineModel {
    type Output = Predictions;

    /// Predicts every row that encodes cleanly. The target is carried along
    /// when its column is present.
    fn transform(&self, data: &DataFrame) -> Result<Predictions> {
        let encoded = encode_all(self.encoders(), data)?;
        let rows = encoded.kept_rows();
        let (x, label) = encoded.select(&rows);

        let (prediction, probability) = match self.stages.last() {
            Some(FittedStage::Classifier(model)) => {
                check_width(model.coefficients().ncols(), x.ncols())?;
                let probability = model.predict_proba(&x);
                let prediction = model.predict(&x).into_iter().map(|c| c as f64).collect();
                (prediction, Some(probability))
            }
            Some(FittedStage::Regressor(model)) => {
                check_width(model.coefficients().len(), x.ncols())?;
                (model.predict(&x).to_vec(), None)
            }
            _ => {
                return Err(BourseError::InvalidPipeline(
                    "the last stage must be a model".to_string(),
                ));
            }
        };

        Ok(Predictions {
            rows,
            prediction,
            label,
            probability,
            classes: self.class_labels().map(<[String]>::to_vec),
        })
    }
}

fn check_width(expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(BourseError::InvalidData(format!(
            "model expects {expected} features, encoders produced {got}"
        )))
    }
}

/// Output of [`PipelineModel::transform`].
#[derive(Debug, Clone)]
pub struct Predictions {
    rows: Vec<usize>,
    prediction: Vec<f64>,
    label: Option<Vec<f64>>,
    probability: Option<Array2<f64>>,
    classes: Option<Vec<String>>,
}

impl Predictions {
    /// Source row of each prediction, ascending.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Predicted value, or predicted class index.
    pub fn prediction(&self) -> &[f64] {
        &self.prediction
    }

    /// Actual value or class index, if the target column was present.
    pub fn label(&self) -> Option<&[f64]> {
        self.label.as_deref()
    }

    /// Class probabilities, one row per prediction.
    pub const fn probability(&self) -> Option<&Array2<f64>> {
        self.probability.as_ref()
    }

    /// Class names in index order, for a classifier.
    pub fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    /// Number of predictions.
    pub fn len(&self) -> usize {
        self.prediction.len()
    }

    /// Whether there are no predictions.
    pub fn is_empty(&self) -> bool {
        self.prediction.is_empty()
    }

    /// Predicted class names, for a classifier.
    pub fn predicted_classes(&self) -> Option<Vec<String>> {
        let classes = self.classes.as_ref()?;
        Some(
            self.prediction
                .iter()
                .map(|&p| classes.get(p as usize).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Probability of the predicted class, for a classifier.
    pub fn predicted_probability(&self) -> Option<Vec<f64>> {
        let probability = self.probability.as_ref()?;
        Some(
            self.prediction
                .iter()
                .enumerate()
                .map(|(i, &p)| probability[[i, p as usize]])
                .collect(),
        )
    }

    /// The predicted rows of `source` with `columns`, plus a prediction column.
    ///
    /// Classifiers get the predicted class name and its probability;
    /// regressors get the predicted value.
    pub fn to_frame(&self, source: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        require_columns(source, columns)?;
        let mut selected = vec![false; source.height()];
        for &row in &self.rows {
            selected[row] = true;
        }
        let mask = BooleanChunked::from_slice("predicted".into(), &selected);
        let mut frame = source.select(columns.iter().copied())?.filter(&mask)?;

        match (self.predicted_classes(), self.predicted_probability()) {
            (Some(classes), Some(probability)) => {
                frame.with_column(Series::new(PREDICTION.into(), classes))?;
                frame.with_column(Series::new(PROBABILITY.into(), probability))?;
            }
            _ => {
                frame.with_column(Series::new(PREDICTION.into(), self.prediction.clone()))?;
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{FeatureSpec, HandleInvalid};
    use approx::assert_abs_diff_eq;
    use bourse_traits::types::{float_values, string_values};

    fn regression_frame() -> DataFrame {
        // y = 3 x + 1, plus a constant offset per group
        df! {
            "group" => &["a", "b", "a", "b", "a", "b"],
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, f64::NAN],
            "y" => &[4.0, 9.0, 10.0, 15.0, 16.0, 21.0],
        }
        .unwrap()
    }

    fn regression_pipeline() -> Pipeline {
        Pipeline::new(vec![
            Stage::Encoder(
                FeatureEncoder::regression("y")
                    .with_feature(FeatureSpec::numeric("x"))
                    .with_feature(FeatureSpec::one_hot("group"))
                    .with_handle_invalid(HandleInvalid::Skip),
            ),
            Stage::Regressor(LinearRegression::default()),
        ])
    }

    #[test]
    fn test_regression_pipeline_fits_and_predicts() {
        let data = regression_frame();
        let model = regression_pipeline().fit(&data).unwrap();
        assert_eq!(model.feature_names(), vec!["x", "group=a"]);
        assert_eq!(model.label_column(), Some("y"));

        let predictions = model.transform(&data).unwrap();
        // The NaN row is skipped.
        assert_eq!(predictions.rows(), &[0, 1, 2, 3, 4]);
        for (p, a) in predictions.prediction().iter().zip(predictions.label().unwrap()) {
            assert_abs_diff_eq!(p, a, epsilon = 1e-6);
        }

        let frame = predictions.to_frame(&data, &["group", "y"]).unwrap();
        assert_eq!(frame.height(), 5);
        assert_eq!(
            float_values(&frame, PREDICTION).unwrap().len(),
            predictions.len()
        );
    }

    #[test]
    fn test_classifier_pipeline_emits_class_names() {
        let data = df! {
            "x" => &[-3.0, -2.0, -2.5, 2.0, 3.0, 2.5],
            "label" => &["DOWN", "DOWN", "DOWN", "UP", "UP", "UP"],
        }
        .unwrap();
        let pipeline = Pipeline::new(vec![
            Stage::Encoder(FeatureEncoder::classification("label").with_feature(FeatureSpec::numeric("x"))),
            Stage::Classifier(LogisticRegression::default()),
        ]);
        let model = pipeline.fit(&data).unwrap();
        let predictions = model.transform(&data).unwrap();

        let frame = predictions.to_frame(&data, &["label"]).unwrap();
        assert_eq!(
            string_values(&frame, PREDICTION).unwrap(),
            string_values(&frame, "label").unwrap()
        );
        let probability = float_values(&frame, PROBABILITY).unwrap();
        assert!(probability.iter().all(|&p| p > 0.5 && p <= 1.0));
    }

    #[test]
    fn test_prefitted_encoder_stage() {
        let data = regression_frame();
        let encoder = FeatureEncoder::regression("y")
            .with_feature(FeatureSpec::one_hot("group"))
            .fit(&data)
            .unwrap();
        let pipeline = Pipeline::new(vec![
            Stage::Encoded(encoder),
            Stage::Encoder(FeatureEncoder::new().with_feature(FeatureSpec::numeric("x")).with_handle_invalid(HandleInvalid::Skip)),
            Stage::Regressor(LinearRegression::default()),
        ]);
        let model = pipeline.fit(&data).unwrap();
        assert_eq!(model.feature_names(), vec!["group=a", "x"]);
    }

    #[test]
    fn test_with_params_targets_model_stage() {
        let params = ParamMap::new()
            .with(Param::RegParam, 0.3)
            .with(Param::ElasticNetParam, 0.5)
            .with(Param::MaxIter, 7.0);
        let tuned = regression_pipeline().with_params(&params);
        match tuned.stages().last() {
            Some(Stage::Regressor(m)) => {
                assert_abs_diff_eq!(m.reg_param, 0.3);
                assert_abs_diff_eq!(m.elastic_net_param, 0.5);
                assert_eq!(m.max_iter, 7);
            }
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_layouts() {
        let encoder = FeatureEncoder::regression("y").with_feature(FeatureSpec::numeric("x"));
        let cases = vec![
            Pipeline::new(vec![]),
            Pipeline::new(vec![Stage::Encoder(encoder.clone())]),
            Pipeline::new(vec![Stage::Regressor(LinearRegression::default())]),
            Pipeline::new(vec![
                Stage::Encoder(encoder.clone()),
                Stage::Classifier(LogisticRegression::default()),
            ]),
            Pipeline::new(vec![
                Stage::Encoder(encoder.clone()),
                Stage::Encoder(encoder.clone()),
                Stage::Regressor(LinearRegression::default()),
            ]),
            Pipeline::new(vec![
                Stage::Encoder(FeatureEncoder::new().with_feature(FeatureSpec::numeric("x"))),
                Stage::Regressor(LinearRegression::default()),
            ]),
        ];
        for pipeline in cases {
            assert!(matches!(
                pipeline.validate(),
                Err(BourseError::InvalidPipeline(_))
            ));
        }
    }

    #[test]
    fn test_transform_unseen_category_fails_by_default() {
        let data = regression_frame().slice(0, 5);
        let pipeline = Pipeline::new(vec![
            Stage::Encoder(
                FeatureEncoder::regression("y")
                    .with_feature(FeatureSpec::one_hot("group"))
                    .with_feature(FeatureSpec::numeric("x")),
            ),
            Stage::Regressor(LinearRegression::default()),
        ]);
        let model = pipeline.fit(&data).unwrap();
        let unseen = df! {
            "group" => &["c"],
            "x" => &[1.0],
        }
        .unwrap();
        assert!(matches!(
            model.transform(&unseen),
            Err(BourseError::UnseenCategory { .. })
        ));
    }
}
