//! Categorical indexing and feature assembly.
//!
//! A [`FeatureEncoder`] declares the role of every input column: one-hot
//! categorical, indexed categorical, or continuous. Fitting it learns the
//! category vocabularies; the resulting [`FittedEncoder`] turns a DataFrame
//! into a dense design matrix plus an optional label vector.

use std::collections::HashMap;

use bourse_traits::types::{float_values, has_column, require_columns, string_values};
use bourse_traits::{BourseError, Estimator, Result, Transformer};
use ndarray::{Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// What to do with a value that cannot be encoded.
///
/// For categorical columns this covers values unseen at fit time and nulls.
/// For continuous columns it covers NaN and infinite values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleInvalid {
    /// Fail the transform.
    #[default]
    Error,
    /// Drop the row.
    Skip,
    /// Put unseen categories in an extra bucket, pass continuous values through.
    Keep,
}

/// Learns a string-to-index mapping for one column.
///
/// Indices are assigned by descending frequency, ties broken by the
/// lexically smaller label, so the most frequent label gets index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringIndexer {
    column: String,
    handle_invalid: HandleInvalid,
}

impl StringIndexer {
    /// Create an indexer for `column` that fails on unseen values.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            handle_invalid: HandleInvalid::default(),
        }
    }

    /// Set the policy for unseen values.
    #[must_use]
    pub fn with_handle_invalid(mut self, handle_invalid: HandleInvalid) -> Self {
        self.handle_invalid = handle_invalid;
        self
    }

    /// Fits the mapping from raw values. Nulls are not counted.
    pub fn fit_values<'a>(
        &self,
        values: impl IntoIterator<Item = Option<&'a str>>,
    ) -> StringIndexerModel {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let labels: Vec<String> = ranked.into_iter().map(|(l, _)| l.to_string()).collect();
        StringIndexerModel::new(self.column.clone(), labels, self.handle_invalid)
    }
}

impl Estimator for StringIndexer {
    type Model = StringIndexerModel;

    fn fit(&self, data: &DataFrame) -> Result<StringIndexerModel> {
        let values = string_values(data, &self.column)?;
        Ok(self.fit_values(values.iter().map(Option::as_deref)))
    }
}

/// A fitted string-to-index mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringIndexerModel {
    column: String,
    labels: Vec<String>,
    positions: HashMap<String, usize>,
    handle_invalid: HandleInvalid,
}

impl StringIndexerModel {
    /// Build a model from labels already in index order.
    pub fn new(column: impl Into<String>, labels: Vec<String>, handle_invalid: HandleInvalid) -> Self {
        let positions = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self {
            column: column.into(),
            labels,
            positions,
            handle_invalid,
        }
    }

    /// The indexed column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of distinct indices this model can emit, including the extra
    /// bucket under [`HandleInvalid::Keep`].
    pub fn num_categories(&self) -> usize {
        match self.handle_invalid {
            HandleInvalid::Keep => self.labels.len() + 1,
            _ => self.labels.len(),
        }
    }

    /// Label for `index`, or `None` for the extra bucket.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Index of `value`.
    ///
    /// Returns `Ok(None)` when the value is invalid and the row should be
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::UnseenCategory`] under [`HandleInvalid::Error`].
    pub fn index_of(&self, value: Option<&str>) -> Result<Option<usize>> {
        if let Some(&i) = value.and_then(|v| self.positions.get(v)) {
            return Ok(Some(i));
        }
        match self.handle_invalid {
            HandleInvalid::Error => Err(BourseError::UnseenCategory {
                column: self.column.clone(),
                value: value.unwrap_or("null").to_string(),
            }),
            HandleInvalid::Skip => Ok(None),
            HandleInvalid::Keep => Ok(Some(self.labels.len())),
        }
    }
}

impl Transformer for StringIndexerModel {
    type Output = Vec<Option<usize>>;

    fn transform(&self, data: &DataFrame) -> Result<Vec<Option<usize>>> {
        string_values(data, &self.column)?
            .iter()
            .map(|v| self.index_of(v.as_deref()))
            .collect()
    }
}

/// Role of a predictor column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Indexed, then expanded to indicator columns with the last category
    /// dropped.
    OneHot,
    /// Indexed, used as a single numeric column.
    Index,
    /// Used as-is.
    Numeric,
}

/// One predictor column and its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Source column.
    pub column: String,
    /// How the column is encoded.
    pub encoding: Encoding,
}

impl FeatureSpec {
    /// A one-hot categorical predictor.
    pub fn one_hot(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            encoding: Encoding::OneHot,
        }
    }

    /// An indexed categorical predictor.
    pub fn indexed(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            encoding: Encoding::Index,
        }
    }

    /// A continuous predictor.
    pub fn numeric(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            encoding: Encoding::Numeric,
        }
    }
}

/// The target column and its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSpec {
    /// A categorical target, indexed by frequency.
    Categorical(String),
    /// A continuous target.
    Numeric(String),
}

impl LabelSpec {
    /// The target column.
    pub fn column(&self) -> &str {
        match self {
            Self::Categorical(c) | Self::Numeric(c) => c,
        }
    }
}

/// Declarative encoder: a target and an ordered list of predictors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    label: Option<LabelSpec>,
    features: Vec<FeatureSpec>,
    handle_invalid: HandleInvalid,
}

impl FeatureEncoder {
    /// An encoder with no target and no predictors.
    pub fn new() -> Self {
        Self::default()
    }

    /// An encoder for a categorical target.
    pub fn classification(label: impl Into<String>) -> Self {
        Self {
            label: Some(LabelSpec::Categorical(label.into())),
            ..Self::default()
        }
    }

    /// An encoder for a continuous target.
    pub fn regression(label: impl Into<String>) -> Self {
        Self {
            label: Some(LabelSpec::Numeric(label.into())),
            ..Self::default()
        }
    }

    /// Append a predictor.
    #[must_use]
    pub fn with_feature(mut self, feature: FeatureSpec) -> Self {
        self.features.push(feature);
        self
    }

    /// Append several predictors in order.
    #[must_use]
    pub fn with_features(mut self, features: impl IntoIterator<Item = FeatureSpec>) -> Self {
        self.features.extend(features);
        self
    }

    /// Set the invalid-value policy for every predictor.
    #[must_use]
    pub fn with_handle_invalid(mut self, handle_invalid: HandleInvalid) -> Self {
        self.handle_invalid = handle_invalid;
        self
    }

    /// The declared target.
    pub const fn label(&self) -> Option<&LabelSpec> {
        self.label.as_ref()
    }

    /// The declared predictors.
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }
}

impl Estimator for FeatureEncoder {
    type Model = FittedEncoder;

    fn fit(&self, data: &DataFrame) -> Result<FittedEncoder> {
        let columns: Vec<&str> = self.features.iter().map(|f| f.column.as_str()).collect();
        require_columns(data, &columns)?;

        let features = self
            .features
            .iter()
            .map(|spec| {
                let indexer =
                    StringIndexer::new(spec.column.clone()).with_handle_invalid(self.handle_invalid);
                Ok(match spec.encoding {
                    Encoding::OneHot => FittedFeature::OneHot(indexer.fit(data)?),
                    Encoding::Index => FittedFeature::Index(indexer.fit(data)?),
                    Encoding::Numeric => FittedFeature::Numeric(spec.column.clone()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let label = match &self.label {
            Some(LabelSpec::Categorical(column)) => {
                require_columns(data, &[column.as_str()])?;
                // Labels unseen at fit time are never predicted, so they go
                // in the extra bucket instead of failing evaluation.
                let indexer = StringIndexer::new(column.clone()).with_handle_invalid(HandleInvalid::Keep);
                Some(FittedLabel::Categorical(indexer.fit(data)?))
            }
            Some(LabelSpec::Numeric(column)) => Some(FittedLabel::Numeric(column.clone())),
            None => None,
        };

        Ok(FittedEncoder {
            label,
            features,
            handle_invalid: self.handle_invalid,
        })
    }
}

/// A fitted target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FittedLabel {
    /// Categorical target with its learned classes.
    Categorical(StringIndexerModel),
    /// Continuous target column.
    Numeric(String),
}

impl FittedLabel {
    /// The target column.
    pub fn column(&self) -> &str {
        match self {
            Self::Categorical(model) => model.column(),
            Self::Numeric(column) => column,
        }
    }
}

/// A fitted predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FittedFeature {
    /// One-hot expansion with the last category dropped.
    OneHot(StringIndexerModel),
    /// Single indexed column.
    Index(StringIndexerModel),
    /// Continuous column.
    Numeric(String),
}

impl FittedFeature {
    fn width(&self) -> usize {
        match self {
            Self::OneHot(model) => model.num_categories().saturating_sub(1),
            Self::Index(_) | Self::Numeric(_) => 1,
        }
    }
}

/// A design matrix with its row mask and optional target.
///
/// `features` and `label` cover every input row; `keep` marks the rows that
/// encoded cleanly.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// One row per input row.
    pub features: Array2<f64>,
    /// `false` for rows dropped under [`HandleInvalid::Skip`].
    pub keep: Vec<bool>,
    /// Target values, or class indices for a categorical target.
    pub label: Option<Vec<f64>>,
}

impl Encoded {
    /// Indices of the kept rows, ascending.
    pub fn kept_rows(&self) -> Vec<usize> {
        self.keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect()
    }

    /// Features and target restricted to `rows`.
    pub fn select(&self, rows: &[usize]) -> (Array2<f64>, Option<Vec<f64>>) {
        let features = self.features.select(Axis(0), rows);
        let label = self
            .label
            .as_ref()
            .map(|values| rows.iter().map(|&i| values[i]).collect());
        (features, label)
    }
}

/// The fitted form of a [`FeatureEncoder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FittedEncoder {
    label: Option<FittedLabel>,
    features: Vec<FittedFeature>,
    handle_invalid: HandleInvalid,
}

impl FittedEncoder {
    /// Number of design-matrix columns.
    pub fn width(&self) -> usize {
        self.features.iter().map(FittedFeature::width).sum()
    }

    /// The fitted target.
    pub const fn label(&self) -> Option<&FittedLabel> {
        self.label.as_ref()
    }

    /// Class labels in index order, for a categorical target.
    pub fn class_labels(&self) -> Option<&[String]> {
        match &self.label {
            Some(FittedLabel::Categorical(model)) => Some(model.labels()),
            _ => None,
        }
    }

    /// The fitted predictors.
    pub fn features(&self) -> &[FittedFeature] {
        &self.features
    }

    /// Names of the design-matrix columns, in order.
    ///
    /// One-hot columns are named `column=label`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for feature in &self.features {
            match feature {
                FittedFeature::OneHot(model) => {
                    let width = feature.width();
                    for i in 0..width {
                        let label = model.label(i).unwrap_or("__unknown");
                        names.push(format!("{}={}", model.column(), label));
                    }
                }
                FittedFeature::Index(model) => names.push(model.column().to_string()),
                FittedFeature::Numeric(column) => names.push(column.clone()),
            }
        }
        names
    }

    fn invalid_number(&self, column: &str, row: usize, value: f64, keep: &mut [bool]) -> Result<()> {
        match self.handle_invalid {
            HandleInvalid::Error => Err(BourseError::InvalidData(format!(
                "non-finite value {value} in column '{column}' at row {row}"
            ))),
            HandleInvalid::Skip => {
                keep[row] = false;
                Ok(())
            }
            HandleInvalid::Keep => Ok(()),
        }
    }
}

impl Transformer for FittedEncoder {
    type Output = Encoded;

    /// Encodes every row. The target is read only if its column is present.
    fn transform(&self, data: &DataFrame) -> Result<Encoded> {
        let n = data.height();
        let mut keep = vec![true; n];
        let mut features = Array2::<f64>::zeros((n, self.width()));
        let mut offset = 0;

        for feature in &self.features {
            match feature {
                FittedFeature::OneHot(model) => {
                    let width = feature.width();
                    for (row, value) in string_values(data, model.column())?.iter().enumerate() {
                        match model.index_of(value.as_deref())? {
                            Some(i) if i < width => features[[row, offset + i]] = 1.0,
                            Some(_) => {}
                            None => keep[row] = false,
                        }
                    }
                    offset += width;
                }
                FittedFeature::Index(model) => {
                    for (row, value) in string_values(data, model.column())?.iter().enumerate() {
                        match model.index_of(value.as_deref())? {
                            Some(i) => features[[row, offset]] = i as f64,
                            None => keep[row] = false,
                        }
                    }
                    offset += 1;
                }
                FittedFeature::Numeric(column) => {
                    for (row, value) in float_values(data, column)?.into_iter().enumerate() {
                        if !value.is_finite() {
                            self.invalid_number(column, row, value, &mut keep)?;
                        }
                        features[[row, offset]] = value;
                    }
                    offset += 1;
                }
            }
        }

        let label = match &self.label {
            Some(label) if has_column(data, label.column()) => Some(match label {
                FittedLabel::Categorical(model) => string_values(data, model.column())?
                    .iter()
                    .map(|v| -> Result<f64> {
                        Ok(model.index_of(v.as_deref())?.map_or(f64::NAN, |i| i as f64))
                    })
                    .collect::<Result<Vec<f64>>>()?,
                FittedLabel::Numeric(column) => {
                    let values = float_values(data, column)?;
                    for (row, &value) in values.iter().enumerate() {
                        if !value.is_finite() {
                            self.invalid_number(column, row, value, &mut keep)?;
                        }
                    }
                    values
                }
            }),
            _ => None,
        };

        Ok(Encoded {
            features,
            keep,
            label,
        })
    }
}
