//! Model fitting for stock-price records.
//!
//! This crate provides the pieces the classifier and regressor workflows are
//! assembled from:
//! - Categorical indexing and one-hot expansion driven by declared column roles
//! - A per-entity chronological rank split
//! - Multinomial logistic regression and linear regression with elastic-net
//!   penalties
//! - A tagged-variant stage pipeline with JSON persistence
//! - Parameter grids and a train/validation split search
//!
//! # Example
//!
//! ```rust,ignore
//! use bourse_ml::{
//!     FeatureEncoder, FeatureSpec, LogisticRegression, Metric, Param, ParamGridBuilder,
//!     Pipeline, RankSplit, Stage, TrainValidationSplit,
//! };
//!
//! let pipeline = Pipeline::new(vec![
//!     Stage::Encoder(
//!         FeatureEncoder::classification("direction")
//!             .with_feature(FeatureSpec::one_hot("ticker"))
//!             .with_feature(FeatureSpec::numeric("open")),
//!     ),
//!     Stage::Classifier(LogisticRegression::default()),
//! ]);
//! let grid = ParamGridBuilder::new()
//!     .add_grid(Param::RegParam, &[0.1, 2.0])
//!     .build()?;
//! let search = TrainValidationSplit::new(pipeline, grid, Metric::Accuracy)
//!     .with_split(RankSplit::new(0.7));
//! let model = search.fit(&train)?;
//! ```

pub mod artifact;
pub mod encode;
pub mod linear;
pub mod logistic;
pub mod metrics;
pub mod pipeline;
pub mod split;
pub mod tuning;

mod linalg;

// Re-export main types
pub use artifact::{FORMAT_VERSION, ModelMetadata, load_model, save_model};
pub use encode::{
    Encoded, Encoding, FeatureEncoder, FeatureSpec, FittedEncoder, FittedFeature, FittedLabel,
    HandleInvalid, LabelSpec, StringIndexer, StringIndexerModel,
};
pub use linear::{LinearModel, LinearRegression};
pub use logistic::{LogisticModel, LogisticRegression};
pub use metrics::{Metric, RegressionMetrics, accuracy};
pub use pipeline::{FittedStage, PREDICTION, PROBABILITY, Pipeline, PipelineModel, Predictions, Stage};
pub use split::RankSplit;
pub use tuning::{Param, ParamGridBuilder, ParamMap, TrainValidationSplit, TrainValidationSplitModel};
