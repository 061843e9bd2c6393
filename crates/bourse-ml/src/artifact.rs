//! On-disk model artifacts.
//!
//! An artifact is a directory holding `metadata.json` and `stages.json`.
//! Saving removes any existing directory at the target path first.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bourse_traits::{BourseError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metrics::Metric;
use crate::pipeline::PipelineModel;
use crate::tuning::ParamMap;

/// Artifact layout version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

const METADATA_FILE: &str = "metadata.json";
const STAGES_FILE: &str = "stages.json";

/// Descriptive metadata stored next to the fitted stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Free-form model kind, e.g. `direction_classifier`.
    pub kind: String,
    /// Artifact layout version.
    pub format_version: u32,
    /// Crate version that wrote the artifact.
    pub crate_version: String,
    /// Design-matrix column names.
    pub feature_names: Vec<String>,
    /// Class labels in index order, for classifiers.
    pub class_labels: Option<Vec<String>>,
    /// Selection metric, if the model came out of a search.
    pub metric: Option<Metric>,
    /// Winning parameters.
    pub best_params: ParamMap,
    /// Validation score per candidate; non-finite scores are stored as null.
    pub validation_metrics: Vec<Option<f64>>,
}

impl ModelMetadata {
    /// Metadata for `model` with no selection details.
    pub fn new(kind: impl Into<String>, model: &PipelineModel) -> Self {
        Self {
            kind: kind.into(),
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            feature_names: model.feature_names(),
            class_labels: model.class_labels().map(<[String]>::to_vec),
            metric: None,
            best_params: ParamMap::new(),
            validation_metrics: Vec::new(),
        }
    }

    /// Record the search that selected the model.
    #[must_use]
    pub fn with_selection(mut self, metric: Metric, best_params: &ParamMap, scores: &[f64]) -> Self {
        self.metric = Some(metric);
        self.best_params = best_params.clone();
        self.validation_metrics = scores.iter().map(|&s| s.is_finite().then_some(s)).collect();
        self
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| BourseError::Artifact(format!("{}: {}", path.display(), e)))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Writes `model` and `metadata` to `dir`, replacing whatever was there.
pub fn save_model(dir: &Path, model: &PipelineModel, metadata: &ModelMetadata) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    write_json(&dir.join(METADATA_FILE), metadata)?;
    write_json(&dir.join(STAGES_FILE), model)?;
    info!("Saved {} model to {}", metadata.kind, dir.display());
    Ok(())
}

/// Reads an artifact written by [`save_model`].
///
/// # Errors
///
/// Returns [`BourseError::Artifact`] if a file is missing or the layout
/// version is not [`FORMAT_VERSION`].
pub fn load_model(dir: &Path) -> Result<(PipelineModel, ModelMetadata)> {
    let metadata: ModelMetadata = read_json(&dir.join(METADATA_FILE))?;
    if metadata.format_version != FORMAT_VERSION {
        return Err(BourseError::Artifact(format!(
            "unsupported artifact version {} (expected {})",
            metadata.format_version, FORMAT_VERSION
        )));
    }
    let model: PipelineModel = read_json(&dir.join(STAGES_FILE))?;
    Ok((model, metadata))
}

impl PipelineModel {
    /// Writes this model to `dir` with metadata of the given kind.
    pub fn save(&self, dir: &Path, kind: &str) -> Result<()> {
        save_model(dir, self, &ModelMetadata::new(kind, self))
    }

    /// Reads a model written by [`PipelineModel::save`] or [`save_model`].
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(load_model(dir)?.0)
    }
}
