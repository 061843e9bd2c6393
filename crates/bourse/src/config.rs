//! Run configuration.
//!
//! Values are layered: built-in defaults, then `config/default.toml`, then
//! `config/local.toml`, then `BOURSE_*` environment variables with `__`
//! separating nested keys (e.g. `BOURSE_CLASSIFIER__TRAIN_RATIO=0.8`).
//! A `.env` file in the working directory is read first.

use std::path::{Path, PathBuf};

use bourse_stats::DateParsePolicy;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Row cap for every printed view.
    #[serde(default = "default_show_rows")]
    pub show_rows: usize,

    /// Root directory for persisted views and model artifacts.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Write aggregate views as Parquet.
    #[serde(default = "default_true")]
    pub write_parquet: bool,

    /// Write aggregate views as CSV.
    #[serde(default = "default_true")]
    pub write_csv: bool,

    /// How the loader interprets date strings.
    #[serde(default)]
    pub date_policy: DateParsePolicy,

    /// Direction classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Close-price regressor settings.
    #[serde(default)]
    pub regressor: RegressorConfig,
}

/// Direction classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Per-ticker rank cutoff for the train partition.
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,

    /// Rank cutoff for the validation re-split of the train partition.
    #[serde(default = "default_train_ratio")]
    pub validation_ratio: f64,

    /// Elastic-net mixing values to search.
    #[serde(default = "default_elastic_net")]
    pub elastic_net: Vec<f64>,

    /// Regularization strengths to search.
    #[serde(default = "default_classifier_reg_param")]
    pub reg_param: Vec<f64>,

    /// Optimizer iteration cap.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

/// Close-price regressor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorConfig {
    /// Per-ticker rank cutoff for the train partition.
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,

    /// Rank cutoff for the validation re-split of the train partition.
    #[serde(default = "default_regressor_validation_ratio")]
    pub validation_ratio: f64,

    /// Elastic-net mixing values to search. Any non-zero value fits by
    /// coordinate descent instead of the closed-form ridge solve.
    #[serde(default = "default_regressor_elastic_net")]
    pub elastic_net: Vec<f64>,

    /// Regularization strengths to search.
    #[serde(default = "default_regressor_reg_param")]
    pub reg_param: Vec<f64>,

    /// Coordinate-descent sweep cap.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

const fn default_show_rows() -> usize {
    20
}
fn default_output_root() -> PathBuf {
    PathBuf::from("src/resources")
}
const fn default_true() -> bool {
    true
}
const fn default_train_ratio() -> f64 {
    0.7
}
const fn default_regressor_validation_ratio() -> f64 {
    0.75
}
fn default_elastic_net() -> Vec<f64> {
    vec![0.0, 0.5, 1.0]
}
fn default_regressor_elastic_net() -> Vec<f64> {
    vec![0.0]
}
fn default_classifier_reg_param() -> Vec<f64> {
    vec![0.1, 2.0]
}
fn default_regressor_reg_param() -> Vec<f64> {
    vec![0.1, 0.3, 0.5, 0.7]
}
const fn default_max_iter() -> usize {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            show_rows: default_show_rows(),
            output_root: default_output_root(),
            write_parquet: true,
            write_csv: true,
            date_policy: DateParsePolicy::default(),
            classifier: ClassifierConfig::default(),
            regressor: RegressorConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            train_ratio: default_train_ratio(),
            validation_ratio: default_train_ratio(),
            elastic_net: default_elastic_net(),
            reg_param: default_classifier_reg_param(),
            max_iter: default_max_iter(),
        }
    }
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            train_ratio: default_train_ratio(),
            validation_ratio: default_regressor_validation_ratio(),
            elastic_net: default_regressor_elastic_net(),
            reg_param: default_regressor_reg_param(),
            max_iter: default_max_iter(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl RunConfig {
    /// Loads from `config/` in the working directory plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Loads from `default.toml` and `local.toml` under `dir` plus the
    /// environment. Missing files are skipped.
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let dir = dir.as_ref();

        Config::builder()
            .add_source(
                File::from(dir.join("default.toml"))
                    .required(false)
                    .format(FileFormat::Toml),
            )
            .add_source(
                File::from(dir.join("local.toml"))
                    .required(false)
                    .format(FileFormat::Toml),
            )
            .add_source(
                Environment::with_prefix("BOURSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("classifier.elastic_net")
                    .with_list_parse_key("classifier.reg_param")
                    .with_list_parse_key("regressor.elastic_net")
                    .with_list_parse_key("regressor.reg_param"),
            )
            .build()?
            .try_deserialize()
    }

    /// Directory of the persisted direction classifier.
    pub fn classifier_model_dir(&self) -> PathBuf {
        self.output_root.join("tmp").join("modelLocation")
    }

    /// Directory of the persisted close-price regressor.
    pub fn regressor_model_dir(&self) -> PathBuf {
        self.output_root.join("tmp").join("linearRegressionModelLocation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bourse_config_{name}"));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.show_rows, 20);
        assert_eq!(config.date_policy, DateParsePolicy::Legacy);
        assert_eq!(config.classifier.elastic_net, vec![0.0, 0.5, 1.0]);
        assert_eq!(config.classifier.reg_param, vec![0.1, 2.0]);
        assert_eq!(config.classifier.validation_ratio, 0.7);
        assert_eq!(config.regressor.validation_ratio, 0.75);
        assert_eq!(config.regressor.reg_param, vec![0.1, 0.3, 0.5, 0.7]);
        assert_eq!(config.regressor.elastic_net, vec![0.0]);
        assert_eq!(
            config.classifier_model_dir(),
            PathBuf::from("src/resources/tmp/modelLocation")
        );
        assert_eq!(
            config.regressor_model_dir(),
            PathBuf::from("src/resources/tmp/linearRegressionModelLocation")
        );
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = scratch("empty");
        let config = RunConfig::load_from(&dir).unwrap();
        assert_eq!(config.show_rows, RunConfig::default().show_rows);
        assert_eq!(config.regressor, RegressorConfig::default());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_local_overrides_default() {
        let dir = scratch("layers");
        fs::write(
            dir.join("default.toml"),
            "show_rows = 5\ndate_policy = \"strict\"\n\n[classifier]\nreg_param = [1.0]\n",
        )
        .unwrap();
        fs::write(dir.join("local.toml"), "show_rows = 7\nwrite_csv = false\n").unwrap();

        let config = RunConfig::load_from(&dir).unwrap();
        assert_eq!(config.show_rows, 7);
        assert!(!config.write_csv);
        assert!(config.write_parquet);
        assert_eq!(config.date_policy, DateParsePolicy::Strict);
        assert_eq!(config.classifier.reg_param, vec![1.0]);
        // Unset keys in a partial table keep their defaults.
        assert_eq!(config.classifier.elastic_net, vec![0.0, 0.5, 1.0]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let dir = scratch("invalid");
        fs::write(dir.join("default.toml"), "date_policy = \"sometimes\"\n").unwrap();
        assert!(RunConfig::load_from(&dir).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
