//! Training run configuration

use crate::error::{LabError, Result};
use crate::explainability::ExplainerConfig;
use crate::preprocessing::PreprocessingConfig;
use crate::training::LogisticRegressionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings of the train-and-explain workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Where local artifact files are written
    pub output_dir: PathBuf,
    /// Row identifier dropped before training
    pub id_column: String,
    /// Raw target column
    pub target_column: String,
    /// Name of the integer-coded target
    pub encoded_target: String,
    /// Fraction of rows held out
    pub test_size: f64,
    /// Seed of the train/test split
    pub seed: u64,
    /// Registry name of the fitted pipeline
    pub model_name: String,
    pub explanation_comment: String,
    pub preprocessing: PreprocessingConfig,
    pub classifier: LogisticRegressionConfig,
    pub explainer: ExplainerConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
            id_column: "Sno".to_string(),
            target_column: "Risk".to_string(),
            encoded_target: "Risk_cat".to_string(),
            test_size: 0.2,
            seed: 0,
            model_name: "creditmodel_explainer_remote".to_string(),
            explanation_comment:
                "Global explanation on classification model trained on German credit dataset"
                    .to_string(),
            preprocessing: PreprocessingConfig::default(),
            classifier: LogisticRegressionConfig::default(),
            explainer: ExplainerConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; absent keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LabError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_explainer(mut self, explainer: ExplainerConfig) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(LabError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.id_column == self.target_column {
            return Err(LabError::ConfigError(
                "id column and target column must differ".to_string(),
            ));
        }
        if self.model_name.trim().is_empty() {
            return Err(LabError::ConfigError("model name is empty".to_string()));
        }
        self.explainer.validate()
    }
}
