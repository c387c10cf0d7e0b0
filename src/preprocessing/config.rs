//! Preprocessing configuration

use super::{HandleUnknown, ImputeStrategy};
use serde::{Deserialize, Serialize};

/// Configuration for the per-column feature transforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Strategy for filling missing numeric values
    pub numeric_impute_strategy: ImputeStrategy,

    /// Whether numeric columns are standardized after imputation
    pub standardize: bool,

    /// Handling of categories unseen during fit
    pub handle_unknown: HandleUnknown,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_impute_strategy: ImputeStrategy::Median,
            standardize: true,
            handle_unknown: HandleUnknown::Ignore,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    /// Builder method to toggle standardization
    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Builder method to set unknown-category handling
    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }
}
