//! mlops-lab - workspace provisioning and explainable credit-risk training
//!
//! # Modules
//!
//! ## Data
//! - [`dataset`] - Schema, typed tables, numeric/categorical partition
//! - [`preprocessing`] - Imputation, scaling, one-hot encoding, column mapper
//!
//! ## Modelling
//! - [`training`] - Stratified split, logistic regression, the credit pipeline
//! - [`explainability`] - Sampling Shapley explanations over raw features
//! - [`export`] - Checksummed binary artifacts
//!
//! ## Workspace
//! - [`tracking`] - File-backed workspace store and run contexts
//! - [`trainer`] - The training and explanation script
//! - [`provision`] - Cloud resource provisioning
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod dataset;
pub mod preprocessing;
pub mod utils;

// Modelling
pub mod training;
pub mod explainability;
pub mod export;

// Workspace
pub mod tracking;
pub mod trainer;
pub mod provision;

// Services
pub mod cli;

pub use error::{LabError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{LabError, Result};

    // Data
    pub use crate::dataset::{partition_features, ColumnKind, FeaturePartition, Schema, Table};
    pub use crate::utils::DataLoader;

    // Preprocessing
    pub use crate::preprocessing::{ColumnMapper, PreprocessingConfig};

    // Training
    pub use crate::training::{
        stratified_split, CreditPipeline, LogisticRegression, LogisticRegressionConfig,
    };

    // Explainability
    pub use crate::explainability::{ExplainerConfig, GlobalExplanation, TabularExplainer};

    // Export
    pub use crate::export::Artifact;

    // Tracking
    pub use crate::tracking::{resolve_run, RunContext, RunMode, WorkspaceConfig, WorkspaceStore};

    // Trainer
    pub use crate::trainer::{train_and_explain, TrainConfig, TrainReport};

    // Provisioning
    pub use crate::provision::{provision, ArmClient, ProvisionConfig};
}
