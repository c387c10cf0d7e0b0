//! Data preprocessing module
//!
//! Per-column feature transforms applied before the classifier:
//! - Missing value imputation (median by default)
//! - Standard scaling of numeric columns
//! - One-hot encoding of categorical columns, unknown categories → all zeros
//! - [`ColumnMapper`] concatenating the per-column outputs into one matrix

mod config;
mod encoder;
mod imputer;
mod mapper;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{HandleUnknown, OneHotEncoder};
pub use imputer::{ImputeStrategy, Imputer};
pub use mapper::{ColumnMapper, ColumnTransform, FeatureGroup};
pub use scaler::StandardScaler;
