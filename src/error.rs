//! Error types for the workshop tooling

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LabError>;

/// Main error type
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Explanation error: {0}")]
    ExplanationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Cloud request failed ({status}): {body}")]
    CloudError { status: u16, body: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl From<polars::error::PolarsError> for LabError {
    fn from(err: polars::error::PolarsError) -> Self {
        LabError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for LabError {
    fn from(err: serde_json::Error) -> Self {
        LabError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for LabError {
    fn from(err: bincode::Error) -> Self {
        LabError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LabError {
    fn from(err: ndarray::ShapeError) -> Self {
        LabError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
