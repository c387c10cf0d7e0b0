//! Standard (z-score) scaling

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};

/// Fitted centering/scaling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Standard scaler: (x - mean) / std, with population std.
///
/// A constant column keeps a scale of 1 so it maps to zeros instead of NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> Option<f64> {
        self.params.map(|p| p.center)
    }

    pub fn scale(&self) -> Option<f64> {
        self.params.map(|p| p.scale)
    }

    /// Fit on a dense column
    pub fn fit(&mut self, values: &[f64]) -> Result<&mut Self> {
        if values.is_empty() {
            return Err(LabError::PreprocessingError(
                "cannot fit a scaler on an empty column".to_string(),
            ));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();

        self.params = Some(ScalerParams {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        });
        Ok(self)
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.params.ok_or(LabError::ModelNotFitted)?;
        Ok(values.iter().map(|v| (v - params.center) / params.scale).collect())
    }
}
