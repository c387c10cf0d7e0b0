//! Missing value imputation for numeric columns

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the mean of the observed values
    Mean,
    /// Replace with the median of the observed values
    Median,
}

/// Single-column imputer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_value: Option<f64>,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_value: None,
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Learned fill value, once fitted
    pub fn fill_value(&self) -> Option<f64> {
        self.fill_value
    }

    /// Fit on the observed values of a column
    pub fn fit(&mut self, values: &[Option<f64>]) -> Result<&mut Self> {
        let mut observed: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        if observed.is_empty() {
            return Err(LabError::PreprocessingError(
                "cannot impute a column without observed values".to_string(),
            ));
        }

        let fill = match self.strategy {
            ImputeStrategy::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
            ImputeStrategy::Median => median(&mut observed),
        };
        self.fill_value = Some(fill);
        Ok(self)
    }

    /// Replace missing (and NaN) values by the fill value
    pub fn transform(&self, values: &[Option<f64>]) -> Result<Vec<f64>> {
        let fill = self.fill_value.ok_or(LabError::ModelNotFitted)?;
        Ok(values
            .iter()
            .map(|v| match v {
                Some(x) if !x.is_nan() => *x,
                _ => fill,
            })
            .collect())
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
