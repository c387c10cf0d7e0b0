//! One-hot encoding for categorical columns

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to do with a category that was not seen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Encode as an all-zero vector
    Ignore,
    /// Fail the transform
    Error,
}

/// Dense one-hot encoder over the sorted categories seen at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    handle_unknown: HandleUnknown,
    categories: Option<Vec<String>>,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(HandleUnknown::Ignore)
    }
}

impl OneHotEncoder {
    pub fn new(handle_unknown: HandleUnknown) -> Self {
        Self {
            handle_unknown,
            categories: None,
        }
    }

    /// Learned categories, sorted
    pub fn categories(&self) -> Option<&[String]> {
        self.categories.as_deref()
    }

    /// Number of output columns
    pub fn width(&self) -> usize {
        self.categories.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn fit(&mut self, values: &[Option<String>]) -> Result<&mut Self> {
        let distinct: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
        if distinct.is_empty() {
            return Err(LabError::PreprocessingError(
                "cannot encode a column without observed categories".to_string(),
            ));
        }
        self.categories = Some(distinct.into_iter().map(str::to_string).collect());
        Ok(self)
    }

    /// Position of the hot column for one value; `None` means all zeros
    pub fn index_of(&self, value: Option<&str>) -> Result<Option<usize>> {
        let categories = self.categories.as_ref().ok_or(LabError::ModelNotFitted)?;
        let Some(value) = value else {
            return Ok(None);
        };
        match categories.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(idx) => Ok(Some(idx)),
            Err(_) => match self.handle_unknown {
                HandleUnknown::Ignore => Ok(None),
                HandleUnknown::Error => Err(LabError::PreprocessingError(format!(
                    "unknown category '{}'",
                    value
                ))),
            },
        }
    }

    /// Encode a column into row-major one-hot rows
    pub fn transform(&self, values: &[Option<String>]) -> Result<Vec<Vec<f64>>> {
        let width = self.width();
        values
            .iter()
            .map(|v| {
                let mut row = vec![0.0; width];
                if let Some(idx) = self.index_of(v.as_deref())? {
                    row[idx] = 1.0;
                }
                Ok(row)
            })
            .collect()
    }
}
