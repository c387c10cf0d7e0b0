//! Feature partitioning into numeric and categorical column sets

use super::schema::ColumnKind;
use super::table::Table;
use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};

/// Disjoint numeric/categorical column-name sets covering every feature column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePartition {
    /// Numeric feature names, sorted
    pub numeric: Vec<String>,
    /// Categorical feature names, in table order
    pub categorical: Vec<String>,
}

impl FeaturePartition {
    /// Number of feature columns covered
    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify each column of `features` by its declared kind.
///
/// Numeric names are sorted so they line up with the order the column mapper
/// emits them in; categorical names keep their table order.
pub fn partition_features(features: &Table) -> Result<FeaturePartition> {
    if features.n_cols() == 0 {
        return Err(LabError::DataError(
            "cannot partition a table without feature columns".to_string(),
        ));
    }

    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for column in features.columns() {
        match column.kind() {
            ColumnKind::Numeric => numeric.push(column.name.clone()),
            ColumnKind::Categorical => categorical.push(column.name.clone()),
        }
    }
    numeric.sort();

    Ok(FeaturePartition { numeric, categorical })
}
