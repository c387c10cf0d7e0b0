//! Per-column transformation list mapping a [`Table`] to a dense feature matrix

use super::{ImputeStrategy, Imputer, OneHotEncoder, PreprocessingConfig, StandardScaler};
use crate::dataset::{ColumnValues, FeaturePartition, Table};
use crate::error::{LabError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Transform applied to a single source column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnTransform {
    /// Imputation followed by optional standardization; one output column
    Numeric {
        column: String,
        imputer: Imputer,
        scaler: Option<StandardScaler>,
    },
    /// One-hot encoding; one output column per learned category
    Categorical {
        column: String,
        encoder: OneHotEncoder,
    },
}

impl ColumnTransform {
    pub fn numeric(column: impl Into<String>, strategy: ImputeStrategy, standardize: bool) -> Self {
        ColumnTransform::Numeric {
            column: column.into(),
            imputer: Imputer::new(strategy),
            scaler: standardize.then(StandardScaler::new),
        }
    }

    pub fn categorical(column: impl Into<String>, encoder: OneHotEncoder) -> Self {
        ColumnTransform::Categorical {
            column: column.into(),
            encoder,
        }
    }

    /// Source column name
    pub fn column(&self) -> &str {
        match self {
            ColumnTransform::Numeric { column, .. } => column,
            ColumnTransform::Categorical { column, .. } => column,
        }
    }

    /// Number of output columns (zero for an unfitted encoder)
    pub fn width(&self) -> usize {
        match self {
            ColumnTransform::Numeric { .. } => 1,
            ColumnTransform::Categorical { encoder, .. } => encoder.width(),
        }
    }

    /// Names of the output columns
    pub fn output_names(&self) -> Vec<String> {
        match self {
            ColumnTransform::Numeric { column, .. } => vec![column.clone()],
            ColumnTransform::Categorical { column, encoder } => encoder
                .categories()
                .unwrap_or_default()
                .iter()
                .map(|c| format!("{}_{}", column, c))
                .collect(),
        }
    }

    fn fit(&mut self, values: &ColumnValues) -> Result<()> {
        match (self, values) {
            (ColumnTransform::Numeric { imputer, scaler, .. }, ColumnValues::Numeric(v)) => {
                imputer.fit(v)?;
                if let Some(scaler) = scaler {
                    let filled = imputer.transform(v)?;
                    scaler.fit(&filled)?;
                }
                Ok(())
            }
            (ColumnTransform::Categorical { encoder, .. }, ColumnValues::Categorical(v)) => {
                encoder.fit(v)?;
                Ok(())
            }
            (transform, values) => Err(kind_mismatch(transform.column(), values)),
        }
    }

    /// Transformed values in row-major order, `width()` values per row
    fn transform(&self, values: &ColumnValues) -> Result<Vec<Vec<f64>>> {
        match (self, values) {
            (ColumnTransform::Numeric { imputer, scaler, .. }, ColumnValues::Numeric(v)) => {
                let filled = imputer.transform(v)?;
                let out = match scaler {
                    Some(scaler) => scaler.transform(&filled)?,
                    None => filled,
                };
                Ok(out.into_iter().map(|x| vec![x]).collect())
            }
            (ColumnTransform::Categorical { encoder, .. }, ColumnValues::Categorical(v)) => {
                encoder.transform(v)
            }
            (transform, values) => Err(kind_mismatch(transform.column(), values)),
        }
    }
}

fn kind_mismatch(column: &str, values: &ColumnValues) -> LabError {
    LabError::PreprocessingError(format!(
        "column '{}' holds {:?} values that do not match its transform",
        column,
        values.kind()
    ))
}

/// Output column range produced by one source column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub source: String,
    pub range: Range<usize>,
}

/// Ordered list of per-column transforms whose outputs are concatenated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapper {
    transforms: Vec<ColumnTransform>,
    is_fitted: bool,
}

impl ColumnMapper {
    pub fn new(transforms: Vec<ColumnTransform>) -> Self {
        Self {
            transforms,
            is_fitted: false,
        }
    }

    /// One transform per numeric column, then one per categorical column
    pub fn from_partition(partition: &FeaturePartition, config: &PreprocessingConfig) -> Self {
        let numeric = partition.numeric.iter().map(|name| {
            ColumnTransform::numeric(name.clone(), config.numeric_impute_strategy, config.standardize)
        });
        let categorical = partition.categorical.iter().map(|name| {
            ColumnTransform::categorical(name.clone(), OneHotEncoder::new(config.handle_unknown))
        });
        Self::new(numeric.chain(categorical).collect())
    }

    pub fn transforms(&self) -> &[ColumnTransform] {
        &self.transforms
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Source columns in transform order
    pub fn source_columns(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.column()).collect()
    }

    /// Width of the produced feature matrix
    pub fn n_output_features(&self) -> usize {
        self.transforms.iter().map(|t| t.width()).sum()
    }

    /// Names of the produced feature columns
    pub fn output_names(&self) -> Vec<String> {
        self.transforms.iter().flat_map(|t| t.output_names()).collect()
    }

    /// Output column ranges per source column
    pub fn feature_groups(&self) -> Vec<FeatureGroup> {
        let mut start = 0;
        self.transforms
            .iter()
            .map(|t| {
                let end = start + t.width();
                let group = FeatureGroup {
                    source: t.column().to_string(),
                    range: start..end,
                };
                start = end;
                group
            })
            .collect()
    }

    pub fn fit(&mut self, table: &Table) -> Result<&mut Self> {
        if self.transforms.is_empty() {
            return Err(LabError::PreprocessingError("no column transforms configured".to_string()));
        }
        for transform in &mut self.transforms {
            let column = table.column(transform.column())?;
            transform.fit(&column.values)?;
        }
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(LabError::ModelNotFitted);
        }

        let n_rows = table.n_rows();
        let mut out = Array2::zeros((n_rows, self.n_output_features()));
        for (transform, group) in self.transforms.iter().zip(self.feature_groups()) {
            let column = table.column(transform.column())?;
            let rows = transform.transform(&column.values)?;
            for (i, row) in rows.into_iter().enumerate() {
                for (offset, value) in row.into_iter().enumerate() {
                    out[[i, group.range.start + offset]] = value;
                }
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, table: &Table) -> Result<Array2<f64>> {
        self.fit(table)?;
        self.transform(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{partition_features, TableColumn};

    fn create_test_table() -> Table {
        Table::new(vec![
            TableColumn::numeric("income", vec![Some(10.0), None, Some(30.0), Some(20.0)]),
            TableColumn::categorical(
                "city",
                vec![Some("NYC".into()), Some("LA".into()), Some("NYC".into()), Some("SF".into())],
            ),
            TableColumn::numeric("age", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_layout_numeric_then_categorical() {
        let table = create_test_table();
        let partition = partition_features(&table).unwrap();
        let mut mapper = ColumnMapper::from_partition(&partition, &PreprocessingConfig::default());
        let x = mapper.fit_transform(&table).unwrap();

        assert_eq!(x.dim(), (4, 5));
        assert_eq!(
            mapper.output_names(),
            vec!["age", "income", "city_LA", "city_NYC", "city_SF"]
        );
        let groups = mapper.feature_groups();
        assert_eq!(groups[2].source, "city");
        assert_eq!(groups[2].range, 2..5);
    }

    #[test]
    fn test_missing_numeric_gets_median_then_scaled() {
        let table = create_test_table();
        let partition = partition_features(&table).unwrap();
        let mut mapper = ColumnMapper::from_partition(
            &partition,
            &PreprocessingConfig::default().with_standardize(false),
        );
        let x = mapper.fit_transform(&table).unwrap();
        // income column sits at index 1; median of 10, 30, 20 is 20
        assert_eq!(x[[1, 1]], 20.0);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let table = create_test_table();
        let partition = partition_features(&table).unwrap();
        let mapper = ColumnMapper::from_partition(&partition, &PreprocessingConfig::default());
        assert!(matches!(mapper.transform(&table), Err(LabError::ModelNotFitted)));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let table = create_test_table();
        let mut mapper = ColumnMapper::new(vec![ColumnTransform::categorical(
            "age",
            OneHotEncoder::default(),
        )]);
        assert!(mapper.fit(&table).is_err());
    }
}
