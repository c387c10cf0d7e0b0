//! Typed in-memory table

use super::schema::ColumnKind;
use crate::error::{LabError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Values of one column. Missing cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValues::Numeric(_) => ColumnKind::Numeric,
            ColumnValues::Categorical(_) => ColumnKind::Categorical,
        }
    }

    fn take(&self, indices: &[usize]) -> Self {
        match self {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnValues::Categorical(v) => {
                ColumnValues::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub values: ColumnValues,
}

impl TableColumn {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Categorical(values),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.values.kind()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of recoding a column into category codes
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCodes {
    /// Sorted distinct values; a value's position is its code
    pub categories: Vec<String>,
    pub codes: Vec<usize>,
}

/// Column-oriented table with equal-length, uniquely named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<TableColumn>,
    n_rows: usize,
}

impl Table {
    /// Build a table, checking lengths and name uniqueness
    pub fn new(columns: Vec<TableColumn>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for col in &columns {
            if col.len() != n_rows {
                return Err(LabError::ShapeError {
                    expected: format!("{} rows in column '{}'", n_rows, col.name),
                    actual: format!("{} rows", col.len()),
                });
            }
            if !seen.insert(col.name.as_str()) {
                return Err(LabError::DataError(format!("duplicate column '{}'", col.name)));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Result<&TableColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| LabError::FeatureNotFound(name.to_string()))
    }

    /// Append a column at the end
    pub fn push_column(&mut self, column: TableColumn) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(LabError::ShapeError {
                expected: format!("{} rows", self.n_rows),
                actual: format!("{} rows in column '{}'", column.len(), column.name),
            });
        }
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(LabError::DataError(format!("duplicate column '{}'", column.name)));
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove and return the named column
    pub fn drop_column(&mut self, name: &str) -> Result<TableColumn> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| LabError::FeatureNotFound(name.to_string()))?;
        Ok(self.columns.remove(idx))
    }

    /// New table holding only the given rows, in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows) {
            return Err(LabError::DataError(format!(
                "row index {} out of bounds for {} rows",
                bad, self.n_rows
            )));
        }
        Ok(Self {
            columns: self
                .columns
                .iter()
                .map(|c| TableColumn {
                    name: c.name.clone(),
                    values: c.values.take(indices),
                })
                .collect(),
            n_rows: indices.len(),
        })
    }

    /// Replace `name` by an integer-coded column `new_name` appended at the end.
    ///
    /// Codes follow the sorted order of the distinct values (numeric columns sort
    /// numerically). Missing values are rejected.
    pub fn recode_as_category(&mut self, name: &str, new_name: &str) -> Result<CategoryCodes> {
        let column = self.column(name)?;
        let recoded = category_codes(column)?;
        self.drop_column(name)?;
        self.push_column(TableColumn::numeric(
            new_name,
            recoded.codes.iter().map(|&c| Some(c as f64)).collect(),
        ))?;
        Ok(recoded)
    }

    /// Remove a numeric column and return it as a dense label vector
    pub fn take_target(&mut self, name: &str) -> Result<Array1<f64>> {
        let column = self.drop_column(name)?;
        match column.values {
            ColumnValues::Numeric(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    v.ok_or_else(|| {
                        LabError::DataError(format!("target '{}' missing at row {}", name, i))
                    })
                })
                .collect::<Result<Vec<f64>>>()
                .map(Array1::from),
            ColumnValues::Categorical(_) => Err(LabError::DataError(format!(
                "target '{}' must be numeric codes",
                name
            ))),
        }
    }
}

fn category_codes(column: &TableColumn) -> Result<CategoryCodes> {
    let missing = || LabError::DataError(format!("column '{}' has missing values", column.name));
    match &column.values {
        ColumnValues::Categorical(values) => {
            let distinct: BTreeSet<&str> = values
                .iter()
                .map(|v| v.as_deref().ok_or_else(missing))
                .collect::<Result<_>>()?;
            let categories: Vec<String> = distinct.into_iter().map(str::to_string).collect();
            let codes = values
                .iter()
                .flatten()
                .map(|v| categories.binary_search(v).unwrap_or_default())
                .collect();
            Ok(CategoryCodes { categories, codes })
        }
        ColumnValues::Numeric(values) => {
            let present: Vec<f64> = values
                .iter()
                .map(|v| v.ok_or_else(missing))
                .collect::<Result<_>>()?;
            let mut distinct = present.clone();
            distinct.sort_by(|a, b| a.total_cmp(b));
            distinct.dedup();
            let codes = present
                .iter()
                .map(|v| distinct.iter().position(|d| d == v).unwrap_or_default())
                .collect();
            Ok(CategoryCodes {
                categories: distinct.iter().map(|d| d.to_string()).collect(),
                codes,
            })
        }
    }
}
