//! Data loading utilities

use crate::dataset::{ColumnKind, Schema, Table, TableColumn};
use crate::error::{LabError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// CSV loader producing schema-validated [`Table`]s
pub struct DataLoader {
    /// Rows polars inspects when inferring dtypes
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Load a CSV file into a polars frame
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            LabError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| LabError::DataError(e.to_string()))
    }

    /// Load a CSV file and validate it against `schema`, or infer one when absent
    pub fn load_table(&self, path: impl AsRef<Path>, schema: Option<&Schema>) -> Result<Table> {
        let df = self.load_csv(path.as_ref())?;
        debug!(
            path = %path.as_ref().display(),
            rows = df.height(),
            cols = df.width(),
            "loaded csv"
        );
        match schema {
            Some(schema) => table_from_frame_with_schema(&df, schema),
            None => table_from_frame(&df),
        }
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().collect())
}

fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

fn reject_all_missing(name: &str, series: &Series) -> Result<()> {
    if series.len() > 0 && series.null_count() == series.len() {
        return Err(LabError::SchemaError(format!(
            "column '{}' has no values; its type is ambiguous",
            name
        )));
    }
    Ok(())
}

/// Convert a frame, inferring each column's kind from its parsed dtype
pub fn table_from_frame(df: &DataFrame) -> Result<Table> {
    let mut columns = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let name = col.name().to_string();
        let series = col.as_materialized_series();
        reject_all_missing(&name, series)?;

        let dtype = series.dtype();
        if is_numeric_dtype(dtype) {
            columns.push(TableColumn::numeric(name, numeric_values(series)?));
        } else if is_text_dtype(dtype) {
            columns.push(TableColumn::categorical(name, text_values(series)?));
        } else {
            return Err(LabError::SchemaError(format!(
                "column '{}' has unsupported type {}",
                name, dtype
            )));
        }
    }
    Table::new(columns)
}

/// Convert a frame, enforcing a declared schema
pub fn table_from_frame_with_schema(df: &DataFrame, schema: &Schema) -> Result<Table> {
    for col in df.get_columns() {
        if schema.kind_of(col.name().as_str()).is_none() {
            return Err(LabError::SchemaError(format!(
                "column '{}' is not declared in the schema",
                col.name()
            )));
        }
    }

    let mut columns = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        let col = df.column(&field.name).map_err(|_| {
            LabError::SchemaError(format!("declared column '{}' is missing", field.name))
        })?;
        let series = col.as_materialized_series();
        reject_all_missing(&field.name, series)?;
        let dtype = series.dtype();

        let column = match field.kind {
            ColumnKind::Numeric if is_numeric_dtype(dtype) => {
                TableColumn::numeric(field.name.clone(), numeric_values(series)?)
            }
            ColumnKind::Numeric if is_text_dtype(dtype) => {
                let parsed = text_values(series)?
                    .into_iter()
                    .enumerate()
                    .map(|(row, v)| match v {
                        None => Ok(None),
                        Some(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
                            LabError::SchemaError(format!(
                                "column '{}' is declared numeric but row {} holds '{}'",
                                field.name, row, s
                            ))
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                TableColumn::numeric(field.name.clone(), parsed)
            }
            ColumnKind::Categorical if is_numeric_dtype(dtype) || is_text_dtype(dtype) => {
                TableColumn::categorical(field.name.clone(), text_values(series)?)
            }
            _ => {
                return Err(LabError::SchemaError(format!(
                    "column '{}' has unsupported type {}",
                    field.name, dtype
                )))
            }
        };
        columns.push(column);
    }
    Table::new(columns)
}
