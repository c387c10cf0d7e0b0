//! Declared column schema

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// How a column is treated by the feature pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A single declared column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: ColumnKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered mapping of column name to [`ColumnKind`].
///
/// A schema is either declared up front (and then enforced while loading) or
/// inferred from the parsed file; in both cases every column ends up with exactly
/// one kind, so there are no mixed-type columns downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to append a column
    pub fn with_field(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.fields.push(Field::new(name, kind));
        self
    }

    /// Build from fields, rejecting duplicate names
    pub fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// Load a declared schema from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let schema: Self = serde_json::from_str(&json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Kind of the named column, if declared
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(LabError::SchemaError("column name must not be empty".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(LabError::SchemaError(format!(
                    "column '{}' declared more than once",
                    field.name
                )));
            }
        }
        Ok(())
    }
}
