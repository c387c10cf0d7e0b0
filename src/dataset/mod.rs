//! Tabular dataset model
//!
//! - [`Schema`] - declared column kinds, validated at load time
//! - [`Table`] - typed column storage used by the feature pipeline
//! - [`partition_features`] - numeric/categorical column split

mod partition;
mod schema;
mod table;

pub use partition::{partition_features, FeaturePartition};
pub use schema::{ColumnKind, Field, Schema};
pub use table::{CategoryCodes, ColumnValues, Table, TableColumn};
