//! Utility functions and types

pub mod data_loader;

pub use data_loader::{table_from_frame, table_from_frame_with_schema, DataLoader};
