//! Model explainability module
//!
//! Sampling Shapley attributions computed over raw features, with the
//! engineered columns of each feature swapped together.

mod tabular;

pub use tabular::{
    classifier_explainer, explain_table, ExplainerConfig, GlobalExplanation, TabularExplainer,
};
