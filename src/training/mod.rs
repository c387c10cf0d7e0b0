//! Model training module
//!
//! Provides:
//! - Stratified train/test splitting
//! - L-BFGS minimization
//! - L2-regularized logistic regression
//! - [`CreditPipeline`], the column mapper chained with the classifier

mod lbfgs;
pub mod linear_models;
mod pipeline;
mod split;

pub use lbfgs::{Lbfgs, LbfgsResult};
pub use linear_models::{LogisticRegression, LogisticRegressionConfig};
pub use pipeline::CreditPipeline;
pub use split::{stratified_split, TrainTestSplit};
