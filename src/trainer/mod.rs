//! Credit-risk training run: load, split, fit, persist, register, explain

mod config;
mod workflow;

pub use config::TrainConfig;
pub use workflow::{
    train_and_explain, TrainReport, MODEL_ARTIFACT, MODEL_FILE, X_TEST_ARTIFACT, X_TEST_FILE,
};
