//! Experiment tracking module
//!
//! A file-backed workspace (datasets, runs, model registry) and the run
//! contexts that training code reports through.

mod run;
mod storage;
mod workspace;

pub use run::{
    default_config_path, open_workspace, resolve_run, LocalRun, RemoteRun, RunContext, RunMode,
    INTERACTIVE_EXPERIMENT, OFFLINE_RUN_PREFIX, REMOTE_EXPERIMENT, RUN_INPUT_NAME,
    WORKSPACE_DATASET,
};
pub use storage::{
    DatasetEntry, ExplanationEntry, ModelEntry, RunRecord, RunStatus, WorkspaceStore,
};
pub use workspace::{WorkspaceConfig, CONFIG_FILE_NAME};
