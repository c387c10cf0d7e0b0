//! Run contexts: where a training run reads its data and reports its results

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use super::storage::{ExplanationEntry, ModelEntry, RunRecord, RunStatus, WorkspaceStore};
use super::workspace::WorkspaceConfig;
use crate::dataset::Table;
use crate::error::{LabError, Result};
use crate::explainability::GlobalExplanation;

/// Prefix carried by ids of interactive runs
pub const OFFLINE_RUN_PREFIX: &str = "OfflineRun";
/// Experiment that interactive runs are recorded under
pub const INTERACTIVE_EXPERIMENT: &str = "Train-Explain-Interactive";
/// Experiment that submitted runs are filed under by default
pub const REMOTE_EXPERIMENT: &str = "Train-Explain-Remote";
/// Workspace dataset read by interactive runs
pub const WORKSPACE_DATASET: &str = "german-credit";
/// Input binding read by scheduled runs
pub const RUN_INPUT_NAME: &str = "credit";

/// How a run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Started interactively; the process owns the run and completes it
    Local,
    /// Started by a scheduler that owns the run's lifecycle
    Remote,
}

impl RunMode {
    pub fn from_run_id(run_id: &str) -> Self {
        if run_id.starts_with(OFFLINE_RUN_PREFIX) {
            RunMode::Local
        } else {
            RunMode::Remote
        }
    }
}

/// Services a training run talks to
pub trait RunContext {
    fn id(&self) -> &str;

    fn mode(&self) -> RunMode;

    fn is_remote(&self) -> bool {
        self.mode() == RunMode::Remote
    }

    /// Name of the workspace the run belongs to
    fn workspace_name(&self) -> &str;

    /// The credit dataset this run trains on
    fn input_dataset(&self) -> Result<Table>;

    /// Attach a local file to the run under `name`
    fn upload_file(&mut self, name: &str, path: &Path) -> Result<()>;

    /// Register an uploaded artifact of this run as a model version
    fn register_model(&mut self, model_name: &str, artifact_name: &str) -> Result<ModelEntry>;

    fn upload_explanation(
        &mut self,
        explanation: &GlobalExplanation,
        comment: &str,
    ) -> Result<ExplanationEntry>;

    fn log_metric(&mut self, name: &str, value: f64) -> Result<()>;

    fn log_param(&mut self, name: &str, value: &str) -> Result<()>;

    /// Mark the run finished
    fn complete(&mut self) -> Result<()>;
}

/// Run recorded in a workspace store
#[derive(Debug)]
struct StoreRun {
    store: WorkspaceStore,
    run_id: String,
}

impl StoreRun {
    fn upload_file(&self, name: &str, path: &Path) -> Result<()> {
        self.store.upload_artifact(&self.run_id, name, path)?;
        info!(run_id = %self.run_id, artifact = name, "uploaded file");
        Ok(())
    }

    fn register_model(&self, model_name: &str, artifact_name: &str) -> Result<ModelEntry> {
        self.store.register_model(model_name, &self.run_id, artifact_name)
    }

    fn upload_explanation(
        &self,
        explanation: &GlobalExplanation,
        comment: &str,
    ) -> Result<ExplanationEntry> {
        let entry = self.store.upload_explanation(&self.run_id, explanation, comment)?;
        info!(run_id = %self.run_id, explanation_id = %entry.id, "explanation uploaded");
        Ok(entry)
    }

    fn log_metric(&self, name: &str, value: f64) -> Result<()> {
        self.store.update_run(&self.run_id, |record| {
            record.metrics.insert(name.to_string(), value);
            Ok(())
        })?;
        Ok(())
    }

    fn log_param(&self, name: &str, value: &str) -> Result<()> {
        self.store.update_run(&self.run_id, |record| {
            record.params.insert(name.to_string(), value.to_string());
            Ok(())
        })?;
        Ok(())
    }
}

/// Interactive run created by this process
#[derive(Debug)]
pub struct LocalRun {
    inner: StoreRun,
    completed: bool,
}

impl LocalRun {
    /// Start a new run in the interactive experiment
    pub fn start(store: WorkspaceStore, run_id: impl Into<String>) -> Result<Self> {
        let run_id = run_id.into();
        store.start_run(INTERACTIVE_EXPERIMENT, &run_id)?;
        info!(run_id = %run_id, experiment = INTERACTIVE_EXPERIMENT, "started interactive run");
        Ok(Self {
            inner: StoreRun { store, run_id },
            completed: false,
        })
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.inner.store
    }

    pub fn record(&self) -> Result<RunRecord> {
        self.inner.store.run(&self.inner.run_id)
    }
}

impl RunContext for LocalRun {
    fn id(&self) -> &str {
        &self.inner.run_id
    }

    fn mode(&self) -> RunMode {
        RunMode::Local
    }

    fn workspace_name(&self) -> &str {
        self.inner.store.name()
    }

    fn input_dataset(&self) -> Result<Table> {
        self.inner.store.load_dataset(WORKSPACE_DATASET)
    }

    fn upload_file(&mut self, name: &str, path: &Path) -> Result<()> {
        self.inner.upload_file(name, path)
    }

    fn register_model(&mut self, model_name: &str, artifact_name: &str) -> Result<ModelEntry> {
        self.inner.register_model(model_name, artifact_name)
    }

    fn upload_explanation(
        &mut self,
        explanation: &GlobalExplanation,
        comment: &str,
    ) -> Result<ExplanationEntry> {
        self.inner.upload_explanation(explanation, comment)
    }

    fn log_metric(&mut self, name: &str, value: f64) -> Result<()> {
        self.inner.log_metric(name, value)
    }

    fn log_param(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.log_param(name, value)
    }

    fn complete(&mut self) -> Result<()> {
        if self.completed {
            return Err(LabError::TrackingError(format!(
                "run '{}' is already complete",
                self.inner.run_id
            )));
        }
        self.inner.store.set_status(&self.inner.run_id, RunStatus::Completed)?;
        self.completed = true;
        info!(run_id = %self.inner.run_id, "run completed");
        Ok(())
    }
}

/// Run submitted by a scheduler; its lifecycle belongs to the scheduler
#[derive(Debug)]
pub struct RemoteRun {
    inner: StoreRun,
}

impl RemoteRun {
    /// Attach to an existing run
    pub fn attach(store: WorkspaceStore, run_id: impl Into<String>) -> Result<Self> {
        let run_id = run_id.into();
        let record = store.run(&run_id)?;
        if record.status == RunStatus::NotStarted {
            store.set_status(&run_id, RunStatus::Running)?;
        }
        info!(run_id = %run_id, experiment = %record.experiment, "attached to scheduled run");
        Ok(Self {
            inner: StoreRun { store, run_id },
        })
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.inner.store
    }

    pub fn record(&self) -> Result<RunRecord> {
        self.inner.store.run(&self.inner.run_id)
    }
}

impl RunContext for RemoteRun {
    fn id(&self) -> &str {
        &self.inner.run_id
    }

    fn mode(&self) -> RunMode {
        RunMode::Remote
    }

    fn workspace_name(&self) -> &str {
        self.inner.store.name()
    }

    fn input_dataset(&self) -> Result<Table> {
        let record = self.record()?;
        let dataset = record.inputs.get(RUN_INPUT_NAME).ok_or_else(|| {
            LabError::TrackingError(format!(
                "run '{}' has no input named '{}'",
                self.inner.run_id, RUN_INPUT_NAME
            ))
        })?;
        self.inner.store.load_dataset(dataset)
    }

    fn upload_file(&mut self, name: &str, path: &Path) -> Result<()> {
        self.inner.upload_file(name, path)
    }

    fn register_model(&mut self, model_name: &str, artifact_name: &str) -> Result<ModelEntry> {
        self.inner.register_model(model_name, artifact_name)
    }

    fn upload_explanation(
        &mut self,
        explanation: &GlobalExplanation,
        comment: &str,
    ) -> Result<ExplanationEntry> {
        self.inner.upload_explanation(explanation, comment)
    }

    fn log_metric(&mut self, name: &str, value: f64) -> Result<()> {
        self.inner.log_metric(name, value)
    }

    fn log_param(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.log_param(name, value)
    }

    fn complete(&mut self) -> Result<()> {
        warn!(run_id = %self.inner.run_id, "scheduled runs are completed by their scheduler");
        Err(LabError::TrackingError(format!(
            "run '{}' is owned by its scheduler and cannot be completed here",
            self.inner.run_id
        )))
    }
}

/// Open the workspace store described by a config file
pub fn open_workspace(config_path: impl AsRef<Path>) -> Result<WorkspaceStore> {
    let config_path = config_path.as_ref();
    let config = WorkspaceConfig::from_file(config_path)?;
    WorkspaceStore::open(config.store_root(config_path), config.workspace_name)
}

/// Resolve the run context for an ambient run id.
///
/// No id, or one carrying the `OfflineRun` prefix, starts a new interactive
/// run; any other id attaches to a run that must already exist.
pub fn resolve_run(run_id: Option<&str>, config_path: &Path) -> Result<Box<dyn RunContext>> {
    let store = open_workspace(config_path)?;
    let run_id = match run_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("{}_{}", OFFLINE_RUN_PREFIX, Uuid::new_v4()),
    };

    match RunMode::from_run_id(&run_id) {
        RunMode::Local => Ok(Box::new(LocalRun::start(store, run_id)?)),
        RunMode::Remote => Ok(Box::new(RemoteRun::attach(store, run_id)?)),
    }
}

/// Default location of the workspace config: `config.json` found from the
/// current directory upwards
pub fn default_config_path() -> Result<PathBuf> {
    WorkspaceConfig::discover(std::env::current_dir()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup_workspace() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        WorkspaceConfig::new("sub", "rg", "ws").write(&config_path).unwrap();

        let csv = dir.path().join("credit.csv");
        fs::write(&csv, "Age,Housing\n22,own\n35,rent\n").unwrap();
        open_workspace(&config_path)
            .unwrap()
            .register_dataset(WORKSPACE_DATASET, &csv, None, "")
            .unwrap();
        (dir, config_path)
    }

    #[test]
    fn test_run_mode_from_id() {
        assert_eq!(RunMode::from_run_id("OfflineRun_1234"), RunMode::Local);
        assert_eq!(RunMode::from_run_id("Train-Explain-Remote_1_abc"), RunMode::Remote);
        assert_eq!(RunMode::from_run_id("offlinerun_1"), RunMode::Remote);
    }

    #[test]
    fn test_missing_id_resolves_local() {
        let (_dir, config_path) = setup_workspace();
        let run = resolve_run(None, &config_path).unwrap();
        assert_eq!(run.mode(), RunMode::Local);
        assert!(run.id().starts_with("OfflineRun_"));
        assert_eq!(run.workspace_name(), "ws");
        assert_eq!(run.input_dataset().unwrap().n_rows(), 2);
    }

    #[test]
    fn test_local_run_completes_once() {
        let (_dir, config_path) = setup_workspace();
        let store = open_workspace(&config_path).unwrap();
        let mut run = LocalRun::start(store, "OfflineRun_1234").unwrap();

        run.complete().unwrap();
        assert_eq!(run.record().unwrap().status, RunStatus::Completed);
        assert!(run.complete().is_err());
    }

    #[test]
    fn test_remote_run_requires_existing_run() {
        let (_dir, config_path) = setup_workspace();
        assert!(resolve_run(Some("Train-Explain-Remote_0_deadbeef"), &config_path).is_err());
    }

    #[test]
    fn test_remote_run_reads_bound_input() {
        let (_dir, config_path) = setup_workspace();
        let store = open_workspace(&config_path).unwrap();
        let inputs = BTreeMap::from([(RUN_INPUT_NAME.to_string(), WORKSPACE_DATASET.to_string())]);
        let submitted = store.submit_run("Train-Explain-Remote", inputs).unwrap();

        let mut run = resolve_run(Some(&submitted.run_id), &config_path).unwrap();
        assert!(run.is_remote());
        assert_eq!(run.input_dataset().unwrap().n_rows(), 2);
        run.log_metric("accuracy", 0.75).unwrap();
        assert!(run.complete().is_err());

        let record = store.run(&submitted.run_id).unwrap();
        assert_eq!(record.status, RunStatus::Running);
        assert_eq!(record.metrics.get("accuracy"), Some(&0.75));
    }
}
