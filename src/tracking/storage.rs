//! File-backed workspace store
//!
//! Layout under the store root:
//!
//! ```text
//! datasets/<name>/dataset.json      registration record
//! datasets/<name>/data.csv          copy of the registered file
//! runs/<run_id>/run.json            run record
//! runs/<run_id>/artifacts/<name>    uploaded files
//! runs/<run_id>/explanations/<id>.json
//! models/index.json                 model registry
//! models/<name>/<version>/<file>
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dataset::{Schema, Table};
use crate::error::{LabError, Result};
use crate::utils::DataLoader;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created by a scheduler, not yet picked up
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// A registered tabular dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub description: String,
    /// File name of the stored copy, relative to the dataset directory
    pub file: String,
    /// Declared column kinds; inferred from the file when absent
    pub schema: Option<Schema>,
    pub registered_at: String,
}

/// Explanation uploaded to a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationEntry {
    pub id: String,
    pub comment: String,
    pub uploaded_at: String,
}

/// Persisted state of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub status: RunStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
    /// Input name to dataset name
    pub inputs: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Uploaded artifact names
    pub artifacts: Vec<String>,
    pub explanations: Vec<ExplanationEntry>,
}

impl RunRecord {
    fn new(run_id: impl Into<String>, experiment: impl Into<String>, status: RunStatus) -> Self {
        Self {
            run_id: run_id.into(),
            experiment: experiment.into(),
            status,
            created_at: Utc::now().to_rfc3339(),
            completed_at: None,
            inputs: BTreeMap::new(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            explanations: Vec::new(),
        }
    }
}

/// One registered model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// Starts at 1, one more than the latest version on each registration
    pub version: u32,
    pub run_id: String,
    /// Artifact name inside the source run
    pub run_artifact: String,
    /// Stored file, relative to the store root
    pub path: String,
    pub registered_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ModelIndex {
    models: BTreeMap<String, Vec<ModelEntry>>,
}

/// Datasets, runs and model registry of one workspace, kept on disk
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
    name: String,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

/// Reject names that would escape their directory
fn check_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\');
    if valid {
        Ok(())
    } else {
        Err(LabError::TrackingError(format!("invalid {} name '{}'", kind, name)))
    }
}

impl WorkspaceStore {
    /// Open (creating if needed) the store at `root`
    pub fn open(root: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            name: name.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Workspace name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn dataset_dir(&self, name: &str) -> PathBuf {
        self.root.join("datasets").join(name)
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(run_id)
    }

    fn model_index_path(&self) -> PathBuf {
        self.root.join("models").join("index.json")
    }

    // Datasets

    /// Register a CSV under `name`, replacing a previous registration
    pub fn register_dataset(
        &self,
        name: &str,
        csv_path: impl AsRef<Path>,
        schema: Option<Schema>,
        description: impl Into<String>,
    ) -> Result<DatasetEntry> {
        check_name("dataset", name)?;
        let csv_path = csv_path.as_ref();

        // Validate before storing anything
        DataLoader::new().load_table(csv_path, schema.as_ref())?;

        let dir = self.dataset_dir(name);
        fs::create_dir_all(&dir)?;
        let file = "data.csv".to_string();
        fs::copy(csv_path, dir.join(&file))?;

        let entry = DatasetEntry {
            name: name.to_string(),
            description: description.into(),
            file,
            schema,
            registered_at: Utc::now().to_rfc3339(),
        };
        write_json(&dir.join("dataset.json"), &entry)?;
        info!(dataset = name, source = %csv_path.display(), "dataset registered");
        Ok(entry)
    }

    pub fn dataset(&self, name: &str) -> Result<DatasetEntry> {
        check_name("dataset", name)?;
        let path = self.dataset_dir(name).join("dataset.json");
        if !path.is_file() {
            return Err(LabError::TrackingError(format!(
                "dataset '{}' is not registered in workspace '{}'",
                name, self.name
            )));
        }
        read_json(&path)
    }

    /// Load a registered dataset as a validated table
    pub fn load_dataset(&self, name: &str) -> Result<Table> {
        let entry = self.dataset(name)?;
        let path = self.dataset_dir(name).join(&entry.file);
        DataLoader::new().load_table(path, entry.schema.as_ref())
    }

    // Runs

    /// Create a run that starts immediately
    pub fn start_run(&self, experiment: &str, run_id: &str) -> Result<RunRecord> {
        self.create_run(experiment, run_id, RunStatus::Running, BTreeMap::new())
    }

    /// Create a run for a scheduler to pick up later
    pub fn submit_run(
        &self,
        experiment: &str,
        inputs: BTreeMap<String, String>,
    ) -> Result<RunRecord> {
        for dataset in inputs.values() {
            self.dataset(dataset)?;
        }
        let suffix = Uuid::new_v4().simple().to_string();
        let run_id = format!("{}_{}_{}", experiment, Utc::now().timestamp(), &suffix[..8]);
        self.create_run(experiment, &run_id, RunStatus::NotStarted, inputs)
    }

    fn create_run(
        &self,
        experiment: &str,
        run_id: &str,
        status: RunStatus,
        inputs: BTreeMap<String, String>,
    ) -> Result<RunRecord> {
        check_name("experiment", experiment)?;
        check_name("run", run_id)?;
        let path = self.run_dir(run_id).join("run.json");
        if path.exists() {
            return Err(LabError::TrackingError(format!("run '{}' already exists", run_id)));
        }

        let mut record = RunRecord::new(run_id, experiment, status);
        record.inputs = inputs;
        write_json(&path, &record)?;
        debug!(run_id, experiment, ?status, "run created");
        Ok(record)
    }

    pub fn run(&self, run_id: &str) -> Result<RunRecord> {
        check_name("run", run_id)?;
        let path = self.run_dir(run_id).join("run.json");
        if !path.is_file() {
            return Err(LabError::TrackingError(format!(
                "run '{}' does not exist in workspace '{}'",
                run_id, self.name
            )));
        }
        read_json(&path)
    }

    /// Read-modify-write of a run record
    pub fn update_run<F>(&self, run_id: &str, update: F) -> Result<RunRecord>
    where
        F: FnOnce(&mut RunRecord) -> Result<()>,
    {
        let mut record = self.run(run_id)?;
        update(&mut record)?;
        write_json(&self.run_dir(run_id).join("run.json"), &record)?;
        Ok(record)
    }

    /// Copy a local file into the run's artifacts
    pub fn upload_artifact(&self, run_id: &str, name: &str, source: &Path) -> Result<PathBuf> {
        check_name("artifact", name)?;
        let target = self.run_dir(run_id).join("artifacts").join(name);
        self.update_run(run_id, |record| {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source, &target)?;
            if !record.artifacts.iter().any(|a| a == name) {
                record.artifacts.push(name.to_string());
            }
            Ok(())
        })?;
        debug!(run_id, artifact = name, "artifact uploaded");
        Ok(target)
    }

    pub fn artifact_path(&self, run_id: &str, name: &str) -> Result<PathBuf> {
        let record = self.run(run_id)?;
        if !record.artifacts.iter().any(|a| a == name) {
            return Err(LabError::TrackingError(format!(
                "run '{}' has no artifact '{}'",
                run_id, name
            )));
        }
        Ok(self.run_dir(run_id).join("artifacts").join(name))
    }

    /// Store a JSON explanation document on the run
    pub fn upload_explanation<T: Serialize>(
        &self,
        run_id: &str,
        explanation: &T,
        comment: &str,
    ) -> Result<ExplanationEntry> {
        let entry = ExplanationEntry {
            id: Uuid::new_v4().to_string(),
            comment: comment.to_string(),
            uploaded_at: Utc::now().to_rfc3339(),
        };
        let path = self
            .run_dir(run_id)
            .join("explanations")
            .join(format!("{}.json", entry.id));
        self.update_run(run_id, |record| {
            write_json(&path, explanation)?;
            record.explanations.push(entry.clone());
            Ok(())
        })?;
        Ok(entry)
    }

    pub fn explanation_path(&self, run_id: &str, explanation_id: &str) -> PathBuf {
        self.run_dir(run_id)
            .join("explanations")
            .join(format!("{}.json", explanation_id))
    }

    pub fn set_status(&self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        self.update_run(run_id, |record| {
            record.status = status;
            if matches!(status, RunStatus::Completed | RunStatus::Failed) {
                record.completed_at = Some(Utc::now().to_rfc3339());
            }
            Ok(())
        })
    }

    // Models

    fn model_index(&self) -> Result<ModelIndex> {
        let path = self.model_index_path();
        if path.is_file() {
            read_json(&path)
        } else {
            Ok(ModelIndex::default())
        }
    }

    /// Register a run artifact as the next version of model `name`
    pub fn register_model(&self, name: &str, run_id: &str, run_artifact: &str) -> Result<ModelEntry> {
        check_name("model", name)?;
        let source = self.artifact_path(run_id, run_artifact)?;
        let file_name = Path::new(run_artifact)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| run_artifact.to_string());

        let mut index = self.model_index()?;
        let versions = index.models.entry(name.to_string()).or_default();
        let version = versions.iter().map(|m| m.version).max().unwrap_or(0) + 1;

        let relative = format!("models/{}/{}/{}", name, version, file_name);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &target)?;

        let entry = ModelEntry {
            name: name.to_string(),
            version,
            run_id: run_id.to_string(),
            run_artifact: run_artifact.to_string(),
            path: relative,
            registered_at: Utc::now().to_rfc3339(),
        };
        versions.push(entry.clone());
        write_json(&self.model_index_path(), &index)?;
        info!(model = name, version, run_id, "model registered");
        Ok(entry)
    }

    /// All versions of a model, oldest first
    pub fn model_versions(&self, name: &str) -> Result<Vec<ModelEntry>> {
        Ok(self.model_index()?.models.remove(name).unwrap_or_default())
    }

    pub fn latest_model(&self, name: &str) -> Result<ModelEntry> {
        self.model_versions(name)?
            .into_iter()
            .max_by_key(|m| m.version)
            .ok_or_else(|| LabError::TrackingError(format!("model '{}' is not registered", name)))
    }
}
