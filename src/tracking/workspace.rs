//! Workspace configuration file (`config.json`)

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default file name searched for by the local run state
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Directory holding the file-backed workspace store, relative to the config file
const DEFAULT_STORE_DIR: &str = ".mlops-lab";

/// Identity of an ML workspace and where its local store lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
    /// Root of the workspace store; defaults to `.mlops-lab/<workspace_name>`
    /// next to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl WorkspaceConfig {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        workspace_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            workspace_name: workspace_name.into(),
            store_path: None,
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Read a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LabError::ConfigError(format!(
                "cannot read workspace config {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        if config.workspace_name.trim().is_empty() {
            return Err(LabError::ConfigError(
                "workspace config has an empty workspace_name".to_string(),
            ));
        }
        Ok(config)
    }

    /// Find `config.json` in `start` or one of its parents
    pub fn discover(start: impl AsRef<Path>) -> Result<PathBuf> {
        let mut dir = Some(start.as_ref());
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            dir = current.parent();
        }
        Err(LabError::ConfigError(format!(
            "no {} found in {} or its parents",
            CONFIG_FILE_NAME,
            start.as_ref().display()
        )))
    }

    /// Write the config as pretty JSON
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Store root for a config read from `config_path`
    pub fn store_root(&self, config_path: impl AsRef<Path>) -> PathBuf {
        let base = config_path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match &self.store_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => base.join(p),
            None => base.join(DEFAULT_STORE_DIR).join(&self.workspace_name),
        }
    }
}
