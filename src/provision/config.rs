//! Provisioning configuration read from the environment

use crate::error::{LabError, Result};
use std::env;
use std::fmt;

/// Environment keys, in the order they are read
pub const ENV_KEYS: [&str; 11] = [
    "subscription_id",
    "client_id",
    "secret",
    "tenant",
    "resource_group",
    "location",
    "storage_account_name",
    "container_registry_name",
    "key_vault_name",
    "app_insights_name",
    "workspace_name",
];

/// Service principal credentials and names of the resources to create
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    pub subscription_id: String,
    pub client_id: String,
    pub secret: String,
    pub tenant: String,
    pub resource_group: String,
    pub location: String,
    pub storage_account_name: String,
    /// Read for completeness; no registry is bound to the workspace
    pub container_registry_name: String,
    pub key_vault_name: String,
    pub app_insights_name: String,
    pub workspace_name: String,
}

impl fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("secret", &"***")
            .field("tenant", &self.tenant)
            .field("resource_group", &self.resource_group)
            .field("location", &self.location)
            .field("storage_account_name", &self.storage_account_name)
            .field("container_registry_name", &self.container_registry_name)
            .field("key_vault_name", &self.key_vault_name)
            .field("app_insights_name", &self.app_insights_name)
            .field("workspace_name", &self.workspace_name)
            .finish()
    }
}

impl ProvisionConfig {
    /// Load from the process environment after an optional `.env` file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Every key is required; empty
    /// values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| LabError::MissingEnv(key.to_string()))
        };

        Ok(Self {
            subscription_id: get("subscription_id")?,
            client_id: get("client_id")?,
            secret: get("secret")?,
            tenant: get("tenant")?,
            resource_group: get("resource_group")?,
            location: get("location")?,
            storage_account_name: get("storage_account_name")?,
            container_registry_name: get("container_registry_name")?,
            key_vault_name: get("key_vault_name")?,
            app_insights_name: get("app_insights_name")?,
            workspace_name: get("workspace_name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<String, String> {
        ENV_KEYS
            .iter()
            .map(|k| (k.to_string(), format!("{}-value", k)))
            .collect()
    }

    #[test]
    fn test_all_keys_present() {
        let vars = full_env();
        let config = ProvisionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.workspace_name, "workspace_name-value");
        assert_eq!(config.container_registry_name, "container_registry_name-value");
    }

    #[test]
    fn test_missing_key_named_in_error() {
        let mut vars = full_env();
        vars.remove("key_vault_name");
        let err = ProvisionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, LabError::MissingEnv(ref k) if k == "key_vault_name"));
        assert!(err.to_string().contains("key_vault_name"));
    }

    #[test]
    fn test_empty_value_is_missing() {
        let mut vars = full_env();
        vars.insert("tenant".to_string(), "  ".to_string());
        assert!(ProvisionConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let vars = full_env();
        let config = ProvisionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let shown = format!("{:?}", config);
        assert!(!shown.contains("secret-value"));
    }
}
