//! Management-plane resource requests
//!
//! Each step of the provisioning plan is a PUT of a JSON body to a resource URL
//! with a fixed api-version.

use super::config::ProvisionConfig;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
pub const LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

pub const RESOURCE_GROUP_API: &str = "2021-04-01";
pub const STORAGE_API: &str = "2023-01-01";
pub const KEY_VAULT_API: &str = "2015-06-01";
pub const APP_INSIGHTS_API: &str = "2015-05-01";
pub const WORKSPACE_API: &str = "2023-04-01";

/// Kind of resource created by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    ResourceGroup,
    StorageAccount,
    KeyVault,
    AppInsights,
    Workspace,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::ResourceGroup => "resource group",
            ResourceKind::StorageAccount => "storage account",
            ResourceKind::KeyVault => "key vault",
            ResourceKind::AppInsights => "application insights",
            ResourceKind::Workspace => "ml workspace",
        };
        f.write_str(name)
    }
}

/// One create-or-update request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub name: String,
    /// ARM resource id, without api-version
    pub resource_id: String,
    pub api_version: &'static str,
    pub body: Value,
}

impl ResourceRequest {
    /// Full request URL
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}{}?api-version={}",
            endpoint.trim_end_matches('/'),
            self.resource_id,
            self.api_version
        )
    }
}

/// Resource ids of the dependencies bound into the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceBindings {
    pub storage_account: String,
    pub key_vault: String,
    pub app_insights: String,
}

fn resource_group_id(config: &ProvisionConfig) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}",
        config.subscription_id, config.resource_group
    )
}

fn provider_id(config: &ProvisionConfig, provider: &str, resource_type: &str, name: &str) -> String {
    format!(
        "{}/providers/{}/{}/{}",
        resource_group_id(config),
        provider,
        resource_type,
        name
    )
}

pub fn resource_group(config: &ProvisionConfig) -> ResourceRequest {
    ResourceRequest {
        kind: ResourceKind::ResourceGroup,
        name: config.resource_group.clone(),
        resource_id: format!(
            "/subscriptions/{}/resourcegroups/{}",
            config.subscription_id, config.resource_group
        ),
        api_version: RESOURCE_GROUP_API,
        body: json!({ "location": config.location }),
    }
}

pub fn storage_account(config: &ProvisionConfig) -> ResourceRequest {
    ResourceRequest {
        kind: ResourceKind::StorageAccount,
        name: config.storage_account_name.clone(),
        resource_id: provider_id(
            config,
            "Microsoft.Storage",
            "storageAccounts",
            &config.storage_account_name,
        ),
        api_version: STORAGE_API,
        body: json!({
            "sku": { "name": "Standard_RAGRS" },
            "kind": "Storage",
            "location": config.location,
        }),
    }
}

pub fn key_vault(config: &ProvisionConfig) -> ResourceRequest {
    ResourceRequest {
        kind: ResourceKind::KeyVault,
        name: config.key_vault_name.clone(),
        resource_id: provider_id(config, "Microsoft.KeyVault", "vaults", &config.key_vault_name),
        api_version: KEY_VAULT_API,
        body: json!({
            "location": config.location,
            "properties": {
                "sku": { "family": "A", "name": "standard" },
                "tenantId": config.tenant,
                "accessPolicies": [],
                "enabledForDeployment": true,
                "enabledForTemplateDeployment": true,
                "enabledForDiskEncryption": true,
            }
        }),
    }
}

pub fn app_insights(config: &ProvisionConfig) -> ResourceRequest {
    ResourceRequest {
        kind: ResourceKind::AppInsights,
        name: config.app_insights_name.clone(),
        resource_id: provider_id(
            config,
            "Microsoft.Insights",
            "components",
            &config.app_insights_name,
        ),
        api_version: APP_INSIGHTS_API,
        body: json!({
            "location": config.location,
            "kind": "web",
            "properties": { "Application_Type": "web" },
        }),
    }
}

pub fn workspace(config: &ProvisionConfig, bindings: &WorkspaceBindings) -> ResourceRequest {
    ResourceRequest {
        kind: ResourceKind::Workspace,
        name: config.workspace_name.clone(),
        resource_id: provider_id(
            config,
            "Microsoft.MachineLearningServices",
            "workspaces",
            &config.workspace_name,
        ),
        api_version: WORKSPACE_API,
        body: json!({
            "location": config.location,
            "identity": { "type": "SystemAssigned" },
            "properties": {
                "friendlyName": config.workspace_name,
                "storageAccount": bindings.storage_account,
                "keyVault": bindings.key_vault,
                "applicationInsights": bindings.app_insights,
            }
        }),
    }
}

/// Bindings derived from the configured names, used before the real ids are
/// known (dry runs)
pub fn expected_bindings(config: &ProvisionConfig) -> WorkspaceBindings {
    WorkspaceBindings {
        storage_account: storage_account(config).resource_id,
        key_vault: key_vault(config).resource_id,
        app_insights: app_insights(config).resource_id,
    }
}

/// The ordered provisioning steps
pub fn plan(config: &ProvisionConfig) -> Vec<ResourceRequest> {
    vec![
        resource_group(config),
        storage_account(config),
        key_vault(config),
        app_insights(config),
        workspace(config, &expected_bindings(config)),
    ]
}

/// Token endpoint of a tenant on a login endpoint
pub fn token_url(login_endpoint: &str, tenant: &str) -> String {
    format!("{}/{}/oauth2/v2.0/token", login_endpoint.trim_end_matches('/'), tenant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::config::ENV_KEYS;

    fn config() -> ProvisionConfig {
        ProvisionConfig::from_lookup(|k| {
            ENV_KEYS.contains(&k).then(|| match k {
                "subscription_id" => "sub-1".to_string(),
                "resource_group" => "rg-lab".to_string(),
                "location" => "westeurope".to_string(),
                "tenant" => "tenant-1".to_string(),
                other => format!("{}1", other.replace('_', "")),
            })
        })
        .unwrap()
    }

    #[test]
    fn test_plan_order() {
        let kinds: Vec<ResourceKind> = plan(&config()).iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::ResourceGroup,
                ResourceKind::StorageAccount,
                ResourceKind::KeyVault,
                ResourceKind::AppInsights,
                ResourceKind::Workspace,
            ]
        );
    }

    #[test]
    fn test_resource_group_request() {
        let request = resource_group(&config());
        assert_eq!(
            request.url(MANAGEMENT_ENDPOINT),
            "https://management.azure.com/subscriptions/sub-1/resourcegroups/rg-lab?api-version=2021-04-01"
        );
        assert_eq!(request.body, json!({ "location": "westeurope" }));
    }

    #[test]
    fn test_storage_body() {
        let request = storage_account(&config());
        assert_eq!(request.api_version, "2023-01-01");
        assert_eq!(request.body["sku"]["name"], "Standard_RAGRS");
        assert_eq!(request.body["kind"], "Storage");
        assert!(request
            .resource_id
            .ends_with("/providers/Microsoft.Storage/storageAccounts/storageaccountname1"));
    }

    #[test]
    fn test_key_vault_body() {
        let body = key_vault(&config()).body;
        assert_eq!(body["properties"]["sku"], json!({ "family": "A", "name": "standard" }));
        assert_eq!(body["properties"]["tenantId"], "tenant-1");
        assert_eq!(body["properties"]["accessPolicies"], json!([]));
        for flag in [
            "enabledForDeployment",
            "enabledForTemplateDeployment",
            "enabledForDiskEncryption",
        ] {
            assert_eq!(body["properties"][flag], true);
        }
    }

    #[test]
    fn test_app_insights_body() {
        let request = app_insights(&config());
        assert_eq!(request.api_version, "2015-05-01");
        assert_eq!(request.body["kind"], "web");
        assert_eq!(request.body["properties"]["Application_Type"], "web");
    }

    #[test]
    fn test_workspace_binds_dependencies() {
        let config = config();
        let bindings = WorkspaceBindings {
            storage_account: "/sa".to_string(),
            key_vault: "/kv".to_string(),
            app_insights: "/ai".to_string(),
        };
        let request = workspace(&config, &bindings);
        assert_eq!(request.api_version, "2023-04-01");
        assert_eq!(request.body["identity"]["type"], "SystemAssigned");
        assert_eq!(request.body["properties"]["storageAccount"], "/sa");
        assert_eq!(request.body["properties"]["keyVault"], "/kv");
        assert_eq!(request.body["properties"]["applicationInsights"], "/ai");
        assert!(!request.body.to_string().contains("containerRegistry"));
    }

    #[test]
    fn test_token_url() {
        assert_eq!(
            token_url(LOGIN_ENDPOINT, "tenant-1"),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
        );
    }
}
