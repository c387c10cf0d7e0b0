//! Cloud workspace provisioning
//!
//! Creates, in order, a resource group, a storage account, a key vault, an
//! Application Insights component and an ML workspace bound to the three
//! resources before it. Every step is a create-or-update PUT, so running the
//! provisioner again updates the existing resources in place.

mod arm;
mod config;
pub mod resources;

pub use arm::ArmClient;
pub use config::{ProvisionConfig, ENV_KEYS};
pub use resources::{ResourceKind, ResourceRequest, WorkspaceBindings};

use crate::error::Result;
use crate::tracking::WorkspaceConfig;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Resource ids produced by a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionOutcome {
    pub resource_group: String,
    pub storage_account: String,
    pub key_vault: String,
    pub app_insights: String,
    pub workspace: String,
}

/// Config file contents that point at the provisioned workspace
pub fn workspace_config(config: &ProvisionConfig) -> WorkspaceConfig {
    WorkspaceConfig::new(
        config.subscription_id.clone(),
        config.resource_group.clone(),
        config.workspace_name.clone(),
    )
}

/// Resource id reported by the service, or the id the request was sent to
fn resource_id(resource: &Value, request: &ResourceRequest) -> String {
    resource
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| request.resource_id.clone())
}

/// Run the provisioning sequence
pub async fn provision(config: &ProvisionConfig, client: &mut ArmClient) -> Result<ProvisionOutcome> {
    client.authenticate(config).await?;

    let request = resources::resource_group(config);
    let resource_group = resource_id(&client.put_and_wait(&request).await?, &request);

    let request = resources::storage_account(config);
    let storage_account = resource_id(&client.put_and_wait(&request).await?, &request);

    let request = resources::key_vault(config);
    let key_vault = resource_id(&client.put_and_wait(&request).await?, &request);

    let request = resources::app_insights(config);
    let app_insights = resource_id(&client.put_and_wait(&request).await?, &request);

    let bindings = WorkspaceBindings {
        storage_account: storage_account.clone(),
        key_vault: key_vault.clone(),
        app_insights: app_insights.clone(),
    };
    let request = resources::workspace(config, &bindings);
    let workspace = resource_id(&client.put_and_wait(&request).await?, &request);

    info!(workspace = %workspace, "workspace ready");
    Ok(ProvisionOutcome {
        resource_group,
        storage_account,
        key_vault,
        app_insights,
        workspace,
    })
}
