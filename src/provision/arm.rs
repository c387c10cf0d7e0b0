//! Minimal management-plane client: token acquisition, PUT and long-running
//! operation polling

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::config::ProvisionConfig;
use super::resources::{
    token_url, ResourceRequest, LOGIN_ENDPOINT, MANAGEMENT_ENDPOINT, MANAGEMENT_SCOPE,
};
use crate::error::{LabError, Result};

const ASYNC_OPERATION: &str = "azure-asyncoperation";
const LOCATION: &str = "location";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Terminal states of an operation or resource
fn terminal_state(state: &str) -> Option<bool> {
    match state.to_ascii_lowercase().as_str() {
        "succeeded" => Some(true),
        "failed" | "canceled" | "cancelled" => Some(false),
        _ => None,
    }
}

fn provisioning_state(resource: &Value) -> Option<&str> {
    resource
        .get("properties")
        .and_then(|p| p.get("provisioningState"))
        .and_then(Value::as_str)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Management API client authenticated as a service principal
pub struct ArmClient {
    http: reqwest::Client,
    management_endpoint: String,
    login_endpoint: String,
    token: Option<String>,
    /// Wait between polls when the service sends no `Retry-After`
    poll_interval: Duration,
}

impl Default for ArmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            management_endpoint: MANAGEMENT_ENDPOINT.to_string(),
            login_endpoint: LOGIN_ENDPOINT.to_string(),
            token: None,
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Point the client at other endpoints
    pub fn with_endpoints(mut self, management: impl Into<String>, login: impl Into<String>) -> Self {
        self.management_endpoint = management.into().trim_end_matches('/').to_string();
        self.login_endpoint = login.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn bearer(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| LabError::ConfigError("management client is not authenticated".to_string()))
    }

    /// Client-credentials token for the management scope
    pub async fn authenticate(&mut self, config: &ProvisionConfig) -> Result<()> {
        let url = token_url(&self.login_endpoint, &config.tenant);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
        ];

        let response = self.http.post(&url).form(&params).send().await?;
        let response = Self::check(response).await?;
        let token: TokenResponse = response.json().await?;
        self.token = Some(token.access_token);
        info!(tenant = %config.tenant, "authenticated service principal");
        Ok(())
    }

    /// Turn non-success statuses into errors carrying the body
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(LabError::CloudError {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn wait_for(&self, headers: &HeaderMap) -> Duration {
        header_str(headers, RETRY_AFTER.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.poll_interval)
    }

    async fn get_json(&self, url: &str) -> Result<(StatusCode, HeaderMap, Value)> {
        let response = self.http.get(url).bearer_auth(self.bearer()?).send().await?;
        let response = Self::check(response).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok((status, headers, value))
    }

    /// Create or update a resource and wait until it is provisioned
    pub async fn put_and_wait(&self, request: &ResourceRequest) -> Result<Value> {
        let url = request.url(&self.management_endpoint);
        info!(kind = %request.kind, name = %request.name, "creating");

        let response = self
            .http
            .put(&url)
            .bearer_auth(self.bearer()?)
            .json(&request.body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        let mut resource: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        if let Some(operation) = header_str(&headers, ASYNC_OPERATION) {
            self.poll_operation(operation, self.wait_for(&headers)).await?;
            resource = self.get_json(&url).await?.2;
        } else if status == StatusCode::ACCEPTED {
            if let Some(location) = header_str(&headers, LOCATION) {
                self.poll_location(location, self.wait_for(&headers)).await?;
            }
            resource = self.get_json(&url).await?.2;
        }

        let resource = self.poll_resource(&url, resource).await?;
        info!(kind = %request.kind, name = %request.name, "provisioned");
        Ok(resource)
    }

    /// Poll an `Azure-AsyncOperation` URL until its status is terminal
    async fn poll_operation(&self, url: &str, mut wait: Duration) -> Result<()> {
        loop {
            tokio::time::sleep(wait).await;
            let (_, headers, body) = self.get_json(url).await?;
            let state = body.get("status").and_then(Value::as_str).unwrap_or("InProgress");
            debug!(operation = url, state, "polled operation");
            match terminal_state(state) {
                Some(true) => return Ok(()),
                Some(false) => {
                    return Err(LabError::CloudError {
                        status: 200,
                        body: body.to_string(),
                    })
                }
                None => wait = self.wait_for(&headers),
            }
        }
    }

    /// Poll a `Location` URL until it stops answering 202
    async fn poll_location(&self, url: &str, mut wait: Duration) -> Result<()> {
        loop {
            tokio::time::sleep(wait).await;
            let (status, headers, _) = self.get_json(url).await?;
            debug!(location = url, status = status.as_u16(), "polled location");
            if status != StatusCode::ACCEPTED {
                return Ok(());
            }
            wait = self.wait_for(&headers);
        }
    }

    /// Re-read the resource until its `provisioningState` is terminal
    async fn poll_resource(&self, url: &str, mut resource: Value) -> Result<Value> {
        loop {
            match provisioning_state(&resource).map(terminal_state) {
                None | Some(Some(true)) => return Ok(resource),
                Some(Some(false)) => {
                    return Err(LabError::CloudError {
                        status: 200,
                        body: resource.to_string(),
                    })
                }
                Some(None) => {
                    tokio::time::sleep(self.poll_interval).await;
                    let (_, _, body) = self.get_json(url).await?;
                    resource = body;
                }
            }
        }
    }
}
