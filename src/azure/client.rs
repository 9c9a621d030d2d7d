//! Fabric Management Client
//!
//! ARM client for `Microsoft.Fabric/capacities`, combining a credential
//! with the HTTP layer.

use super::auth::DefaultCredential;
use super::http::{ArmHttpClient, ArmResponse};
use crate::capacity::model::RawCapacity;
use crate::capacity::remote::{CapacityApi, Connector, Credential, Poller};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Public Azure cloud management endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// API version of the Microsoft.Fabric resource provider
pub const DEFAULT_API_VERSION: &str = "2023-11-01";

const FABRIC_PROVIDER: &str = "Microsoft.Fabric/capacities";

/// Where and how to reach the management API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmSettings {
    pub endpoint: String,
    pub api_version: String,
}

impl Default for ArmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

/// Fabric capacity client scoped to one subscription
pub struct FabricMgmtClient {
    credential: Arc<dyn Credential>,
    http: ArmHttpClient,
    settings: ArmSettings,
    subscription_id: String,
    closed: AtomicBool,
}

impl FabricMgmtClient {
    /// Create a new client
    pub fn new(
        credential: Arc<dyn Credential>,
        subscription_id: &str,
        settings: ArmSettings,
    ) -> Result<Self> {
        let http = ArmHttpClient::new()?;

        Ok(Self {
            credential,
            http,
            settings,
            subscription_id: subscription_id.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn token(&self) -> Result<String> {
        if self.is_closed() {
            anyhow::bail!("Client has been closed");
        }
        self.credential.token().await
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build a subscription scoped ARM URL
    pub fn subscription_url(&self, path: &str) -> String {
        format!(
            "{}/subscriptions/{}/{}",
            self.settings.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.subscription_id),
            path
        )
    }

    /// Append the api-version query parameter
    fn with_api_version(&self, url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}api-version={}",
            url,
            separator,
            urlencoding::encode(&self.settings.api_version)
        )
    }

    /// Build the URL listing every capacity in the subscription
    pub fn capacities_url(&self) -> String {
        self.with_api_version(&self.subscription_url(&format!("providers/{}", FABRIC_PROVIDER)))
    }

    /// Build the URL of one capacity, optionally with an action suffix
    pub fn capacity_url(&self, resource_group: &str, capacity_name: &str, action: Option<&str>) -> String {
        let mut path = format!(
            "resourceGroups/{}/providers/{}/{}",
            urlencoding::encode(resource_group),
            FABRIC_PROVIDER,
            urlencoding::encode(capacity_name)
        );
        if let Some(action) = action {
            path.push('/');
            path.push_str(action);
        }
        self.with_api_version(&self.subscription_url(&path))
    }

    async fn begin_action(
        &self,
        resource_group: &str,
        capacity_name: &str,
        action: &str,
    ) -> Result<Box<dyn Poller>> {
        let token = self.token().await?;
        let url = self.capacity_url(resource_group, capacity_name, Some(action));
        let response = self.http.post(&url, &token, None).await?;
        Ok(Box::new(ArmPoller::from_response(&response)))
    }
}

#[async_trait]
impl CapacityApi for FabricMgmtClient {
    /// List capacities, following `nextLink` pages
    async fn list_by_subscription(&self) -> Result<Vec<RawCapacity>> {
        let mut all_items = Vec::new();
        let mut next_url = Some(self.capacities_url());

        while let Some(url) = next_url {
            let token = self.token().await?;
            let response = self.http.get(&url, &token).await?;

            if let Some(items) = response.get("value").and_then(Value::as_array) {
                all_items.extend(items.iter().cloned().map(RawCapacity::from));
            }

            next_url = match response.get("nextLink").and_then(Value::as_str) {
                Some(link) if link == url => {
                    tracing::warn!("nextLink repeats the page just fetched, stopping pagination");
                    None
                }
                Some(link) if !link.is_empty() => Some(link.to_string()),
                _ => None,
            };
        }

        Ok(all_items)
    }

    async fn get(&self, resource_group: &str, capacity_name: &str) -> Result<RawCapacity> {
        let token = self.token().await?;
        let url = self.capacity_url(resource_group, capacity_name, None);
        let body = self.http.get(&url, &token).await?;

        if !body.is_object() {
            anyhow::bail!("Unexpected payload for capacity {}: expected a JSON object", capacity_name);
        }
        Ok(RawCapacity::from(body))
    }

    async fn begin_resume(&self, resource_group: &str, capacity_name: &str) -> Result<Box<dyn Poller>> {
        self.begin_action(resource_group, capacity_name, "resume").await
    }

    async fn begin_suspend(&self, resource_group: &str, capacity_name: &str) -> Result<Box<dyn Poller>> {
        self.begin_action(resource_group, capacity_name, "suspend").await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Initial state of an ARM long-running operation
///
/// Only the status seen when the operation was accepted is kept; nothing
/// polls the operation URL afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmPoller {
    status: String,
    operation_url: Option<String>,
}

impl ArmPoller {
    pub fn from_response(response: &ArmResponse) -> Self {
        let reported = response
            .body
            .get("status")
            .or_else(|| response.body.pointer("/properties/provisioningState"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let status = reported.unwrap_or_else(|| match response.status {
            StatusCode::CREATED | StatusCode::ACCEPTED => "InProgress".to_string(),
            _ => "Succeeded".to_string(),
        });

        Self {
            status,
            operation_url: response
                .async_operation
                .clone()
                .or_else(|| response.location.clone()),
        }
    }

    /// URL a caller could poll for progress
    pub fn operation_url(&self) -> Option<&str> {
        self.operation_url.as_deref()
    }
}

impl Poller for ArmPoller {
    fn status(&self) -> String {
        self.status.clone()
    }
}

/// Connector handing out a fresh [`DefaultCredential`] and [`FabricMgmtClient`] per call
#[derive(Debug, Clone, Default)]
pub struct AzureConnector {
    settings: ArmSettings,
}

impl AzureConnector {
    pub fn new(settings: ArmSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for AzureConnector {
    async fn credential(&self) -> Result<Arc<dyn Credential>> {
        let credential = DefaultCredential::new().context("Failed to initialize Azure credentials")?;
        Ok(Arc::new(credential))
    }

    async fn client(
        &self,
        credential: Arc<dyn Credential>,
        subscription_id: &str,
    ) -> Result<Arc<dyn CapacityApi>> {
        let client = FabricMgmtClient::new(credential, subscription_id, self.settings.clone())?;
        Ok(Arc::new(client))
    }
}
