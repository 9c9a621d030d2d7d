//! Fabric capacity operations
//!
//! Each operation acquires its own credential and client, performs one
//! remote call, and releases both handles before returning, whatever the
//! outcome. Errors are logged and handed back untouched.

use super::model::FabricCapacity;
use super::remote::{CapacityApi, Connector, Credential};
use crate::azure::format_arm_error;
use crate::mcp::registry::{ToolDescriptor, ToolError, ToolFuture};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

const STATUS_ACCEPTED: &str = "accepted";
const RESUME_MESSAGE: &str = "Resume operation started. Check Azure portal for progress.";
const PAUSE_MESSAGE: &str = "Pause operation started. Check Azure portal for progress.";

/// Result of [`CapacityTools::list_capacities`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityList {
    pub capacities: Vec<FabricCapacity>,
}

/// Acknowledgment of a started long-running operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationAccepted {
    pub status: String,
    pub message: String,
    pub poller_status: String,
}

impl OperationAccepted {
    fn new(message: &str, poller_status: String) -> Self {
        Self {
            status: STATUS_ACCEPTED.to_string(),
            message: message.to_string(),
            poller_status,
        }
    }
}

/// Handles acquired by one operation so far.
///
/// [`Handles::release`] closes them. Handles dropped without being released
/// (cancelled future) are closed on a spawned task.
struct Handles {
    credential: Arc<dyn Credential>,
    client: Option<Arc<dyn CapacityApi>>,
    released: bool,
}

impl Handles {
    async fn release(mut self) {
        self.released = true;
        close_handles(Arc::clone(&self.credential), self.client.take()).await;
    }
}

impl Drop for Handles {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let credential = Arc::clone(&self.credential);
        let client = self.client.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_handles(credential, client));
            }
            Err(_) => warn!("Session dropped outside a runtime, handles not closed"),
        }
    }
}

/// Credential and client held for the duration of one operation
struct Session {
    client: Arc<dyn CapacityApi>,
    handles: Handles,
}

impl Session {
    async fn open(connector: &dyn Connector, subscription_id: &str) -> Result<Self> {
        let credential = connector.credential().await?;
        let mut handles = Handles {
            credential: Arc::clone(&credential),
            client: None,
            released: false,
        };

        match connector.client(credential, subscription_id).await {
            Ok(client) => {
                handles.client = Some(Arc::clone(&client));
                Ok(Session { client, handles })
            }
            Err(e) => {
                handles.release().await;
                Err(e)
            }
        }
    }

    async fn release(self) {
        self.handles.release().await;
    }
}

/// Close the credential, then the client. Close failures are only logged.
async fn close_handles(credential: Arc<dyn Credential>, client: Option<Arc<dyn CapacityApi>>) {
    if let Err(e) = credential.close().await {
        warn!("Failed to close credential: {:#}", e);
    }
    if let Some(client) = client {
        if let Err(e) = client.close().await {
            warn!("Failed to close management client: {:#}", e);
        }
    }
}

fn log_failure(context: &str, e: &anyhow::Error) {
    error!("{}: {:#} ({})", context, e, format_arm_error(e));
}

/// The four capacity lifecycle operations
#[derive(Clone)]
pub struct CapacityTools {
    connector: Arc<dyn Connector>,
}

impl CapacityTools {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Run `op` with a fresh client, releasing the session on every path
    async fn with_session<T, F, Fut>(&self, subscription_id: &str, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn CapacityApi>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Session::open(self.connector.as_ref(), subscription_id).await?;
        let outcome = op(Arc::clone(&session.client)).await;
        session.release().await;
        outcome
    }

    /// List all Fabric capacities within a subscription
    pub async fn list_capacities(&self, subscription_id: &str) -> Result<CapacityList> {
        info!("Listing Fabric capacities for subscription: {}", subscription_id);

        self.with_session(subscription_id, |client| async move {
            let items = client.list_by_subscription().await?;
            let capacities: Vec<FabricCapacity> = items.iter().map(FabricCapacity::from_raw).collect();
            info!("Found {} capacities.", capacities.len());
            Ok(CapacityList { capacities })
        })
        .await
        .inspect_err(|e| log_failure("Error listing capacities", e))
    }

    /// Retrieve a single Fabric capacity
    pub async fn get_capacity(
        &self,
        subscription_id: &str,
        resource_group: &str,
        capacity_name: &str,
    ) -> Result<FabricCapacity> {
        info!(
            "Getting Fabric capacity: {} in resource group: {}, subscription: {}",
            capacity_name, resource_group, subscription_id
        );

        self.with_session(subscription_id, |client| async move {
            let raw = client.get(resource_group, capacity_name).await?;
            info!("Retrieved capacity: {}", capacity_name);
            Ok(FabricCapacity::from_raw(&raw))
        })
        .await
        .inspect_err(|e| log_failure("Error getting capacity", e))
    }

    /// Start resuming a capacity. Returns as soon as the operation is accepted.
    pub async fn resume_capacity(
        &self,
        subscription_id: &str,
        resource_group: &str,
        capacity_name: &str,
    ) -> Result<OperationAccepted> {
        info!(
            "Resuming Fabric capacity: {} in resource group: {}, subscription: {}",
            capacity_name, resource_group, subscription_id
        );

        self.with_session(subscription_id, |client| async move {
            let poller = client.begin_resume(resource_group, capacity_name).await?;
            info!("Resume operation started for: {}", capacity_name);
            Ok(OperationAccepted::new(RESUME_MESSAGE, poller.status()))
        })
        .await
        .inspect_err(|e| log_failure("Error resuming capacity", e))
    }

    /// Start pausing (suspending) a capacity. Returns as soon as the operation is accepted.
    pub async fn pause_capacity(
        &self,
        subscription_id: &str,
        resource_group: &str,
        capacity_name: &str,
    ) -> Result<OperationAccepted> {
        info!(
            "Pausing Fabric capacity: {} in resource group: {}, subscription: {}",
            capacity_name, resource_group, subscription_id
        );

        self.with_session(subscription_id, |client| async move {
            let poller = client.begin_suspend(resource_group, capacity_name).await?;
            info!("Pause operation started for: {}", capacity_name);
            Ok(OperationAccepted::new(PAUSE_MESSAGE, poller.status()))
        })
        .await
        .inspect_err(|e| log_failure("Error pausing capacity", e))
    }
}

// =============================================================================
// Tool descriptors
// =============================================================================

#[derive(Debug, Deserialize)]
struct SubscriptionArgs {
    subscription_id: String,
}

#[derive(Debug, Deserialize)]
struct CapacityArgs {
    subscription_id: String,
    resource_group: String,
    capacity_name: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Failed(e.into()))
}

fn subscription_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subscription_id": {"type": "string", "description": "Azure subscription ID"}
        },
        "required": ["subscription_id"]
    })
}

fn capacity_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subscription_id": {"type": "string", "description": "Azure subscription ID"},
            "resource_group": {"type": "string", "description": "Name of the resource group"},
            "capacity_name": {"type": "string", "description": "Name of the Fabric capacity"}
        },
        "required": ["subscription_id", "resource_group", "capacity_name"]
    })
}

/// Ordered tool descriptors for the capacity operations
pub fn tool_descriptors(tools: Arc<CapacityTools>) -> Vec<ToolDescriptor> {
    let list = Arc::clone(&tools);
    let get = Arc::clone(&tools);
    let resume = Arc::clone(&tools);
    let pause = tools;

    vec![
        ToolDescriptor::new(
            "list_fabric_capacities",
            "Lists all Fabric capacities within an Azure subscription.",
            subscription_schema(),
            move |args| -> ToolFuture {
                let tools = Arc::clone(&list);
                Box::pin(async move {
                    let args: SubscriptionArgs = parse_args(args)?;
                    to_json(&tools.list_capacities(&args.subscription_id).await?)
                })
            },
        ),
        ToolDescriptor::new(
            "get_fabric_capacity",
            "Retrieves details of a specific Fabric capacity resource.",
            capacity_schema(),
            move |args| -> ToolFuture {
                let tools = Arc::clone(&get);
                Box::pin(async move {
                    let args: CapacityArgs = parse_args(args)?;
                    let capacity = tools
                        .get_capacity(&args.subscription_id, &args.resource_group, &args.capacity_name)
                        .await?;
                    to_json(&capacity)
                })
            },
        ),
        ToolDescriptor::new(
            "resume_fabric_capacity",
            "Resume a Fabric capacity. Returns once the operation is accepted.",
            capacity_schema(),
            move |args| -> ToolFuture {
                let tools = Arc::clone(&resume);
                Box::pin(async move {
                    let args: CapacityArgs = parse_args(args)?;
                    let accepted = tools
                        .resume_capacity(&args.subscription_id, &args.resource_group, &args.capacity_name)
                        .await?;
                    to_json(&accepted)
                })
            },
        ),
        ToolDescriptor::new(
            "pause_fabric_capacity",
            "Pause a Fabric capacity. Returns once the operation is accepted.",
            capacity_schema(),
            move |args| -> ToolFuture {
                let tools = Arc::clone(&pause);
                Box::pin(async move {
                    let args: CapacityArgs = parse_args(args)?;
                    let accepted = tools
                        .pause_capacity(&args.subscription_id, &args.resource_group, &args.capacity_name)
                        .await?;
                    to_json(&accepted)
                })
            },
        ),
    ]
}
