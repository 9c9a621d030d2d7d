//! Remote capability seam
//!
//! The operations in [`super::tools`] only talk to these traits. The ARM
//! implementation lives in [`crate::azure`]; tests plug in stubs.

use super::model::RawCapacity;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A credential able to hand out bearer tokens for the management API
#[async_trait]
pub trait Credential: Send + Sync {
    /// Get an access token for the management API
    async fn token(&self) -> Result<String>;

    /// Release the credential. Called exactly once per acquisition.
    async fn close(&self) -> Result<()>;
}

/// Handle on a long-running remote operation
pub trait Poller: Send + Sync {
    /// Status reported when the operation was accepted
    fn status(&self) -> String;
}

/// Fabric capacity operations of the management API, scoped to one subscription
#[async_trait]
pub trait CapacityApi: Send + Sync {
    /// List every capacity visible in the subscription, in remote order
    async fn list_by_subscription(&self) -> Result<Vec<RawCapacity>>;

    /// Fetch a single capacity
    async fn get(&self, resource_group: &str, capacity_name: &str) -> Result<RawCapacity>;

    /// Start resuming a capacity without waiting for completion
    async fn begin_resume(
        &self,
        resource_group: &str,
        capacity_name: &str,
    ) -> Result<Box<dyn Poller>>;

    /// Start suspending a capacity without waiting for completion
    async fn begin_suspend(
        &self,
        resource_group: &str,
        capacity_name: &str,
    ) -> Result<Box<dyn Poller>>;

    /// Release the client. Called exactly once per acquisition.
    async fn close(&self) -> Result<()>;
}

/// Produces fresh credential and client handles for every operation
#[async_trait]
pub trait Connector: Send + Sync {
    async fn credential(&self) -> Result<Arc<dyn Credential>>;

    async fn client(
        &self,
        credential: Arc<dyn Credential>,
        subscription_id: &str,
    ) -> Result<Arc<dyn CapacityApi>>;
}
