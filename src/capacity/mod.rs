//! Fabric capacity layer
//!
//! This module turns the management API into four lifecycle operations.
//!
//! # Architecture
//!
//! - [`model`] - Normalizes raw capacities into [`FabricCapacity`]
//! - [`remote`] - Traits the operations use to reach the remote API
//! - [`tools`] - The list/get/resume/pause operations and their tool descriptors
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use crate::azure::AzureConnector;
//! use crate::capacity::CapacityTools;
//!
//! async fn list(subscription_id: &str) -> anyhow::Result<()> {
//!     let tools = CapacityTools::new(Arc::new(AzureConnector::default()));
//!     let list = tools.list_capacities(subscription_id).await?;
//!     println!("{} capacities", list.capacities.len());
//!     Ok(())
//! }
//! ```

pub mod model;
pub mod remote;
pub mod tools;

pub use model::{extract_resource_group, CapacityModel, FabricCapacity, RawCapacity};
pub use tools::{tool_descriptors, CapacityList, CapacityTools, OperationAccepted};
