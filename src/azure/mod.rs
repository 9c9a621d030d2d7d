//! Azure Resource Manager interaction module
//!
//! Concrete implementation of the remote capability used by the capacity
//! operations: credential chain, HTTP layer and the Fabric capacity client.
//!
//! # Module Structure
//!
//! - [`auth`] - Default credential chain with token caching
//! - [`client`] - Fabric capacity client and connector
//! - [`error`] - Typed ARM error and operator hints
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use crate::azure::client::{ArmSettings, AzureConnector};
//! use crate::capacity::remote::Connector;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let connector = AzureConnector::new(ArmSettings::default());
//!     let credential = connector.credential().await?;
//!     let client = connector.client(credential, "00000000-0000-0000-0000-000000000000").await?;
//!     let capacities = client.list_by_subscription().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;

pub use client::{ArmSettings, AzureConnector, FabricMgmtClient};
pub use error::{format_arm_error, ArmError};
