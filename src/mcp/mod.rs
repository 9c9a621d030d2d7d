//! Model Context Protocol surface
//!
//! - [`registry`] - Explicit, ordered tool descriptors
//! - [`server`] - `rmcp` server handler and streamable HTTP transport (axum)

pub mod registry;
pub mod server;

pub use registry::{ToolDescriptor, ToolError, ToolRegistry};
pub use server::McpServer;
