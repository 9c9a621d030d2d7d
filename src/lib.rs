//! Fabric Admin MCP server
//!
//! Exposes Microsoft Fabric capacity lifecycle operations (list, get,
//! resume, pause) as MCP tools.
//!
//! - [`azure`] - Azure Resource Manager client and credentials
//! - [`capacity`] - Capacity normalization and the four operations
//! - [`mcp`] - Tool registry and the MCP server
//! - [`config`] - Layered server configuration

pub mod azure;
pub mod capacity;
pub mod config;
pub mod mcp;

use std::sync::Arc;

/// Version injected at compile time via FABRIC_MCP_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("FABRIC_MCP_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Name announced to MCP clients
pub const SERVER_NAME: &str = "fabric-admin-mcp-server";

/// User agent sent on every outgoing request
pub fn user_agent() -> String {
    format!("fabric-admin-mcp/{}", VERSION)
}

/// Wire the capacity tools into an MCP server using the given connector
pub fn build_server(connector: Arc<dyn capacity::remote::Connector>) -> mcp::McpServer {
    let tools = Arc::new(capacity::CapacityTools::new(connector));

    let mut registry = mcp::ToolRegistry::new();
    registry.register_all(capacity::tool_descriptors(tools));

    mcp::McpServer::new(SERVER_NAME, VERSION, registry)
}
