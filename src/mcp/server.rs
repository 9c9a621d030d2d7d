//! MCP Server
//!
//! Serves the tool registry over the streamable HTTP transport of `rmcp`.
//! Listing and dispatch walk the explicit [`ToolRegistry`], so tools are
//! announced in registration order.

use super::registry::{ToolError, ToolRegistry};
use axum::Router;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use rmcp::{RoleServer, ServerHandler};
use serde_json::{Map, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

const INSTRUCTIONS: &str =
    "Administer Microsoft Fabric capacities: list them, inspect one, resume or pause it.";

/// MCP server over a fixed tool registry
#[derive(Clone)]
pub struct McpServer {
    info: Implementation,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(name: &str, version: &str, registry: ToolRegistry) -> Self {
        Self {
            info: Implementation {
                name: name.to_string(),
                version: version.to_string(),
                ..Default::default()
            },
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Tool listing, in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.registry
            .tools()
            .iter()
            .map(|t| {
                let schema = match &t.input_schema {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                Tool::new(t.name.clone(), t.description.clone(), Arc::new(schema))
            })
            .collect()
    }

    /// Run one tool call.
    ///
    /// Unknown tools and invalid arguments are protocol errors and reach no
    /// remote. A failing operation is reported in band with `isError` set and
    /// its error text untouched.
    pub async fn call(&self, request: CallToolRequestParams) -> Result<CallToolResult, ErrorData> {
        let Some(tool) = self.registry.get(&request.name) else {
            return Err(ErrorData::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ));
        };

        debug!("Calling tool {}", tool.name);
        let arguments = Value::Object(request.arguments.unwrap_or_default());
        match tool.call(arguments).await {
            Ok(value) => Ok(CallToolResult::structured(value)),
            Err(ToolError::InvalidArguments(message)) => Err(ErrorData::invalid_params(
                format!("Invalid arguments: {}", message),
                None,
            )),
            Err(ToolError::Failed(e)) => Ok(CallToolResult::error(vec![Content::text(format!("{:#}", e))])),
        }
    }

    /// Build the axum router serving this server at `path`.
    ///
    /// Open sessions end when `ct` is cancelled.
    pub fn router(&self, path: &str, ct: CancellationToken) -> Router {
        let server = self.clone();
        let service = StreamableHttpService::new(
            move || Ok(server.clone()),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig {
                cancellation_token: ct,
                ..Default::default()
            },
        );

        let mut router = Router::new().route_service(path, service.clone());

        // Serve both `/mcp/` and `/mcp`
        let trimmed = path.trim_end_matches('/');
        if !trimmed.is_empty() && trimmed != path {
            router = router.route_service(trimmed, service);
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(&self, addr: SocketAddr, path: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ct = CancellationToken::new();
        let app = self.router(path, ct.child_token());
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("MCP server listening on http://{}{}", listener.local_addr()?, path);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                ct.cancel();
            })
            .await?;
        info!("MCP server stopped");
        Ok(())
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: self.info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call(request).await
    }
}
