//! Tool Registry
//!
//! Explicit, ordered list of tools handed to the MCP server at startup.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a tool call did not produce a result
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments did not match the tool's input schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The operation itself failed
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;

pub type ToolHandler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// A named, invocable tool with its input schema
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema for input parameters
    pub input_schema: Value,
    handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn new<F>(name: &str, description: &str, input_schema: Value, handler: F) -> Self
    where
        F: Fn(Value) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    /// Invoke the tool with its JSON arguments
    pub fn call(&self, arguments: Value) -> ToolFuture {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registered tools, in registration order
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of tools. A tool named like an existing one replaces it in place.
    pub fn register_all(&mut self, tools: impl IntoIterator<Item = ToolDescriptor>) {
        for tool in tools {
            match self.tools.iter_mut().find(|t| t.name == tool.name) {
                Some(existing) => {
                    tracing::warn!("Tool {} registered twice, keeping the latest", tool.name);
                    *existing = tool;
                }
                None => {
                    tracing::debug!("Registered tool {}", tool.name);
                    self.tools.push(tool);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
