//! Configuration Management
//!
//! Server settings layered as: CLI flags and environment > config file > defaults.

use crate::azure::client::{ArmSettings, DEFAULT_API_VERSION, DEFAULT_MANAGEMENT_ENDPOINT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PATH: &str = "/mcp/";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// HTTP path of the MCP endpoint
    pub path: String,
    /// Azure Resource Manager endpoint
    pub management_endpoint: String,
    /// Microsoft.Fabric api-version
    pub api_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub management_endpoint: Option<String>,
    pub api_version: Option<String>,
}

impl Config {
    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fabric-admin-mcp").join("config.json"))
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Apply CLI/environment overrides
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = overrides.path {
            self.path = path;
        }
        if let Some(endpoint) = overrides.management_endpoint {
            self.management_endpoint = endpoint;
        }
        if let Some(api_version) = overrides.api_version {
            self.api_version = api_version;
        }
        self
    }

    /// Check the configuration before serving
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            anyhow::bail!("MCP path must start with '/': {}", self.path);
        }

        let endpoint = url::Url::parse(&self.management_endpoint)
            .with_context(|| format!("Invalid management endpoint: {}", self.management_endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("Management endpoint must be http(s): {}", self.management_endpoint);
        }

        if self.api_version.trim().is_empty() {
            anyhow::bail!("api-version must not be empty");
        }

        self.socket_addr().map(|_| ())
    }

    /// Address the server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Settings for the management API client
    pub fn arm_settings(&self) -> ArmSettings {
        ArmSettings {
            endpoint: self.management_endpoint.trim_end_matches('/').to_string(),
            api_version: self.api_version.clone(),
        }
    }
}
