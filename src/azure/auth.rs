//! Azure Authentication
//!
//! Handles authentication through a default credential chain: an
//! environment service principal, a pre-issued access token, or the Azure
//! CLI, tried in that order.

use crate::capacity::remote::Credential;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Scope requested for management API tokens (OAuth2 v2 endpoint)
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Resource requested for management API tokens (Azure CLI)
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// Default Microsoft Entra authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// One link of the credential chain
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Client credentials grant for a service principal
    ServicePrincipal {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Token handed in through the environment
    Static(String),
    /// `az account get-access-token`
    AzureCli,
}

impl std::fmt::Debug for TokenSource {
    // Security: never print secrets or tokens
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::ServicePrincipal {
                tenant_id, client_id, ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            TokenSource::Static(_) => f.write_str("Static(..)"),
            TokenSource::AzureCli => f.write_str("AzureCli"),
        }
    }
}

impl TokenSource {
    /// Build the default chain from the process environment
    pub fn default_chain() -> Vec<TokenSource> {
        let mut chain = Vec::new();

        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            env("AZURE_TENANT_ID"),
            env("AZURE_CLIENT_ID"),
            env("AZURE_CLIENT_SECRET"),
        ) {
            chain.push(TokenSource::ServicePrincipal {
                authority_host: env("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
                tenant_id,
                client_id,
                client_secret,
            });
        }

        if let Some(token) = env("AZURE_ACCESS_TOKEN") {
            chain.push(TokenSource::Static(token));
        }

        chain.push(TokenSource::AzureCli);
        chain
    }

    fn label(&self) -> &'static str {
        match self {
            TokenSource::ServicePrincipal { .. } => "service principal",
            TokenSource::Static(_) => "static token",
            TokenSource::AzureCli => "azure cli",
        }
    }

    async fn fetch(&self, http: &reqwest::Client) -> Result<FetchedToken> {
        match self {
            TokenSource::ServicePrincipal {
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            } => {
                fetch_client_credentials(http, authority_host, tenant_id, client_id, client_secret)
                    .await
            }
            TokenSource::Static(token) => Ok(FetchedToken {
                token: token.clone(),
                ttl: DEFAULT_TOKEN_TTL,
            }),
            TokenSource::AzureCli => fetch_from_cli().await,
        }
    }
}

struct FetchedToken {
    token: String,
    ttl: Duration,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Credential walking the default chain, with token caching
pub struct DefaultCredential {
    sources: Vec<TokenSource>,
    http: reqwest::Client,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
    closed: AtomicBool,
}

impl DefaultCredential {
    /// Create a credential from the process environment
    pub fn new() -> Result<Self> {
        Self::with_sources(TokenSource::default_chain())
    }

    /// Create a credential with an explicit chain
    pub fn with_sources(sources: Vec<TokenSource>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::user_agent())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            sources,
            http,
            token_cache: Arc::new(RwLock::new(None)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn fetch_token(&self) -> Result<FetchedToken> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.fetch(&self.http).await {
                Ok(token) => {
                    tracing::debug!("Token acquired via {}", source.label());
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!("Credential source {} unavailable: {:#}", source.label(), e);
                    failures.push(format!("{}: {:#}", source.label(), e));
                }
            }
        }

        Err(anyhow::anyhow!(
            "No credential in the chain produced a token ({})",
            failures.join("; ")
        ))
    }
}

#[async_trait]
impl Credential for DefaultCredential {
    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    async fn token(&self) -> Result<String> {
        if self.is_closed() {
            anyhow::bail!("Credential has been closed");
        }

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let fetched = self.fetch_token().await?;
        let ttl = fetched.ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: fetched.token.clone(),
                expires_at: Instant::now() + ttl,
            });
        }

        tracing::debug!("New token cached, expires in ~{} minutes", ttl.as_secs() / 60);

        Ok(fetched.token)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let mut cache = self.token_cache.write().await;
        *cache = None;
        Ok(())
    }
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

async fn fetch_client_credentials(
    http: &reqwest::Client,
    authority_host: &str,
    tenant_id: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<FetchedToken> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        urlencoding::encode(tenant_id)
    );

    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", MANAGEMENT_SCOPE),
        ])
        .send()
        .await
        .context("Failed to reach token endpoint")?;

    let status = response.status();
    if !status.is_success() {
        // Security: the body may echo request details, only keep the status
        return Err(anyhow::anyhow!("Token request failed: {}", status));
    }

    let body: OAuthTokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    Ok(FetchedToken {
        token: body.access_token,
        ttl: body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    /// POSIX timestamp, emitted by azure-cli 2.54 and later
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

async fn fetch_from_cli() -> Result<FetchedToken> {
    let output = tokio::process::Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            MANAGEMENT_RESOURCE,
            "--output",
            "json",
        ])
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to run 'az'. Is the Azure CLI installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow::anyhow!(
            "'az account get-access-token' failed: {}. Run 'az login'",
            stderr.trim()
        ));
    }

    let body: CliTokenResponse =
        serde_json::from_slice(&output.stdout).context("Failed to parse Azure CLI output")?;

    Ok(FetchedToken {
        token: body.access_token,
        ttl: body.expires_on.map(ttl_until).unwrap_or(DEFAULT_TOKEN_TTL),
    })
}

/// Time left until a POSIX timestamp, zero if already past
fn ttl_until(expires_on: i64) -> Duration {
    chrono::DateTime::from_timestamp(expires_on, 0)
        .and_then(|at| (at - chrono::Utc::now()).to_std().ok())
        .unwrap_or(Duration::ZERO)
}
