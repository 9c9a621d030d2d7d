//! HTTP utilities for ARM REST API calls

use super::error::ArmError;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the per-request correlation id
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// Header carrying the status URL of a long-running operation
const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Sanitize response body for logging
/// Truncates long responses and drops control characters, keeping non-ASCII text
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(char::is_control, "")
}

/// Successful ARM response
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: StatusCode,
    /// `Azure-AsyncOperation` header, if any
    pub async_operation: Option<String>,
    /// `Location` header, if any
    pub location: Option<String>,
    /// Parsed body, `Null` when empty
    pub body: Value,
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::user_agent())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request and return the parsed body
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        Ok(self.send(Method::GET, url, token, None).await?.body)
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<ArmResponse> {
        self.send(Method::POST, url, token, body).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("{} {} (request id {})", method, url, request_id);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(CLIENT_REQUEST_ID, &request_id);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(ArmError::from_response(status, &response_body).into());
        }

        // Handle empty response
        let body = if response_body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&response_body).context("Failed to parse response JSON")?
        };

        Ok(ArmResponse {
            status,
            async_operation: header_string(&headers, AZURE_ASYNC_OPERATION),
            location: header_string(&headers, LOCATION.as_str()),
            body,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
