//! ARM error types
//!
//! Azure Resource Manager reports failures with a JSON envelope of the form
//! `{"error": {"code": "...", "message": "..."}}`. [`ArmError`] keeps the
//! HTTP status next to those two fields so callers can downcast an
//! `anyhow::Error` and branch on it.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// A failed ARM request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ARM request failed ({status}){}: {message}", code_suffix(.code))]
pub struct ArmError {
    pub status: StatusCode,
    pub code: Option<String>,
    pub message: String,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ArmError {
    /// Build an error from a non-success response body.
    ///
    /// Bodies that are not an ARM error envelope still produce an error; the
    /// message then falls back to the canonical reason of the status code.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let (code, message) = match parsed {
            Some(envelope) => (envelope.error.code, envelope.error.message),
            None => (None, None),
        };

        Self {
            status,
            code,
            message: message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            }),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Maximum length of a non-ARM error rendered by [`format_arm_error`]
const MAX_HINT_LENGTH: usize = 120;

/// Render a short operator hint for an error.
///
/// Only meant for log lines: the error handed back to callers is never
/// replaced by this text.
pub fn format_arm_error(error: &anyhow::Error) -> String {
    let Some(arm) = error.chain().find_map(|e| e.downcast_ref::<ArmError>()) else {
        let text = format!("{:#}", error);
        return match text.char_indices().nth(MAX_HINT_LENGTH) {
            Some((end, _)) => format!("{}...", &text[..end]),
            None => text,
        };
    };

    match arm.status.as_u16() {
        401 => "Authentication failed. Check AZURE_TENANT_ID/AZURE_CLIENT_ID/AZURE_CLIENT_SECRET or run 'az login'.".to_string(),
        403 => "Permission denied. The identity needs a Contributor or Fabric role on the capacity.".to_string(),
        404 => "Capacity not found. Check the subscription, resource group and capacity name.".to_string(),
        409 => "Conflict. The capacity may already be in the requested state or another operation is running.".to_string(),
        429 => "Rate limit exceeded. Please try again later.".to_string(),
        400 => "Invalid request. Check your parameters.".to_string(),
        500..=599 => "Azure Resource Manager temporarily unavailable. Please try again.".to_string(),
        _ => match &arm.code {
            Some(code) => format!("Request failed with code {}", code),
            None => "Request failed.".to_string(),
        },
    }
}
