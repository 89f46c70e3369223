//! Failure classification and the single error shape exposed to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Identifier used when the upstream did not supply one.
pub const UNKNOWN_ERROR: &str = "UnknownError";

/// A failure captured while a call is in flight, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// No response was received (connection refused, timeout, DNS, ...).
    Transport { message: String, request: String },
    /// The upstream answered with a non-success status.
    Response {
        status: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    },
    /// Local failure with neither a response nor a request to report.
    Unexpected { message: String },
}

impl RawFailure {
    /// Upstream status, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            RawFailure::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The failure's own description, used when the upstream body carries no message.
    pub fn message(&self) -> String {
        match self {
            RawFailure::Transport { message, .. } | RawFailure::Unexpected { message } => {
                message.clone()
            }
            RawFailure::Response { status, .. } => {
                format!("Request failed with status code {}", status)
            }
        }
    }
}

impl std::fmt::Display for RawFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawFailure::Transport { message, request } => {
                write!(f, "transport failure on {}: {}", request, message)
            }
            RawFailure::Response { status, .. } => write!(f, "HTTP {}", status),
            RawFailure::Unexpected { message } => write!(f, "unexpected failure: {}", message),
        }
    }
}

/// The only error type returned by [`Client`](super::Client) operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    pub status_code: u16,
    pub error_identifier: String,
    pub message: String,
    pub details: String,
}

impl std::fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.error_identifier, self.status_code, self.message
        )?;
        if !self.details.is_empty() {
            write!(f, " [{}]", self.details)?;
        }
        Ok(())
    }
}

impl std::error::Error for NormalizedError {}

impl From<RawFailure> for NormalizedError {
    fn from(failure: RawFailure) -> Self {
        normalize(&failure)
    }
}

/// Maps any raw failure to a fully populated [`NormalizedError`].
pub fn normalize(failure: &RawFailure) -> NormalizedError {
    match failure {
        RawFailure::Response { status, body, .. } => {
            let parsed: Option<Value> = serde_json::from_slice(body).ok();
            let field = |name: &str| parsed.as_ref().and_then(|v| present_field(v, name));

            NormalizedError {
                status_code: *status,
                error_identifier: field("errorIdentifier")
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
                message: field("message").unwrap_or_else(|| failure.message()),
                details: field("details").unwrap_or_default(),
            }
        }
        RawFailure::Transport { message, request } => NormalizedError {
            status_code: 500,
            error_identifier: UNKNOWN_ERROR.to_string(),
            message: format!("Something went wrong with the request: {}", message),
            details: format!("Request Information: {}", request),
        },
        RawFailure::Unexpected { message } => NormalizedError {
            status_code: 500,
            error_identifier: UNKNOWN_ERROR.to_string(),
            message: format!("Something went wrong: {}", message),
            details: String::new(),
        },
    }
}

/// Reads `name` from a JSON object when the value is truthy.
/// Strings are returned as-is, anything else as compact JSON.
fn present_field(body: &Value, name: &str) -> Option<String> {
    let value = body.as_object()?.get(name)?;
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
