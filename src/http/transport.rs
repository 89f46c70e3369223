//! Transport seam between the dispatcher and the network.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;

use super::config::ClientConfig;
use super::request::{HttpVerb, RequestDescriptor, resolve_url};

/// A request with its URL resolved and default headers attached, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub verb: HttpVerb,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportRequest {
    /// Resolves `request` against the base URL and headers in `config`.
    pub fn new(config: &ClientConfig, request: &RequestDescriptor) -> Self {
        Self {
            verb: request.verb,
            url: resolve_url(&config.base_url, &request.path),
            headers: config
                .sorted_headers()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: request.body.clone(),
        }
    }

    /// `VERB url`, as reported in logs.
    pub fn describe(&self) -> String {
        format!("{} {}", self.verb, self.url)
    }
}

/// Status, headers and raw body of a response, whatever its status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failure where no response was obtained.
///
/// `request` carries a description of the request when one had been built
/// before the failure; it is `None` for purely local failures.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    pub message: String,
    pub request: Option<String>,
}

impl TransportError {
    /// Failure after the request was built, e.g. connection refused or timeout.
    pub fn request(message: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request: Some(request.into()),
        }
    }

    /// Failure before any request existed.
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request: None,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.request {
            Some(request) => write!(f, "{} ({})", self.message, request),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Performs a single request. Retrying and status classification are left to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport over a fresh reqwest client.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::local(error_chain(&e)))?;
        Ok(Self::with_client(client))
    }

    /// Wraps an already configured reqwest client, e.g. one with a timeout.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(verb = %request.verb, url = %request.url))]
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::local(format!("Invalid URL {:?}: {}", request.url, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::local(format!("Invalid header name {:?}: {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::local(format!("Invalid value for header {:?}: {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let context = format!("{} {}", request.verb, url);
        debug!("Sending {}...", context);

        let mut builder = self
            .client
            .request(request.verb.into(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::request(error_chain(&e), context.as_str()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::request(error_chain(&e), context.as_str()))?;

        debug!("{} -> {} ({} bytes)", context, status, body.len());

        Ok(TransportResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Joins an error and its sources, so "error sending request" keeps its root cause.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
