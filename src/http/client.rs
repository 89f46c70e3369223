//! HTTP client facade: one base URL, four verbs, one error type.

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use super::config::ClientConfig;
use super::dispatch::Dispatcher;
use super::error::{NormalizedError, RawFailure};
use super::request::{HttpVerb, RequestDescriptor};
use super::retry::RetryPolicy;
use super::transport::{ReqwestTransport, Transport, TransportResponse};

/// A successful response with its body decoded as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: T,
}

/// HTTP client bound to a single base URL, with retry of transient
/// failures. Every failure is reported as a [`NormalizedError`].
pub struct Client<T: Transport = ReqwestTransport> {
    dispatcher: Dispatcher<T>,
}

impl Client<ReqwestTransport> {
    /// Creates a client for `base_url`. No network I/O happens here.
    #[tracing::instrument(skip(headers))]
    pub fn new(
        base_url: &str,
        headers: Option<HashMap<String, String>>,
    ) -> Result<Self, NormalizedError> {
        let transport = ReqwestTransport::new().map_err(|e| unexpected(e.message))?;
        Self::with_transport(ClientConfig::new(base_url, headers), transport)
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over a caller-supplied transport, using the default retry policy.
    ///
    /// `config` is applied to every request regardless of the transport; an
    /// invalid header in it fails here rather than on the first call.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, NormalizedError> {
        config.validate().map_err(unexpected)?;

        debug!(
            "Client for {} with {} default header(s)",
            config.base_url,
            config.default_headers.len()
        );

        Ok(Self {
            dispatcher: Dispatcher::new(config, transport, RetryPolicy::default()),
        })
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.dispatcher.set_policy(policy);
        self
    }

    /// Base URL and default headers in effect.
    pub fn config(&self) -> &ClientConfig {
        self.dispatcher.config()
    }

    /// The base URL every path is resolved against.
    pub fn base_url(&self) -> &str {
        &self.config().base_url
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.dispatcher.policy()
    }

    /// The transport requests go through.
    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    #[tracing::instrument(skip(self))]
    pub async fn get<R>(&self, path: &str) -> Result<Response<R>, NormalizedError>
    where
        R: DeserializeOwned,
    {
        self.request::<R, ()>(HttpVerb::Get, path, None).await
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn post<R, B>(&self, path: &str, body: &B) -> Result<Response<R>, NormalizedError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpVerb::Post, path, Some(body)).await
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn put<R, B>(&self, path: &str, body: &B) -> Result<Response<R>, NormalizedError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpVerb::Put, path, Some(body)).await
    }

    /// Sends a DELETE. Pass `&()` to send no body.
    #[tracing::instrument(skip(self, body))]
    pub async fn del<R, B>(&self, path: &str, body: &B) -> Result<Response<R>, NormalizedError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpVerb::Delete, path, Some(body)).await
    }

    async fn request<R, B>(
        &self,
        verb: HttpVerb,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response<R>, NormalizedError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| unexpected(format!("Failed to serialize request body: {}", e)))?;

        let descriptor = RequestDescriptor::new(verb, path, body);
        let response = self.dispatcher.dispatch(&descriptor).await?;
        decode(response)
    }
}

/// Decodes a successful response body. An empty body decodes as JSON `null`.
fn decode<R>(response: TransportResponse) -> Result<Response<R>, NormalizedError>
where
    R: DeserializeOwned,
{
    let bytes: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &response.body
    };

    let data = serde_json::from_slice(bytes)
        .map_err(|e| unexpected(format!("Failed to parse JSON response: {}", e)))?;

    Ok(Response {
        status: response.status,
        headers: response.headers,
        data,
    })
}

fn unexpected(message: String) -> NormalizedError {
    NormalizedError::from(RawFailure::Unexpected { message })
}
