//! HTTP client facade with retry of transient failures and a single
//! normalized error shape.
//!
//! # Structure
//!
//! - `client` - [`Client`] and its GET/POST/PUT/DELETE surface
//! - `config` - base URL and default headers
//! - `dispatch` - the retry loop around a single transport call
//! - `error` - raw failure classification and [`normalize`]
//! - `request` - verbs, per-call descriptors and URL resolution
//! - `retry` - the retry policy (statuses, attempt budget, backoff)
//! - `transport` - resolved [`TransportRequest`]s, the [`Transport`] seam and its
//!   reqwest implementation

mod client;
mod config;
mod dispatch;
mod error;
mod request;
mod retry;
mod transport;

pub use client::{Client, Response};
pub use config::ClientConfig;
pub use dispatch::Dispatcher;
pub use error::{NormalizedError, RawFailure, UNKNOWN_ERROR, normalize};
pub use request::{HttpVerb, RequestDescriptor, resolve_url};
pub use retry::{MAX_RETRIES, MAX_RETRY_LIMIT, RETRY_BASE_DELAY_MS, RETRYABLE_STATUSES, RetryPolicy};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
