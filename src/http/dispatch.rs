//! Request dispatch with retry of transient upstream failures.

use log::{debug, warn};

use super::config::ClientConfig;
use super::error::{NormalizedError, RawFailure};
use super::request::RequestDescriptor;
use super::retry::RetryPolicy;
use super::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// Runs requests through a [`Transport`], retrying per its [`RetryPolicy`]
/// and normalizing whatever failure ends the call.
///
/// Requests are resolved against the dispatcher's [`ClientConfig`] before
/// they reach the transport.
pub struct Dispatcher<T: Transport> {
    config: ClientConfig,
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher sending requests for `config` through `transport`.
    pub fn new(config: ClientConfig, transport: T, policy: RetryPolicy) -> Self {
        Self {
            config,
            transport,
            policy,
        }
    }

    /// Base URL and default headers applied to every request.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub(crate) fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Dispatches `request`, returning the first successful response.
    #[tracing::instrument(skip(self, request), fields(verb = %request.verb, path = %request.path))]
    pub async fn dispatch(
        &self,
        request: &RequestDescriptor,
    ) -> Result<TransportResponse, NormalizedError> {
        self.dispatch_raw(request).await.map_err(|failure| {
            debug!("{} {} failed: {}", request.verb, request.path, failure);
            NormalizedError::from(failure)
        })
    }

    /// The retry loop; terminal failures are returned unnormalized.
    pub async fn dispatch_raw(
        &self,
        request: &RequestDescriptor,
    ) -> Result<TransportResponse, RawFailure> {
        let outgoing = TransportRequest::new(&self.config, request);
        let max_retries = self.policy.max_retries();
        let mut last_failure = None;

        debug!("Dispatching {}...", outgoing.describe());

        for attempt in 0..=max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }

            match self.attempt(&outgoing).await {
                Ok(response) => return Ok(response),
                Err(failure) => {
                    if !self.policy.should_retry(&failure) {
                        return Err(failure);
                    }

                    if attempt < max_retries {
                        warn!(
                            "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                            outgoing.describe(),
                            attempt + 1,
                            max_retries + 1,
                            failure,
                            self.policy.delay_for(attempt + 1).as_millis()
                        );
                    }
                    last_failure = Some(failure);
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| RawFailure::Unexpected {
            message: format!(
                "{}: failed after {} attempts",
                outgoing.describe(),
                max_retries + 1
            ),
        }))
    }

    /// One transport call, with non-success statuses turned into failures.
    async fn attempt(&self, request: &TransportRequest) -> Result<TransportResponse, RawFailure> {
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(RawFailure::Response {
                status: response.status,
                headers: response.headers,
                body: response.body,
            }),
            Err(TransportError {
                message,
                request: Some(request),
            }) => Err(RawFailure::Transport { message, request }),
            Err(TransportError {
                message,
                request: None,
            }) => Err(RawFailure::Unexpected { message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::HttpVerb;
    use crate::http::transport::MockTransport;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    const BASE_URL: &str = "https://api.example.com";

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            headers: Default::default(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    fn dispatcher(transport: MockTransport, policy: RetryPolicy) -> Dispatcher<MockTransport> {
        Dispatcher::new(ClientConfig::new(BASE_URL, None), transport, policy)
    }

    fn get(path: &str) -> RequestDescriptor {
        RequestDescriptor::new(HttpVerb::Get, path, None)
    }

    /// Transport that fails with `status` for the first `failures` calls, then answers 200.
    fn flaky_transport(status: u16, failures: usize, expected_calls: usize) -> MockTransport {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport
            .expect_send()
            .times(expected_calls)
            .returning(move |_| {
                calls += 1;
                if calls <= failures {
                    Ok(response(status, ""))
                } else {
                    Ok(response(200, r#"{"id":1}"#))
                }
            });
        transport
    }

    #[test_log::test(tokio::test)]
    async fn test_dispatch_retries_429_then_succeeds() {
        let dispatcher = dispatcher(flaky_transport(429, 3, 4), fast_policy());
        let result = dispatcher.dispatch(&get("/widgets")).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.body, br#"{"id":1}"#.to_vec());
    }

    #[tokio::test]
    async fn test_dispatch_retries_501_then_succeeds() {
        let dispatcher = dispatcher(flaky_transport(501, 3, 4), fast_policy());
        let result = dispatcher.dispatch(&get("/widgets")).await.unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn test_dispatch_success_short_circuits() {
        let dispatcher = dispatcher(flaky_transport(429, 1, 2), fast_policy());
        assert!(dispatcher.dispatch(&get("/widgets")).await.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_resolves_request_against_config() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.url == "https://api.example.com/widgets"
                    && req.headers == vec![("x-api-key".to_string(), "secret".to_string())]
            })
            .times(1)
            .returning(|_| Ok(response(200, "{}")));

        let headers = HashMap::from([("x-api-key".to_string(), "secret".to_string())]);
        let config = ClientConfig::new(BASE_URL, Some(headers));
        let dispatcher = Dispatcher::new(config, transport, fast_policy());

        assert!(dispatcher.dispatch(&get("/widgets")).await.is_ok());
        assert_eq!(dispatcher.config().base_url, BASE_URL);
    }

    #[tokio::test]
    async fn test_dispatch_exhausts_retries() {
        let dispatcher = dispatcher(flaky_transport(429, usize::MAX, 4), fast_policy());
        let err = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();
        assert_eq!(err.status_code, 429);
        assert_eq!(err.error_identifier, "UnknownError");
        assert_eq!(err.message, "Request failed with status code 429");
    }

    #[tokio::test]
    async fn test_dispatch_honors_larger_retry_budget() {
        let policy = fast_policy().with_max_retries(5);
        let dispatcher = dispatcher(flaky_transport(501, 5, 6), policy);
        assert!(dispatcher.dispatch(&get("/widgets")).await.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_non_retryable_status_fails_once() {
        for status in [400, 401, 404, 500, 502, 503] {
            let dispatcher = dispatcher(flaky_transport(status, usize::MAX, 1), fast_policy());
            let err = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();
            assert_eq!(err.status_code, status);
        }
    }

    #[tokio::test]
    async fn test_dispatch_transport_failure_is_not_retried() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Err(TransportError::request(
                "operation timed out",
                "GET https://api.example.com/widgets",
            ))
        });

        let dispatcher = dispatcher(transport, fast_policy());
        let err = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();

        assert_eq!(err.status_code, 500);
        assert_eq!(
            err.message,
            "Something went wrong with the request: operation timed out"
        );
        assert_eq!(
            err.details,
            "Request Information: GET https://api.example.com/widgets"
        );
    }

    #[tokio::test]
    async fn test_dispatch_local_failure_is_unexpected() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::local("Invalid URL")));

        let dispatcher = dispatcher(transport, fast_policy());
        let err = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();

        assert_eq!(err.status_code, 500);
        assert_eq!(err.message, "Something went wrong: Invalid URL");
        assert_eq!(err.details, "");
    }

    #[tokio::test]
    async fn test_dispatch_raw_keeps_last_failure() {
        let dispatcher = dispatcher(flaky_transport(501, usize::MAX, 4), fast_policy());
        let failure = dispatcher.dispatch_raw(&get("/widgets")).await.unwrap_err();
        assert_eq!(failure.status(), Some(501));
    }

    #[tokio::test]
    async fn test_dispatch_with_no_retries() {
        let dispatcher = dispatcher(flaky_transport(429, usize::MAX, 1), RetryPolicy::none());
        let err = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();
        assert_eq!(err.status_code, 429);
    }

    #[tokio::test]
    async fn test_dispatch_backs_off_between_attempts() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(5));
        let dispatcher = dispatcher(flaky_transport(429, 3, 4), policy);

        let start = Instant::now();
        dispatcher.dispatch(&get("/widgets")).await.unwrap();

        // 10ms + 20ms + 40ms
        assert!(start.elapsed() >= Duration::from_millis(70));
    }

    #[tokio::test]
    async fn test_dispatch_identical_failures_are_identical() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(2)
            .returning(|_| Ok(response(404, r#"{"message":"not found"}"#)));

        let dispatcher = dispatcher(transport, fast_policy());
        let first = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();
        let second = dispatcher.dispatch(&get("/widgets")).await.unwrap_err();
        assert_eq!(first, second);
    }
}
