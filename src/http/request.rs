//! Per-call request description and URL resolution.

use serde_json::Value;

/// HTTP verbs supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    /// Method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
        }
    }

    /// Whether a payload is sent with this verb.
    pub fn carries_body(&self) -> bool {
        !matches!(self, HttpVerb::Get)
    }
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpVerb> for reqwest::Method {
    fn from(verb: HttpVerb) -> Self {
        match verb {
            HttpVerb::Get => reqwest::Method::GET,
            HttpVerb::Post => reqwest::Method::POST,
            HttpVerb::Put => reqwest::Method::PUT,
            HttpVerb::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single request to dispatch. Built per call and dropped once the call completes.
///
/// A `null` payload means no body is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub verb: HttpVerb,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// Describes a call; the body is dropped for GET and when it is `null`.
    pub fn new(verb: HttpVerb, path: &str, body: Option<Value>) -> Self {
        let body = body.filter(|b| verb.carries_body() && !b.is_null());
        Self {
            verb,
            path: path.to_string(),
            body,
        }
    }
}

/// Returns true if `path` already names a full http(s) URL.
pub fn is_absolute_url(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolves `path` against `base_url`.
///
/// Absolute URLs pass through untouched. Otherwise slashes at the join are
/// collapsed to exactly one, and an empty path yields the base URL.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path)
}
