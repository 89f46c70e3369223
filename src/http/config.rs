//! Client configuration: the base URL and the headers sent with every request.

use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashMap;

/// Fixed settings of a [`Client`](super::Client). This is the only place the
/// base URL and default headers live; every request is resolved against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub default_headers: HashMap<String, String>,
}

impl ClientConfig {
    /// Creates a configuration. Headers default to none.
    pub fn new(base_url: &str, default_headers: Option<HashMap<String, String>>) -> Self {
        Self {
            base_url: base_url.to_string(),
            default_headers: default_headers.unwrap_or_default(),
        }
    }

    /// Default headers ordered by name.
    pub fn sorted_headers(&self) -> Vec<(&str, &str)> {
        let mut headers: Vec<_> = self
            .default_headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        headers.sort_unstable();
        headers
    }

    /// Checks that every default header can be sent.
    ///
    /// Header names are case-insensitive, so two names that differ only by
    /// case are rejected rather than letting one silently replace the other.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: HashMap<HeaderName, &str> = HashMap::new();

        for (name, value) in self.sorted_headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("Invalid header name {:?}: {}", name, e))?;
            HeaderValue::from_str(value)
                .map_err(|e| format!("Invalid value for header {:?}: {}", name, e))?;

            if let Some(previous) = seen.insert(header_name, name) {
                return Err(format!(
                    "Duplicate header {:?} and {:?}: header names are case-insensitive",
                    previous, name
                ));
            }
        }

        Ok(())
    }
}
