pub mod http;

pub use http::{Client, ClientConfig, NormalizedError, Response, RetryPolicy};
