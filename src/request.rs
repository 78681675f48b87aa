//! Request descriptors.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Everything needed to issue one logical HTTP request.
///
/// A `RequestConfig` is constructed per call and treated as immutable input:
/// the client resolves `path` against its base URL, merges `headers` over the
/// client defaults, and applies the per-request `timeout` and `retry_policy`
/// overrides when present.
///
/// Interceptors receive and return values of this type, so a registered
/// [`RequestInterceptor`](crate::RequestInterceptor) can rewrite any part of
/// a request before it reaches the wire.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, relative to the client's base URL.
    pub path: String,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters for this request.
    pub query_params: HashMap<String, String>,

    /// Optional JSON body. Serialized with `Content-Type: application/json`.
    pub body: Option<serde_json::Value>,

    /// Per-request timeout, overriding the client default.
    pub timeout: Option<Duration>,

    /// Per-request retry policy, overriding the client default.
    pub retry_policy: Option<RetryPolicy>,
}

impl RequestConfig {
    /// Creates a new `RequestConfig` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: HashMap::new(),
            body: None,
            timeout: None,
            retry_policy: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Attaches a JSON body, serializing the given value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, crate::Error> {
        let value = serde_json::to_value(body)
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Overrides the client's timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the client's retry policy for this request.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}
