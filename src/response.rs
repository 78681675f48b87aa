//! Response envelopes.
//!
//! [`HttpResponse`] is the untyped envelope produced by
//! [`Client::request`](crate::Client::request): status, headers, and the raw
//! body, plus timing and attempt metadata. The typed convenience methods
//! (`get`, `post`, ...) parse it into a [`Response<T>`], which keeps the raw
//! body around for debugging.

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{Error, Result};

/// A successful (2xx) HTTP response, untyped.
///
/// The envelope is `Clone`: when several concurrent GET requests are coalesced
/// into one network call, each caller receives its own copy of the settled
/// envelope.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw response body.
    pub body: String,

    /// Total latency including all retry attempts.
    pub latency: Duration,

    /// Attempts made to produce this response; `1` means no retries.
    pub attempts: usize,
}

impl HttpResponse {
    /// Deserializes the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialization`] with the raw body preserved.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| Error::Deserialization {
            body: self.body.clone(),
            message: e.to_string(),
            status: self.status,
        })
    }

    /// Returns a header value by name, when present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

/// A typed wrapper around a successful HTTP response.
///
/// Pairs the deserialized `data` with the transaction metadata, including the
/// raw body for when a response needs to be inspected after the fact.
///
/// # Examples
///
/// ```no_run
/// use refetch::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), refetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get::<User>("/users/123").await?;
/// println!("user: {}", response.data.name);
/// println!("took {:?} over {} attempt(s)", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body.
    pub raw_body: String,

    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Total latency including all retry attempts.
    pub latency: Duration,

    /// Attempts made; `1` for a first-try success.
    pub attempts: usize,
}

impl<T: DeserializeOwned> Response<T> {
    /// Parses a typed response out of an untyped envelope.
    pub(crate) fn from_envelope(envelope: HttpResponse) -> Result<Self> {
        let data = envelope.json()?;
        Ok(Self {
            data,
            raw_body: envelope.body,
            status: envelope.status,
            headers: envelope.headers,
            latency: envelope.latency,
            attempts: envelope.attempts,
        })
    }
}

impl<T> Response<T> {
    /// Maps the response data to a different type, preserving the metadata.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, when present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
