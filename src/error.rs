//! Error types for HTTP calls.
//!
//! Every failure is carried as a value through the `Result` channel, never as
//! a panic. The taxonomy separates transport-level failures ([`Error::Network`],
//! [`Error::Timeout`], [`Error::Aborted`]) from HTTP-status failures
//! ([`Error::Status`]), which keep the full response envelope for inspection.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

use crate::rate_limit::RateLimitInfo;

/// Status codes retried by default: request timeout, too-many-requests, and
/// the transient 5xx family.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// The main error type.
///
/// Unlike a wrapped transport exception, this is a plain tagged value: it is
/// `Clone`, so a single failed in-flight request can be handed to every
/// caller that attached to it.
///
/// # Examples
///
/// ```no_run
/// use refetch::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint").await {
///     Ok(response) => println!("{:?}", response.data),
///     Err(Error::Status { status, body, .. }) => {
///         eprintln!("HTTP {status}: {body}");
///     }
///     Err(Error::Timeout) => eprintln!("timed out"),
///     Err(e) => eprintln!("{e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The transport could not complete the call: connection refused, DNS
    /// failure, broken socket. The underlying error is classified at the
    /// transport boundary and carried as text.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// A shared in-flight request was abandoned before it settled, so the
    /// waiters never received a result.
    #[error("request aborted")]
    Aborted,

    /// The server answered with a status outside `[200, 300)`.
    ///
    /// A status code alone never implies success: 4xx, 5xx and also 3xx
    /// responses (including `304 Not Modified` on a conditional request)
    /// arrive through this variant, with the body and headers intact.
    #[error("HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: StatusCode,
        /// The raw response body.
        body: String,
        /// The response headers.
        headers: HeaderMap,
        /// Rate limit information parsed from the headers, when present.
        rate_limit: Option<RateLimitInfo>,
    },

    /// The response body did not deserialize into the requested type.
    #[error("failed to deserialize response (status {status}): {message}")]
    Deserialization {
        /// The raw response body that failed to parse.
        body: String,
        /// The serde error message.
        message: String,
        /// The HTTP status code of the response.
        status: StatusCode,
    },

    /// The request body could not be serialized to JSON.
    #[error("failed to serialize request: {0}")]
    Serialization(String),

    /// The client or request was misconfigured (bad header, missing base
    /// URL, invalid timeout).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Classifies a transport-level failure from the underlying HTTP stack.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(error.to_string())
        }
    }

    /// Returns `true` if this error is worth retrying.
    ///
    /// Network errors, timeouts, and statuses in
    /// [`DEFAULT_RETRYABLE_STATUSES`] are retryable. Other 4xx statuses,
    /// serialization problems and configuration mistakes are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch::Error;
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let err = Error::Status {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     body: String::new(),
    ///     headers: HeaderMap::new(),
    ///     rate_limit: None,
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Status {
    ///     status: StatusCode::BAD_REQUEST,
    ///     body: String::new(),
    ///     headers: HeaderMap::new(),
    ///     rate_limit: None,
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::Status { status, .. } => {
                DEFAULT_RETRYABLE_STATUSES.contains(&status.as_u16())
            }
            Error::Aborted
            | Error::Deserialization { .. }
            | Error::Serialization(_)
            | Error::Configuration(_)
            | Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Deserialization { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body, if this error carries one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Status { body, .. } => Some(body),
            Error::Deserialization { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns rate limit information parsed from the failing response.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::Status { rate_limit, .. } => rate_limit.as_ref(),
            _ => None,
        }
    }

    /// Returns the server-indicated retry delay, capped at `max_wait`.
    pub fn rate_limit_delay(&self, max_wait: Duration) -> Option<Duration> {
        self.rate_limit_info()?.delay(max_wait)
    }
}

/// A specialized `Result` for HTTP calls.
pub type Result<T> = std::result::Result<T, Error>;
