//! # refetch - a resilient HTTP client
//!
//! `refetch` is a retry-aware HTTP client library built on top of `reqwest`
//! for read-heavy API consumers. Beyond bounded exponential-backoff retries
//! it coalesces identical concurrent GETs into a single network call, tracks
//! `ETag` validators to issue conditional requests, and exposes interceptor
//! chains for cross-cutting concerns like authentication.
//!
//! ## Quick Start
//!
//! ```no_run
//! use refetch::{Client, RetryPolicy};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreatePost {
//!     text: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Post {
//!     id: u64,
//!     text: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), refetch::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .retry_policy(RetryPolicy::ExponentialBackoff {
//!             base_delay: Duration::from_secs(1),
//!             max_delay: Duration::from_secs(30),
//!             max_attempts: 3,
//!             jitter: true,
//!         })
//!         .build()?;
//!
//!     // GET with automatic retries, coalescing, and conditional headers.
//!     let post = client.get::<Post>("/posts/123").await?;
//!     println!("{}", post.data.text);
//!
//!     // POST requests never coalesce and never carry conditional headers.
//!     let created = client
//!         .post::<_, Post>("/posts", &CreatePost { text: "hi".into() })
//!         .await?;
//!     println!("created {}", created.data.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## What the pipeline does
//!
//! - **Retries**: transient failures (network errors, timeouts, 408/429 and
//!   the 5xx family) retry with exponential backoff plus jitter, up to a
//!   total attempt ceiling. Everything else surfaces immediately, unchanged.
//! - **Coalescing**: concurrent GETs with the same method, URL, and query
//!   parameters share one in-flight network call; every caller receives the
//!   same settled result. Mutating requests always execute individually.
//! - **Conditional requests**: a GET response carrying `ETag` populates a
//!   per-URL cache; the next GET to that URL carries `If-None-Match`, letting
//!   the server answer `304 Not Modified`. The 304 surfaces as
//!   [`Error::Status`] for the caller (or a response interceptor) to map back
//!   to its cached payload.
//! - **Interceptors**: ordered request and response chains with success and
//!   error channels, for auth-header injection, refresh-on-401, logging.
//!
//! ## Error handling
//!
//! All failures are values of the [`Error`] enum; the response body and
//! headers stay available on HTTP-status errors:
//!
//! ```no_run
//! use refetch::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get::<serde_json::Value>("/endpoint").await {
//!     Ok(response) => println!("{:?}", response.data),
//!     Err(Error::Status { status, body, .. }) => {
//!         eprintln!("HTTP {status}: {body}");
//!     }
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retrying things that aren't HTTP
//!
//! The [`backoff`] module exposes the retry loop on its own for arbitrary
//! async operations:
//!
//! ```no_run
//! use refetch::backoff::{retry_with_backoff, RetryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), refetch::Error> {
//! let value = retry_with_backoff(
//!     || async { read_replica().await },
//!     &RetryOptions::new().max_retries(3).initial_delay(Duration::from_millis(100)),
//! )
//! .await?;
//! # Ok(())
//! # }
//! # async fn read_replica() -> refetch::Result<String> { Ok(String::new()) }
//! ```

pub mod backoff;
mod cache;
mod client;
mod dedup;
mod error;
mod interceptor;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
mod util;

pub use backoff::{make_retryable, retry_fixed, retry_request, retry_with_backoff, RetryOptions};
pub use cache::EtagCache;
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result, DEFAULT_RETRYABLE_STATUSES};
pub use interceptor::{InterceptorHandle, RequestInterceptor, ResponseInterceptor};
pub use request::RequestConfig;
pub use response::{HttpResponse, Response};
pub use retry::{RetryPolicy, RetryPredicate};
