//! HTTP client with retry logic, request coalescing, and conditional caching.
//!
//! The [`Client`] type is the main entry point. Use [`ClientBuilder`] to
//! configure and create clients.
//!
//! A request travels through the request-interceptor chain, then the
//! deduplication layer (GET only), then the retry loop around single
//! transport attempts (with `If-None-Match` injection and `ETag` capture),
//! and finally back through the response-interceptor chain.

use crate::{
    cache::EtagCache,
    dedup::{canonical_key, Flight, InflightMap},
    interceptor::{
        run_request_chain, run_response_chain, InterceptorHandle, InterceptorRegistry,
        RequestInterceptor, ResponseInterceptor,
    },
    rate_limit::{RateLimitConfig, RateLimitInfo},
    request::RequestConfig,
    retry::{RetryOnRetryable, RetryPolicy, RetryPredicate},
    Error, HttpResponse, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client with automatic retries, coalescing of identical concurrent
/// GETs, and ETag-based conditional requests.
///
/// The client is cheap to clone and designed to be shared: clones use the
/// same connection pool, in-flight request map, ETag cache, and interceptor
/// chains.
///
/// # Examples
///
/// ```no_run
/// use refetch::{Client, RetryPolicy};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Feed {
///     posts: Vec<String>,
/// }
///
/// # async fn example() -> Result<(), refetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::ExponentialBackoff {
///         base_delay: Duration::from_secs(1),
///         max_delay: Duration::from_secs(30),
///         max_attempts: 3,
///         jitter: true,
///     })
///     .build()?;
///
/// // Identical concurrent GETs share one network call.
/// let (a, b) = tokio::join!(
///     client.get::<Feed>("/feed"),
///     client.get::<Feed>("/feed"),
/// );
/// let (a, b) = (a?, b?);
/// println!("{} + {} posts", a.data.posts.len(), b.data.posts.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    retry_predicate: Box<dyn RetryPredicate>,
    timeout: Option<Duration>,
    rate_limit_config: RateLimitConfig,
    deduplication: bool,
    conditional_requests: bool,
    inflight: InflightMap,
    etags: EtagCache,
    request_interceptors: InterceptorRegistry<dyn RequestInterceptor>,
    response_interceptors: InterceptorRegistry<dyn ResponseInterceptor>,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Issues a request described by `config` and returns the untyped
    /// envelope.
    ///
    /// This is the full pipeline: the request-interceptor chain may rewrite
    /// (or reject) the config; GETs are coalesced with identical in-flight
    /// GETs; each transport attempt carries `If-None-Match` when an ETag is
    /// cached for the URL; failures are retried per the client's policy; the
    /// response-interceptor chain sees the outcome last, error path included.
    ///
    /// Any status outside `[200, 300)`, including `304 Not Modified`,
    /// surfaces as [`Error::Status`].
    pub async fn request(&self, config: RequestConfig) -> Result<HttpResponse> {
        let chain = self.inner.request_interceptors.snapshot();
        let outcome = match run_request_chain(&chain, config) {
            Ok(config) => self.dispatch(config).await,
            Err(error) => Err(error),
        };
        run_response_chain(&self.inner.response_interceptors.snapshot(), outcome)
    }

    /// Routes a request through the deduplication layer when eligible.
    ///
    /// Only GET coalesces; mutating methods always execute, even when
    /// byte-identical requests are in flight.
    async fn dispatch(&self, config: RequestConfig) -> Result<HttpResponse> {
        if config.method != Method::GET || !self.inner.deduplication {
            return self.execute_with_retry(&config).await;
        }

        let url = self.resolve_url(&config);
        let key = canonical_key(&config.method, &url);

        match self.inner.inflight.join_or_lead(&key) {
            Flight::Follow(rx) => {
                tracing::debug!(url = %url, "attaching to in-flight request");
                InflightMap::wait(rx).await
            }
            Flight::Lead(tx, rx) => {
                // The shared execution is detached so that a caller dropping
                // its own future cannot cancel the call for other waiters.
                let client = self.clone();
                tokio::spawn(async move {
                    let result = client.execute_with_retry(&config).await;
                    client.inner.inflight.settle(&key, &tx, result);
                });
                InflightMap::wait(rx).await
            }
        }
    }

    /// The bounded retry loop around single transport attempts.
    ///
    /// Retries run strictly sequentially. The attempt ceiling comes from the
    /// policy and holds even when the server names its own wait; when it is
    /// reached, the last error propagates unchanged.
    async fn execute_with_retry(&self, config: &RequestConfig) -> Result<HttpResponse> {
        let policy = config
            .retry_policy
            .as_ref()
            .unwrap_or(&self.inner.retry_policy);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.execute_once(config, attempt, start).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        attempt,
                        method = %config.method,
                        path = %config.path,
                        "request failed"
                    );

                    if !self.inner.retry_predicate.should_retry(&error, attempt) {
                        return Err(error);
                    }

                    let Some(policy_delay) = policy.delay_for_attempt(attempt) else {
                        return Err(error);
                    };

                    let rate_limit_delay = if self.inner.rate_limit_config.enabled {
                        error.rate_limit_delay(self.inner.rate_limit_config.max_wait)
                    } else {
                        None
                    };

                    let delay = match rate_limit_delay {
                        Some(wait) => {
                            tracing::info!(
                                delay_ms = wait.as_millis() as u64,
                                attempt,
                                "rate limited, honoring server-indicated wait"
                            );
                            wait
                        }
                        None => {
                            tracing::info!(
                                delay_ms = policy_delay.as_millis() as u64,
                                attempt,
                                "retrying request after delay"
                            );
                            policy_delay
                        }
                    };

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Executes exactly one transport attempt and normalizes the outcome.
    async fn execute_once(
        &self,
        config: &RequestConfig,
        attempt: usize,
        start: Instant,
    ) -> Result<HttpResponse> {
        let url = self.resolve_url(config);
        let is_get = config.method == Method::GET;

        tracing::debug!(
            method = %config.method,
            url = %url,
            attempt,
            "executing HTTP request"
        );

        let mut request = self
            .inner
            .http_client
            .request(config.method.clone(), url.clone());

        for (name, value) in &self.inner.default_headers {
            request = request.header(name, value);
        }
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }

        // Conditional-request plumbing is GET-only in both directions.
        if is_get && self.inner.conditional_requests {
            if let Some(etag) = self.inner.etags.if_none_match(url.as_str()) {
                request = request.header(http::header::IF_NONE_MATCH, etag);
            }
        }

        if let Some(timeout) = config.timeout.or(self.inner.timeout) {
            request = request.timeout(timeout);
        }

        if let Some(body) = &config.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Error::from_transport)?;

        let status = response.status();
        let headers = response.headers().clone();

        if is_get && self.inner.conditional_requests {
            self.inner.etags.record(url.as_str(), &headers);
        }

        let body = response.text().await.map_err(Error::from_transport)?;
        let latency = start.elapsed();

        if !status.is_success() {
            let rate_limit = if self.inner.rate_limit_config.enabled {
                let info = RateLimitInfo::from_headers(&headers);
                info.is_rate_limited().then_some(info)
            } else {
                None
            };

            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), body = %body, "client error response");
            } else {
                tracing::warn!(status = status.as_u16(), body = %body, "non-success response");
            }

            return Err(Error::Status {
                status,
                body,
                headers,
                rate_limit,
            });
        }

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            attempt,
            "received HTTP response"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
            latency,
            attempts: attempt,
        })
    }

    fn resolve_url(&self, config: &RequestConfig) -> Url {
        let mut url = self.inner.base_url.clone();
        // A query embedded in the path string ("/comments?postId=1") must not
        // be percent-encoded into the path.
        match config.path.split_once('?') {
            Some((path, query)) => {
                url.set_path(path);
                url.set_query(Some(query));
            }
            None => url.set_path(&config.path),
        }
        for (key, value) in &config.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }
        url
    }

    /// Registers a request interceptor; it runs after all previously
    /// registered ones. Returns the handle used to remove it.
    pub fn add_request_interceptor(
        &self,
        interceptor: impl RequestInterceptor + 'static,
    ) -> InterceptorHandle {
        self.inner.request_interceptors.add(Arc::new(interceptor))
    }

    /// Removes a request interceptor. Unknown or already-removed handles are
    /// ignored.
    pub fn remove_request_interceptor(&self, handle: InterceptorHandle) {
        self.inner.request_interceptors.remove(handle);
    }

    /// Registers a response interceptor; it runs after all previously
    /// registered ones, on both the success and the error path.
    pub fn add_response_interceptor(
        &self,
        interceptor: impl ResponseInterceptor + 'static,
    ) -> InterceptorHandle {
        self.inner.response_interceptors.add(Arc::new(interceptor))
    }

    /// Removes a response interceptor. Unknown or already-removed handles are
    /// ignored.
    pub fn remove_response_interceptor(&self, handle: InterceptorHandle) {
        self.inner.response_interceptors.remove(handle);
    }

    /// Drops every cached ETag validator.
    pub fn clear_etag_cache(&self) {
        self.inner.etags.clear();
    }

    /// Makes a GET request and deserializes the response body.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refetch::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), refetch::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user = client.get::<User>("/users/123").await?;
    /// println!("user: {}", user.data.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let envelope = self.request(RequestConfig::new(Method::GET, path)).await?;
        Response::from_envelope(envelope)
    }

    /// Makes a POST request with a JSON body and deserializes the response.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::POST, path).with_json(body)?;
        Response::from_envelope(self.request(config).await?)
    }

    /// Makes a PUT request with a JSON body and deserializes the response.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::PUT, path).with_json(body)?;
        Response::from_envelope(self.request(config).await?)
    }

    /// Makes a DELETE request and deserializes the response.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let envelope = self
            .request(RequestConfig::new(Method::DELETE, path))
            .await?;
        Response::from_envelope(envelope)
    }

    /// Makes a PATCH request with a JSON body and deserializes the response.
    pub async fn patch<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::PATCH, path).with_json(body)?;
        Response::from_envelope(self.request(config).await?)
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use refetch::{ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), refetch::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::standard())
///     .default_header("User-Agent", "my-app/1.0")?
///     .deduplication(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
    timeout: Option<Duration>,
    rate_limit_config: RateLimitConfig,
    deduplication: bool,
    conditional_requests: bool,
}

impl ClientBuilder {
    /// Creates a builder with the defaults: the standard retry policy,
    /// deduplication and conditional requests on, rate-limit awareness on.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::standard(),
            retry_predicate: None,
            timeout: None,
            rate_limit_config: RateLimitConfig::default(),
            deduplication: true,
            conditional_requests: true,
        }
    }

    /// Sets the base URL all request paths resolve against. Required.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry policy. Defaults to [`RetryPolicy::standard`]; use
    /// [`RetryPolicy::None`] to disable retries.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets a custom retry predicate. By default errors are retried when
    /// [`Error::is_retryable`] says so.
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Sets the default per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the rate limit configuration.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Enables or disables coalescing of identical concurrent GETs.
    pub fn deduplication(mut self, enabled: bool) -> Self {
        self.deduplication = enabled;
        self
    }

    /// Enables or disables the ETag / `If-None-Match` plumbing.
    pub fn conditional_requests(mut self, enabled: bool) -> Self {
        self.conditional_requests = enabled;
        self
    }

    /// Builds the configured [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or the underlying HTTP
    /// client cannot be constructed.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Configuration("base URL is required".to_string()))?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnRetryable));

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                default_headers: self.default_headers,
                retry_policy: self.retry_policy,
                retry_predicate,
                timeout: self.timeout,
                rate_limit_config: self.rate_limit_config,
                deduplication: self.deduplication,
                conditional_requests: self.conditional_requests,
                inflight: InflightMap::new(),
                etags: EtagCache::new(),
                request_interceptors: InterceptorRegistry::new(),
                response_interceptors: InterceptorRegistry::new(),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
