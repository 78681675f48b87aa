//! Request and response interceptor pipelines.
//!
//! Interceptors are the extension point for concerns that belong to callers
//! rather than the client core: injecting authentication headers, refreshing
//! a credential on 401, mapping `304 Not Modified` to a cached payload,
//! request/response logging.
//!
//! Both pipelines are two-channel chains: each stage sees either the
//! previous stage's success value (`on_request` / `on_response`) or its error
//! (`on_error`), and may pass it along, transform it, fail, or (on the error
//! channel) recover. Stages run in registration order.
//!
//! Registration returns an opaque [`InterceptorHandle`]. Removing a handle
//! twice, or a handle that was never issued, is a no-op.
//!
//! # Examples
//!
//! ```
//! use refetch::{RequestConfig, RequestInterceptor, Result};
//!
//! struct BearerAuth {
//!     token: String,
//! }
//!
//! impl RequestInterceptor for BearerAuth {
//!     fn on_request(&self, request: RequestConfig) -> Result<RequestConfig> {
//!         request.with_header("Authorization", format!("Bearer {}", self.token))
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::util::lock_unpoisoned;
use crate::{Error, HttpResponse, RequestConfig, Result};

/// Transforms outgoing requests before they reach the dedup and transport
/// layers.
pub trait RequestInterceptor: Send + Sync {
    /// Receives the request produced by the previous stage and returns the
    /// request to hand to the next one. Returning an error short-circuits
    /// into the error channel.
    fn on_request(&self, request: RequestConfig) -> Result<RequestConfig>;

    /// Receives an error raised by an earlier stage. Return `Ok` to recover
    /// with a replacement request, or propagate the error.
    fn on_error(&self, error: Error) -> Result<RequestConfig> {
        Err(error)
    }
}

/// Transforms responses (and errors) on their way back to the caller.
pub trait ResponseInterceptor: Send + Sync {
    /// Receives the response produced by the previous stage.
    fn on_response(&self, response: HttpResponse) -> Result<HttpResponse> {
        Ok(response)
    }

    /// Receives an error from the transport/retry layers or from an earlier
    /// stage. Return `Ok` to recover with a substitute response.
    fn on_error(&self, error: Error) -> Result<HttpResponse> {
        Err(error)
    }
}

/// Opaque removal token for a registered interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle(u64);

/// Ordered interceptor storage keyed by a monotonic id, so handles stay valid
/// across removals and iteration follows registration order.
pub(crate) struct InterceptorRegistry<I: ?Sized> {
    entries: Mutex<BTreeMap<u64, Arc<I>>>,
    next_id: AtomicU64,
}

impl<I: ?Sized> InterceptorRegistry<I> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn add(&self, interceptor: Arc<I>) -> InterceptorHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock_unpoisoned(&self.entries).insert(id, interceptor);
        InterceptorHandle(id)
    }

    /// Removing an unknown or already-removed handle is a no-op.
    pub(crate) fn remove(&self, handle: InterceptorHandle) {
        lock_unpoisoned(&self.entries).remove(&handle.0);
    }

    /// The current chain, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<I>> {
        lock_unpoisoned(&self.entries).values().cloned().collect()
    }
}

impl<I: ?Sized> std::fmt::Debug for InterceptorRegistry<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("len", &lock_unpoisoned(&self.entries).len())
            .finish()
    }
}

/// Threads a request through the chain, switching between the success and
/// error channels as stages succeed or fail.
pub(crate) fn run_request_chain(
    chain: &[Arc<dyn RequestInterceptor>],
    request: RequestConfig,
) -> Result<RequestConfig> {
    let mut state = Ok(request);
    for interceptor in chain {
        state = match state {
            Ok(request) => interceptor.on_request(request),
            Err(error) => interceptor.on_error(error),
        };
    }
    state
}

/// Threads an outcome through the response chain; errors may be recovered
/// into responses by any stage.
pub(crate) fn run_response_chain(
    chain: &[Arc<dyn ResponseInterceptor>],
    outcome: Result<HttpResponse>,
) -> Result<HttpResponse> {
    let mut state = outcome;
    for interceptor in chain {
        state = match state {
            Ok(response) => interceptor.on_response(response),
            Err(error) => interceptor.on_error(error),
        };
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::time::Duration;

    struct AppendHeader(&'static str, &'static str);

    impl RequestInterceptor for AppendHeader {
        fn on_request(&self, request: RequestConfig) -> Result<RequestConfig> {
            request.with_header(self.0, self.1)
        }
    }

    struct FailRequest;

    impl RequestInterceptor for FailRequest {
        fn on_request(&self, _request: RequestConfig) -> Result<RequestConfig> {
            Err(Error::Configuration("rejected".into()))
        }
    }

    struct RecoverRequest;

    impl RequestInterceptor for RecoverRequest {
        fn on_request(&self, request: RequestConfig) -> Result<RequestConfig> {
            Ok(request)
        }

        fn on_error(&self, _error: Error) -> Result<RequestConfig> {
            Ok(RequestConfig::get("/fallback"))
        }
    }

    fn registry() -> InterceptorRegistry<dyn RequestInterceptor> {
        InterceptorRegistry::new()
    }

    #[test]
    fn chain_runs_in_registration_order() {
        let reg = registry();
        reg.add(Arc::new(AppendHeader("x-first", "1")));
        reg.add(Arc::new(AppendHeader("x-second", "2")));

        let out = run_request_chain(&reg.snapshot(), RequestConfig::get("/")).unwrap();
        assert_eq!(out.headers.get("x-first").unwrap(), "1");
        assert_eq!(out.headers.get("x-second").unwrap(), "2");
    }

    #[test]
    fn failure_short_circuits_later_success_stages() {
        let reg = registry();
        reg.add(Arc::new(FailRequest));
        reg.add(Arc::new(AppendHeader("x-after", "1")));

        let err = run_request_chain(&reg.snapshot(), RequestConfig::get("/")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn error_channel_can_recover() {
        let reg = registry();
        reg.add(Arc::new(FailRequest));
        reg.add(Arc::new(RecoverRequest));

        let out = run_request_chain(&reg.snapshot(), RequestConfig::get("/")).unwrap();
        assert_eq!(out.path, "/fallback");
    }

    #[test]
    fn removal_is_idempotent_and_leaves_others_intact() {
        let reg = registry();
        let first = reg.add(Arc::new(AppendHeader("x-first", "1")));
        let second = reg.add(Arc::new(AppendHeader("x-second", "2")));

        reg.remove(first);
        reg.remove(first); // second removal: no-op
        reg.remove(InterceptorHandle(9999)); // never issued: no-op

        let out = run_request_chain(&reg.snapshot(), RequestConfig::get("/")).unwrap();
        assert!(out.headers.get("x-first").is_none());
        assert_eq!(out.headers.get("x-second").unwrap(), "2");

        // Handles issued before a removal stay valid.
        reg.remove(second);
        let out = run_request_chain(&reg.snapshot(), RequestConfig::get("/")).unwrap();
        assert!(out.headers.is_empty());
    }

    struct RecoverNotModified;

    impl ResponseInterceptor for RecoverNotModified {
        fn on_error(&self, error: Error) -> Result<HttpResponse> {
            if error.status().map(|s| s.as_u16()) == Some(304) {
                return Ok(HttpResponse {
                    status: StatusCode::OK,
                    headers: http::HeaderMap::new(),
                    body: "cached".to_string(),
                    latency: Duration::ZERO,
                    attempts: 1,
                });
            }
            Err(error)
        }
    }

    #[test]
    fn response_error_channel_recovers_not_modified() {
        let reg: InterceptorRegistry<dyn ResponseInterceptor> = InterceptorRegistry::new();
        reg.add(Arc::new(RecoverNotModified));

        let not_modified = Error::Status {
            status: StatusCode::NOT_MODIFIED,
            body: String::new(),
            headers: http::HeaderMap::new(),
            rate_limit: None,
        };
        let out = run_response_chain(&reg.snapshot(), Err(not_modified)).unwrap();
        assert_eq!(out.body, "cached");

        let not_found = Error::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
            headers: http::HeaderMap::new(),
            rate_limit: None,
        };
        assert!(run_response_chain(&reg.snapshot(), Err(not_found)).is_err());
    }
}
