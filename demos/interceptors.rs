//! Interceptor pipelines: header injection, logging, and error recovery.
//!
//! Run with: `cargo run --example interceptors`

use refetch::{
    Client, Error, HttpResponse, RequestConfig, RequestInterceptor, ResponseInterceptor,
};
use std::time::Duration;

/// Adds a bearer token to every outgoing request.
struct BearerAuth {
    token: String,
}

impl RequestInterceptor for BearerAuth {
    fn on_request(&self, request: RequestConfig) -> refetch::Result<RequestConfig> {
        request.with_header("Authorization", format!("Bearer {}", self.token))
    }
}

/// Logs every response and error flowing back to callers.
struct LogOutcome;

impl ResponseInterceptor for LogOutcome {
    fn on_response(&self, response: HttpResponse) -> refetch::Result<HttpResponse> {
        println!("<- {} in {:?}", response.status, response.latency);
        Ok(response)
    }

    fn on_error(&self, error: Error) -> refetch::Result<HttpResponse> {
        println!("<- failed: {error}");
        Err(error)
    }
}

/// Maps `304 Not Modified` to a stand-in payload. A real application would
/// substitute the body it cached alongside the ETag.
struct NotModifiedFallback;

impl ResponseInterceptor for NotModifiedFallback {
    fn on_error(&self, error: Error) -> refetch::Result<HttpResponse> {
        if error.status().map(|s| s.as_u16()) == Some(304) {
            return Ok(HttpResponse {
                status: http::StatusCode::OK,
                headers: http::HeaderMap::new(),
                body: "{\"cached\": true}".to_string(),
                latency: Duration::ZERO,
                attempts: 1,
            });
        }
        Err(error)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("refetch=info,interceptors=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    let auth_handle = client.add_request_interceptor(BearerAuth {
        token: "demo-token".to_string(),
    });
    client.add_response_interceptor(LogOutcome);
    client.add_response_interceptor(NotModifiedFallback);

    let post = client.get::<serde_json::Value>("/posts/1").await?;
    println!("got: {}", post.raw_body.len());

    // Interceptors are removable by handle; removing twice is a no-op.
    client.remove_request_interceptor(auth_handle);
    client.remove_request_interceptor(auth_handle);

    let post = client.get::<serde_json::Value>("/posts/2").await?;
    println!("got without auth header: {}", post.raw_body.len());

    Ok(())
}
