//! The standalone retry helpers, applied to non-HTTP work.
//!
//! Run with: `cargo run --example retry_utilities`

use refetch::backoff::{make_retryable, retry_fixed, retry_with_backoff, RetryOptions, RetryableError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A domain error unrelated to HTTP.
#[derive(Debug)]
enum ReplicaError {
    Lagging,
    Corrupt,
}

impl RetryableError for ReplicaError {
    fn is_retryable(&self) -> bool {
        matches!(self, ReplicaError::Lagging)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("refetch=info,retry_utilities=info")
        .init();

    // Succeeds on the third attempt; the observer sees each retry.
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let result = retry_with_backoff(
        || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(ReplicaError::Lagging)
                } else {
                    Ok(format!("caught up after {n} reads"))
                }
            }
        },
        &RetryOptions::new()
            .max_retries(5)
            .initial_delay(Duration::from_millis(50))
            .jitter(false)
            .on_retry(|attempt, delay, error: &ReplicaError| {
                println!("attempt {attempt} failed ({error:?}), next in {delay:?}");
            }),
    )
    .await;
    println!("backoff result: {result:?}");

    // Non-retryable errors short-circuit on the first attempt.
    let result: Result<(), _> =
        retry_fixed(|| async { Err(ReplicaError::Corrupt) }, 3, Duration::from_millis(10)).await;
    println!("fixed result: {result:?}");

    // A wrapped operation retries on every invocation.
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut refresh = make_retryable(
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n % 2 == 0 {
                    Ok(n)
                } else {
                    Err(ReplicaError::Lagging)
                }
            }
        },
        RetryOptions::new()
            .max_retries(3)
            .initial_delay(Duration::from_millis(10))
            .jitter(false),
    );
    println!("first call: {:?}", refresh.call().await);
    println!("second call: {:?}", refresh.call().await);
}
