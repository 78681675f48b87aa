//! Standalone retry-with-backoff for arbitrary async operations.
//!
//! [`retry_with_backoff`] is not tied to HTTP: any failure-prone operation
//! whose error type implements [`RetryableError`] (or for which a custom
//! predicate is supplied) can be wrapped. [`retry_request`] specializes it to
//! this crate's [`Error`](crate::Error), and [`retry_fixed`] trades the
//! exponential schedule for a constant delay.
//!
//! As with [`RetryPolicy`](crate::RetryPolicy), `max_retries` is a *total*
//! attempt count: `3` means at most three executions, the first included.
//!
//! # Examples
//!
//! ```no_run
//! use refetch::backoff::{retry_with_backoff, RetryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), refetch::Error> {
//! let value = retry_with_backoff(
//!     || async { fetch_flaky_thing().await },
//!     &RetryOptions::new()
//!         .max_retries(3)
//!         .initial_delay(Duration::from_millis(100)),
//! )
//! .await?;
//! # Ok(())
//! # }
//! # async fn fetch_flaky_thing() -> refetch::Result<String> { Ok(String::new()) }
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as transient or permanent.
///
/// The default predicate of [`RetryOptions`] delegates here, so wrapping an
/// operation whose error type implements this trait needs no configuration.
pub trait RetryableError {
    /// `true` when another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for crate::Error {
    fn is_retryable(&self) -> bool {
        crate::Error::is_retryable(self)
    }
}

/// Tuning for [`retry_with_backoff`].
pub struct RetryOptions<E> {
    /// Maximum total attempts, the first included. Values below 1 behave
    /// as 1.
    pub max_retries: usize,

    /// Delay after the first failed attempt; doubles per attempt.
    pub initial_delay: Duration,

    /// Ceiling on the exponential component of the delay.
    pub max_delay: Duration,

    /// Add up to 1s of uniform random jitter on top of each delay.
    pub jitter: bool,

    should_retry: Option<Box<dyn Fn(&E) -> bool + Send + Sync>>,
    on_retry: Option<Box<dyn Fn(usize, Duration, &E) + Send + Sync>>,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
            should_retry: None,
            on_retry: None,
        }
    }
}

impl<E> RetryOptions<E> {
    /// Options with the defaults: 3 total attempts, 1s initial delay, 10s
    /// cap, jitter on, retryability decided by [`RetryableError`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total attempt ceiling.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay after the first failed attempt.
    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Sets the ceiling on the exponential component of the delay.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enables or disables the random jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Overrides the retryability predicate for this operation.
    pub fn should_retry(
        mut self,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Box::new(predicate));
        self
    }

    /// Observes each retry: receives the attempt number just failed
    /// (1-indexed), the upcoming delay, and the error.
    pub fn on_retry(
        mut self,
        observer: impl Fn(usize, Duration, &E) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(observer));
        self
    }

    fn retryable(&self, error: &E) -> bool
    where
        E: RetryableError,
    {
        match &self.should_retry {
            Some(predicate) => predicate(error),
            None => error.is_retryable(),
        }
    }

    /// `min(initial_delay * 2^(attempt-1), max_delay)` plus jitter.
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1) as u32);
        let exponential = self
            .initial_delay
            .saturating_mul(multiplier.try_into().unwrap_or(u32::MAX));
        let mut delay = exponential.min(self.max_delay);
        if self.jitter {
            let jitter_ms = rand::thread_rng().gen_range(0..1000);
            delay = delay.saturating_add(Duration::from_millis(jitter_ms));
        }
        delay
    }
}

/// Runs `operation` until it succeeds, retries are exhausted, or it fails
/// with a non-retryable error. The last error is returned unchanged.
pub async fn retry_with_backoff<Op, Fut, T, E>(
    mut operation: Op,
    options: &RetryOptions<E>,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= options.max_retries || !options.retryable(&error) {
                    return Err(error);
                }

                let delay = options.delay_for_attempt(attempt);
                if let Some(on_retry) = &options.on_retry {
                    on_retry(attempt, delay, &error);
                }
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// [`retry_with_backoff`] with a constant delay between attempts.
pub async fn retry_fixed<Op, Fut, T, E>(
    operation: Op,
    max_retries: usize,
    delay: Duration,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let options = RetryOptions::new()
        .max_retries(max_retries)
        .initial_delay(delay)
        .max_delay(delay)
        .jitter(false);
    retry_with_backoff(operation, &options).await
}

/// [`retry_with_backoff`] specialized to this crate's [`Error`](crate::Error)
/// with the default policy, for HTTP-shaped call sites.
pub async fn retry_request<Op, Fut, T>(operation: Op) -> crate::Result<T>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    retry_with_backoff(operation, &RetryOptions::default()).await
}

/// An operation bundled with its retry options, re-invocable any number of
/// times. Built with [`make_retryable`].
///
/// Arguments the operation needs are bound by capture; each [`call`](Self::call)
/// runs the full retry loop.
pub struct Retryable<Op, E> {
    operation: Op,
    options: RetryOptions<E>,
}

/// Wraps `operation` so every invocation retries per `options`.
pub fn make_retryable<Op, Fut, T, E>(operation: Op, options: RetryOptions<E>) -> Retryable<Op, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    Retryable { operation, options }
}

impl<Op, E> Retryable<Op, E> {
    /// Runs the wrapped operation with retries.
    pub async fn call<Fut, T>(&mut self) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        retry_with_backoff(&mut self.operation, &self.options).await
    }
}
