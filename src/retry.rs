//! Retry policies and predicates for transient failures.
//!
//! A [`RetryPolicy`] decides *when* the next attempt happens (and bounds how
//! many there are); a [`RetryPredicate`] decides *whether* a given error is
//! worth another attempt. The client consults both after every failure.

use crate::Error;
use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Upper bound of the uniform random jitter added to exponential delays.
const JITTER_MS: u64 = 1000;

/// Defines when and how failed requests are retried.
///
/// The attempt ceiling is a *total* count: `max_attempts: 3` means the
/// request executes at most three times, the first attempt included.
///
/// # Examples
///
/// ```
/// use refetch::RetryPolicy;
/// use std::time::Duration;
///
/// // The default: 1s base delay doubling per attempt, capped at 30s,
/// // at most 3 attempts, with jitter.
/// let standard = RetryPolicy::default();
///
/// // Fixed 500ms between attempts.
/// let fixed = RetryPolicy::Fixed {
///     delay: Duration::from_millis(500),
///     max_attempts: 3,
/// };
/// ```
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    /// Never retry.
    None,

    /// Exponentially increasing delays with optional additive jitter.
    ExponentialBackoff {
        /// Delay before the first retry; doubles on each subsequent one.
        base_delay: Duration,
        /// Ceiling on any single delay.
        max_delay: Duration,
        /// Maximum total attempts, the first included.
        max_attempts: usize,
        /// Add up to 1s of uniform random jitter to each delay.
        jitter: bool,
    },

    /// A constant delay between attempts.
    Fixed {
        /// The delay between attempts.
        delay: Duration,
        /// Maximum total attempts, the first included.
        max_attempts: usize,
    },

    /// Custom delay schedule.
    Custom {
        /// Given the number of attempts already made (1-indexed), returns the
        /// delay before the next one, or `None` to stop.
        delay_fn: fn(attempt: usize) -> Option<Duration>,
    },
}

impl RetryPolicy {
    /// The default policy: 1s base, 30s cap, 3 total attempts, jitter on.
    pub fn standard() -> Self {
        RetryPolicy::ExponentialBackoff {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
            jitter: true,
        }
    }

    /// Returns the delay before the next attempt, or `None` when the attempt
    /// ceiling is reached.
    ///
    /// `attempt` is the number of attempts already made (1-indexed): after
    /// the first execution fails, the client calls `delay_for_attempt(1)`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryPolicy::None => None,
            RetryPolicy::ExponentialBackoff {
                base_delay,
                max_delay,
                max_attempts,
                jitter,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }

                // base_delay * 2^(attempt - 1), saturating
                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1) as u32);
                let mut delay =
                    base_delay.saturating_mul(multiplier.try_into().unwrap_or(u32::MAX));

                if *jitter {
                    let jitter_ms = rand::thread_rng().gen_range(0..JITTER_MS);
                    delay = delay.saturating_add(Duration::from_millis(jitter_ms));
                }

                Some(delay.min(*max_delay))
            }
            RetryPolicy::Fixed {
                delay,
                max_attempts,
            } => {
                if attempt >= *max_attempts {
                    None
                } else {
                    Some(*delay)
                }
            }
            RetryPolicy::Custom { delay_fn } => delay_fn(attempt),
        }
    }

    /// Returns the total attempt ceiling, if the policy has a fixed one.
    pub fn max_attempts(&self) -> Option<usize> {
        match self {
            RetryPolicy::None => Some(1),
            RetryPolicy::ExponentialBackoff { max_attempts, .. } => Some(*max_attempts),
            RetryPolicy::Fixed { max_attempts, .. } => Some(*max_attempts),
            RetryPolicy::Custom { .. } => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Decides whether a failed request should be retried.
///
/// Implement this to retry on custom criteria: error kind, status code,
/// response headers, attempt number.
///
/// # Examples
///
/// ```
/// use refetch::{Error, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         matches!(
///             error,
///             Error::Status { status, .. } if status.as_u16() == 429
///         )
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` to retry after `error`. `attempt` is the number of
    /// attempts already made (1-indexed).
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retry everything [`Error::is_retryable`] marks retryable: network errors,
/// timeouts, and the default transient status set. The client's default.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRetryable;

impl RetryPredicate for RetryOnRetryable {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Retry on network/timeout errors plus an explicit status-code set.
///
/// This is the way to widen or narrow the transient set without writing a
/// predicate from scratch.
///
/// # Examples
///
/// ```
/// use refetch::retry::RetryOnStatus;
///
/// // Also retry 425 Too Early.
/// let predicate = RetryOnStatus::new([408, 425, 429, 500, 502, 503, 504]);
/// ```
#[derive(Debug, Clone)]
pub struct RetryOnStatus {
    statuses: BTreeSet<u16>,
}

impl RetryOnStatus {
    /// Creates a predicate retrying the given status codes (and all
    /// network/timeout errors).
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }
}

impl RetryPredicate for RetryOnStatus {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        match error {
            Error::Network(_) | Error::Timeout => true,
            Error::Status { status, .. } => self.statuses.contains(&status.as_u16()),
            _ => false,
        }
    }
}

/// Retry only on 5xx server errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Status { status, .. } if status.is_server_error())
    }
}

/// Retry only on timeouts.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Timeout)
    }
}

/// Retry only on network/connection errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnConnectionError;

impl RetryPredicate for RetryOnConnectionError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Network(_))
    }
}

/// Combines predicates with OR logic: retries if ANY matches.
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// Combines predicates with AND logic: retries only if ALL match.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(error, attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delays_double_per_attempt() {
        let policy = RetryPolicy::ExponentialBackoff {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
            jitter: false,
        };

        assert_eq!(
            policy.delay_for_attempt(1),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            policy.delay_for_attempt(2),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            policy.delay_for_attempt(3),
            Some(Duration::from_millis(400))
        );
        assert_eq!(
            policy.delay_for_attempt(4),
            Some(Duration::from_millis(800))
        );
    }

    #[test]
    fn total_attempts_equal_the_ceiling() {
        // max_attempts = 3 means the request runs exactly 3 times: after the
        // third failure no further delay is offered.
        let policy = RetryPolicy::ExponentialBackoff {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
            jitter: false,
        };

        assert!(policy.delay_for_attempt(1).is_some());
        assert!(policy.delay_for_attempt(2).is_some());
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::ExponentialBackoff {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            jitter: false,
        };

        assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_secs(30)));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::ExponentialBackoff {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            jitter: true,
        };

        for _ in 0..256 {
            let delay = policy.delay_for_attempt(2).unwrap();
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(200 + JITTER_MS));
        }
    }

    #[test]
    fn fixed_delays_are_constant() {
        let policy = RetryPolicy::Fixed {
            delay: Duration::from_secs(1),
            max_attempts: 3,
        };

        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[test]
    fn no_retry_policy_never_delays() {
        assert_eq!(RetryPolicy::None.delay_for_attempt(1), None);
        assert_eq!(RetryPolicy::None.max_attempts(), Some(1));
    }

    #[test]
    fn status_set_predicate_matches_transport_errors_and_listed_codes() {
        let predicate = RetryOnStatus::new([418]);
        assert!(predicate.should_retry(&Error::Timeout, 1));
        assert!(predicate.should_retry(&Error::Network("down".into()), 1));

        let teapot = Error::Status {
            status: http::StatusCode::IM_A_TEAPOT,
            body: String::new(),
            headers: http::HeaderMap::new(),
            rate_limit: None,
        };
        assert!(predicate.should_retry(&teapot, 1));

        let not_found = Error::Status {
            status: http::StatusCode::NOT_FOUND,
            body: String::new(),
            headers: http::HeaderMap::new(),
            rate_limit: None,
        };
        assert!(!predicate.should_retry(&not_found, 1));
    }
}
