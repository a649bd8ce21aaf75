//! Bounded fixed-delay retry policy.
//!
//! Shared by the API gateway (transport failures and 5xx responses) and the
//! action executor (per-user follow/unfollow attempts).

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tracing::warn;

/// Default number of attempts per call (first try included).
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: usize,
    /// Fixed delay between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Attempts actually made when every try fails.
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Build the backon strategy. backon counts retries, not attempts.
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.attempts() - 1)
    }

    /// Run `operation` until it succeeds, `should_retry` rejects the error, or
    /// the attempts are used up. The last error is returned on failure.
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, operation: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let attempts = self.attempts();
        let attempt = AtomicUsize::new(0);
        let mut operation = operation;

        let counted = || {
            attempt.fetch_add(1, Ordering::SeqCst);
            operation()
        };

        counted
            .retry(self.into_backoff())
            .when(|err| should_retry(err))
            .notify(|err, dur| {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt.load(Ordering::SeqCst),
                    attempts,
                    err,
                    dur
                );
            })
            .await
    }
}
