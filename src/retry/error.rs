//! Error types for retry runs and retry configuration.

use std::fmt;
use std::time::Duration;

/// A failed run, together with how long it took to fail.
///
/// Only [`Retrier::run_reporting`](crate::Retrier::run_reporting) produces this;
/// [`Retrier::run`](crate::Retrier::run) returns the operation's error untouched.
///
/// # Examples
///
/// ```rust
/// use retrywrap::{NoopBackoff, Retrier};
///
/// let retrier = Retrier::new().with_max_attempts(3).with_backoff(NoopBackoff);
///
/// match retrier.run_reporting(|| Err::<(), _>("always fails")) {
///     Err(exhausted) => {
///         assert_eq!(exhausted.final_error, "always fails");
///         assert_eq!(exhausted.attempts, 3);
///     }
///     Ok(_) => panic!("Expected failure"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the final attempt.
    pub final_error: E,
    /// Total number of attempts made.
    pub attempts: u64,
    /// Time from the first attempt until the run gave up.
    pub total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new RetryExhausted error.
    pub fn new(final_error: E, attempts: u64, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// Get a reference to the final error.
    pub fn error(&self) -> &E {
        &self.final_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempts ({:?}): {}",
            self.attempts, self.total_duration, self.final_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}

/// A retry configuration that cannot be turned into a retrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_attempts` was zero.
    ZeroAttempts,
    /// A backoff's floor was above its ceiling.
    InvertedBounds {
        /// The configured floor.
        min_wait: Duration,
        /// The configured ceiling.
        max_wait: Duration,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
            Self::InvertedBounds { min_wait, max_wait } => write!(
                f,
                "backoff min_wait {:?} is greater than max_wait {:?}",
                min_wait, max_wait
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
