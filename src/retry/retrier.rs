//! The retry loop.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::backoff::{BackoffFactory, DecorrelatedExponentialBackoff};
use super::error::RetryExhausted;

/// Default predicate: every error is worth another attempt.
pub fn any_err<E>(_error: &E) -> bool {
    true
}

/// Calls a fallible operation until it succeeds, fails for good, or runs out of attempts.
///
/// A `Retrier` is immutable configuration. Build it once, keep it next to the client
/// that needs it, and share it freely between threads: every [`run`](Self::run) asks the
/// backoff factory for its own backoff, so runs never see each other's state.
///
/// Defaults:
/// - one attempt ([`Retrier::DEFAULT_MAX_ATTEMPTS`]),
/// - every error is retriable ([`any_err`]),
/// - [`DecorrelatedExponentialBackoff::default`] (500ms floor, 60s ceiling).
///
/// # Examples
///
/// ```rust
/// use retrywrap::{NoopBackoff, Retrier};
///
/// #[derive(Debug, PartialEq)]
/// enum FetchError {
///     Unavailable,
///     NotFound,
/// }
///
/// let retrier = Retrier::new()
///     .with_max_attempts(5)
///     .with_retriable(|err: &FetchError| matches!(err, FetchError::Unavailable))
///     .with_backoff(NoopBackoff);
///
/// // Permanent errors are returned after a single attempt.
/// let mut calls = 0;
/// let result: Result<(), _> = retrier.run(|| {
///     calls += 1;
///     Err(FetchError::NotFound)
/// });
/// assert_eq!(result, Err(FetchError::NotFound));
/// assert_eq!(calls, 1);
/// ```
pub struct Retrier<E> {
    max_attempts: u64,
    is_retriable: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    backoff_factory: Arc<dyn BackoffFactory>,
}

impl<E: 'static> Retrier<E> {
    /// Attempts made when none are configured.
    pub const DEFAULT_MAX_ATTEMPTS: u64 = 1;

    /// Create a retrier with the default configuration.
    pub fn new() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            is_retriable: Arc::new(any_err::<E>),
            backoff_factory: Arc::new(DecorrelatedExponentialBackoff::default()),
        }
    }

    /// Set the total number of attempts, including the first. Zero is treated as one.
    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Decide which errors are worth another attempt.
    pub fn with_retriable<P>(mut self, is_retriable: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_retriable = Arc::new(is_retriable);
        self
    }

    /// Use `factory` to create the backoff of each run.
    pub fn with_backoff<B>(mut self, factory: B) -> Self
    where
        B: BackoffFactory + 'static,
    {
        self.backoff_factory = Arc::new(factory);
        self
    }

    /// Use an already shared backoff factory.
    pub fn with_shared_backoff(mut self, factory: Arc<dyn BackoffFactory>) -> Self {
        self.backoff_factory = factory;
        self
    }
}

impl<E> Retrier<E> {
    /// Total number of attempts a run may make.
    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    /// Whether `error` would trigger another attempt.
    pub fn is_retriable(&self, error: &E) -> bool {
        (self.is_retriable)(error)
    }

    /// The factory each run draws its backoff from.
    pub fn backoff_factory(&self) -> &Arc<dyn BackoffFactory> {
        &self.backoff_factory
    }

    /// Run `op` until it succeeds, returns a non-retriable error, or the attempt budget
    /// is spent.
    ///
    /// The backoff pauses between attempts, never after the last one. On failure the
    /// error of the final attempt is returned as is.
    pub fn run<T, F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.execute(op).map_err(|(error, _)| error)
    }

    /// Like [`run`](Self::run), but a failure carries the attempt count and elapsed time.
    pub fn run_reporting<T, F>(&self, op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        let start = Instant::now();
        self.execute(op)
            .map_err(|(error, attempts)| RetryExhausted::new(error, attempts, start.elapsed()))
    }

    fn execute<T, F>(&self, mut op: F) -> Result<T, (E, u64)>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut backoff = self.backoff_factory.new_backoff();
        let mut attempt = 0u64;

        loop {
            let error = match op() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.is_retriable(&error) {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, "non-retriable error, giving up");
                return Err((error, attempt + 1));
            }

            if attempt + 1 >= self.max_attempts {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempts = attempt + 1,
                    max_attempts = self.max_attempts,
                    "retry attempts exhausted"
                );
                return Err((error, attempt + 1));
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                max_attempts = self.max_attempts,
                "attempt failed, retrying"
            );

            backoff.backoff(attempt);
            attempt += 1;
        }
    }
}

impl<E: 'static> Default for Retrier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Retrier<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            is_retriable: Arc::clone(&self.is_retriable),
            backoff_factory: Arc::clone(&self.backoff_factory),
        }
    }
}

impl<E> fmt::Debug for Retrier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
