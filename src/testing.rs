//! Testing utilities for code built on [`Retrier`](crate::Retrier).
//!
//! # Examples
//!
//! ```rust
//! use retrywrap::testing::{BackoffRecorder, FlakyOperation};
//! use retrywrap::Retrier;
//!
//! let op = FlakyOperation::new(2, "timeout");
//! let recorder = BackoffRecorder::new();
//!
//! let retrier = Retrier::new()
//!     .with_max_attempts(5)
//!     .with_backoff(recorder.backoff());
//!
//! assert_eq!(retrier.run(|| op.call()), Ok(3));
//! assert_eq!(op.calls(), 3);
//! assert_eq!(recorder.attempts(), vec![0, 1]);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::retry::FunctionalBackoff;

/// An operation that fails a fixed number of times, then succeeds.
///
/// Every call is counted, so tests can check how often the retrier invoked it.
#[derive(Debug)]
pub struct FlakyOperation<E> {
    failures: u64,
    error: E,
    calls: AtomicU64,
}

impl<E: Clone> FlakyOperation<E> {
    /// Fail the first `failures` calls with `error`.
    pub fn new(failures: u64, error: E) -> Self {
        Self {
            failures,
            error,
            calls: AtomicU64::new(0),
        }
    }

    /// An operation that never succeeds.
    pub fn always_failing(error: E) -> Self {
        Self::new(u64::MAX, error)
    }

    /// Invoke the operation. On success returns the 1-based number of this call.
    pub fn call(&self) -> Result<u64, E> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(self.error.clone())
        } else {
            Ok(call)
        }
    }

    /// How many times [`call`](Self::call) ran.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Records the attempt index of every backoff it is asked to perform, without waiting.
#[derive(Debug, Clone, Default)]
pub struct BackoffRecorder {
    attempts: Arc<Mutex<Vec<u64>>>,
}

impl BackoffRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backoff that writes into this recorder.
    pub fn backoff(&self) -> FunctionalBackoff {
        let attempts = Arc::clone(&self.attempts);
        FunctionalBackoff::new(move |attempt| {
            attempts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(attempt);
        })
    }

    /// Attempt indices seen so far, in order.
    pub fn attempts(&self) -> Vec<u64> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(feature = "proptest")]
use crate::retry::BackoffConfig;
#[cfg(feature = "proptest")]
use proptest::prelude::*;
#[cfg(feature = "proptest")]
use std::time::Duration;

/// Valid configurations only: bounds are always ordered.
#[cfg(feature = "proptest")]
impl Arbitrary for BackoffConfig {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        let bounds = (0u64..60_000, 0u64..60_000).prop_map(|(a, b)| {
            (
                Duration::from_millis(a.min(b)),
                Duration::from_millis(a.max(b)),
            )
        });

        prop_oneof![
            Just(BackoffConfig::None),
            (0u64..60_000).prop_map(|ms| BackoffConfig::Fixed {
                wait: Duration::from_millis(ms)
            }),
            (bounds.clone(), any::<bool>()).prop_map(|((min_wait, max_wait), jitter)| {
                BackoffConfig::Exponential {
                    min_wait,
                    max_wait,
                    jitter,
                }
            }),
            bounds.prop_map(|(min_wait, max_wait)| BackoffConfig::DecorrelatedExponential {
                min_wait,
                max_wait
            }),
        ]
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Retrier;

    #[test]
    fn flaky_operation_fails_then_succeeds() {
        let op = FlakyOperation::new(2, "boom");
        assert_eq!(op.call(), Err("boom"));
        assert_eq!(op.call(), Err("boom"));
        assert_eq!(op.call(), Ok(3));
        assert_eq!(op.calls(), 3);
    }

    #[test]
    fn flaky_operation_with_no_failures() {
        let op = FlakyOperation::new(0, "boom");
        assert_eq!(op.call(), Ok(1));
    }

    #[test]
    fn always_failing_never_succeeds() {
        let op = FlakyOperation::always_failing("boom");
        for _ in 0..100 {
            assert_eq!(op.call(), Err("boom"));
        }
    }

    #[test]
    fn recorder_starts_empty() {
        assert!(BackoffRecorder::new().attempts().is_empty());
    }

    #[test]
    fn recorder_clones_share_attempts() {
        let recorder = BackoffRecorder::new();
        let retrier = Retrier::new()
            .with_max_attempts(4)
            .with_backoff(recorder.clone().backoff());

        let op = FlakyOperation::always_failing("boom");
        assert_eq!(retrier.run(|| op.call()), Err("boom"));
        assert_eq!(recorder.attempts(), vec![0, 1, 2]);
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn backoff_config_arbitrary_is_always_valid(
                config in any::<BackoffConfig>()
            ) {
                prop_assert!(config.validate().is_ok());
            }
        }
    }
}
