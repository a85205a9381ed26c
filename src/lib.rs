//! # Retrywrap
//!
//! Blocking retry orchestration with pluggable, overflow-safe backoff.
//!
//! A [`Retrier`] calls a fallible operation until it succeeds, returns an error the
//! caller does not want retried, or runs out of attempts. Between attempts it pauses
//! the current thread according to a [`Backoff`] obtained fresh for every run.
//!
//! ## Quick Example
//!
//! ```rust
//! use retrywrap::{DecorrelatedExponentialBackoff, Retrier};
//! use std::time::Duration;
//!
//! #[derive(Debug, PartialEq)]
//! enum ApiError {
//!     Unavailable,
//!     Invalid,
//! }
//!
//! let retrier = Retrier::new()
//!     .with_max_attempts(5)
//!     .with_retriable(|err: &ApiError| *err == ApiError::Unavailable)
//!     .with_backoff(DecorrelatedExponentialBackoff::new(
//!         Duration::from_millis(1),
//!         Duration::from_millis(20),
//!     ));
//!
//! let mut calls = 0;
//! let result = retrier.run(|| {
//!     calls += 1;
//!     if calls < 3 { Err(ApiError::Unavailable) } else { Ok(calls) }
//! });
//! assert_eq!(result, Ok(3));
//!
//! // Invalid requests are never retried.
//! let result: Result<(), _> = retrier.run(|| Err(ApiError::Invalid));
//! assert_eq!(result, Err(ApiError::Invalid));
//! ```
//!
//! ## Features
//!
//! - `tracing`: log retries and exhaustion through the `tracing` crate
//! - `serde`: deserialize [`RetrierConfig`] and [`BackoffConfig`]
//! - `proptest`: `Arbitrary` for [`BackoffConfig`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod retry;
pub mod rpc;
pub mod testing;

// Re-exports
pub use retry::{
    any_err, Backoff, BackoffConfig, BackoffFactory, ConfigError, DecorrelatedBackoffState,
    DecorrelatedExponentialBackoff, ExponentialBackoff, FixedBackoff, FunctionalBackoff,
    NoopBackoff, Retrier, RetrierConfig, RetryExhausted, MAX_WAIT,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        Backoff, BackoffFactory, DecorrelatedExponentialBackoff, ExponentialBackoff,
        FixedBackoff, FunctionalBackoff, NoopBackoff, Retrier,
    };
    pub use crate::rpc::{Client, Transport, TransportFactory};
}
