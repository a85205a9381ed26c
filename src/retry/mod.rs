//! Retrying fallible operations with pluggable backoff.
//!
//! - [`Retrier`] owns the attempt budget, the retriability predicate and a backoff factory.
//!   It is plain configuration, cheap to clone and safe to share between threads.
//! - [`Backoff`] pauses between attempts; [`BackoffFactory`] hands out one backoff per run
//!   so stateful strategies never leak history from one run into another.
//!
//! # Quick Start
//!
//! ```rust
//! use retrywrap::{ExponentialBackoff, Retrier};
//! use std::time::Duration;
//!
//! let retrier = Retrier::new()
//!     .with_max_attempts(4)
//!     .with_backoff(ExponentialBackoff::new(
//!         Duration::from_millis(1),
//!         Duration::from_millis(10),
//!     ));
//!
//! let mut calls = 0;
//! let result = retrier.run(|| {
//!     calls += 1;
//!     if calls < 3 { Err("connection reset") } else { Ok("payload") }
//! });
//!
//! assert_eq!(result, Ok("payload"));
//! assert_eq!(calls, 3);
//! ```
//!
//! # Backoff Strategies
//!
//! - **Noop**: no wait at all
//! - **Fixed**: the same wait after every failure
//! - **Exponential**: `min * 2^attempt` up to a cap, optionally jittered to `[50%, 100%]`
//! - **Decorrelated exponential**: random walk between the floor and three times the
//!   previous wait (the default)
//! - **Functional**: any closure taking the attempt index
//!
//! # Error Types
//!
//! - [`RetryExhausted`]: returned by [`Retrier::run_reporting`], holds the final error and
//!   how many attempts were made
//! - [`ConfigError`]: an invalid [`RetrierConfig`]

pub mod backoff;
mod config;
mod error;
mod retrier;

pub use backoff::{
    Backoff, BackoffFactory, DecorrelatedBackoffState, DecorrelatedExponentialBackoff,
    ExponentialBackoff, FixedBackoff, FunctionalBackoff, NoopBackoff, MAX_WAIT,
};
pub use config::{BackoffConfig, RetrierConfig};
pub use error::{ConfigError, RetryExhausted};
pub use retrier::{any_err, Retrier};
